use crate::project::Project;
use colored::Colorize;
use stackfleet_registry::parse_nodes_file;

pub fn handle(project: &Project) -> anyhow::Result<()> {
    let Some(path) = &project.nodes_file else {
        println!("{}", "No nodes registered (nodes.kdl not found)".yellow());
        return Ok(());
    };

    let nodes = parse_nodes_file(path)?;
    println!("Nodes ({}): {}", nodes.len(), path.display().to_string().dimmed());
    for node in &nodes {
        let attributes = node
            .attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        let capacity = if node.capacity == 0 {
            "draining".yellow()
        } else {
            format!("capacity {}", node.capacity).normal()
        };
        println!(
            "  - {} cluster={} {} {}",
            node.id.cyan(),
            node.cluster_id,
            capacity,
            attributes.dimmed()
        );
    }
    Ok(())
}
