use crate::commands::graph_or_exit;
use crate::project::Project;
use colored::Colorize;
use stackfleet_cloud::StateManager;

pub async fn handle(project: &Project) -> anyhow::Result<()> {
    let graph = graph_or_exit(project);
    let state = StateManager::new(&project.root).load().await?;

    println!("{}", "Provisioning order:".bold());
    for (position, stack) in graph.ordered_stacks().enumerate() {
        let deps = graph.dependencies_of(&stack.id);
        if deps.is_empty() {
            println!("  {}. {}", position + 1, stack.id.cyan());
        } else {
            println!(
                "  {}. {} {}",
                position + 1,
                stack.id.cyan(),
                format!("(after {})", deps.join(", ")).dimmed()
            );
        }

        for resource in &stack.resources {
            let key = format!("{}/{}", stack.id, resource.id);
            let status = match state.get_resource(&key) {
                Some(_) => "exists".dimmed(),
                None => "create".green(),
            };
            println!(
                "       {:<26} {:<16} [{}]",
                resource.kind.to_string(),
                resource.id,
                status
            );
        }
    }

    let edges = graph.edges();
    if !edges.is_empty() {
        println!();
        println!("{}", "Dependencies:".bold());
        for (producer, consumer) in edges {
            println!("  {} -> {}", producer, consumer);
        }
    }

    Ok(())
}
