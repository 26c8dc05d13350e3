use crate::commands::graph_or_exit;
use crate::project::Project;
use colored::Colorize;

pub fn handle(project: &Project) -> anyhow::Result<()> {
    println!("{}", "Validating stack definitions...".blue());
    println!("Project root: {}", project.root.display().to_string().cyan());
    for file in &project.files {
        println!("  • {}", file.display());
    }

    let graph = graph_or_exit(project);

    println!("{}", "✓ Stack definitions are valid".green().bold());
    println!();
    println!("Summary:");
    println!("  stacks: {}", graph.len());
    for stack in graph.ordered_stacks() {
        let deps = graph.dependencies_of(&stack.id);
        let deps = if deps.is_empty() {
            String::new()
        } else {
            format!(", depends on {}", deps.join(", "))
        };
        println!(
            "    - {} ({} resources{})",
            stack.id.cyan(),
            stack.resources.len(),
            deps
        );
    }
    println!("  edges: {}", graph.edges().len());
    if !graph.secrets().is_empty() {
        println!("  secrets: {}", graph.secrets().len());
        for (id, declaration) in graph.secrets() {
            println!("    - {} (declared in {})", id.cyan(), declaration.stack);
        }
    }

    Ok(())
}
