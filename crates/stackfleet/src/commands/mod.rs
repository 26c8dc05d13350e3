pub mod apply;
pub mod nodes;
pub mod plan;
pub mod validate;

use crate::project::Project;
use colored::Colorize;
use stackfleet_core::ProvisioningGraph;

/// Build the graph or report the error and exit with status 1
pub(crate) fn graph_or_exit(project: &Project) -> ProvisioningGraph {
    match project.graph() {
        Ok(graph) => graph,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Invalid stack definitions".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
