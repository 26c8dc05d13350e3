use crate::commands::graph_or_exit;
use crate::project::Project;
use colored::Colorize;
use stackfleet_cloud::{
    EnvSecretStore, ExecutionReport, Executor, ExecutorConfig, LocalProvider, OnePasswordStore,
    ProviderRegistry, SecretStore, StackState, StateManager,
};
use stackfleet_config::{SecretBackend, Settings};
use stackfleet_registry::{AlwaysHealthy, NodeRegistry, PlacementEngine, StaticNodeRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Provision every stack; returns the process exit code
pub async fn handle(
    project: &Project,
    concurrency: Option<usize>,
    json: bool,
) -> anyhow::Result<i32> {
    let graph = graph_or_exit(project);
    let settings = Settings::load(Some(project.root.as_path()))?;

    let state_manager = StateManager::new(&project.root);
    let lock = state_manager.acquire_lock().await?;
    let state = state_manager.load().await?;

    let provider = Arc::new(LocalProvider::new(state.clone()));
    let placement = Arc::new(
        PlacementEngine::new(Arc::new(AlwaysHealthy)).with_stable(state.placements.values().cloned()),
    );
    let nodes: Arc<dyn NodeRegistry> = match &project.nodes_file {
        Some(path) => Arc::new(StaticNodeRegistry::from_file(path)?),
        None => Arc::new(StaticNodeRegistry::new(Vec::new())),
    };
    let secrets: Arc<dyn SecretStore> = match settings.secret_backend {
        SecretBackend::Env => Arc::new(EnvSecretStore),
        SecretBackend::OnePassword => Arc::new(OnePasswordStore::new()),
    };

    let config = ExecutorConfig {
        max_parallel_stacks: concurrency.unwrap_or(settings.max_parallel_stacks).max(1),
        provider_rate_limit: settings.provider_rate_limit,
        resource_timeout: settings.resource_timeout_secs.map(Duration::from_secs),
    };
    info!(
        stacks = graph.len(),
        max_parallel_stacks = config.max_parallel_stacks,
        secret_backend = %settings.secret_backend,
        "Applying"
    );

    if !json {
        println!(
            "{}",
            format!(
                "Provisioning {} stacks ({} in parallel)...",
                graph.len(),
                config.max_parallel_stacks
            )
            .blue()
        );
    }

    let executor = Executor::new(
        Arc::new(ProviderRegistry::new().with_all(provider.clone())),
        nodes,
        placement.clone(),
        secrets,
    )
    .with_config(config);
    let report = executor.execute(&graph).await;

    let mut next = provider.snapshot().await;
    next.set_placements(placement.stable_placements().await);
    state_manager.save(&next).await?;
    lock.release().await?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }

    Ok(report.exit_code())
}

fn print_report(report: &ExecutionReport) {
    println!();
    for stack in &report.stacks {
        let state = match stack.state {
            StackState::Materialized => "✓".green(),
            StackState::Failed => "✗".red(),
            StackState::Skipped => "-".yellow(),
            StackState::Pending | StackState::Materializing => "?".dimmed(),
        };
        println!(
            "{} {} {} {}",
            state,
            stack.id.cyan(),
            stack.state.to_string().dimmed(),
            format!("({}ms)", stack.duration_ms).dimmed()
        );
        for resource in &stack.resources {
            println!("    {:<8} {}", resource.action.to_string(), resource.id);
        }
        for (name, value) in &stack.outputs {
            println!("    {} {} = {}", "output".dimmed(), name, value);
        }
        if let Some(error) = &stack.error {
            match &error.resource {
                Some(resource) => println!("    {} {}: {}", "error".red(), resource, error.message),
                None => println!("    {} {}", "error".red(), error.message),
            }
        }
    }

    println!();
    let summary = format!(
        "{} materialized, {} failed, {} skipped in {}ms",
        report.count(StackState::Materialized),
        report.count(StackState::Failed),
        report.count(StackState::Skipped),
        report.duration_ms
    );
    if report.is_success() {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.red().bold());
    }
}
