use auxd_core::config::SupervisorSettings;
use auxd_core::store::{ConfigStore, JsonConfigStore};
use auxd_core::supervisor::output::TracingSink;
use auxd_core::supervisor::Supervisor;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    tracing::info!("auxd starting");

    let settings = SupervisorSettings::load();
    let store_path =
        std::env::var("AUXD_STORE_PATH").unwrap_or_else(|_| "./projects.json".to_string());
    let store = Arc::new(JsonConfigStore::open(&store_path)?);
    let supervisor = Supervisor::new(store.clone(), Arc::new(TracingSink), settings);

    // autostart pass over every known project
    let project_ids = store.project_ids();
    for project_id in &project_ids {
        let project = match store.get_project(project_id) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Skipping project {}: {}", project_id, e);
                continue;
            }
        };
        for cfg in project.processes.iter().filter(|c| c.autostart) {
            match supervisor.start_process(project_id, &cfg.name).await {
                Ok(count) => {
                    tracing::info!(
                        "Autostarted '{}' for project '{}' ({} instance(s))",
                        cfg.name,
                        project.name,
                        count
                    );
                }
                Err(e) => tracing::error!("Autostart of '{}' failed: {}", cfg.name, e),
            }
        }
    }

    // run until Ctrl+C / SIGTERM, then take every group down
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping all processes");
    for project_id in &project_ids {
        match supervisor.stop_all_processes(project_id).await {
            Ok(count) if count > 0 => {
                tracing::info!("Stopped {} group(s) for project {}", count, project_id);
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Failed to stop project {}: {}", project_id, e),
        }
    }
    tracing::info!("auxd stopped");
    Ok(())
}
