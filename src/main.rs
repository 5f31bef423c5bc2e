use clap::Parser;
use diagramdb::{
    api::{self, AppState},
    config::{CliArgs, Config},
    logging,
    workspace::{Workspace, WorkspaceError},
};
use metrics_exporter_prometheus::PrometheusBuilder;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("diagramdb: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);
    logging::init(&config.logging)?;
    let metrics = PrometheusBuilder::new().install_recorder()?;

    let storage = config.storage.clone();
    let workspace = tokio::task::spawn_blocking(move || -> Result<Workspace, WorkspaceError> {
        let mut workspace = Workspace::open(storage)?;
        if let Err(e) = workspace.load_all() {
            // Requests retry the load, so a store that is down at start-up is not fatal.
            tracing::error!(error = %e, "Initial load failed");
        }
        Ok(workspace)
    })
    .await??;

    let state = AppState::new(workspace, Some(metrics));
    let addr = config.listen_addr()?;
    tracing::info!(%addr, "API listening");

    axum::Server::bind(&addr)
        .serve(api::router(state.clone()).into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    // The remote store's blocking HTTP client must not be dropped on the runtime.
    tokio::task::spawn_blocking(move || drop(state)).await?;
    tracing::info!("API stopped");
    Ok(())
}
