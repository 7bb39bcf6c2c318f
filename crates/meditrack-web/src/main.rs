//! MediTrack ML Server
//!
//! Run with: cargo run -p meditrack-web

use meditrack_config::Config;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("meditrack_web=info,meditrack_anomaly=info,meditrack_ranker=info,tower_http=info")
    });
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load()?;
    info!(
        knn_neighbors = config.anomaly.knn_neighbors,
        n_neighbors = config.providers.n_neighbors,
        "Starting MediTrack ML server..."
    );

    let state = meditrack_web::state::AppState::new(&config);
    let app = meditrack_web::router::build_router(state, config.server.permissive_cors);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
