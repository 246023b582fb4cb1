use axum::Router;
use capstan_core::{Queue, StoreConfig};
use envconfig::Envconfig;
use eyre::Result;
use tracing::info;

use config::Config;
use handlers::app::{app, SERVICE_NAME};
use state::AppState;

mod config;
mod errors;
mod handlers;
mod metrics;
mod middleware;
mod state;

async fn listen(app: Router, bind: String) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("failed to load configuration from env");

    let store = StoreConfig::new(&config.database_url);
    let queue = Queue::new(&store)
        .await
        .expect("failed to open the job store");

    let state = AppState {
        queue,
        api_token: config.internal_api_token.clone(),
        environment: config.environment.clone(),
    };

    let app = crate::metrics::setup_metrics_routes(app(state));

    info!("{} listening on {}", SERVICE_NAME, config.bind());
    listen(app, config.bind()).await
}
