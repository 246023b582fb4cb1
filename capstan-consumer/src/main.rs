use envconfig::Envconfig;
use tracing::info;

use config::Config;
use consumer::Consumer;

mod config;
mod consumer;
mod error;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("failed to load configuration from env");
    let app_config = config.to_app_config();

    info!(
        "consumer polling {} every {:?}, up to {} jobs per tick",
        app_config.gateway_url, app_config.poll_interval, app_config.jobs_per_tick
    );

    let consumer = Consumer::new(&app_config);
    consumer.run().await;
}
