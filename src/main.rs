use std::sync::Arc;

use clap::Parser;
use skin_check_server::config::Config;
use skin_check_server::core::yolo::{ImageDetector, YoloV8Backend};
use skin_check_server::server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    tracing::info!("Starting with {:?}", config);

    // loaded once, shared read-only by every request
    let detector = Arc::new(ImageDetector::new(YoloV8Backend::load(), config.image_size)?);

    server::start_server(config, detector).await
}
