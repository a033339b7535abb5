use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::core::{session::MemorySessionStore, upload::UploadPolicy, yolo::Detector};
use crate::handler::{self, AppState};

pub fn router<P: AsRef<Path>>(state: AppState, static_dir: P, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handler::index))
        .route(
            "/camera",
            get(handler::camera_page).post(handler::camera_submit),
        )
        .route(
            "/upload",
            get(handler::upload_page).post(handler::upload_submit),
        )
        .route("/result", get(handler::result))
        .nest_service("/static", ServeDir::new(static_dir.as_ref()))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: Config, detector: Arc<dyn Detector>) -> anyhow::Result<()> {
    // STEP 1: storage directory and allow-list
    let uploads = UploadPolicy::new(&config.upload_dir, &config.allowed_extensions)?;

    // STEP 2: shared state with the injected detector
    let state = AppState::new(uploads, detector, Arc::new(MemorySessionStore::new()))?;
    let app = router(state, &config.static_dir, config.max_upload_bytes);

    // STEP 3: serve until the process is stopped
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("SkinCheck listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
