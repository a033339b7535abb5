use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Startup configuration; nothing here is reloaded at runtime.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "skin-check-server",
    version,
    about = "Upload or capture a photo and see detected skin conditions"
)]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, env = "SKINCHECK_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Directory uploaded images are stored in (created if missing)
    #[arg(long, env = "SKINCHECK_UPLOAD_DIR", default_value = "static/uploads")]
    pub upload_dir: PathBuf,

    /// Accepted file extensions, comma separated
    #[arg(
        long,
        env = "SKINCHECK_ALLOWED_EXTENSIONS",
        value_delimiter = ',',
        default_values = ["png", "jpg", "jpeg", "jfif"]
    )]
    pub allowed_extensions: Vec<String>,

    /// Side length of the square model input, in pixels; must match the
    /// size the detector was exported at
    #[arg(long, env = "SKINCHECK_IMAGE_SIZE", default_value_t = 640)]
    pub image_size: u32,

    /// Directory served under /static
    #[arg(long, env = "SKINCHECK_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Largest accepted request body
    #[arg(long, env = "SKINCHECK_MAX_UPLOAD_BYTES", default_value_t = 16 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}
