use std::path::PathBuf;

use serde::Deserialize;

use crate::images::thumbnail::DEFAULT_MAX_WIDTH;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    pub address: String,
    pub cache_dir: PathBuf,
    pub public_dir: PathBuf,
    pub placeholder: PathBuf,
    pub rasterizer_url: String,
    pub rasterizer_restart_command: Option<String>,
    /// Seconds before a rasterizer call counts as failed
    pub render_timeout: u64,
    pub callback_timeout: u64,
    /// Seconds a delivered file stays on disk before it is removed
    pub cleanup_delay: u64,
    /// Largest `imgSize` that is resized; larger hints get the original
    pub max_thumbnail_width: u32,
    pub use_cors: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            address: "127.0.0.1".to_string(),
            cache_dir: PathBuf::from("cache"),
            public_dir: PathBuf::from("public"),
            placeholder: PathBuf::from("public/preview-unavailable.png"),
            rasterizer_url: "http://localhost:3001/".to_string(),
            rasterizer_restart_command: None,
            render_timeout: 60,
            callback_timeout: 60,
            cleanup_delay: 60,
            max_thumbnail_width: DEFAULT_MAX_WIDTH,
            use_cors: false,
        }
    }
}
