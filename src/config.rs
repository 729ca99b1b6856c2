//! Configuration loaded from the environment.

use std::env;

/// Runtime configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Directory holding staged uploads and transcoded asset directories
    pub upload_dir: String,
    /// Path of the persisted view-counter document
    pub stats_file: String,
    /// Origins allowed on the top-level app routes
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            addr: env::var("ADDR").unwrap_or_else(|_| String::from("127.0.0.1")),
            port: env::var("PORT").unwrap_or_else(|_| String::from("5000")),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| String::from("./uploads")),
            stats_file: env::var("STATS_FILE")
                .unwrap_or_else(|_| String::from("./data/stats.json")),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| String::from("http://localhost:3000"))
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
        }
    }
}
