//! Aria server binary.
//!
//! Wires up:
//! - Environment configuration
//! - On-disk asset store and the persistent view-counter table
//! - External ffmpeg encoder
//! - HTTP layer (upload, playback, stats)

use aria::av::FfmpegHlsEncoder;
use aria::config::Config;
use aria::store::{AssetStore, StatsStore};
use aria::web::{self, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt::init();

    // 1. Asset root (staged uploads + one directory per asset)
    if let Err(e) = tokio::fs::create_dir_all(&config.upload_dir).await {
        eprintln!(
            "Failed to create upload directory {}: {}",
            config.upload_dir, e
        );
        std::process::exit(1);
    }
    let assets = AssetStore::new(config.upload_dir.as_str());

    // 2. View counters (a corrupt document degrades to an empty table)
    let stats = match StatsStore::open(config.stats_file.as_str()).await {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Failed to open stats file {}: {}", config.stats_file, e);
            std::process::exit(1);
        }
    };

    // 3. HTTP layer
    let state = AppState {
        config: Arc::new(config.clone()),
        assets,
        stats,
        encoder: Arc::new(FfmpegHlsEncoder),
    };
    let app = web::router(state);

    // 4. Start Server
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.addr, config.port))
        .await
        .expect("Failed to bind TCP listener");
    println!("Listening at {}:{}", config.addr, config.port);
    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
