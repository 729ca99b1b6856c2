//! Aria - Audio HLS Hosting Service
//!
//! Layers:
//! - store/: filesystem asset layout and the persistent view-counter table
//! - av/: adapter around the external ffmpeg transcoder
//! - ingest: the upload-to-asset pipeline
//! - delivery: playlist/segment serving with playlist rewriting
//! - web: axum routes, pages and CORS wiring
//! - config: environment configuration

pub mod av;
pub mod config;
pub mod delivery;
pub mod ingest;
pub mod store;
pub mod web;

// Re-exports for convenience
pub use config::Config;
pub use store::{AssetStore, StatsStore};
pub use web::AppState;
