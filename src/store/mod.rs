pub mod assets;
pub mod stats;

pub use assets::AssetStore;
pub use stats::{StatsError, StatsStore, ViewStats};
