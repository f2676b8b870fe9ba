//! # Lyricat Engine
//!
//! Best-N rating engine for a rhythm game:
//! - Song catalog split into old / new eras by release version
//! - Rating function bounded by chart difficulty
//! - Concurrent best-N scheduler that skips and cancels fetches which
//!   cannot change the result
//! - Client for the game's leaderboard backend
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use lyricat_engine::{Catalog, EngineConfig, RatingEngine, SessionToken};
//! use lyricat_engine::providers::LeaderboardClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::load("config.yml").await?;
//!     let catalog = Arc::new(Catalog::from_path("song_lib.yml").await?);
//!     let client = Arc::new(LeaderboardClient::new(&config)?);
//!     let engine = RatingEngine::from_config(catalog, client, &config);
//!
//!     let rating = engine.player_rating(&SessionToken::new("r:abc")).await?;
//!     println!("Rating: {:.4}", rating.rating);
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod catalog;
pub mod config;
pub mod ranking;
pub mod providers;
pub mod engine;
pub mod error;

// Re-export primary types
pub use core::{BestEntry, Candidate, ChartKind, PlayerRating, SessionToken, SongId};
pub use catalog::{Catalog, Era, Song};
pub use config::EngineConfig;
pub use engine::RatingEngine;
pub use error::{EngineError, Result};
pub use providers::ScoreSource;
pub use ranking::{BestScheduler, SchedulerStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
