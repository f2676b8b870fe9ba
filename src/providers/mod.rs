pub mod mock;
pub mod upstream;

use async_trait::async_trait;

use crate::core::{ChartKind, SessionToken, SongId};
use crate::error::Result;

pub use mock::{MockResponse, MockScoreSource};
pub use upstream::LeaderboardClient;

/// Source of a player's raw score on one chart.
///
/// Errors are classified by [`EngineError::is_transient`]: a transient
/// failure only costs this chart (it scores 0), anything else aborts the
/// whole batch. Retrying is the implementation's own business.
///
/// [`EngineError::is_transient`]: crate::error::EngineError::is_transient
#[async_trait]
pub trait ScoreSource: Send + Sync {
    /// Fetch the player's best score on a chart (0 when never played)
    async fn fetch_score(
        &self,
        token: &SessionToken,
        song_id: SongId,
        chart: ChartKind,
    ) -> Result<u32>;

    /// Get source name for logging
    fn name(&self) -> &str;
}
