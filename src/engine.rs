use crate::catalog::{Catalog, Era};
use crate::config::{EngineConfig, NEW_ERA_SIZE, OLD_ERA_SIZE};
use crate::core::{BestEntry, PlayerRating, SessionToken};
use crate::error::Result;
use crate::providers::ScoreSource;
use crate::ranking::{BestScheduler, SchedulerStats};
use std::sync::Arc;
use std::time::Instant;

/// Main rating orchestrator: catalog + score source + scheduler
#[derive(Clone)]
pub struct RatingEngine {
    catalog: Arc<Catalog>,
    scheduler: BestScheduler,
}

impl RatingEngine {
    /// Create engine with `workers` fetches in flight per batch
    pub fn new(catalog: Arc<Catalog>, source: Arc<dyn ScoreSource>, workers: usize) -> Self {
        Self {
            catalog,
            scheduler: BestScheduler::new(source, workers),
        }
    }

    /// Create engine with workers and timeouts taken from the configuration
    pub fn from_config(
        catalog: Arc<Catalog>,
        source: Arc<dyn ScoreSource>,
        config: &EngineConfig,
    ) -> Self {
        tracing::info!(
            "⚙️ rating engine: {} workers, {} retries, {}",
            config.workers,
            config.retry_count,
            config.timeouts
        );
        Self {
            catalog,
            scheduler: BestScheduler::from_config(source, config),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Best `n` songs of an era
    pub async fn best(
        &self,
        era: Era,
        n: usize,
        token: &SessionToken,
    ) -> Result<(Vec<BestEntry>, SchedulerStats)> {
        let start = Instant::now();
        let result = self
            .scheduler
            .best_with_stats(n, self.catalog.candidates(era), token)
            .await?;
        tracing::debug!(
            "{:?} best {} in {:.2}ms",
            era,
            n,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(result)
    }

    /// The b35 list: best songs released before the latest major version
    pub async fn best_old(&self, token: &SessionToken) -> Result<Vec<BestEntry>> {
        let (best, _) = self.best(Era::Old, OLD_ERA_SIZE, token).await?;
        Ok(best)
    }

    /// The b15 list: best songs of the latest major version
    pub async fn best_new(&self, token: &SessionToken) -> Result<Vec<BestEntry>> {
        let (best, _) = self.best(Era::New, NEW_ERA_SIZE, token).await?;
        Ok(best)
    }

    /// Overall rating from both lists.
    ///
    /// Both batches run at the same time, each with its own worker budget.
    /// A fatal error in either one drops the other.
    pub async fn player_rating(&self, token: &SessionToken) -> Result<PlayerRating> {
        let (best_old, best_new) = tokio::try_join!(self.best_old(token), self.best_new(token))?;
        Ok(PlayerRating::aggregate(
            best_old,
            best_new,
            OLD_ERA_SIZE + NEW_ERA_SIZE,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Song;
    use crate::core::ChartKind;
    use crate::error::EngineError;
    use crate::providers::{MockResponse, MockScoreSource};

    fn catalog() -> Arc<Catalog> {
        let song = |id: u32, version: &str, d: f64| {
            let charts = [(ChartKind::Master, d)].into_iter().collect();
            Song::new(id, format!("Song {}", id), version, charts)
        };
        Arc::new(Catalog::from_songs(vec![song(1, "1.0.0", 10.0), song(2, "2.0.0", 11.0)]).unwrap())
    }

    #[tokio::test]
    async fn test_player_rating() {
        let mock = Arc::new(MockScoreSource::new().with_default(MockResponse::Score(1_000_000)));
        let engine = RatingEngine::new(catalog(), mock.clone(), 4);
        let token = SessionToken::new("r:test");

        let rating = engine.player_rating(&token).await.unwrap();
        assert_eq!(rating.best_old.len(), 1);
        assert_eq!(rating.best_old[0].rating, 12.0);
        assert_eq!(rating.best_new[0].rating, 13.0);
        assert_eq!(rating.old_contribution, 0.24);
        assert_eq!(rating.new_contribution, 0.26);
        assert_eq!(rating.rating, 0.5);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fatal_error_fails_rating() {
        let mock = Arc::new(
            MockScoreSource::new()
                .with_default(MockResponse::Score(1_000_000))
                .with_response(2, ChartKind::Master, MockResponse::Malformed),
        );
        let engine = RatingEngine::new(catalog(), mock, 4);

        let err = engine.player_rating(&SessionToken::new("r:test")).await.unwrap_err();
        assert!(matches!(err, EngineError::BadUpstreamResponse(_)));
    }
}
