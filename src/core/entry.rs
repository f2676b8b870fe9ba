use serde::{Deserialize, Serialize};

use crate::core::{ChartKind, SongId};

/// One line of a best-N list: the best chart of a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestEntry {
    pub song_id: SongId,
    pub chart: ChartKind,
    pub raw_score: u32,
    pub rating: f64,
}

/// Combined rating of a player over both eras
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRating {
    /// Sum of all best ratings divided by the combined list size
    pub rating: f64,

    /// Share contributed by the old-era list
    pub old_contribution: f64,

    /// Share contributed by the new-era list
    pub new_contribution: f64,

    pub best_old: Vec<BestEntry>,
    pub best_new: Vec<BestEntry>,
}

impl PlayerRating {
    /// Aggregate two best lists. `divisor` is the nominal size of both lists
    /// together; missing entries count as zero.
    pub fn aggregate(best_old: Vec<BestEntry>, best_new: Vec<BestEntry>, divisor: usize) -> Self {
        let divisor = divisor.max(1) as f64;
        let old_sum: f64 = best_old.iter().map(|e| e.rating).sum();
        let new_sum: f64 = best_new.iter().map(|e| e.rating).sum();

        Self {
            rating: round8((old_sum + new_sum) / divisor),
            old_contribution: round8(old_sum / divisor),
            new_contribution: round8(new_sum / divisor),
            best_old,
            best_new,
        }
    }
}

fn round8(x: f64) -> f64 {
    (x * 1e8).round() / 1e8
}
