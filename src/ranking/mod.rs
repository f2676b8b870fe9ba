pub mod rating;
pub mod scheduler;

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::core::{BestEntry, Candidate, Observation, SongId};

pub use rating::{max_rating, rating, MAX_BONUS};
pub use scheduler::{BestScheduler, SchedulerStats};

/// Decision for a candidate given what is already known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Might still change the result, evaluate it
    Evaluate,
    /// Its song already has a pick this chart cannot beat
    SkipSong,
    /// Cannot enter the current top-N, nor can anything easier
    Stop,
}

/// Read-only view of the picks the producer needs to decide admission.
///
/// Ratings only grow while a batch runs, so a stale copy is always
/// conservative: it admits more, never less.
#[derive(Debug, Clone, Default)]
pub struct Bounds {
    nth_rating: Option<f64>,
    song_ratings: HashMap<SongId, f64>,
}

impl Bounds {
    pub fn nth_rating(&self) -> Option<f64> {
        self.nth_rating
    }

    pub fn song_rating(&self, song_id: SongId) -> Option<f64> {
        self.song_ratings.get(&song_id).copied()
    }

    pub fn admission(&self, candidate: &Candidate) -> Admission {
        let ceiling = max_rating(candidate.difficulty);
        if self.nth_rating.is_some_and(|nth| nth > ceiling) {
            return Admission::Stop;
        }
        if self.song_rating(candidate.song_id).is_some_and(|r| r > ceiling) {
            return Admission::SkipSong;
        }
        Admission::Evaluate
    }
}

/// An observation together with the candidate it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pick {
    pub candidate: Candidate,
    pub observation: Observation,
}

impl Pick {
    fn rating(&self) -> f64 {
        self.observation.rating
    }

    /// Descending rating, ties by position in the input
    fn rank_cmp(&self, other: &Pick) -> Ordering {
        other
            .rating()
            .total_cmp(&self.rating())
            .then(self.candidate.sequence_index.cmp(&other.candidate.sequence_index))
    }
}

/// Best observation per song, kept ranked.
///
/// Owned by a single consumer; the producer only ever sees [`Bounds`] copies.
#[derive(Debug)]
pub struct PickedSet {
    n: usize,
    ranking: Vec<Pick>,
    bounds: Bounds,
}

impl PickedSet {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            ranking: Vec::new(),
            bounds: Bounds::default(),
        }
    }

    /// Number of songs with a pick
    pub fn len(&self) -> usize {
        self.ranking.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranking.is_empty()
    }

    /// Whether at least `n` songs are picked
    pub fn is_full(&self) -> bool {
        self.ranking.len() >= self.n
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Record an observation. Returns false when the song already has a pick
    /// that is at least as good.
    pub fn offer(&mut self, candidate: Candidate, observation: Observation) -> bool {
        let pick = Pick {
            candidate,
            observation,
        };

        if let Some(pos) = self
            .ranking
            .iter()
            .position(|p| p.candidate.song_id == candidate.song_id)
        {
            if self.ranking[pos].rank_cmp(&pick) != Ordering::Greater {
                return false;
            }
            self.ranking.remove(pos);
        }

        let at = self
            .ranking
            .partition_point(|p| p.rank_cmp(&pick) == Ordering::Less);
        self.ranking.insert(at, pick);

        self.bounds.song_ratings.insert(candidate.song_id, observation.rating);
        self.bounds.nth_rating = self
            .ranking
            .get(self.n.saturating_sub(1))
            .filter(|_| self.n > 0)
            .map(Pick::rating);
        true
    }

    /// Current top-N, best first
    pub fn top(&self) -> &[Pick] {
        &self.ranking[..self.ranking.len().min(self.n)]
    }

    /// Final list: top-N with non-positive ratings dropped
    pub fn into_best(self) -> Vec<BestEntry> {
        self.top()
            .iter()
            .filter(|p| p.rating() > 0.0)
            .map(|p| BestEntry {
                song_id: p.candidate.song_id,
                chart: p.candidate.chart,
                raw_score: p.observation.raw_score,
                rating: p.observation.rating,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChartKind;

    fn cand(seq: usize, song: SongId, difficulty: f64) -> Candidate {
        Candidate::new(seq, song, ChartKind::Master, difficulty)
    }

    fn obs(seq: usize, rating: f64) -> Observation {
        Observation {
            sequence_index: seq,
            raw_score: 1_000_000,
            rating,
        }
    }

    #[test]
    fn test_keeps_best_per_song() {
        let mut picked = PickedSet::new(3);
        assert!(picked.offer(cand(0, 1, 10.0), obs(0, 11.5)));
        assert!(!picked.offer(cand(1, 1, 9.0), obs(1, 11.0)));
        assert!(!picked.offer(cand(2, 1, 9.5), obs(2, 11.5)));
        assert_eq!(picked.len(), 1);
        assert_eq!(picked.top()[0].candidate.sequence_index, 0);
        assert_eq!(picked.bounds().song_rating(1), Some(11.5));
    }

    #[test]
    fn test_equal_rating_prefers_earlier_position() {
        let mut picked = PickedSet::new(1);
        assert!(picked.offer(cand(4, 1, 9.0), obs(4, 10.0)));
        assert!(picked.offer(cand(2, 1, 9.5), obs(2, 10.0)));
        assert_eq!(picked.top()[0].candidate.sequence_index, 2);
    }

    #[test]
    fn test_ranking_and_nth() {
        let mut picked = PickedSet::new(2);
        picked.offer(cand(0, 1, 12.0), obs(0, 12.0));
        assert_eq!(picked.bounds().nth_rating(), None);
        picked.offer(cand(1, 2, 12.0), obs(1, 13.0));
        assert_eq!(picked.bounds().nth_rating(), Some(12.0));
        picked.offer(cand(2, 3, 11.0), obs(2, 12.5));
        assert_eq!(picked.bounds().nth_rating(), Some(12.5));
        let songs: Vec<SongId> = picked.top().iter().map(|p| p.candidate.song_id).collect();
        assert_eq!(songs, vec![2, 3]);
    }

    #[test]
    fn test_admission_rules() {
        let mut picked = PickedSet::new(1);
        picked.offer(cand(0, 1, 10.0), obs(0, 11.5));

        // 9 + 2 = 11 < 11.5
        assert_eq!(picked.bounds().admission(&cand(1, 1, 9.0)), Admission::Stop);
        // 9.5 + 2 = 11.5, could tie: keep
        assert_eq!(picked.bounds().admission(&cand(1, 2, 9.5)), Admission::Evaluate);

        let mut picked = PickedSet::new(2);
        picked.offer(cand(0, 1, 10.0), obs(0, 11.5));
        assert_eq!(picked.bounds().admission(&cand(1, 1, 9.0)), Admission::SkipSong);
        assert_eq!(picked.bounds().admission(&cand(2, 2, 9.0)), Admission::Evaluate);
    }

    #[test]
    fn test_into_best_drops_zero() {
        let mut picked = PickedSet::new(3);
        picked.offer(cand(0, 1, 10.0), obs(0, 11.0));
        picked.offer(cand(1, 2, 10.0), obs(1, 0.0));
        let best = picked.into_best();
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].song_id, 1);
    }
}
