//! Scriptable score source for tests and benchmarks
//!
//! Answers from an in-memory table instead of the game backend and records
//! every call, so tests can assert how many fetches a batch really needed.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::core::{ChartKind, SessionToken, SongId};
use crate::error::{EngineError, Result};
use crate::providers::ScoreSource;

/// What the mock answers for one chart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockResponse {
    Score(u32),
    Timeout,
    Malformed,
    /// The source panics mid-call
    Panic,
}

/// In-memory score source
#[derive(Debug)]
pub struct MockScoreSource {
    responses: HashMap<(SongId, ChartKind), MockResponse>,
    delays: HashMap<(SongId, ChartKind), Duration>,
    default_response: MockResponse,
    default_delay: Duration,
    calls: Mutex<Vec<(SongId, ChartKind)>>,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockScoreSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScoreSource {
    /// Every chart scores 0 and answers immediately
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            delays: HashMap::new(),
            default_response: MockResponse::Score(0),
            default_delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_score(self, song_id: SongId, chart: ChartKind, score: u32) -> Self {
        self.with_response(song_id, chart, MockResponse::Score(score))
    }

    pub fn with_response(
        mut self,
        song_id: SongId,
        chart: ChartKind,
        response: MockResponse,
    ) -> Self {
        self.responses.insert((song_id, chart), response);
        self
    }

    /// Latency of one chart
    pub fn with_delay(mut self, song_id: SongId, chart: ChartKind, delay: Duration) -> Self {
        self.delays.insert((song_id, chart), delay);
        self
    }

    /// Answer for charts without a scripted response
    pub fn with_default(mut self, response: MockResponse) -> Self {
        self.default_response = response;
        self
    }

    /// Latency for charts without a scripted delay
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Number of fetches started
    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    /// Charts fetched, in start order
    pub fn calls(&self) -> Vec<(SongId, ChartKind)> {
        self.lock_calls().clone()
    }

    pub fn was_called(&self, song_id: SongId, chart: ChartKind) -> bool {
        self.lock_calls().contains(&(song_id, chart))
    }

    /// Number of fetches that ran to completion
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Fetches dropped before they answered
    pub fn cancelled_count(&self) -> usize {
        self.call_count()
            .saturating_sub(self.completed_count() + self.in_flight.load(Ordering::SeqCst))
    }

    /// Highest number of fetches that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Forget recorded calls and counters, keeping the script
    pub fn reset(&self) {
        self.lock_calls().clear();
        self.completed.store(0, Ordering::SeqCst);
        self.max_in_flight
            .store(self.in_flight.load(Ordering::SeqCst), Ordering::SeqCst);
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<(SongId, ChartKind)>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Tracks concurrency; released on drop so cancelled fetches count too
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ScoreSource for MockScoreSource {
    async fn fetch_score(
        &self,
        _token: &SessionToken,
        song_id: SongId,
        chart: ChartKind,
    ) -> Result<u32> {
        let key = (song_id, chart);
        self.lock_calls().push(key);
        let _in_flight = InFlight::enter(&self.in_flight, &self.max_in_flight);

        let delay = self.delays.get(&key).copied().unwrap_or(self.default_delay);
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        match self.responses.get(&key).copied().unwrap_or(self.default_response) {
            MockResponse::Score(score) => Ok(score),
            MockResponse::Timeout => Err(EngineError::Timeout),
            MockResponse::Malformed => Err(EngineError::BadUpstreamResponse(format!(
                "mock record for song {} chart {} is malformed",
                song_id, chart
            ))),
            MockResponse::Panic => {
                panic!("mock source panicked on song {} chart {}", song_id, chart)
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
