//! Best-N scheduler.
//!
//! Finds the N songs with the highest ratings among a difficulty-sorted
//! candidate list while fetching as few scores as possible.
//!
//! - A producer task walks the candidates in order. For each it waits for a
//!   free worker slot, then either spawns a fetch or skips it using the
//!   latest [`Bounds`] published by the consumer.
//! - Workers fetch one score each and report on a completion channel.
//! - The consumer (the caller of [`BestScheduler::best`]) owns the
//!   [`PickedSet`]. After every improvement it publishes new bounds and,
//!   once N songs are picked, cancels in-flight fetches that can no longer
//!   matter.
//!
//! A chart of difficulty `d` can never rate above `d + 2`, and candidates
//! only get easier, which is what makes skipping and early stop sound.

use std::collections::HashMap;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::core::{BestEntry, Candidate, Observation, SessionToken};
use crate::error::{EngineError, Result};
use crate::providers::ScoreSource;
use crate::ranking::{rating, Admission, Bounds, PickedSet};

/// What happened during one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Candidates handed to the batch
    pub candidates: usize,
    /// Fetches started
    pub admitted: usize,
    /// Candidates never fetched
    pub skipped: usize,
    /// Fetches cancelled while in flight
    pub cancelled: usize,
    /// Fetches that timed out and scored 0
    pub timed_out: usize,
    /// Whether the producer stopped before the end of the list
    pub stopped_early: bool,
}

/// A finished fetch. Carries the worker slot so it is released only once
/// the consumer has accounted for the result and published new bounds.
struct Completion {
    candidate: Candidate,
    outcome: Outcome,
    _slot: OwnedSemaphorePermit,
}

enum Outcome {
    Scored { observation: Observation, timed_out: bool },
    Failed(EngineError),
}

/// In-flight fetches by sequence index
type Registry = Arc<Mutex<InFlight>>;

type InFlight = HashMap<usize, (Candidate, CancellationToken)>;

fn lock(registry: &Registry) -> MutexGuard<'_, InFlight> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

/// Runs best-N batches against one score source
#[derive(Clone)]
pub struct BestScheduler {
    source: Arc<dyn ScoreSource>,
    workers: usize,
    call_timeout: Option<Duration>,
    batch_timeout: Option<Duration>,
}

impl BestScheduler {
    /// `workers` is the maximum number of fetches in flight at once
    pub fn new(source: Arc<dyn ScoreSource>, workers: usize) -> Self {
        Self {
            source,
            workers: workers.max(1),
            call_timeout: None,
            batch_timeout: None,
        }
    }

    pub fn from_config(source: Arc<dyn ScoreSource>, config: &EngineConfig) -> Self {
        Self::new(source, config.workers)
            .with_call_timeout(config.timeouts.score_call())
            .with_batch_timeout(config.timeouts.batch())
    }

    /// Deadline for a single fetch; elapsing counts as a timeout (score 0)
    pub fn with_call_timeout(mut self, limit: Option<Duration>) -> Self {
        self.call_timeout = limit;
        self
    }

    /// Deadline for a whole batch; elapsing fails the batch
    pub fn with_batch_timeout(mut self, limit: Option<Duration>) -> Self {
        self.batch_timeout = limit;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Top `n` songs by rating, best first, ratings above 0 only.
    ///
    /// `candidates` must be sorted by non-increasing difficulty. Timeouts
    /// score 0; any other fetch error aborts the batch and is returned.
    pub async fn best(
        &self,
        n: usize,
        candidates: &[Candidate],
        token: &SessionToken,
    ) -> Result<Vec<BestEntry>> {
        let (best, _) = self.best_with_stats(n, candidates, token).await?;
        Ok(best)
    }

    /// Same as [`best`](Self::best), also reporting how much work was done
    pub async fn best_with_stats(
        &self,
        n: usize,
        candidates: &[Candidate],
        token: &SessionToken,
    ) -> Result<(Vec<BestEntry>, SchedulerStats)> {
        if n == 0 || candidates.is_empty() {
            return Ok((Vec::new(), SchedulerStats::default()));
        }
        debug_assert!(
            candidates.windows(2).all(|w| w[0].difficulty >= w[1].difficulty),
            "candidates must be sorted by descending difficulty"
        );

        match self.batch_timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(n, candidates, token))
                .await
                .map_err(|_| EngineError::BatchTimeout(limit))?,
            None => self.run(n, candidates, token).await,
        }
    }

    async fn run(
        &self,
        n: usize,
        candidates: &[Candidate],
        token: &SessionToken,
    ) -> Result<(Vec<BestEntry>, SchedulerStats)> {
        let root = CancellationToken::new();
        // Dropping this future (batch timeout, caller gone) stops every task
        let _abort_on_drop = root.clone().drop_guard();

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let (bounds_tx, bounds_rx) = watch::channel(Bounds::default());
        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));

        let producer = Producer {
            source: self.source.clone(),
            token: Arc::new(token.clone()),
            candidates: candidates.to_vec(),
            slots: Arc::new(Semaphore::new(self.workers)),
            bounds: bounds_rx,
            registry: registry.clone(),
            root: root.clone(),
            done: done_tx,
            call_timeout: self.call_timeout,
        };
        let producer = tokio::spawn(producer.run());

        let mut picked = PickedSet::new(n);
        let mut stats = SchedulerStats {
            candidates: candidates.len(),
            ..SchedulerStats::default()
        };

        while let Some(completion) = done_rx.recv().await {
            let candidate = completion.candidate;
            let (observation, timed_out) = match completion.outcome {
                Outcome::Scored {
                    observation,
                    timed_out,
                } => (observation, timed_out),
                Outcome::Failed(error) => {
                    tracing::error!(
                        "❌ song {} {} failed, aborting batch: {}",
                        candidate.song_id,
                        candidate.chart,
                        error
                    );
                    root.cancel();
                    return Err(error);
                }
            };

            if timed_out {
                stats.timed_out += 1;
            }
            if !picked.offer(candidate, observation) {
                continue;
            }
            bounds_tx.send_replace(picked.bounds().clone());

            if picked.is_full() {
                stats.cancelled += cancel_hopeless(&registry, picked.bounds());
            }
        }

        let produced = producer
            .await
            .map_err(|e| EngineError::Other(format!("Producer task failed: {}", e)))?;
        stats.admitted = produced.admitted;
        stats.skipped = candidates.len() - produced.admitted;
        stats.stopped_early = produced.stopped_early;

        let best = picked.into_best();
        tracing::info!(
            "🏁 best {} via {}: {} songs, {}/{} fetched, {} skipped, {} cancelled, {} timed out",
            n,
            self.source.name(),
            best.len(),
            stats.admitted,
            stats.candidates,
            stats.skipped,
            stats.cancelled,
            stats.timed_out
        );
        Ok((best, stats))
    }
}

/// Cancel in-flight fetches that cannot change the result; returns how many
fn cancel_hopeless(registry: &Registry, bounds: &Bounds) -> usize {
    let mut in_flight = lock(registry);
    let before = in_flight.len();
    in_flight.retain(|_, (candidate, cancel)| {
        if bounds.admission(candidate) == Admission::Evaluate {
            return true;
        }
        tracing::debug!(
            "✂️ cancelling #{} (song {} {})",
            candidate.sequence_index,
            candidate.song_id,
            candidate.chart
        );
        cancel.cancel();
        false
    });
    before - in_flight.len()
}

struct ProducerReport {
    admitted: usize,
    stopped_early: bool,
}

/// Admits candidates into worker slots
struct Producer {
    source: Arc<dyn ScoreSource>,
    token: Arc<SessionToken>,
    candidates: Vec<Candidate>,
    slots: Arc<Semaphore>,
    bounds: watch::Receiver<Bounds>,
    registry: Registry,
    root: CancellationToken,
    done: mpsc::UnboundedSender<Completion>,
    call_timeout: Option<Duration>,
}

impl Producer {
    async fn run(self) -> ProducerReport {
        let mut report = ProducerReport {
            admitted: 0,
            stopped_early: false,
        };

        for &candidate in &self.candidates {
            let permit = tokio::select! {
                _ = self.root.cancelled() => break,
                permit = self.slots.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let admission = self.bounds.borrow().admission(&candidate);
            match admission {
                Admission::Stop => {
                    tracing::debug!(
                        "🛑 stop at #{} (difficulty {})",
                        candidate.sequence_index,
                        candidate.difficulty
                    );
                    report.stopped_early = true;
                    break;
                }
                Admission::SkipSong => {
                    tracing::debug!(
                        "⏭️ skip #{} (song {} already better)",
                        candidate.sequence_index,
                        candidate.song_id
                    );
                    continue;
                }
                Admission::Evaluate => {}
            }

            let cancel = self.root.child_token();
            lock(&self.registry).insert(candidate.sequence_index, (candidate, cancel.clone()));
            report.admitted += 1;

            let worker = Worker {
                source: self.source.clone(),
                token: self.token.clone(),
                candidate,
                cancel,
                registry: self.registry.clone(),
                done: self.done.clone(),
                call_timeout: self.call_timeout,
            };
            tokio::spawn(worker.run(permit));
        }

        report
    }
}

/// One score fetch
struct Worker {
    source: Arc<dyn ScoreSource>,
    token: Arc<SessionToken>,
    candidate: Candidate,
    cancel: CancellationToken,
    registry: Registry,
    done: mpsc::UnboundedSender<Completion>,
    call_timeout: Option<Duration>,
}

impl Worker {
    /// Gives its slot back on cancellation, otherwise passes it on with the result
    async fn run(self, slot: OwnedSemaphorePermit) {
        let candidate = self.candidate;
        let fetch = self
            .source
            .fetch_score(&self.token, candidate.song_id, candidate.chart);
        // A panicking source must fail the batch, not drop the candidate
        let fetch = AssertUnwindSafe(with_deadline(self.call_timeout, fetch)).catch_unwind();

        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return,
            fetched = fetch => fetched.unwrap_or_else(|panic| {
                Err(EngineError::Other(format!(
                    "Score source {} panicked: {}",
                    self.source.name(),
                    panic_message(panic.as_ref())
                )))
            }),
        };
        lock(&self.registry).remove(&candidate.sequence_index);

        let outcome = match fetched {
            Ok(score) => Outcome::Scored {
                observation: observe(&candidate, score),
                timed_out: false,
            },
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    "⚠️ timeout on #{} (song {} {}), counting as 0",
                    candidate.sequence_index,
                    candidate.song_id,
                    candidate.chart
                );
                Outcome::Scored {
                    observation: observe(&candidate, 0),
                    timed_out: true,
                }
            }
            Err(error) => Outcome::Failed(error),
        };

        if let Outcome::Scored { observation, .. } = &outcome {
            tracing::debug!(
                "#{} song {} {} → {} ({})",
                candidate.sequence_index,
                candidate.song_id,
                candidate.chart,
                observation.raw_score,
                observation.rating
            );
        }
        // The consumer is gone only when the batch was aborted
        let _ = self.done.send(Completion {
            candidate,
            outcome,
            _slot: slot,
        });
    }
}

fn observe(candidate: &Candidate, raw_score: u32) -> Observation {
    Observation {
        sequence_index: candidate.sequence_index,
        raw_score,
        rating: rating(candidate.difficulty, raw_score),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

async fn with_deadline<F>(limit: Option<Duration>, fetch: F) -> Result<u32>
where
    F: Future<Output = Result<u32>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fetch)
            .await
            .unwrap_or(Err(EngineError::Timeout)),
        None => fetch.await,
    }
}
