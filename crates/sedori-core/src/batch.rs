use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::quota::TokenBudgetGuard;
use crate::AccessError;

/// Outcome recorded for one input item. Every input item gets exactly one
/// outcome; nothing is ever dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome<T> {
    /// The provider returned data for this item.
    Enriched(T),
    /// The chunk succeeded but the response omitted this item.
    NoData,
    /// The chunk exhausted its retries; the run continued.
    Failed { error: String },
    /// The run aborted before this item's chunk was attempted.
    Skipped,
}

impl<T> ItemOutcome<T> {
    pub const fn is_enriched(&self) -> bool {
        matches!(self, Self::Enriched(_))
    }

    pub fn into_enriched(self) -> Option<T> {
        match self {
            Self::Enriched(value) => Some(value),
            _ => None,
        }
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunStatus {
    Completed,
    CompletedWithFailures { failed_chunks: usize },
    Aborted { error: AccessError },
}

impl RunStatus {
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// Result of a batch run: one outcome per input item, in input order,
/// plus the run-level status.
#[derive(Debug)]
pub struct BatchRun<T> {
    pub outcomes: Vec<ItemOutcome<T>>,
    pub status: RunStatus,
}

impl<T> BatchRun<T> {
    pub fn enriched_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_enriched())
            .count()
    }

    /// Converts an aborted run into an error for callers that want `?`.
    pub fn into_result(self) -> Result<Vec<ItemOutcome<T>>, AccessError> {
        match self.status {
            RunStatus::Aborted { error } => Err(error),
            _ => Ok(self.outcomes),
        }
    }
}

/// Partitions a work list into bounded batches and aggregates per-item
/// outcomes without letting one item's failure discard the rest.
///
/// A chunk that exhausts its retries marks its items failed and the run
/// continues; quota refusal and configuration errors abort the whole run
/// with the remaining items marked skipped.
pub struct BatchOrchestrator {
    batch_size: usize,
    cooldown: Option<Duration>,
    guard: Option<Arc<TokenBudgetGuard>>,
}

impl BatchOrchestrator {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            cooldown: None,
            guard: None,
        }
    }

    /// Pause between consecutive chunks. Callers in serverless runtimes
    /// pass `None` since back-to-back short-lived invocations are safe.
    pub const fn with_cooldown(mut self, cooldown: Option<Duration>) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_budget_guard(mut self, guard: Arc<TokenBudgetGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Runs `fetch` over consecutive chunks of at most `batch_size` items,
    /// preserving input order. The fetcher returns one optional result per
    /// chunk item, aligned by position; omissions become [`ItemOutcome::NoData`].
    ///
    /// The returned outcome list always has exactly `items.len()` entries.
    pub async fn process_all<I, T, F, Fut>(&self, items: &[I], mut fetch: F) -> BatchRun<T>
    where
        I: Clone,
        F: FnMut(Vec<I>) -> Fut,
        Fut: Future<Output = Result<Vec<Option<T>>, AccessError>>,
    {
        let mut outcomes: Vec<ItemOutcome<T>> = Vec::with_capacity(items.len());
        let mut failed_chunks = 0_usize;
        let mut abort: Option<AccessError> = None;

        let chunk_count = items.len().div_ceil(self.batch_size);
        let mut chunks = items.chunks(self.batch_size).enumerate().peekable();

        while let Some((index, chunk)) = chunks.next() {
            if let Some(guard) = &self.guard {
                if let Err(error) = guard.check_and_reserve(guard.estimate(chunk.len())) {
                    abort = Some(error);
                    outcomes.extend(chunk.iter().map(|_| ItemOutcome::Skipped));
                    break;
                }
            }

            tracing::debug!(
                chunk = index + 1,
                chunk_count,
                len = chunk.len(),
                "dispatching batch chunk"
            );

            match fetch(chunk.to_vec()).await {
                Ok(results) => {
                    let mut results = results.into_iter();
                    for _ in 0..chunk.len() {
                        outcomes.push(match results.next().flatten() {
                            Some(value) => ItemOutcome::Enriched(value),
                            None => ItemOutcome::NoData,
                        });
                    }
                }
                Err(error) if error.is_fatal() => {
                    abort = Some(error);
                    outcomes.extend(chunk.iter().map(|_| ItemOutcome::Skipped));
                    break;
                }
                Err(error) => {
                    tracing::warn!(
                        chunk = index + 1,
                        chunk_count,
                        %error,
                        "chunk failed after retries; continuing with placeholders"
                    );
                    failed_chunks += 1;
                    let message = error.to_string();
                    outcomes.extend(chunk.iter().map(|_| ItemOutcome::Failed {
                        error: message.clone(),
                    }));
                }
            }

            if chunks.peek().is_some() {
                if let Some(cooldown) = self.cooldown {
                    tracing::debug!(cooldown_secs = cooldown.as_secs(), "inter-batch cooldown");
                    tokio::time::sleep(cooldown).await;
                }
            }
        }

        // Items in chunks never attempted after an abort.
        while outcomes.len() < items.len() {
            outcomes.push(ItemOutcome::Skipped);
        }
        debug_assert_eq!(outcomes.len(), items.len());

        let status = match abort {
            Some(error) => RunStatus::Aborted { error },
            None if failed_chunks > 0 => RunStatus::CompletedWithFailures { failed_chunks },
            None => RunStatus::Completed,
        };

        BatchRun { outcomes, status }
    }
}
