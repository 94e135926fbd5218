use std::sync::Mutex;

use crate::AccessError;

/// Point-in-time view of a provider's call budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub tokens_left: i64,
    pub cost_per_item: u32,
}

/// Tracks a provider's remaining call quota and refuses to spend more than
/// is available.
///
/// The counter is never decremented locally: after every real call it is
/// overwritten from the provider's own reported remaining-quota value,
/// since local estimates drift from the authoritative source. Quota
/// exhaustion is a hard stop for the current run, not something to wait
/// out.
#[derive(Debug)]
pub struct TokenBudgetGuard {
    state: Mutex<QuotaSnapshot>,
}

impl TokenBudgetGuard {
    /// `cost_per_item` is an estimate (one token per item for Keepa's
    /// default data richness), not an exact accounting rule.
    pub fn new(initial_tokens: i64, cost_per_item: u32) -> Self {
        Self {
            state: Mutex::new(QuotaSnapshot {
                tokens_left: initial_tokens,
                cost_per_item: cost_per_item.max(1),
            }),
        }
    }

    /// Estimated cost of dispatching `items` work items.
    pub fn estimate(&self, items: usize) -> i64 {
        let state = self
            .state
            .lock()
            .expect("quota state should not be poisoned");
        items as i64 * i64::from(state.cost_per_item)
    }

    /// Returns `Ok` when the budget covers `estimated_cost`, otherwise a
    /// fatal [`AccessError::BudgetExhausted`]. Never waits.
    pub fn check_and_reserve(&self, estimated_cost: i64) -> Result<(), AccessError> {
        let state = self
            .state
            .lock()
            .expect("quota state should not be poisoned");
        if state.tokens_left <= 0 || state.tokens_left < estimated_cost {
            tracing::error!(
                tokens_left = state.tokens_left,
                required = estimated_cost,
                "token budget exhausted"
            );
            return Err(AccessError::BudgetExhausted {
                tokens_left: state.tokens_left,
                required: estimated_cost,
            });
        }
        Ok(())
    }

    /// Overwrites the counter with the provider's reported remaining quota.
    pub fn record_reported(&self, tokens_left: i64) {
        let mut state = self
            .state
            .lock()
            .expect("quota state should not be poisoned");
        tracing::debug!(
            previous = state.tokens_left,
            reported = tokens_left,
            "quota overwritten from provider report"
        );
        state.tokens_left = tokens_left;
    }

    pub fn snapshot(&self) -> QuotaSnapshot {
        *self
            .state
            .lock()
            .expect("quota state should not be poisoned")
    }
}
