use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::provider_policy::ProviderPolicy;

/// Trailing time span inside which the recorded-request count is bounded.
const WINDOW_HORIZON: Duration = Duration::from_secs(1);

/// Sliding-window request gate with a minimum inter-request interval.
///
/// One gate instance per provider; the window is owned by that instance
/// and mutated only through [`RateGate::acquire`]. The gate is safe to
/// share across tasks: the check and the timestamp record happen under a
/// single lock acquisition, and waits are re-evaluated in a loop.
#[derive(Debug)]
pub struct RateGate {
    capacity: usize,
    min_interval: Duration,
    window: Mutex<VecDeque<Instant>>,
}

impl RateGate {
    pub fn new(requests_per_second: f64, window_seconds: f64) -> Self {
        let rate = if requests_per_second > 0.0 {
            requests_per_second
        } else {
            1.0
        };
        let capacity = ((rate * window_seconds).ceil() as usize).max(1);
        Self {
            capacity,
            min_interval: Duration::from_secs_f64(1.0 / rate),
            window: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn from_policy(policy: &ProviderPolicy) -> Self {
        Self::new(policy.requests_per_second, policy.window_seconds)
    }

    /// Suspends until one more request may be issued, then records its
    /// timestamp.
    ///
    /// Cancel-safe: dropping the future while it waits records nothing.
    pub async fn acquire(&self) {
        loop {
            match self.try_record() {
                None => return,
                Some(wait) => {
                    tracing::trace!(wait_ms = wait.as_millis() as u64, "rate gate waiting");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Records `now` if the gate is open, otherwise returns how long to
    /// wait before re-evaluating.
    fn try_record(&self) -> Option<Duration> {
        let mut window = self
            .window
            .lock()
            .expect("rate gate window should not be poisoned");
        let now = Instant::now();

        while window
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= WINDOW_HORIZON)
        {
            window.pop_front();
        }

        if window.len() >= self.capacity {
            let oldest = *window.front().expect("window is non-empty at capacity");
            return Some(WINDOW_HORIZON.saturating_sub(now.duration_since(oldest)));
        }

        if let Some(last) = window.back() {
            let gap = now.duration_since(*last);
            if gap < self.min_interval {
                return Some(self.min_interval - gap);
            }
        }

        window.push_back(now);
        None
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Number of timestamps currently retained in the window.
    pub fn recorded_len(&self) -> usize {
        self.window
            .lock()
            .expect("rate gate window should not be poisoned")
            .len()
    }
}
