use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Found { value: T, attempts: usize },
    Exhausted { attempts: usize },
}

impl<T> PollOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, PollOutcome::Found { .. })
    }

    pub fn attempts(&self) -> usize {
        match self {
            PollOutcome::Found { attempts, .. } | PollOutcome::Exhausted { attempts } => *attempts,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            PollOutcome::Found { value, .. } => Some(value),
            PollOutcome::Exhausted { .. } => None,
        }
    }
}

/// Runs `check` once per `interval`, up to `max_attempts` times. Each check
/// happens after its interval has elapsed, so an exhausted poll has waited
/// `interval * max_attempts` in total.
pub async fn bounded_poll<F, Fut, T>(
    interval: Duration,
    max_attempts: usize,
    mut check: F,
) -> PollOutcome<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 1..=max_attempts {
        sleep(interval).await;
        if let Some(value) = check(attempt).await {
            return PollOutcome::Found {
                value,
                attempts: attempt,
            };
        }
    }
    PollOutcome::Exhausted {
        attempts: max_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn finds_value_on_matching_attempt() {
        let start = Instant::now();
        let outcome = bounded_poll(Duration::from_millis(500), 40, |attempt| async move {
            (attempt == 3).then_some("ready")
        })
        .await;
        assert_eq!(
            outcome,
            PollOutcome::Found {
                value: "ready",
                attempts: 3
            }
        );
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_ceiling() {
        let calls = Cell::new(0usize);
        let start = Instant::now();
        let outcome: PollOutcome<()> = bounded_poll(Duration::from_millis(500), 4, |_| {
            calls.set(calls.get() + 1);
            async { None }
        })
        .await;
        assert_eq!(outcome, PollOutcome::Exhausted { attempts: 4 });
        assert_eq!(calls.get(), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ceiling_never_checks() {
        let calls = Cell::new(0usize);
        let outcome = bounded_poll(Duration::from_millis(10), 0, |_| {
            calls.set(calls.get() + 1);
            async { None::<()> }
        })
        .await;
        assert!(!outcome.is_found());
        assert_eq!(outcome.attempts(), 0);
        assert_eq!(calls.get(), 0);
    }
}
