//! Best-effort wait for an asynchronous page update to settle.
//!
//! The catalog reloads its table in place after pagination. A probe installs
//! an observer on the table container and reports whether anything under it
//! changed. [`wait_for_change`] arms the probe before running the action that
//! triggers the update, so a redraw that lands while the action is still in
//! flight is not missed. It returns shortly after the first observed change,
//! or once the timeout has passed without one. The wait itself never fails: a
//! return only means enough time has plausibly passed, not that the page is
//! fresh. Only the action's own error is passed through.

use std::future::Future;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::browser::BrowserResult;
use crate::config::ChangeAwaitSection;
use crate::poll::{bounded_poll, PollOutcome};

#[async_trait(?Send)]
pub trait MutationProbe {
    /// Starts observing. Returns `false` when no container is present.
    async fn arm(&self) -> BrowserResult<bool>;
    async fn mutated(&self) -> BrowserResult<bool>;
    async fn disarm(&self) -> BrowserResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSignal {
    NoContainer,
    Mutated,
    TimedOut,
}

/// Arms `probe`, runs `action`, then waits for the container to change.
pub async fn wait_for_change<A>(
    probe: &dyn MutationProbe,
    settings: &ChangeAwaitSection,
    action: A,
) -> BrowserResult<ChangeSignal>
where
    A: Future<Output = BrowserResult<()>>,
{
    let armed = match probe.arm().await {
        Ok(present) => present,
        Err(err) => {
            warn!(error = %err, "failed to arm mutation probe");
            false
        }
    };

    if let Err(err) = action.await {
        if armed {
            disarm(probe).await;
        }
        return Err(err);
    }

    if !armed {
        debug!("no update container present, skipping change wait");
        return Ok(ChangeSignal::NoContainer);
    }

    let outcome = bounded_poll(settings.poll_interval(), settings.max_polls(), |_| async move {
        match probe.mutated().await {
            Ok(true) => Some(()),
            Ok(false) => None,
            Err(err) => {
                warn!(error = %err, "mutation probe check failed");
                None
            }
        }
    })
    .await;

    disarm(probe).await;

    match outcome {
        PollOutcome::Found { attempts, .. } => {
            debug!(attempts, "container update observed");
            sleep(settings.settle()).await;
            Ok(ChangeSignal::Mutated)
        }
        PollOutcome::Exhausted { attempts } => {
            debug!(attempts, "no container update observed before timeout");
            Ok(ChangeSignal::TimedOut)
        }
    }
}

async fn disarm(probe: &dyn MutationProbe) {
    if let Err(err) = probe.disarm().await {
        warn!(error = %err, "failed to disarm mutation probe");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserError;
    use std::cell::Cell;
    use std::time::Duration;
    use tokio::time::Instant;

    struct ScriptedProbe {
        present: bool,
        mutate_after: Option<usize>,
        checks: Cell<usize>,
        armed: Cell<bool>,
        disarmed: Cell<bool>,
        fail_arm: bool,
    }

    impl ScriptedProbe {
        fn new(present: bool, mutate_after: Option<usize>) -> Self {
            Self {
                present,
                mutate_after,
                checks: Cell::new(0),
                armed: Cell::new(false),
                disarmed: Cell::new(false),
                fail_arm: false,
            }
        }
    }

    #[async_trait(?Send)]
    impl MutationProbe for ScriptedProbe {
        async fn arm(&self) -> BrowserResult<bool> {
            if self.fail_arm {
                return Err(BrowserError::Script("detached".into()));
            }
            self.armed.set(self.present);
            Ok(self.present)
        }

        async fn mutated(&self) -> BrowserResult<bool> {
            let count = self.checks.get() + 1;
            self.checks.set(count);
            Ok(self.mutate_after.is_some_and(|after| count >= after))
        }

        async fn disarm(&self) -> BrowserResult<()> {
            self.disarmed.set(true);
            Ok(())
        }
    }

    fn settings() -> ChangeAwaitSection {
        ChangeAwaitSection {
            container_selectors: vec![".song-list-table".into()],
            timeout_ms: 1_000,
            settle_ms: 300,
            poll_interval_ms: 100,
        }
    }

    async fn idle() -> BrowserResult<()> {
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_immediately_without_container() {
        let probe = ScriptedProbe::new(false, Some(1));
        let start = Instant::now();
        let signal = wait_for_change(&probe, &settings(), idle()).await.unwrap();
        assert_eq!(signal, ChangeSignal::NoContainer);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(probe.checks.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn settles_after_first_mutation() {
        let probe = ScriptedProbe::new(true, Some(2));
        let start = Instant::now();
        let signal = wait_for_change(&probe, &settings(), idle()).await.unwrap();
        assert_eq!(signal, ChangeSignal::Mutated);
        assert_eq!(start.elapsed(), Duration::from_millis(200 + 300));
        assert!(probe.disarmed.get());
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_timeout() {
        let probe = ScriptedProbe::new(true, None);
        let start = Instant::now();
        let signal = wait_for_change(&probe, &settings(), idle()).await.unwrap();
        assert_eq!(signal, ChangeSignal::TimedOut);
        assert_eq!(start.elapsed(), Duration::from_millis(1_000));
        assert_eq!(probe.checks.get(), 10);
        assert!(probe.disarmed.get());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_errors_are_swallowed() {
        let mut probe = ScriptedProbe::new(true, Some(1));
        probe.fail_arm = true;
        let signal = wait_for_change(&probe, &settings(), idle()).await.unwrap();
        assert_eq!(signal, ChangeSignal::NoContainer);
    }

    #[tokio::test(start_paused = true)]
    async fn action_runs_with_observer_already_armed() {
        let probe = ScriptedProbe::new(true, Some(1));
        let saw_armed = Cell::new(false);
        let signal = wait_for_change(&probe, &settings(), async {
            saw_armed.set(probe.armed.get());
            Ok(())
        })
        .await
        .unwrap();
        assert!(saw_armed.get());
        assert_eq!(signal, ChangeSignal::Mutated);
    }

    #[tokio::test(start_paused = true)]
    async fn action_error_disarms_and_propagates() {
        let probe = ScriptedProbe::new(true, Some(1));
        let start = Instant::now();
        let result = wait_for_change(&probe, &settings(), async {
            Err(BrowserError::Script("next page control disappeared".into()))
        })
        .await;
        assert!(matches!(result, Err(BrowserError::Script(_))));
        assert!(probe.disarmed.get());
        assert_eq!(probe.checks.get(), 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn action_still_runs_without_container() {
        let probe = ScriptedProbe::new(false, None);
        let ran = Cell::new(false);
        let signal = wait_for_change(&probe, &settings(), async {
            ran.set(true);
            Ok(())
        })
        .await
        .unwrap();
        assert!(ran.get());
        assert_eq!(signal, ChangeSignal::NoContainer);
        assert!(!probe.disarmed.get());
    }
}
