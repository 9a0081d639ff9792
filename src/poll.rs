//! Timed polling with a stall budget.
//!
//! A long-running remote operation is watched by repeatedly running a
//! status query. The operation is allowed to run as long as it keeps
//! reporting progress; it times out after `max_stalled` consecutive polls
//! without any. The clock is injected so tests never sleep.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Source of delays between polls.
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Wall-clock sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Cooperative cancellation, shared between the caller and every worker.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What one status query observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    /// The operation reached a terminal state.
    Ready(T),

    /// Still running, and something changed since the last poll.
    Progress,

    /// Still running with nothing new, or the query itself failed.
    Stalled,
}

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut { stalled: u32, elapsed: Duration },
    Cancelled,
}

pub struct Poller<'a> {
    clock: &'a dyn Clock,
    cancel: &'a CancelFlag,
    interval: Duration,
    max_stalled: u32,
}

impl<'a> Poller<'a> {
    pub fn new(
        clock: &'a dyn Clock,
        cancel: &'a CancelFlag,
        interval: Duration,
        max_stalled: u32,
    ) -> Self {
        Self {
            clock,
            cancel,
            interval,
            max_stalled,
        }
    }

    /// Sleeps one interval, then runs `check`, until it is ready, the stall
    /// budget is spent, or the cancel flag is raised.
    pub fn run<T>(&self, mut check: impl FnMut() -> Poll<T>) -> PollOutcome<T> {
        let mut stalled = 0;
        let mut elapsed = Duration::ZERO;

        loop {
            if self.cancel.is_cancelled() {
                return PollOutcome::Cancelled;
            }
            self.clock.sleep(self.interval);
            elapsed += self.interval;
            if self.cancel.is_cancelled() {
                return PollOutcome::Cancelled;
            }

            match check() {
                Poll::Ready(value) => return PollOutcome::Ready(value),
                Poll::Progress => stalled = 0,
                Poll::Stalled => {
                    stalled += 1;
                    if stalled >= self.max_stalled {
                        return PollOutcome::TimedOut { stalled, elapsed };
                    }
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeClock;
    use super::*;

    const SECS_20: Duration = Duration::from_secs(20);

    #[test]
    fn ready_after_progress() {
        let clock = FakeClock::new();
        let cancel = CancelFlag::new();
        let poller = Poller::new(&clock, &cancel, SECS_20, 3);

        let mut script = vec![Poll::Progress, Poll::Stalled, Poll::Ready("done")].into_iter();
        let outcome = poller.run(|| script.next().unwrap());

        assert_eq!(outcome, PollOutcome::Ready("done"));
        assert_eq!(clock.sleeps(), 3);
    }

    #[test]
    fn stall_budget_times_out() {
        let clock = FakeClock::new();
        let cancel = CancelFlag::new();
        let poller = Poller::new(&clock, &cancel, SECS_20, 90);

        let outcome: PollOutcome<()> = poller.run(|| Poll::Stalled);

        assert_eq!(
            outcome,
            PollOutcome::TimedOut {
                stalled: 90,
                elapsed: Duration::from_secs(30 * 60),
            }
        );
        assert_eq!(clock.total(), Duration::from_secs(30 * 60));
    }

    #[test]
    fn progress_resets_the_budget() {
        let clock = FakeClock::new();
        let cancel = CancelFlag::new();
        let poller = Poller::new(&clock, &cancel, SECS_20, 2);

        let mut script = vec![
            Poll::Stalled,
            Poll::Progress,
            Poll::Stalled,
            Poll::Progress,
            Poll::Stalled,
            Poll::Stalled,
        ]
        .into_iter();
        let outcome: PollOutcome<()> = poller.run(|| script.next().unwrap());

        assert!(matches!(outcome, PollOutcome::TimedOut { stalled: 2, .. }));
        assert_eq!(clock.sleeps(), 6);
    }

    #[test]
    fn cancel_is_honoured_between_polls() {
        let clock = FakeClock::new();
        let cancel = CancelFlag::new();
        let poller = Poller::new(&clock, &cancel, SECS_20, 90);

        let mut polls = 0;
        let outcome: PollOutcome<()> = poller.run(|| {
            polls += 1;
            if polls == 2 {
                cancel.cancel();
            }
            Poll::Progress
        });

        assert_eq!(outcome, PollOutcome::Cancelled);
        assert_eq!(polls, 2);
    }
}
