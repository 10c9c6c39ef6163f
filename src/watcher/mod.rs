/// Watchers
///
/// A watcher samples one transient page condition on a fixed
/// interval and reacts to what it finds. Each runs as its own
/// tokio task and owns its interval timer.
///
/// - join:   finds the join control once (on a tick or a page
///           mutation), then waits for its click
/// - roster: reports the participant list on every tick
///
/// The task handle is wrapped in [`WatcherHandle`] so the
/// orchestrator can release it exactly once at teardown.
pub mod join;
pub mod roster;

use std::future::Future;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval_at};

/// Owned handle to a running watcher task.
///
/// Cancelling aborts the task, which drops its timer with it.
/// A second cancel is a no-op. Dropping the handle cancels too.
pub struct WatcherHandle {
    name: &'static str,
    task: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    pub fn spawn<F>(name: &'static str, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            task: Some(tokio::spawn(fut)),
        }
    }

    /// Stops the watcher.
    ///
    /// Returns `true` if the task was still running at this point.
    pub fn cancel(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };

        let running = !task.is_finished();
        task.abort();
        debug!("{} watcher cancelled (running={})", self.name, running);
        running
    }

    /// Whether the watcher task has ended, on its own or by cancel.
    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Recurring timer whose first tick is one `period` from now.
///
/// Late ticks are delayed rather than bunched up, so a stalled
/// runtime never produces a burst of back-to-back probes.
pub(crate) fn sampling_timer(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cancel_is_exactly_once() {
        let mut handle = WatcherHandle::spawn("test", async {
            futures_util::future::pending::<()>().await;
        });
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn cancel_after_completion_reports_not_running() {
        let mut handle = WatcherHandle::spawn("test", async {});
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        assert!(!handle.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_first_tick_waits_one_period() {
        let start = Instant::now();
        let mut timer = sampling_timer(Duration::from_millis(800));
        timer.tick().await;
        assert_eq!(Instant::now() - start, Duration::from_millis(800));
        timer.tick().await;
        assert_eq!(Instant::now() - start, Duration::from_millis(1600));
    }
}
