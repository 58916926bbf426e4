//! Single-shot deadline timers for the orchestrator
//!
//! Each timer runs as a tokio sleep task tagged with a generation number.
//! Arming or cancelling bumps the generation and aborts the previous task, so
//! an expiry that was already queued before the cancel is recognised as stale
//! by [`DeadlineTimer::accept`] and never reaches the state machine.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Which orchestrator timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// End-of-utterance debounce
    Silence,
    /// Playback-never-started watchdog
    Recovery,
}

/// A re-armable single-shot timer
#[derive(Debug)]
pub struct DeadlineTimer {
    kind: TimerKind,
    delay: Duration,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl DeadlineTimer {
    pub fn new(kind: TimerKind, delay: Duration) -> Self {
        Self {
            kind,
            delay,
            generation: 0,
            task: None,
        }
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether an armed, not yet accepted instance exists
    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    /// Arm the timer, superseding any previous instance
    ///
    /// `on_expiry` is called from the timer task with the kind and generation
    /// of this instance. Must be called from within a tokio runtime.
    pub fn arm<F>(&mut self, on_expiry: F)
    where
        F: FnOnce(TimerKind, u64) + Send + 'static,
    {
        self.cancel();
        let kind = self.kind();
        let delay = self.delay;
        let generation = self.generation;

        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_expiry(kind, generation);
        }));

        tracing::debug!(
            "{:?} timer armed for {}ms (generation {})",
            kind,
            delay.as_millis(),
            generation
        );
    }

    /// Cancel any outstanding instance
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("{:?} timer cancelled (generation {})", self.kind, self.generation);
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Check an expiry against the current instance
    ///
    /// Returns true exactly once for the live instance; stale generations and
    /// expiries arriving after a cancel return false.
    pub fn accept(&mut self, generation: u64) -> bool {
        if self.task.is_some() && generation == self.generation {
            self.task = None;
            self.generation = self.generation.wrapping_add(1);
            true
        } else {
            tracing::debug!(
                "Ignoring stale {:?} timer expiry (generation {}, current {})",
                self.kind,
                generation,
                self.generation
            );
            false
        }
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Callback = Box<dyn FnOnce(TimerKind, u64) + Send>;

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl Fn() -> Callback) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let make = move || {
            let sink = Arc::clone(&sink);
            Box::new(move |_kind: TimerKind, generation: u64| sink.lock().push(generation))
                as Callback
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (fired, make) = recorder();
        let mut timer = DeadlineTimer::new(TimerKind::Silence, Duration::from_millis(1500));
        assert_eq!(timer.kind(), TimerKind::Silence);
        timer.arm(make());

        tokio::time::sleep(Duration::from_millis(1499)).await;
        assert!(fired.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let generations = fired.lock().clone();
        assert_eq!(generations.len(), 1);
        assert!(timer.accept(generations[0]));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_supersedes_previous_instance() {
        let (fired, make) = recorder();
        let mut timer = DeadlineTimer::new(TimerKind::Silence, Duration::from_millis(100));

        timer.arm(make());
        tokio::time::sleep(Duration::from_millis(60)).await;
        timer.arm(make());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(fired.lock().is_empty(), "first instance must not fire");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (fired, make) = recorder();
        let mut timer = DeadlineTimer::new(TimerKind::Recovery, Duration::from_millis(100));
        timer.arm(make());
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(fired.lock().is_empty());
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_accept_rejects_stale_generation() {
        let mut timer = DeadlineTimer::new(TimerKind::Recovery, Duration::from_millis(100));
        // Nothing armed
        assert!(!timer.accept(0));
        timer.cancel();
        assert!(!timer.accept(0));
    }
}
