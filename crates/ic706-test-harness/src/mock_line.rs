//! Mock PWK line for deterministic testing of the bridge.
//!
//! [`MockPwkLine`] implements [`PwkLine`] and records every level change
//! with a timestamp. Clones share state, so a test can keep one handle
//! while the bridge owns another.
//!
//! # Example
//!
//! ```
//! use ic706_test_harness::MockPwkLine;
//!
//! let line = MockPwkLine::new();
//! let observer = line.clone();
//! // hand `line` to the bridge, inspect `observer.transitions()` later
//! assert!(observer.transitions().is_empty());
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use ic706_core::error::{Error, Result};
use ic706_core::line::PwkLine;

/// One recorded level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub high: bool,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct State {
    level: bool,
    transitions: Vec<LevelChange>,
    failing: bool,
}

/// A [`PwkLine`] that records instead of driving hardware.
#[derive(Debug, Clone, Default)]
pub struct MockPwkLine {
    state: Arc<Mutex<State>>,
}

impl MockPwkLine {
    /// Create a line in the low state with no history.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All successful level changes so far, oldest first.
    pub fn transitions(&self) -> Vec<LevelChange> {
        self.lock().transitions.clone()
    }

    /// Current level.
    pub fn is_high(&self) -> bool {
        self.lock().level
    }

    /// Make subsequent writes fail with [`Error::Gpio`].
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Poll until the line reaches `high` or `timeout` elapses.
    ///
    /// Returns the time the level was observed, or `None` on timeout.
    pub async fn wait_for_level(&self, high: bool, timeout: Duration) -> Option<Instant> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_high() == high {
                return Some(Instant::now());
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl PwkLine for MockPwkLine {
    async fn set_level(&mut self, high: bool) -> Result<()> {
        let mut state = self.lock();
        if state.failing {
            return Err(Error::Gpio("mock line failure".into()));
        }
        state.level = high;
        state.transitions.push(LevelChange {
            high,
            at: Instant::now(),
        });
        Ok(())
    }

    fn level(&self) -> bool {
        self.lock().level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_transitions_across_clones() {
        let mut line = MockPwkLine::new();
        let observer = line.clone();

        line.set_level(true).await.unwrap();
        line.set_level(false).await.unwrap();

        let history = observer.transitions();
        assert_eq!(history.len(), 2);
        assert!(history[0].high);
        assert!(!history[1].high);
        assert!(history[1].at >= history[0].at);
        assert!(!observer.is_high());
    }

    #[tokio::test]
    async fn failing_line_keeps_level() {
        let mut line = MockPwkLine::new();
        line.set_failing(true);

        let result = line.set_level(true).await;
        assert!(matches!(result, Err(Error::Gpio(_))));
        assert!(!line.level());
        assert!(line.transitions().is_empty());
    }

    #[tokio::test]
    async fn wait_for_level_times_out() {
        let line = MockPwkLine::new();
        assert!(line.wait_for_level(false, Duration::from_millis(10)).await.is_some());
        assert!(line.wait_for_level(true, Duration::from_millis(20)).await.is_none());
    }
}
