//! PWK pulse controller.
//!
//! Pressing the radio's power key is emulated by holding the PWK line high
//! for a fixed width and then releasing it. The controller never sleeps:
//! [`assert`](PulseController::assert) raises the line and stamps the time,
//! and the event loop calls [`tick`](PulseController::tick) every poll cycle
//! to release it once the width has passed. Other I/O keeps flowing while
//! the pulse is held.

use std::time::Duration;

use ic706_core::error::Result;
use ic706_core::line::PwkLine;
use tokio::time::Instant;
use tracing::debug;

/// How long the power key is held.
pub const DEFAULT_PULSE_WIDTH: Duration = Duration::from_millis(500);

/// Drives the PWK line for bounded pulses.
pub struct PulseController {
    line: Box<dyn PwkLine>,
    /// Set while the line is held high.
    asserted_at: Option<Instant>,
    width: Duration,
}

impl PulseController {
    pub fn new(line: Box<dyn PwkLine>, width: Duration) -> Self {
        PulseController {
            line,
            asserted_at: None,
            width,
        }
    }

    /// When the current pulse started, if one is in progress.
    pub fn asserted_at(&self) -> Option<Instant> {
        self.asserted_at
    }

    pub fn is_asserted(&self) -> bool {
        self.asserted_at.is_some()
    }

    /// Raise the line and start (or restart) the hold window at `now`.
    ///
    /// If the line cannot be driven the previous pulse state is kept.
    pub async fn assert(&mut self, now: Instant) -> Result<()> {
        self.line.set_level(true).await?;
        debug!(restarted = self.asserted_at.is_some(), "PWK line asserted");
        self.asserted_at = Some(now);
        Ok(())
    }

    /// Release the line if it has been held for longer than the pulse width.
    ///
    /// Returns `true` when the line was released by this call. A failed
    /// release keeps the pulse pending so the next tick retries it.
    pub async fn tick(&mut self, now: Instant) -> Result<bool> {
        let Some(started) = self.asserted_at else {
            return Ok(false);
        };
        if now.saturating_duration_since(started) <= self.width {
            return Ok(false);
        }
        self.line.set_level(false).await?;
        self.asserted_at = None;
        debug!(
            held_ms = now.saturating_duration_since(started).as_millis(),
            "PWK line released"
        );
        Ok(true)
    }

    /// Release the line immediately if a pulse is in progress or the line
    /// was left high.
    pub async fn release(&mut self) -> Result<()> {
        if self.asserted_at.is_some() || self.line.level() {
            self.line.set_level(false).await?;
            self.asserted_at = None;
            debug!("PWK line released early");
        }
        Ok(())
    }
}
