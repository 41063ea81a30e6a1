//! Rig power state tracking and keepalive cadence.
//!
//! The main unit announces power-up with a handshake and power-down with an
//! end-of-session packet; both arrive on the UART. While the rig is on it
//! must hear a keepalive from the bridge at a steady cadence or it drops
//! back to standby. Network power requests never change the tracked state
//! directly: they only decide whether the power key needs to be pressed,
//! and the rig's own packets confirm the result.

use std::fmt;
use std::time::Duration;

use ic706_core::packet::{PKT_TYPE_EOS, PKT_TYPE_INIT2, PKT_TYPE_LCD};
use tokio::time::Instant;
use tracing::{debug, info};

/// Interval between keepalives while the rig is on.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(150);

/// Tracked power state of the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    #[default]
    Off,
    On,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Off => write!(f, "off"),
            PowerState::On => write!(f, "on"),
        }
    }
}

/// Which UART packet marks the rig as powered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerOnTrigger {
    /// The second handshake packet (`INIT2`).
    #[default]
    Handshake,
    /// The first display update (`LCD`).
    Display,
}

impl PowerOnTrigger {
    /// The packet type code that triggers `Off -> On`.
    pub fn packet_type(self) -> u8 {
        match self {
            PowerOnTrigger::Handshake => PKT_TYPE_INIT2,
            PowerOnTrigger::Display => PKT_TYPE_LCD,
        }
    }
}

/// Effect of a UART packet on the power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    Unchanged,
    TurnedOn,
    TurnedOff,
    /// The rig repeated its handshake while already on.
    Handshake,
}

/// Power state machine driven by UART packet types.
#[derive(Debug)]
pub struct RigPower {
    state: PowerState,
    trigger: PowerOnTrigger,
    keepalive_interval: Duration,
    last_keepalive: Instant,
}

impl RigPower {
    pub fn new(trigger: PowerOnTrigger, keepalive_interval: Duration) -> Self {
        RigPower {
            state: PowerState::Off,
            trigger,
            keepalive_interval,
            last_keepalive: Instant::now(),
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn is_on(&self) -> bool {
        self.state == PowerState::On
    }

    /// Apply a packet type seen on the UART.
    ///
    /// On `TurnedOn` and `Handshake` the keepalive timer is reset to `now`;
    /// the caller sends a keepalive immediately.
    pub fn on_uart_packet(&mut self, kind: u8, now: Instant) -> PowerEvent {
        match (self.state, kind) {
            (PowerState::Off, k) if k == self.trigger.packet_type() => {
                self.state = PowerState::On;
                self.last_keepalive = now;
                info!(trigger = ?self.trigger, "rig powered on");
                PowerEvent::TurnedOn
            }
            (PowerState::On, PKT_TYPE_EOS) => {
                self.state = PowerState::Off;
                info!("rig powered off");
                PowerEvent::TurnedOff
            }
            (PowerState::On, PKT_TYPE_INIT2) => {
                self.last_keepalive = now;
                debug!("handshake repeated while on");
                PowerEvent::Handshake
            }
            _ => PowerEvent::Unchanged,
        }
    }

    /// Whether a keepalive is due at `now`.
    ///
    /// Returns `true` at most once per interval while the rig is on, and
    /// restarts the interval when it does.
    pub fn keepalive_due(&mut self, now: Instant) -> bool {
        if !self.is_on() {
            return false;
        }
        if now.saturating_duration_since(self.last_keepalive) <= self.keepalive_interval {
            return false;
        }
        self.last_keepalive = now;
        true
    }

    /// Whether a network power request needs a key press.
    pub fn wants_pulse(&self, requested_on: bool) -> bool {
        requested_on != self.is_on()
    }
}
