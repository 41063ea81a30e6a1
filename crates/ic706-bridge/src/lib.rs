//! Serial-to-TCP bridge for a remotely operated IC-706.
//!
//! The IC-706 can be split into a control head and a main unit joined by a
//! serial link. This crate sits on the main unit's side of that link and
//! relays the panel packets to one network client, so the head (or software
//! standing in for it) can run anywhere on the network. It provides:
//!
//! - **Bridge** ([`bridge`]) -- the single-task event loop relaying packets
//!   in both directions.
//! - **Power tracking** ([`power`]) -- rig on/off state driven by the
//!   handshake and end-of-session packets, plus the keepalive cadence.
//! - **Power key** ([`pulse`]) -- bounded pulses on the PWK GPIO line.
//! - **Client slot** ([`connection`]) -- one client at a time, same-address
//!   reconnection, refusal of everyone else.
//! - **BridgeBuilder** ([`builder`]) -- configuration and hardware setup.

pub mod bridge;
pub mod builder;
pub mod connection;
pub mod power;
pub mod pulse;

pub use bridge::{Bridge, BridgeReport};
pub use builder::{BridgeBuilder, DEFAULT_POLL_INTERVAL, DEFAULT_UART_PATH};
pub use connection::{AcceptOutcome, ConnectionManager, ConnectionStats};
pub use power::{PowerOnTrigger, PowerState, RigPower};
pub use pulse::PulseController;
