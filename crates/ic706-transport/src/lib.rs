//! Transport implementations for the IC-706 bridge.
//!
//! This crate provides the concrete hardware and network endpoints the
//! bridge engine runs on:
//!
//! - [`open_serial`]: the UART to the radio's main unit, via tokio-serial
//! - [`bind_listener`]: the single-client TCP listener
//! - [`SysfsGpio`]: the PWK output line through Linux sysfs GPIO
//! - [`NullPwkLine`]: a logging-only PWK line for hosts without the GPIO
//!
//! # Example
//!
//! ```no_run
//! use ic706_transport::{DEFAULT_BAUD_RATE, open_serial};
//!
//! # fn example() -> ic706_core::Result<()> {
//! // IC-706 panel link: 19200 baud, 8N1
//! let uart = open_serial("/dev/ttyO1", DEFAULT_BAUD_RATE)?;
//! # Ok(())
//! # }
//! ```

pub mod gpio;
pub mod serial;
pub mod tcp;

pub use gpio::{DEFAULT_PWK_GPIO, DEFAULT_SYSFS_ROOT, NullPwkLine, SysfsGpio};
pub use serial::{DEFAULT_BAUD_RATE, open_serial};
pub use tcp::{DEFAULT_PORT, LISTEN_BACKLOG, bind_listener, prepare_client};
