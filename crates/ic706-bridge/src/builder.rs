//! BridgeBuilder -- fluent builder for constructing [`Bridge`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! the serial device, listening address, PWK line and timing parameters
//! before any hardware is touched.
//!
//! # Example
//!
//! ```no_run
//! use ic706_bridge::BridgeBuilder;
//!
//! # async fn example() -> ic706_core::Result<()> {
//! let bridge = BridgeBuilder::new()
//!     .uart_path("/dev/ttyO1")
//!     .port(42000)
//!     .pwk_gpio(Some(20))
//!     .build()
//!     .await?;
//! let report = bridge.run().await;
//! report.log();
//! # Ok(())
//! # }
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use ic706_core::error::{Error, Result};
use ic706_core::line::{PwkLine, SerialLink};
use ic706_core::transfer::DEFAULT_WRITE_TIMEOUT;
use ic706_transport::{
    DEFAULT_BAUD_RATE, DEFAULT_PORT, DEFAULT_PWK_GPIO, DEFAULT_SYSFS_ROOT, LISTEN_BACKLOG,
    NullPwkLine, SysfsGpio, bind_listener, open_serial,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::bridge::{Bridge, BridgeConfig};
use crate::power::{DEFAULT_KEEPALIVE_INTERVAL, PowerOnTrigger};
use crate::pulse::DEFAULT_PULSE_WIDTH;

/// UART device wired to the IC-706 main unit.
pub const DEFAULT_UART_PATH: &str = "/dev/ttyO1";

/// Upper bound on how long the event loop waits for readiness.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Fluent builder for [`Bridge`].
///
/// Every setting has a default matching the stock hardware, so
/// `BridgeBuilder::new().build().await` is a complete configuration on the
/// target board.
#[derive(Debug, Clone)]
pub struct BridgeBuilder {
    uart_path: String,
    baud_rate: u32,
    bind: IpAddr,
    port: u16,
    pwk_gpio: Option<u32>,
    sysfs_root: PathBuf,
    poll_interval: Duration,
    keepalive_interval: Duration,
    pulse_width: Duration,
    write_timeout: Duration,
    power_on_trigger: PowerOnTrigger,
    cancel: CancellationToken,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeBuilder {
    pub fn new() -> Self {
        BridgeBuilder {
            uart_path: DEFAULT_UART_PATH.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            pwk_gpio: Some(DEFAULT_PWK_GPIO),
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            poll_interval: DEFAULT_POLL_INTERVAL,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            pulse_width: DEFAULT_PULSE_WIDTH,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            power_on_trigger: PowerOnTrigger::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the serial device path (e.g. `/dev/ttyO1`).
    pub fn uart_path(mut self, path: &str) -> Self {
        self.uart_path = path.to_string();
        self
    }

    /// Override the UART baud rate (default 19200).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Address to listen on (default `0.0.0.0`).
    pub fn bind_addr(mut self, addr: IpAddr) -> Self {
        self.bind = addr;
        self
    }

    /// TCP port to listen on (default 42000).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// GPIO number of the PWK line, or `None` to run without one.
    pub fn pwk_gpio(mut self, pin: Option<u32>) -> Self {
        self.pwk_gpio = pin;
        self
    }

    /// Root of the sysfs GPIO tree (default `/sys/class/gpio`).
    pub fn sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// How long the PWK line is held for one key press (default 500 ms).
    pub fn pulse_width(mut self, width: Duration) -> Self {
        self.pulse_width = width;
        self
    }

    /// Deadline for the writes triggered by one read (default 100 ms).
    ///
    /// Never longer than the poll interval once built.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Which UART packet marks the rig as powered on.
    pub fn power_on_trigger(mut self, trigger: PowerOnTrigger) -> Self {
        self.power_on_trigger = trigger;
        self
    }

    /// Use an externally owned cancellation token.
    ///
    /// Cancelling it makes [`Bridge::run`] return within one poll interval.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn validate(&self) -> Result<()> {
        let intervals = [
            ("poll interval", self.poll_interval),
            ("keepalive interval", self.keepalive_interval),
            ("pulse width", self.pulse_width),
            ("write timeout", self.write_timeout),
        ];
        for (name, value) in intervals {
            if value.is_zero() {
                return Err(Error::InvalidParameter(format!("{name} must be non-zero")));
            }
        }
        if self.baud_rate == 0 {
            return Err(Error::InvalidParameter("baud rate must be non-zero".into()));
        }
        Ok(())
    }

    /// Build a [`Bridge`] from already-open endpoints.
    ///
    /// This is the entry point for tests (pass a `tokio::io::duplex` half as
    /// the UART and a `MockPwkLine` from `ic706-test-harness`) and for
    /// callers that manage the hardware themselves.
    pub fn build_with(
        self,
        uart: Box<dyn SerialLink>,
        listener: TcpListener,
        line: Box<dyn PwkLine>,
    ) -> Result<Bridge> {
        self.validate()?;
        let config = self.bridge_config();
        Ok(Bridge::new(uart, listener, line, config, self.cancel))
    }

    fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            poll_interval: self.poll_interval,
            keepalive_interval: self.keepalive_interval,
            pulse_width: self.pulse_width,
            write_timeout: self.write_timeout.min(self.poll_interval),
            power_on_trigger: self.power_on_trigger,
        }
    }

    /// Open the serial port, the PWK line and the listening socket.
    ///
    /// Any failure here is fatal: the bridge cannot run without all three.
    pub async fn build(self) -> Result<Bridge> {
        self.validate()?;

        let uart = open_serial(&self.uart_path, self.baud_rate)?;

        let line: Box<dyn PwkLine> = match self.pwk_gpio {
            Some(pin) => Box::new(SysfsGpio::init_output_at(&self.sysfs_root, pin).await?),
            None => {
                tracing::warn!("no PWK GPIO configured, power key requests are logged only");
                Box::new(NullPwkLine::new())
            }
        };

        let listener = bind_listener(SocketAddr::new(self.bind, self.port), LISTEN_BACKLOG)?;

        self.build_with(Box::new(uart), listener, line)
    }
}
