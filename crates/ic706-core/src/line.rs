//! Hardware seams for the bridge.
//!
//! The bridge engine never touches a device directly. It talks to the radio
//! through a [`SerialLink`] (any async byte stream) and drives the power
//! key through a [`PwkLine`]. Concrete implementations live in
//! `ic706-transport` (tokio-serial, Linux sysfs GPIO) and
//! `ic706-test-harness` (mock line for tests).

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// An async byte stream connected to the radio's control port.
///
/// Blanket-implemented for every suitable stream, so a
/// `tokio_serial::SerialStream` and a `tokio::io::DuplexStream` both
/// qualify.
pub trait SerialLink: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialLink for T {}

/// Output line wired to the radio's PWK (power key) input.
#[async_trait]
pub trait PwkLine: Send {
    /// Drive the line high (`true`) or low (`false`).
    async fn set_level(&mut self, high: bool) -> Result<()>;

    /// The last level successfully written.
    fn level(&self) -> bool;
}
