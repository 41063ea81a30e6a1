//! Serial port access for the radio's control link.
//!
//! The IC-706 main unit talks to its control head at 19200 baud, 8 data
//! bits, no parity, one stop bit, no flow control. Only the baud rate is
//! adjustable; [`open_serial`] fixes the rest of the line settings and hands
//! back a stream the bridge can poll alongside its sockets.

use ic706_core::error::{Error, Result};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

/// Baud rate used by the IC-706 panel link.
pub const DEFAULT_BAUD_RATE: u32 = 19_200;

/// Open the UART at `path`, 8N1 without flow control.
///
/// Must be called from within a tokio runtime. Failure here is fatal for
/// the bridge and is reported as [`Error::Transport`].
pub fn open_serial(path: &str, baud_rate: u32) -> Result<SerialStream> {
    tracing::debug!(port = %path, baud_rate, "Opening serial port");

    let stream = tokio_serial::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| {
            tracing::error!(port = %path, error = %e, "Failed to open serial port");
            Error::Transport(format!("failed to open serial port {}: {}", path, e))
        })?;

    tracing::info!(port = %path, baud_rate, "Serial port opened");

    Ok(stream)
}
