//! The bridge event loop.
//!
//! A single task owns the UART, the listening socket, the client slot, the
//! PWK line and both transfer buffers. Each iteration runs the timer-driven
//! housekeeping (keepalive, pulse release), then waits up to one poll
//! interval for the first of:
//!
//! 1. cancellation,
//! 2. bytes from the UART (forwarded to the client, fed to the power state
//!    machine),
//! 3. bytes from the client (forwarded to the UART, power requests turned
//!    into key presses),
//! 4. a new connection on the listener.
//!
//! No I/O error after startup stops the loop; failures are counted in the
//! transfer statistics and logged.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use ic706_core::error::{Error, Result, map_io_error};
use ic706_core::line::{PwkLine, SerialLink};
use ic706_core::packet::{MAX_PACKET_SIZE, Packet, keepalive_packet, packet_type_name};
use ic706_core::transfer::{TransferBuffer, TransferOutcome, TransferStats};
use ic706_transport::prepare_client;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::connection::{AcceptOutcome, ConnectionManager, ConnectionStats};
use crate::power::{PowerEvent, PowerOnTrigger, PowerState, RigPower};
use crate::pulse::PulseController;

/// Timing and policy settings, filled in by [`BridgeBuilder`](crate::BridgeBuilder).
pub(crate) struct BridgeConfig {
    pub poll_interval: Duration,
    pub keepalive_interval: Duration,
    pub pulse_width: Duration,
    pub write_timeout: Duration,
    pub power_on_trigger: PowerOnTrigger,
}

/// Counters reported when the bridge stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeReport {
    /// Packets read from the UART and forwarded to the client.
    pub uart: TransferStats,
    /// Packets read from the client and forwarded to the UART.
    pub net: TransferStats,
    pub connections: ConnectionStats,
    /// Rig power state at shutdown.
    pub rig: PowerState,
}

impl BridgeReport {
    /// Emit the report through `tracing` at info level.
    pub fn log(&self) {
        info!(
            valid = self.uart.valid_packets,
            invalid = self.uart.invalid_packets,
            write_errors = self.uart.write_errors,
            read_errors = self.uart.read_errors,
            "UART -> network totals"
        );
        info!(
            valid = self.net.valid_packets,
            invalid = self.net.invalid_packets,
            write_errors = self.net.write_errors,
            read_errors = self.net.read_errors,
            "network -> UART totals"
        );
        info!(
            accepted = self.connections.accepted,
            reconnected = self.connections.reconnected,
            refused = self.connections.refused,
            disconnected = self.connections.disconnected,
            "connection totals"
        );
        info!(rig = %self.rig, "final rig state");
    }
}

/// What woke the loop.
enum Wake {
    Cancelled,
    Uart(io::Result<usize>),
    Client(io::Result<usize>),
    Accept(io::Result<(TcpStream, SocketAddr)>),
    Idle,
}

/// The running bridge. Create one with [`BridgeBuilder`](crate::BridgeBuilder).
pub struct Bridge {
    uart: Box<dyn SerialLink>,
    listener: TcpListener,
    clients: ConnectionManager<TcpStream>,
    pulse: PulseController,
    power: RigPower,
    uart_buf: TransferBuffer,
    net_buf: TransferBuffer,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl Bridge {
    pub(crate) fn new(
        uart: Box<dyn SerialLink>,
        listener: TcpListener,
        line: Box<dyn PwkLine>,
        config: BridgeConfig,
        cancel: CancellationToken,
    ) -> Self {
        Bridge {
            uart,
            listener,
            clients: ConnectionManager::new(),
            pulse: PulseController::new(line, config.pulse_width),
            power: RigPower::new(config.power_on_trigger, config.keepalive_interval),
            uart_buf: TransferBuffer::new("uart").with_write_timeout(config.write_timeout),
            net_buf: TransferBuffer::new("net").with_write_timeout(config.write_timeout),
            poll_interval: config.poll_interval,
            cancel,
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Error::Io)
    }

    /// Run until the cancellation token fires, then release the PWK line,
    /// close the client and return the accumulated counters.
    pub async fn run(mut self) -> BridgeReport {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "bridge listening");
        }

        let mut uart_chunk = [0u8; MAX_PACKET_SIZE];
        let mut net_chunk = [0u8; MAX_PACKET_SIZE];

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.housekeeping(Instant::now()).await;

            let connected = self.clients.is_connected();
            let wake = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => Wake::Cancelled,

                res = self.uart.read(&mut uart_chunk) => Wake::Uart(res),

                res = read_client(self.clients.socket_mut(), &mut net_chunk), if connected => {
                    Wake::Client(res)
                }

                res = self.listener.accept() => Wake::Accept(res),

                _ = tokio::time::sleep(self.poll_interval) => Wake::Idle,
            };

            match wake {
                Wake::Cancelled => break,
                Wake::Uart(Ok(n)) => self.on_uart_data(&uart_chunk[..n]).await,
                Wake::Uart(Err(e)) => {
                    self.uart_buf.record_read_error();
                    warn!(error = %e, "UART read failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
                Wake::Client(Ok(n)) => self.on_client_data(&net_chunk[..n]).await,
                Wake::Client(Err(e)) => self.on_client_error(e),
                Wake::Accept(Ok((stream, addr))) => self.on_accept(stream, addr),
                Wake::Accept(Err(e)) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
                Wake::Idle => {}
            }

            tokio::task::yield_now().await;
        }

        debug!("bridge loop cancelled, shutting down");
        self.shutdown().await
    }

    // -----------------------------------------------------------------------
    // Housekeeping
    // -----------------------------------------------------------------------

    async fn housekeeping(&mut self, now: Instant) {
        if self.power.keepalive_due(now) {
            self.send_keepalive().await;
        }
        if let Err(e) = self.pulse.tick(now).await {
            warn!(error = %e, "failed to release PWK line, will retry");
        }
    }

    /// The keepalive queues behind any frame the network direction left
    /// half written; failures are counted against the UART direction.
    async fn send_keepalive(&mut self) {
        match self.net_buf.write_frame(&mut self.uart, &keepalive_packet()).await {
            Ok(()) => trace!("keepalive sent"),
            Err(e) => {
                self.uart_buf.record_write_error();
                warn!(error = %e, "keepalive write failed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // UART side
    // -----------------------------------------------------------------------

    async fn on_uart_data(&mut self, data: &[u8]) {
        let outcome = self.uart_buf.forward(data, self.clients.socket_mut()).await;
        match outcome {
            TransferOutcome::Packets(packets) => {
                let now = Instant::now();
                for packet in &packets {
                    self.on_uart_packet(packet, now).await;
                }
            }
            TransferOutcome::EndOfStream => {
                debug!("UART returned end of stream");
                tokio::time::sleep(self.poll_interval).await;
            }
            TransferOutcome::Incomplete => {}
        }
    }

    async fn on_uart_packet(&mut self, packet: &Packet, now: Instant) {
        trace!(kind = packet_type_name(packet.kind()), "UART packet");
        match self.power.on_uart_packet(packet.kind(), now) {
            PowerEvent::TurnedOn | PowerEvent::Handshake => self.send_keepalive().await,
            PowerEvent::TurnedOff | PowerEvent::Unchanged => {}
        }
    }

    // -----------------------------------------------------------------------
    // Network side
    // -----------------------------------------------------------------------

    async fn on_client_data(&mut self, data: &[u8]) {
        let outcome = self.net_buf.forward(data, Some(&mut self.uart)).await;
        match outcome {
            TransferOutcome::Packets(packets) => {
                for requested in packets.iter().filter_map(Packet::power_request) {
                    self.on_power_request(requested).await;
                }
            }
            TransferOutcome::EndOfStream => self.disconnect(),
            TransferOutcome::Incomplete => {}
        }
    }

    fn on_client_error(&mut self, e: io::Error) {
        match map_io_error(e) {
            Error::ConnectionLost => self.disconnect(),
            other => {
                self.net_buf.record_read_error();
                warn!(error = %other, "client read failed");
            }
        }
    }

    async fn on_power_request(&mut self, on: bool) {
        if !self.power.wants_pulse(on) {
            debug!(requested = on, rig = %self.power.state(), "rig already in requested state");
            return;
        }
        info!(
            requested = on,
            peer = ?self.clients.peer(),
            restart = self.pulse.is_asserted(),
            "pressing power key"
        );
        if let Err(e) = self.pulse.assert(Instant::now()).await {
            warn!(error = %e, "failed to assert PWK line");
        }
    }

    fn on_accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        prepare_client(&stream, addr);
        match self.clients.on_accept(stream, addr) {
            AcceptOutcome::Accepted | AcceptOutcome::Reconnected => {
                self.net_buf.clear();
                self.uart_buf.discard_unsent();
            }
            AcceptOutcome::Refused => {}
        }
    }

    fn disconnect(&mut self) {
        self.clients.on_disconnect();
        if self.net_buf.pending() > 0 {
            debug!(bytes = self.net_buf.pending(), "dropping partial client packet");
        }
        self.net_buf.clear();
        self.uart_buf.discard_unsent();
    }

    async fn shutdown(mut self) -> BridgeReport {
        if let Err(e) = self.pulse.release().await {
            warn!(error = %e, "failed to release PWK line on shutdown");
        }
        self.clients.close();

        BridgeReport {
            uart: self.uart_buf.stats(),
            net: self.net_buf.stats(),
            connections: self.clients.stats(),
            rig: self.power.state(),
        }
    }
}

/// Read from the client if there is one; never completes otherwise.
async fn read_client(socket: Option<&mut TcpStream>, buf: &mut [u8]) -> io::Result<usize> {
    match socket {
        Some(socket) => socket.read(buf).await,
        None => std::future::pending().await,
    }
}
