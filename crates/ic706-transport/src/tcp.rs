//! TCP listener for the remote control head.
//!
//! The bridge serves exactly one client at a time, so the listener is
//! created with a backlog of one. `SO_REUSEADDR` is set so a restarted
//! server can rebind while old connections linger in `TIME_WAIT`.

use std::net::SocketAddr;

use ic706_core::error::{Error, Result};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

/// Default network port.
pub const DEFAULT_PORT: u16 = 42000;

/// Pending-connection backlog for the single-client listener.
pub const LISTEN_BACKLOG: u32 = 1;

/// Create, bind and listen on `addr`.
///
/// Must be called from within a tokio runtime. Failure to set
/// `SO_REUSEADDR` only logs a warning; socket creation, bind and listen
/// failures are returned as [`Error::Transport`].
pub fn bind_listener(addr: SocketAddr, backlog: u32) -> Result<TcpListener> {
    tracing::debug!(addr = %addr, backlog, "Binding TCP listener");

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(|e| Error::Transport(format!("failed to create socket: {}", e)))?;

    if let Err(e) = socket.set_reuseaddr(true) {
        tracing::warn!(addr = %addr, error = %e, "Failed to set SO_REUSEADDR (continuing anyway)");
    }

    socket.bind(addr).map_err(|e| {
        tracing::error!(addr = %addr, error = %e, "bind() failed");
        Error::Transport(format!("failed to bind {}: {}", addr, e))
    })?;

    let listener = socket.listen(backlog).map_err(|e| {
        tracing::error!(addr = %addr, error = %e, "listen() failed");
        Error::Transport(format!("failed to listen on {}: {}", addr, e))
    })?;

    let local = listener.local_addr().unwrap_or(addr);
    tracing::info!(addr = %local, "Listening for remote head connections");

    Ok(listener)
}

/// Tune a freshly accepted client socket.
///
/// Disables Nagle's algorithm; panel packets are small and
/// latency-sensitive.
pub fn prepare_client(stream: &TcpStream, peer: SocketAddr) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!(
            peer = %peer,
            error = %e,
            "Failed to set TCP_NODELAY (continuing anyway)"
        );
    }
}
