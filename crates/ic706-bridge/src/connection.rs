//! Single-client connection slot.
//!
//! The bridge serves exactly one network client. A new connection from the
//! address already holding the slot replaces the stale socket (the client
//! reconnected after a network hiccup); a connection from any other
//! address is refused and closed on the spot. Sockets are closed by
//! dropping them.

use std::net::{IpAddr, SocketAddr};

use tracing::{info, warn};

/// What [`ConnectionManager::on_accept`] did with a new socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The slot was empty; the socket is now the active client.
    Accepted,
    /// Same address as the active client; the old socket was closed.
    Reconnected,
    /// Another client holds the slot; the new socket was closed.
    Refused,
}

/// Counters kept across the bridge's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub accepted: u64,
    pub reconnected: u64,
    pub refused: u64,
    pub disconnected: u64,
}

/// The active client.
#[derive(Debug)]
pub struct ClientSlot<S> {
    pub addr: SocketAddr,
    pub socket: S,
}

/// Owns the single client slot.
#[derive(Debug)]
pub struct ConnectionManager<S> {
    slot: Option<ClientSlot<S>>,
    stats: ConnectionStats,
}

impl<S> Default for ConnectionManager<S> {
    fn default() -> Self {
        ConnectionManager {
            slot: None,
            stats: ConnectionStats::default(),
        }
    }
}

/// Client identity is the IP address; the source port changes on every
/// reconnect. IPv4-mapped IPv6 addresses compare equal to plain IPv4.
fn identity(addr: &SocketAddr) -> IpAddr {
    addr.ip().to_canonical()
}

impl<S> ConnectionManager<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.slot.is_some()
    }

    /// Address of the active client.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.slot.as_ref().map(|s| s.addr)
    }

    pub fn socket_mut(&mut self) -> Option<&mut S> {
        self.slot.as_mut().map(|s| &mut s.socket)
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    /// Place a freshly accepted socket according to the slot policy.
    pub fn on_accept(&mut self, socket: S, addr: SocketAddr) -> AcceptOutcome {
        match &mut self.slot {
            None => {
                self.slot = Some(ClientSlot { addr, socket });
                self.stats.accepted += 1;
                info!(peer = %addr, "client connected");
                AcceptOutcome::Accepted
            }
            Some(active) if identity(&active.addr) == identity(&addr) => {
                let stale = std::mem::replace(active, ClientSlot { addr, socket });
                drop(stale);
                self.stats.reconnected += 1;
                info!(peer = %addr, "client reconnected, stale socket closed");
                AcceptOutcome::Reconnected
            }
            Some(active) => {
                drop(socket);
                self.stats.refused += 1;
                warn!(peer = %addr, active = %active.addr, "refused second client");
                AcceptOutcome::Refused
            }
        }
    }

    /// Clear the slot after the client went away.
    pub fn on_disconnect(&mut self) -> Option<ClientSlot<S>> {
        let slot = self.slot.take()?;
        self.stats.disconnected += 1;
        info!(peer = %slot.addr, "client disconnected");
        Some(slot)
    }

    /// Close the active client, if any.
    pub fn close(&mut self) {
        if let Some(slot) = self.slot.take() {
            info!(peer = %slot.addr, "closing client");
        }
    }
}
