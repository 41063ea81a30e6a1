//! ic706-core: Core types, packet codec, and error definitions for the
//! IC-706 remote bridge.
//!
//! # Key types
//!
//! - [`TransferBuffer`] -- per-direction packet accumulation and forwarding
//! - [`Packet`] / [`decode_packet`] -- panel packet framing
//! - [`PwkLine`] / [`SerialLink`] -- hardware seams used by the bridge
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod line;
pub mod packet;
pub mod transfer;

pub use error::{Error, Result, map_io_error};
pub use line::{PwkLine, SerialLink};
pub use packet::{DecodeResult, MAX_PACKET_SIZE, Packet, decode_packet, encode_packet};
pub use transfer::{TransferBuffer, TransferOutcome, TransferStats};
