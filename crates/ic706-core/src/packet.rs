//! IC-706 panel packet encoder/decoder.
//!
//! The IC-706 control head and main unit talk over a serial line using
//! short binary packets. This module handles the pure byte-level framing:
//! finding packet boundaries in an accumulated byte stream and building the
//! few packets the bridge originates itself.
//!
//! # Frame format
//!
//! ```text
//! 0xFE <type> [<payload>...] 0xFD
//! ```
//!
//! - Start byte: `0xFE`
//! - `type`: packet type code (see the `PKT_TYPE_*` constants)
//! - `payload`: variable-length data, meaning owned by the radio
//! - Terminator: `0xFD`, the first one after the start byte ends the frame

use bytes::{BufMut, Bytes, BytesMut};

/// Start-of-packet byte.
pub const START: u8 = 0xFE;

/// End-of-packet byte.
pub const END: u8 = 0xFD;

/// Largest packet the codec will accumulate before giving up on it.
pub const MAX_PACKET_SIZE: usize = 200;

/// Smallest well-formed packet: start, type, terminator.
pub const MIN_PACKET_SIZE: usize = 3;

/// First power-up handshake packet from the main unit.
pub const PKT_TYPE_INIT1: u8 = 0x00;

/// Second power-up handshake packet; the radio is live once it is seen.
pub const PKT_TYPE_INIT2: u8 = 0x01;

/// Display (LCD) update from the main unit.
pub const PKT_TYPE_LCD: u8 = 0x06;

/// Keepalive sent to the main unit while it is powered.
pub const PKT_TYPE_KEEPALIVE: u8 = 0x0B;

/// End of session; the main unit is powering down.
pub const PKT_TYPE_EOS: u8 = 0x0F;

/// Power on/off request from the network client.
///
/// The first payload byte is the requested state: non-zero means on.
pub const PKT_TYPE_PWK: u8 = 0xF0;

/// A single decoded panel packet, including start byte and terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Bytes,
}

impl Packet {
    /// Wrap raw frame bytes.
    ///
    /// The caller guarantees `bytes` is a complete frame as produced by
    /// [`decode_packet`] or [`encode_packet`].
    fn from_frame(bytes: Bytes) -> Self {
        debug_assert!(bytes.len() >= MIN_PACKET_SIZE);
        Packet { bytes }
    }

    /// The packet type code.
    pub fn kind(&self) -> u8 {
        self.bytes[1]
    }

    /// Payload bytes between the type code and the terminator.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[2..self.bytes.len() - 1]
    }

    /// The full frame as it appeared on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// For a [`PKT_TYPE_PWK`] packet, the requested power state.
    ///
    /// Returns `None` for other packet types or an empty payload.
    pub fn power_request(&self) -> Option<bool> {
        if self.kind() != PKT_TYPE_PWK {
            return None;
        }
        self.payload().first().map(|&b| b != 0)
    }
}

/// Result of attempting to decode one packet from the front of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete packet and the number of bytes it consumed.
    Packet(Packet, usize),
    /// More bytes are needed.
    Incomplete,
    /// Leading bytes that cannot belong to any packet; drop this many.
    Garbage(usize),
    /// A started packet grew past [`MAX_PACKET_SIZE`] without a
    /// terminator; drop this many.
    Overflow(usize),
}

/// Decode a single packet from the front of `buf`.
///
/// Bytes before the first start byte are reported as [`DecodeResult::Garbage`].
/// A runt frame (`0xFE 0xFD`, no type code) is also reported as garbage.
pub fn decode_packet(buf: &[u8]) -> DecodeResult {
    if buf.is_empty() {
        return DecodeResult::Incomplete;
    }

    if buf[0] != START {
        let skip = buf.iter().position(|&b| b == START).unwrap_or(buf.len());
        return DecodeResult::Garbage(skip);
    }

    match buf[1..].iter().position(|&b| b == END) {
        Some(offset) => {
            let len = offset + 2;
            if len < MIN_PACKET_SIZE {
                return DecodeResult::Garbage(len);
            }
            let packet = Packet::from_frame(Bytes::copy_from_slice(&buf[..len]));
            DecodeResult::Packet(packet, len)
        }
        None if buf.len() >= MAX_PACKET_SIZE => DecodeResult::Overflow(buf.len()),
        None => DecodeResult::Incomplete,
    }
}

/// Encode a packet into raw bytes ready for transmission.
///
/// # Example
///
/// ```
/// use ic706_core::packet::{encode_packet, PKT_TYPE_KEEPALIVE};
///
/// let bytes = encode_packet(PKT_TYPE_KEEPALIVE, &[0x00]);
/// assert_eq!(bytes, vec![0xFE, 0x0B, 0x00, 0xFD]);
/// ```
pub fn encode_packet(kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(MIN_PACKET_SIZE + payload.len());
    buf.put_u8(START);
    buf.put_u8(kind);
    buf.put_slice(payload);
    buf.put_u8(END);
    buf.to_vec()
}

/// The keepalive packet the bridge writes to the main unit.
pub fn keepalive_packet() -> Vec<u8> {
    encode_packet(PKT_TYPE_KEEPALIVE, &[0x00])
}

/// Human-readable name of a packet type, for logging.
pub fn packet_type_name(kind: u8) -> &'static str {
    match kind {
        PKT_TYPE_INIT1 => "INIT1",
        PKT_TYPE_INIT2 => "INIT2",
        PKT_TYPE_LCD => "LCD",
        PKT_TYPE_KEEPALIVE => "KEEPALIVE",
        PKT_TYPE_EOS => "EOS",
        PKT_TYPE_PWK => "PWK",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_complete_packet() {
        let buf = [0xFE, PKT_TYPE_INIT2, 0x12, 0x34, 0xFD];
        match decode_packet(&buf) {
            DecodeResult::Packet(pkt, consumed) => {
                assert_eq!(consumed, 5);
                assert_eq!(pkt.kind(), PKT_TYPE_INIT2);
                assert_eq!(pkt.payload(), &[0x12, 0x34]);
                assert_eq!(pkt.as_bytes(), &buf);
            }
            other => panic!("expected packet, got {other:?}"),
        }
    }

    #[test]
    fn decode_leaves_trailing_bytes() {
        let buf = [0xFE, PKT_TYPE_EOS, 0xFD, 0xFE, 0x06];
        match decode_packet(&buf) {
            DecodeResult::Packet(pkt, consumed) => {
                assert_eq!(consumed, 3);
                assert_eq!(pkt.kind(), PKT_TYPE_EOS);
                assert!(pkt.payload().is_empty());
            }
            other => panic!("expected packet, got {other:?}"),
        }
        assert_eq!(decode_packet(&buf[3..]), DecodeResult::Incomplete);
    }

    #[test]
    fn decode_empty_is_incomplete() {
        assert_eq!(decode_packet(&[]), DecodeResult::Incomplete);
        assert_eq!(decode_packet(&[0xFE]), DecodeResult::Incomplete);
    }

    #[test]
    fn decode_skips_leading_garbage() {
        let buf = [0x11, 0x22, 0xFE, 0x01, 0xFD];
        assert_eq!(decode_packet(&buf), DecodeResult::Garbage(2));
    }

    #[test]
    fn decode_all_garbage() {
        let buf = [0x11, 0x22, 0xFD];
        assert_eq!(decode_packet(&buf), DecodeResult::Garbage(3));
    }

    #[test]
    fn decode_runt_frame_is_garbage() {
        assert_eq!(decode_packet(&[0xFE, 0xFD, 0x00]), DecodeResult::Garbage(2));
    }

    #[test]
    fn decode_overflow_without_terminator() {
        let mut buf = vec![0xFE, PKT_TYPE_LCD];
        buf.resize(MAX_PACKET_SIZE, 0x20);
        assert_eq!(decode_packet(&buf), DecodeResult::Overflow(MAX_PACKET_SIZE));
        assert_eq!(
            decode_packet(&buf[..MAX_PACKET_SIZE - 1]),
            DecodeResult::Incomplete
        );
    }

    #[test]
    fn keepalive_bytes() {
        assert_eq!(keepalive_packet(), vec![0xFE, 0x0B, 0x00, 0xFD]);
    }

    #[test]
    fn power_request_from_pwk_packet() {
        let on = encode_packet(PKT_TYPE_PWK, &[0x01]);
        let off = encode_packet(PKT_TYPE_PWK, &[0x00]);
        let empty = encode_packet(PKT_TYPE_PWK, &[]);
        let lcd = encode_packet(PKT_TYPE_LCD, &[0x01]);

        let decode = |b: &[u8]| match decode_packet(b) {
            DecodeResult::Packet(p, _) => p,
            other => panic!("expected packet, got {other:?}"),
        };
        assert_eq!(decode(&on).power_request(), Some(true));
        assert_eq!(decode(&off).power_request(), Some(false));
        assert_eq!(decode(&empty).power_request(), None);
        assert_eq!(decode(&lcd).power_request(), None);
    }

    #[test]
    fn type_names() {
        assert_eq!(packet_type_name(PKT_TYPE_INIT2), "INIT2");
        assert_eq!(packet_type_name(PKT_TYPE_PWK), "PWK");
        assert_eq!(packet_type_name(0x42), "OTHER");
    }
}
