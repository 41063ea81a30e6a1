//! Ready-made panel packets for tests.

use ic706_core::packet::{
    PKT_TYPE_EOS, PKT_TYPE_INIT1, PKT_TYPE_INIT2, PKT_TYPE_LCD, PKT_TYPE_PWK, encode_packet,
};

/// First handshake packet from the main unit.
pub fn init1() -> Vec<u8> {
    encode_packet(PKT_TYPE_INIT1, &[0x00])
}

/// Handshake-complete packet from the main unit.
pub fn init2() -> Vec<u8> {
    encode_packet(PKT_TYPE_INIT2, &[0x00])
}

/// End-of-session packet from the main unit.
pub fn eos() -> Vec<u8> {
    encode_packet(PKT_TYPE_EOS, &[])
}

/// Display update carrying `text`.
pub fn lcd(text: &str) -> Vec<u8> {
    encode_packet(PKT_TYPE_LCD, text.as_bytes())
}

/// Power request from the network client.
pub fn pwk(on: bool) -> Vec<u8> {
    encode_packet(PKT_TYPE_PWK, &[u8::from(on)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pwk_payload() {
        assert_eq!(pwk(true), vec![0xFE, 0xF0, 0x01, 0xFD]);
        assert_eq!(pwk(false), vec![0xFE, 0xF0, 0x00, 0xFD]);
    }

    #[test]
    fn lcd_carries_text() {
        assert_eq!(lcd("7"), vec![0xFE, 0x06, b'7', 0xFD]);
    }
}
