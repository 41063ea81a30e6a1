//! ic706-test-harness: Test utilities for the IC-706 bridge.
//!
//! This crate provides [`MockPwkLine`] for observing the power-key line
//! without GPIO hardware, and [`packets`] with ready-made panel packets for
//! driving the bridge from either side.

pub mod mock_line;
pub mod packets;

pub use mock_line::{LevelChange, MockPwkLine};
