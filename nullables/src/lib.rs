//! Nullable infrastructure for deterministic testing.
//!
//! The engines take their clock, VRF verifier and response sink from the
//! caller. This crate provides test-friendly versions of each that return
//! scripted answers, record what they were asked, and never touch the
//! network.

pub mod clock;
pub mod sink;
pub mod vrf;

pub use clock::NullClock;
pub use sink::RecordingSink;
pub use vrf::NullVrf;
