//! PIN domain: re-entry confirmation in front of sensitive screens.

pub mod gate;

pub use gate::{PinGate, PinVerification};
