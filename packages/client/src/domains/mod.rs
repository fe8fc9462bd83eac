//! Domain components. Each submodule owns one piece of the client core.

pub mod otp;
pub mod payment;
pub mod pin;
pub mod session;
