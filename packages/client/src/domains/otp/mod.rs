//! OTP domain: one-time code issuance, expiry, and resend cooldown.

pub mod tracker;

pub use tracker::CodeTracker;
