// Pasarin - Mobile Client Core
//
// This crate provides the device-side core for the pasarin grocery/loyalty
// app: credential lifecycle, PIN re-entry gating, OTP delivery tracking, and
// asynchronous payment settlement polling. Screens sit on top of these
// components; rendering, navigation, and platform permission plumbing live
// outside this crate.
//
// Architecture follows domain-driven design with infrastructure behind
// Base* traits in kernel/ so every domain is testable against mocks.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
