//! Shared types used across domains.

pub mod errors;

pub use errors::ClientError;
