//! Session domain: credential lifecycle and authenticated request wrapping.

pub mod store;

pub use store::{Credential, SessionStore};
