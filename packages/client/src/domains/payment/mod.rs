//! Payment domain: asynchronous settlement tracking against the gateway.

pub mod models;
pub mod poller;

pub use models::{PendingSettlement, SettlementState};
pub use poller::SettlementPoller;
