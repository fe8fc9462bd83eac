use chrono::{DateTime, Utc};

/// Local lifecycle of a tracked settlement.
///
/// Remote truth only ever moves a settlement forward; once a terminal
/// state is reached no snapshot may change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementState {
    /// Created at the backend, polling not yet started
    Created,
    /// Actively re-querying the status endpoint
    Polling,
    /// Paid; the balance refresh has been triggered (once)
    Settled,
    /// Ran out of time, remotely or by local wall clock
    Expired,
    /// The owning screen went away; polling stopped
    Abandoned,
}

impl SettlementState {
    /// States that no snapshot may overwrite
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            SettlementState::Settled | SettlementState::Expired | SettlementState::Abandoned
        )
    }
}

/// One asynchronous payment/top-up request, as seen by screens.
///
/// Owned by the poller; UI reads it and never mutates it directly.
#[derive(Debug, Clone)]
pub struct PendingSettlement {
    pub order_id: String,
    pub amount: i64,
    /// Scannable QRIS artifact to render, when the gateway issued one
    pub qris_url: Option<String>,
    /// Hosted payment page fallback
    pub redirect_url: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub state: SettlementState,
}
