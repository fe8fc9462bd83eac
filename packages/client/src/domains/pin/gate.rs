//! Secondary authentication gate.
//!
//! Re-confirms user presence with a short PIN before a protected subtree
//! renders. The gate is independent of the primary credential but uses it
//! for the remote check. Every gate starts Locked; re-locking happens by
//! constructing a new gate when the screen mounts again, never by timeout.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::common::ClientError;
use crate::domains::session::SessionStore;

const PIN_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Locked,
    Unlocked,
}

/// Outcome of a PIN verification attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinVerification {
    /// Remote check passed; the gate is now unlocked
    Accepted,
    /// The PIN was checked and is wrong, or the check could not be made.
    /// The reason distinguishes the two so a network outage never reads
    /// as "your PIN is wrong".
    Rejected { reason: String },
    /// Wrong length or non-numeric; detected locally, no network call
    Malformed,
}

/// Gate in front of a protected subtree.
pub struct PinGate {
    session: Arc<SessionStore>,
    state: RwLock<GateState>,
}

impl PinGate {
    /// A new gate is always Locked.
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self {
            session,
            state: RwLock::new(GateState::Locked),
        }
    }

    pub async fn is_unlocked(&self) -> bool {
        *self.state.read().await == GateState::Unlocked
    }

    /// Check a 6-digit PIN against the backend.
    ///
    /// The only state transition is Locked to Unlocked on `Accepted`.
    /// `SessionExpired` still propagates: an invalid credential is not a
    /// wrong PIN and the session store has already handled it.
    pub async fn verify(&self, pin: &str) -> Result<PinVerification, ClientError> {
        if pin.len() != PIN_LENGTH || !pin.chars().all(|c| c.is_ascii_digit()) {
            debug!("malformed pin input rejected locally");
            return Ok(PinVerification::Malformed);
        }

        let deps = self.session.deps();
        let pin = pin.to_string();
        let result = self
            .session
            .authenticated(|token| {
                let api = deps.api.clone();
                async move { api.verify_pin(&token, &pin).await }
            })
            .await;

        match result {
            Ok(true) => {
                let mut state = self.state.write().await;
                *state = GateState::Unlocked;
                info!("pin gate unlocked");
                Ok(PinVerification::Accepted)
            }
            Ok(false) => Ok(PinVerification::Rejected {
                reason: "PIN is incorrect".to_string(),
            }),
            Err(ClientError::SessionExpired) => Err(ClientError::SessionExpired),
            Err(e) => Ok(PinVerification::Rejected {
                reason: format!("could not reach the server: {}", e),
            }),
        }
    }
}
