//! Pending settlement poller.
//!
//! The backend never pushes payment updates; the client re-queries the
//! status endpoint on a fixed interval until the settlement reaches a
//! terminal state or its own expiry. Polling is bounded by the expiry
//! instant, cancellation is explicit, and a stale snapshot can never
//! overwrite a terminal state.
//!
//! ```text
//! SettlementPoller
//!     │
//!     ├─► create (authenticated POST, returns QRIS artifact + expiry)
//!     ├─► watch  (spawned task: poll_once every interval)
//!     └─► cancel (flips the cancel flag; task exits, state = Abandoned)
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::models::{PendingSettlement, SettlementState};
use crate::common::ClientError;
use crate::domains::session::SessionStore;
use crate::kernel::{ClientDeps, PaymentRequest, SettlementStatus, StatusSnapshot};

struct RecordInner {
    settlement: PendingSettlement,
    /// Set when the one-shot balance refresh has been claimed
    refreshed: bool,
}

struct OrderRecord {
    cancelled: AtomicBool,
    /// Set while a watch task owns this record; at most one at a time
    polling: AtomicBool,
    inner: Mutex<RecordInner>,
    state_tx: watch::Sender<SettlementState>,
}

impl OrderRecord {
    fn new(settlement: PendingSettlement) -> Self {
        let (state_tx, _) = watch::channel(settlement.state);
        Self {
            cancelled: AtomicBool::new(false),
            polling: AtomicBool::new(false),
            inner: Mutex::new(RecordInner {
                settlement,
                refreshed: false,
            }),
            state_tx,
        }
    }
}

/// What a snapshot application decided, beyond the state change.
enum Applied {
    /// This application won the one-shot balance refresh
    RefreshClaimed,
    NoEffect,
}

/// Reconciles client-visible settlement state with the remote truth.
#[derive(Clone)]
pub struct SettlementPoller {
    session: Arc<SessionStore>,
    deps: Arc<ClientDeps>,
    orders: Arc<Mutex<HashMap<String, Arc<OrderRecord>>>>,
}

impl SettlementPoller {
    pub fn new(session: Arc<SessionStore>) -> Self {
        let deps = session.deps();
        Self {
            session,
            deps,
            orders: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a payment/top-up at the backend and begin tracking it.
    pub async fn create(
        &self,
        amount: i64,
        expiry_minutes: i64,
    ) -> Result<PendingSettlement, ClientError> {
        let deps = self.deps.clone();
        let request = PaymentRequest {
            amount,
            expiry_minutes,
        };
        let order = self
            .session
            .authenticated(|token| {
                let api = deps.api.clone();
                async move { api.create_payment(&token, &request).await }
            })
            .await?;

        let settlement = PendingSettlement {
            order_id: order.order_id.clone(),
            amount,
            qris_url: order.qris_url,
            redirect_url: order.redirect_url,
            expires_at: order.expires_at,
            state: SettlementState::Created,
        };
        info!(order_id = %settlement.order_id, amount, "settlement created");

        let record = Arc::new(OrderRecord::new(settlement.clone()));
        self.orders
            .lock()
            .unwrap()
            .insert(settlement.order_id.clone(), record);
        Ok(settlement)
    }

    /// Current snapshot of a tracked settlement, for rendering.
    pub fn settlement(&self, order_id: &str) -> Option<PendingSettlement> {
        let record = self.record(order_id)?;
        let inner = record.inner.lock().unwrap();
        Some(inner.settlement.clone())
    }

    /// Current lifecycle state of a tracked settlement.
    pub fn state(&self, order_id: &str) -> Option<SettlementState> {
        self.settlement(order_id).map(|s| s.state)
    }

    /// Observe state transitions for a tracked settlement.
    pub fn subscribe(&self, order_id: &str) -> Option<watch::Receiver<SettlementState>> {
        self.record(order_id).map(|r| r.state_tx.subscribe())
    }

    /// Fetch the remote status once and reconcile local state with it.
    ///
    /// Safe to call redundantly: terminal and cancelled settlements ignore
    /// whatever comes back.
    pub async fn poll_once(&self, order_id: &str) -> Result<StatusSnapshot, ClientError> {
        let deps = self.deps.clone();
        let order = order_id.to_string();
        let snapshot = self
            .session
            .authenticated(|token| {
                let api = deps.api.clone();
                async move { api.payment_status(&token, &order).await }
            })
            .await?;

        if let Some(record) = self.record(order_id) {
            if let Applied::RefreshClaimed = self.apply(&record, &snapshot) {
                self.refresh_balance(order_id).await;
            }
        }
        Ok(snapshot)
    }

    /// Poll the status endpoint until the settlement reaches a terminal
    /// state, it expires, or `cancel` is called.
    ///
    /// Returns the task handle; dropping it does NOT stop polling, `cancel`
    /// does. Returns None for untracked or already-final settlements, and
    /// for settlements that already have a watch task running.
    pub fn watch(&self, order_id: &str) -> Option<JoinHandle<()>> {
        let record = self.record(order_id)?;
        {
            let mut inner = record.inner.lock().unwrap();
            if inner.settlement.state.is_final() {
                return None;
            }
            if record
                .polling
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return None;
            }
            self.transition(&record.state_tx, &mut inner, SettlementState::Polling);
        }

        let poller = self.clone();
        let order_id = order_id.to_string();
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(poller.deps.settlement_poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;

                if record.cancelled.load(Ordering::SeqCst) {
                    break;
                }
                // Bound polling by the settlement's own expiry
                {
                    let mut inner = record.inner.lock().unwrap();
                    if poller.deps.clock.now() >= inner.settlement.expires_at
                        && !inner.settlement.state.is_final()
                    {
                        poller.transition(&record.state_tx, &mut inner, SettlementState::Expired);
                    }
                    if inner.settlement.state.is_final() {
                        break;
                    }
                }

                match poller.poll_once(&order_id).await {
                    Ok(_) => {}
                    Err(ClientError::SessionExpired) => {
                        warn!(order_id = %order_id, "session expired while polling, stopping");
                        break;
                    }
                    Err(e) => {
                        // A missed tick is retried silently on the next one
                        debug!(order_id = %order_id, "poll tick failed: {}", e);
                    }
                }

                let inner = record.inner.lock().unwrap();
                if inner.settlement.state.is_final() {
                    break;
                }
            }
            record.polling.store(false, Ordering::SeqCst);
            debug!(order_id = %order_id, "settlement watch stopped");
        }))
    }

    /// Stop tracking a settlement. Idempotent; an in-flight poll response
    /// arriving afterwards cannot mutate its state.
    pub fn cancel(&self, order_id: &str) {
        let Some(record) = self.record(order_id) else {
            return;
        };
        record.cancelled.store(true, Ordering::SeqCst);
        let mut inner = record.inner.lock().unwrap();
        if !inner.settlement.state.is_final() {
            self.transition(&record.state_tx, &mut inner, SettlementState::Abandoned);
            info!(order_id, "settlement abandoned");
        }
    }

    /// Stop tracking a settlement and drop its record entirely.
    ///
    /// For screens that are done with the outcome; `state`/`subscribe`
    /// return None afterwards. Idempotent.
    pub fn discard(&self, order_id: &str) {
        self.cancel(order_id);
        self.orders.lock().unwrap().remove(order_id);
    }

    fn record(&self, order_id: &str) -> Option<Arc<OrderRecord>> {
        self.orders.lock().unwrap().get(order_id).cloned()
    }

    fn transition(
        &self,
        state_tx: &watch::Sender<SettlementState>,
        inner: &mut RecordInner,
        next: SettlementState,
    ) {
        if inner.settlement.state != next {
            debug!(order_id = %inner.settlement.order_id, ?next, "settlement transition");
            inner.settlement.state = next;
            state_tx.send_replace(next);
        }
    }

    /// Apply one remote snapshot. Last-terminal-wins: once final, nothing
    /// moves the state again, so a stale response is harmless.
    fn apply(&self, record: &OrderRecord, snapshot: &StatusSnapshot) -> Applied {
        let mut inner = record.inner.lock().unwrap();

        if record.cancelled.load(Ordering::SeqCst) || inner.settlement.state.is_final() {
            return Applied::NoEffect;
        }

        let settled =
            snapshot.status == SettlementStatus::Settlement || snapshot.processed;
        if settled {
            self.transition(&record.state_tx, &mut inner, SettlementState::Settled);
            if !inner.refreshed {
                inner.refreshed = true;
                return Applied::RefreshClaimed;
            }
            return Applied::NoEffect;
        }

        if snapshot.status == SettlementStatus::Expire
            || self.deps.clock.now() >= inner.settlement.expires_at
        {
            self.transition(&record.state_tx, &mut inner, SettlementState::Expired);
            return Applied::NoEffect;
        }

        // Pending/Unknown keep the poll going
        self.transition(&record.state_tx, &mut inner, SettlementState::Polling);
        Applied::NoEffect
    }

    /// The one-shot downstream reconciliation after a settlement succeeds.
    async fn refresh_balance(&self, order_id: &str) {
        let deps = self.deps.clone();
        let result = self
            .session
            .authenticated(|token| {
                let wallet = deps.wallet.clone();
                async move { wallet.refresh_balance(&token).await }
            })
            .await;
        match result {
            Ok(balance) => {
                info!(order_id, points = balance.points, "balance refreshed after settlement")
            }
            Err(e) => warn!(order_id, "balance refresh failed: {}", e),
        }
    }
}
