// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ClientDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::api_client::{
    ApiError, InviteCodeCheck, LoginRequest, PaymentOrder, PaymentRequest, PhoneCheck,
    RegisterRequest, SettlementStatus, StatusSnapshot, WalletBalance,
};
use super::deps::ClientDeps;
use super::traits::{
    BaseBackendApi, BaseClock, BaseCredentialStore, BaseLocationService, BaseMessagingService,
    BaseWalletService, DeviceLocation,
};
use crate::common::ClientError;

// =============================================================================
// Mock Backend API
// =============================================================================

/// Scriptable backend: queue results per endpoint, read back recorded calls.
///
/// Queued results are consumed in order; when a queue is empty the mock
/// falls back to a permissive default so unrelated tests stay short.
#[derive(Default)]
pub struct MockBackendApi {
    login_results: Mutex<Vec<Result<String, ApiError>>>,
    register_results: Mutex<Vec<Result<String, ApiError>>>,
    pin_results: Mutex<Vec<Result<bool, ApiError>>>,
    status_results: Mutex<Vec<Result<StatusSnapshot, ApiError>>>,
    payment_results: Mutex<Vec<Result<PaymentOrder, ApiError>>>,
    balance_results: Mutex<Vec<Result<WalletBalance, ApiError>>>,
    phone_results: Mutex<Vec<Result<PhoneCheck, ApiError>>>,
    invite_results: Mutex<Vec<Result<InviteCodeCheck, ApiError>>>,

    login_calls: Mutex<Vec<LoginRequest>>,
    register_calls: Mutex<Vec<RegisterRequest>>,
    pin_calls: Mutex<Vec<(String, String)>>,
    status_calls: Mutex<Vec<String>>,
}

impl MockBackendApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_login_result(self, result: Result<String, ApiError>) -> Self {
        self.login_results.lock().unwrap().push(result);
        self
    }

    pub fn with_register_result(self, result: Result<String, ApiError>) -> Self {
        self.register_results.lock().unwrap().push(result);
        self
    }

    pub fn with_pin_result(self, result: Result<bool, ApiError>) -> Self {
        self.pin_results.lock().unwrap().push(result);
        self
    }

    /// Queue one settlement status snapshot
    pub fn with_status_result(self, result: Result<StatusSnapshot, ApiError>) -> Self {
        self.status_results.lock().unwrap().push(result);
        self
    }

    pub fn with_payment_result(self, result: Result<PaymentOrder, ApiError>) -> Self {
        self.payment_results.lock().unwrap().push(result);
        self
    }

    pub fn with_phone_result(self, result: Result<PhoneCheck, ApiError>) -> Self {
        self.phone_results.lock().unwrap().push(result);
        self
    }

    pub fn with_invite_result(self, result: Result<InviteCodeCheck, ApiError>) -> Self {
        self.invite_results.lock().unwrap().push(result);
        self
    }

    /// Get all recorded login requests
    pub fn login_calls(&self) -> Vec<LoginRequest> {
        self.login_calls.lock().unwrap().clone()
    }

    /// Get all recorded (token, pin) pairs from pin-verify calls
    pub fn pin_calls(&self) -> Vec<(String, String)> {
        self.pin_calls.lock().unwrap().clone()
    }

    /// Number of payment-status fetches made
    pub fn status_call_count(&self) -> usize {
        self.status_calls.lock().unwrap().len()
    }

    fn pop<T>(queue: &Mutex<Vec<Result<T, ApiError>>>) -> Option<Result<T, ApiError>> {
        let mut queue = queue.lock().unwrap();
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }
}

#[async_trait]
impl BaseBackendApi for MockBackendApi {
    async fn login(&self, req: &LoginRequest) -> Result<String, ApiError> {
        self.login_calls.lock().unwrap().push(req.clone());
        Self::pop(&self.login_results).unwrap_or_else(|| Ok("tok_test".to_string()))
    }

    async fn register(&self, req: &RegisterRequest) -> Result<String, ApiError> {
        self.register_calls.lock().unwrap().push(req.clone());
        Self::pop(&self.register_results).unwrap_or_else(|| Ok("tok_test".to_string()))
    }

    async fn verify_pin(&self, token: &str, pin: &str) -> Result<bool, ApiError> {
        self.pin_calls
            .lock()
            .unwrap()
            .push((token.to_string(), pin.to_string()));
        Self::pop(&self.pin_results).unwrap_or(Ok(true))
    }

    async fn check_invite_code(&self, _code: &str) -> Result<InviteCodeCheck, ApiError> {
        Self::pop(&self.invite_results).unwrap_or(Ok(InviteCodeCheck::Valid))
    }

    async fn check_phone(&self, _phone: &str) -> Result<PhoneCheck, ApiError> {
        Self::pop(&self.phone_results).unwrap_or(Ok(PhoneCheck::NotRegistered))
    }

    async fn create_payment(
        &self,
        _token: &str,
        req: &PaymentRequest,
    ) -> Result<PaymentOrder, ApiError> {
        Self::pop(&self.payment_results).unwrap_or_else(|| {
            Ok(PaymentOrder {
                order_id: "order-test".to_string(),
                qris_url: Some("https://gateway.test/qris/order-test".to_string()),
                redirect_url: None,
                status: SettlementStatus::Pending,
                expires_at: Utc::now() + ChronoDuration::minutes(req.expiry_minutes),
            })
        })
    }

    async fn payment_status(
        &self,
        _token: &str,
        order_id: &str,
    ) -> Result<StatusSnapshot, ApiError> {
        self.status_calls.lock().unwrap().push(order_id.to_string());
        Self::pop(&self.status_results).unwrap_or_else(|| {
            Ok(StatusSnapshot {
                order_id: order_id.to_string(),
                status: SettlementStatus::Pending,
                processed: false,
                expires_at: Utc::now() + ChronoDuration::minutes(10),
            })
        })
    }

    async fn balance(&self, _token: &str) -> Result<WalletBalance, ApiError> {
        Self::pop(&self.balance_results).unwrap_or(Ok(WalletBalance {
            points: 0,
            savings: 0,
        }))
    }
}

// =============================================================================
// Memory Credential Store
// =============================================================================

/// In-memory credential store for tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
    /// When true, save() fails (exercises the no-partial-state contract)
    fail_saves: Mutex<bool>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: &str) -> Self {
        *self.token.lock().unwrap() = Some(token.to_string());
        self
    }

    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }

    pub fn stored(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseCredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<String>> {
        Ok(self.token.lock().unwrap().clone())
    }

    async fn save(&self, token: &str) -> Result<()> {
        if *self.fail_saves.lock().unwrap() {
            anyhow::bail!("simulated storage failure");
        }
        *self.token.lock().unwrap() = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.token.lock().unwrap() = None;
        Ok(())
    }
}

// =============================================================================
// Mock Messaging Service
// =============================================================================

pub struct MockMessagingService {
    sends: Mutex<Vec<(String, String)>>,
    fail_sends: Mutex<bool>,
}

impl MockMessagingService {
    pub fn new() -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            fail_sends: Mutex::new(false),
        }
    }

    pub fn set_fail_sends(&self, fail: bool) {
        *self.fail_sends.lock().unwrap() = fail;
    }

    /// Get all (recipient, body) pairs that were dispatched
    pub fn sends(&self) -> Vec<(String, String)> {
        self.sends.lock().unwrap().clone()
    }
}

impl Default for MockMessagingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseMessagingService for MockMessagingService {
    async fn send_message(&self, phone_number: &str, body: &str) -> Result<()> {
        if *self.fail_sends.lock().unwrap() {
            anyhow::bail!("simulated gateway outage");
        }
        self.sends
            .lock()
            .unwrap()
            .push((phone_number.to_string(), body.to_string()));
        Ok(())
    }
}

// =============================================================================
// Mock Location Service
// =============================================================================

pub struct MockLocationService {
    location: Mutex<Option<DeviceLocation>>,
}

impl MockLocationService {
    /// Location granted at a fixed test position
    pub fn granted() -> Self {
        Self {
            location: Mutex::new(Some(DeviceLocation {
                latitude: -6.2,
                longitude: 106.8,
                ip: "10.0.0.1".to_string(),
            })),
        }
    }

    /// Location permission denied
    pub fn denied() -> Self {
        Self {
            location: Mutex::new(None),
        }
    }
}

#[async_trait]
impl BaseLocationService for MockLocationService {
    async fn current(&self) -> Result<DeviceLocation, ClientError> {
        self.location.lock().unwrap().clone().ok_or_else(|| {
            ClientError::PermissionDenied("location access is not granted".to_string())
        })
    }
}

// =============================================================================
// Mock Wallet Service
// =============================================================================

/// Counts balance refreshes (the settlement poller's side effect).
#[derive(Default)]
pub struct MockWalletService {
    refresh_count: AtomicUsize,
}

impl MockWalletService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseWalletService for MockWalletService {
    async fn refresh_balance(&self, _token: &str) -> Result<WalletBalance, ApiError> {
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        Ok(WalletBalance {
            points: 1200,
            savings: 50_000,
        })
    }
}

// =============================================================================
// Mock Clock
// =============================================================================

/// Settable clock so expiry tests control wall time directly.
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump the clock forward (models backgrounded elapsed time)
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::zero());
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl BaseClock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Bundle of mocks plus the `ClientDeps` wired to them.
///
/// Keep the handles around to script responses and assert on recorded calls
/// after exercising a domain component.
pub struct TestDependencies {
    pub api: Arc<MockBackendApi>,
    pub credential_store: Arc<MemoryCredentialStore>,
    pub messaging: Arc<MockMessagingService>,
    pub wallet: Arc<MockWalletService>,
    pub clock: Arc<MockClock>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self::with_api(MockBackendApi::new())
    }

    pub fn with_api(api: MockBackendApi) -> Self {
        Self {
            api: Arc::new(api),
            credential_store: Arc::new(MemoryCredentialStore::new()),
            messaging: Arc::new(MockMessagingService::new()),
            wallet: Arc::new(MockWalletService::new()),
            clock: Arc::new(MockClock::default()),
        }
    }

    /// Build a `ClientDeps` backed by these mocks.
    pub fn deps(&self) -> ClientDeps {
        ClientDeps {
            api: self.api.clone(),
            credential_store: self.credential_store.clone(),
            messaging: self.messaging.clone(),
            location: Arc::new(MockLocationService::granted()),
            wallet: self.wallet.clone(),
            clock: self.clock.clone(),
            otp_ttl: Duration::from_secs(120),
            settlement_poll_interval: Duration::from_millis(10),
        }
    }

    /// Same as `deps()` but with location permission denied.
    pub fn deps_without_location(&self) -> ClientDeps {
        ClientDeps {
            location: Arc::new(MockLocationService::denied()),
            ..self.deps()
        }
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
