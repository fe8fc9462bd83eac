// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (like "verify this PIN") lives in domain components that
// use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseBackendApi, BaseClock)

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::api_client::{
    ApiError, InviteCodeCheck, LoginRequest, PaymentOrder, PaymentRequest, PhoneCheck,
    RegisterRequest, StatusSnapshot, WalletBalance,
};
use crate::common::ClientError;

// =============================================================================
// Backend API Trait (Infrastructure - the remote REST API)
// =============================================================================

/// The remote pasarin REST API, one method per endpoint.
///
/// Implementations normalize the backend's inconsistent response shapes at
/// this boundary; callers only ever see the strict types below.
#[async_trait]
pub trait BaseBackendApi: Send + Sync {
    /// POST /login - returns the bearer token on success
    async fn login(&self, req: &LoginRequest) -> Result<String, ApiError>;

    /// POST /register - returns the bearer token on success
    async fn register(&self, req: &RegisterRequest) -> Result<String, ApiError>;

    /// POST /pin-verify - authenticated; remote boolean PIN check
    async fn verify_pin(&self, token: &str, pin: &str) -> Result<bool, ApiError>;

    /// POST /code-check - invite code validation
    async fn check_invite_code(&self, code: &str) -> Result<InviteCodeCheck, ApiError>;

    /// POST /phone-check - is this phone number already registered?
    async fn check_phone(&self, phone: &str) -> Result<PhoneCheck, ApiError>;

    /// POST /payment-create - authenticated; starts a payment/top-up
    async fn create_payment(
        &self,
        token: &str,
        req: &PaymentRequest,
    ) -> Result<PaymentOrder, ApiError>;

    /// GET /payment-status/{order_id} - authenticated; single status fetch
    async fn payment_status(&self, token: &str, order_id: &str)
        -> Result<StatusSnapshot, ApiError>;

    /// GET /balance - authenticated; current loyalty points and savings
    async fn balance(&self, token: &str) -> Result<WalletBalance, ApiError>;
}

// =============================================================================
// Credential Store Trait (Infrastructure - durable device storage)
// =============================================================================

/// Durable storage for the bearer token.
///
/// Only the session store may call the mutating methods; screens never
/// touch credential storage directly.
#[async_trait]
pub trait BaseCredentialStore: Send + Sync {
    /// Read the persisted token, if any
    async fn load(&self) -> anyhow::Result<Option<String>>;

    /// Persist the token. Must be atomic: a reader never sees a partial write.
    async fn save(&self, token: &str) -> anyhow::Result<()>;

    /// Remove any persisted token
    async fn clear(&self) -> anyhow::Result<()>;
}

// =============================================================================
// Messaging Trait (Infrastructure - SMS/WhatsApp dispatch)
// =============================================================================

/// Fire-and-forget outbound message dispatch (OTP delivery).
#[async_trait]
pub trait BaseMessagingService: Send + Sync {
    /// Send a text message to a phone number
    async fn send_message(&self, phone_number: &str, body: &str) -> anyhow::Result<()>;
}

// =============================================================================
// Location Trait (Infrastructure - device geolocation)
// =============================================================================

/// A device position captured at request time.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub ip: String,
}

/// Device geolocation. The platform permission prompt happens behind this
/// seam; a denied permission surfaces as `ClientError::PermissionDenied`.
#[async_trait]
pub trait BaseLocationService: Send + Sync {
    async fn current(&self) -> Result<DeviceLocation, ClientError>;
}

// =============================================================================
// Wallet Trait (Infrastructure - balance reconciliation target)
// =============================================================================

/// Downstream reconciliation invoked when a settlement succeeds.
#[async_trait]
pub trait BaseWalletService: Send + Sync {
    /// Re-fetch the user's balance from the backend
    async fn refresh_balance(&self, token: &str) -> Result<WalletBalance, ApiError>;
}

// =============================================================================
// Clock Trait (Infrastructure - wall-clock time)
// =============================================================================

/// Wall-clock source. Expiry logic computes against this rather than
/// accumulated ticks, so backgrounded time is never miscounted.
pub trait BaseClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl BaseClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
