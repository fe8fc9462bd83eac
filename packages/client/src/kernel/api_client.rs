//! HTTP client for the pasarin backend REST API.
//!
//! The backend returns inconsistent shapes across endpoints (sometimes an
//! array, sometimes an object, sometimes a bare flag). Each endpoint gets a
//! strict response struct here and is normalized immediately; nothing past
//! this module ever sniffs JSON shapes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::traits::BaseBackendApi;

/// Errors from the backend API boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401-equivalent: the credential is no longer valid.
    /// The session store treats this as a forced logout wherever it occurs.
    #[error("Credential rejected by the backend")]
    Unauthorized,

    /// Non-2xx response with a backend-supplied message
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Connection failed or the request timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Response body did not match the endpoint's schema
    #[error("Parse error: {0}")]
    Parse(String),
}

// =============================================================================
// Request bodies
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub phone: String,
    pub pin: String,
    pub ip: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub phone: String,
    pub pin: String,
    pub ip: String,
    pub latitude: f64,
    pub longitude: f64,
    pub invite_code: String,
    pub option: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    pub amount: i64,
    pub expiry_minutes: i64,
}

// =============================================================================
// Normalized results
// =============================================================================

/// Invite code lookup result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteCodeCheck {
    Valid,
    Invalid,
}

/// Phone registration lookup result.
///
/// The backend's "error" leg stays an `ApiError`; it is not a third variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneCheck {
    Registered,
    NotRegistered,
}

/// Remote payment status values, normalized from the gateway's strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementStatus {
    Pending,
    Settlement,
    Expire,
    Unknown,
}

impl SettlementStatus {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "pending" => SettlementStatus::Pending,
            "settlement" | "success" | "capture" => SettlementStatus::Settlement,
            "expire" | "expired" => SettlementStatus::Expire,
            other => {
                warn!(status = other, "unrecognized settlement status");
                SettlementStatus::Unknown
            }
        }
    }

    /// True for states from which no further transition is expected
    pub fn is_terminal(&self) -> bool {
        matches!(self, SettlementStatus::Settlement | SettlementStatus::Expire)
    }
}

/// A payment order as created by the backend
#[derive(Debug, Clone)]
pub struct PaymentOrder {
    pub order_id: String,
    /// Scannable QRIS artifact, when the gateway issued one
    pub qris_url: Option<String>,
    /// Hosted payment page, for non-QRIS methods
    pub redirect_url: Option<String>,
    pub status: SettlementStatus,
    pub expires_at: DateTime<Utc>,
}

/// One observation of a settlement's remote state.
///
/// `status` and `processed` are carried as independent signals: the backend
/// sometimes flips `processed` before (or without) moving `status` to
/// settlement, and their exact relationship is unconfirmed.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub order_id: String,
    pub status: SettlementStatus,
    pub processed: bool,
    pub expires_at: DateTime<Utc>,
}

/// Loyalty balance (points + savings)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalletBalance {
    pub points: i64,
    pub savings: i64,
}

// =============================================================================
// Wire-level response shapes (private; normalized before returning)
// =============================================================================

#[derive(Deserialize)]
struct TokenBody {
    token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct PinVerifyRow {
    success: i32,
}

#[derive(Deserialize)]
struct FlagBody {
    result: i32,
}

#[derive(Deserialize)]
struct PaymentBody {
    order_id: String,
    #[serde(default)]
    qris_url: Option<String>,
    #[serde(default)]
    redirect_url: Option<String>,
    status: String,
    #[serde(default)]
    processed: Option<bool>,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct BalanceBody {
    points: i64,
    savings: i64,
}

// =============================================================================
// HttpBackendApi
// =============================================================================

/// reqwest-backed implementation of `BaseBackendApi`.
#[derive(Clone)]
pub struct HttpBackendApi {
    http_client: Client,
    base_url: String,
}

impl HttpBackendApi {
    /// Create a client against the given base URL with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Convert a non-2xx response into the right `ApiError` variant.
    async fn error_from(response: reqwest::Response) -> ApiError {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return ApiError::Unauthorized;
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message.unwrap_or_else(|| "request failed".to_string()),
            Err(_) => "request failed".to_string(),
        };
        ApiError::Api {
            status: status.as_u16(),
            message,
        }
    }

    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, ApiError> {
        let mut request = self.http_client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .http_client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

fn normalize_payment(body: PaymentBody) -> PaymentOrder {
    PaymentOrder {
        status: SettlementStatus::parse(&body.status),
        order_id: body.order_id,
        qris_url: body.qris_url,
        redirect_url: body.redirect_url,
        expires_at: body.expires_at,
    }
}

#[async_trait]
impl BaseBackendApi for HttpBackendApi {
    async fn login(&self, req: &LoginRequest) -> Result<String, ApiError> {
        debug!(phone = %req.phone, "login request");
        let body: TokenBody = self.post_json("/login", None, req).await?;
        Ok(body.token)
    }

    async fn register(&self, req: &RegisterRequest) -> Result<String, ApiError> {
        debug!(phone = %req.phone, "register request");
        let body: TokenBody = self.post_json("/register", None, req).await?;
        Ok(body.token)
    }

    async fn verify_pin(&self, token: &str, pin: &str) -> Result<bool, ApiError> {
        // Legacy shape: an array whose first row carries the flag
        let rows: Vec<PinVerifyRow> = self
            .post_json(
                "/pin-verify",
                Some(token),
                &serde_json::json!({ "pin": pin, "token": token }),
            )
            .await?;
        let accepted = rows.first().map(|row| row.success == 1).unwrap_or(false);
        Ok(accepted)
    }

    async fn check_invite_code(&self, code: &str) -> Result<InviteCodeCheck, ApiError> {
        let body: FlagBody = self
            .post_json("/code-check", None, &serde_json::json!({ "code": code }))
            .await?;
        Ok(if body.result == 1 {
            InviteCodeCheck::Valid
        } else {
            InviteCodeCheck::Invalid
        })
    }

    async fn check_phone(&self, phone: &str) -> Result<PhoneCheck, ApiError> {
        let body: FlagBody = self
            .post_json("/phone-check", None, &serde_json::json!({ "phone": phone }))
            .await?;
        Ok(if body.result == 1 {
            PhoneCheck::Registered
        } else {
            PhoneCheck::NotRegistered
        })
    }

    async fn create_payment(
        &self,
        token: &str,
        req: &PaymentRequest,
    ) -> Result<PaymentOrder, ApiError> {
        debug!(amount = req.amount, "creating payment");
        let body: PaymentBody = self.post_json("/payment-create", Some(token), req).await?;
        Ok(normalize_payment(body))
    }

    async fn payment_status(
        &self,
        token: &str,
        order_id: &str,
    ) -> Result<StatusSnapshot, ApiError> {
        let body: PaymentBody = self
            .get_json(&format!("/payment-status/{}", order_id), token)
            .await?;
        Ok(StatusSnapshot {
            status: SettlementStatus::parse(&body.status),
            processed: body.processed.unwrap_or(false),
            order_id: body.order_id,
            expires_at: body.expires_at,
        })
    }

    async fn balance(&self, token: &str) -> Result<WalletBalance, ApiError> {
        let body: BalanceBody = self.get_json("/balance", token).await?;
        Ok(WalletBalance {
            points: body.points,
            savings: body.savings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!(
            SettlementStatus::parse("SETTLEMENT"),
            SettlementStatus::Settlement
        );
        assert_eq!(SettlementStatus::parse("pending"), SettlementStatus::Pending);
        assert_eq!(SettlementStatus::parse("Expire"), SettlementStatus::Expire);
    }

    #[test]
    fn test_unrecognized_status_maps_to_unknown() {
        assert_eq!(SettlementStatus::parse("deny"), SettlementStatus::Unknown);
        assert_eq!(SettlementStatus::parse(""), SettlementStatus::Unknown);
    }

    #[test]
    fn test_terminal_states() {
        assert!(SettlementStatus::Settlement.is_terminal());
        assert!(SettlementStatus::Expire.is_terminal());
        assert!(!SettlementStatus::Pending.is_terminal());
        assert!(!SettlementStatus::Unknown.is_terminal());
    }
}
