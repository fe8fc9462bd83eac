//! Client dependencies for domain components (using traits for testability)
//!
//! This module provides the central dependency container handed to every
//! domain component. All external services sit behind trait abstractions so
//! tests can substitute fakes.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use wagate::{Channel, WagateOptions, WagateService};

use super::api_client::{ApiError, HttpBackendApi, WalletBalance};
use super::credential_store::FileCredentialStore;
use super::traits::{
    BaseBackendApi, BaseClock, BaseCredentialStore, BaseLocationService, BaseMessagingService,
    BaseWalletService, DeviceLocation, SystemClock,
};
use crate::common::ClientError;
use crate::config::Config;

// =============================================================================
// WagateService Adapter (implements BaseMessagingService trait)
// =============================================================================

/// Wrapper around WagateService that implements BaseMessagingService trait
pub struct WagateAdapter(pub Arc<WagateService>);

impl WagateAdapter {
    pub fn new(service: Arc<WagateService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseMessagingService for WagateAdapter {
    async fn send_message(&self, phone_number: &str, body: &str) -> Result<()> {
        self.0
            .send_message(phone_number, body, Channel::Whatsapp)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

// =============================================================================
// Static Location Service
// =============================================================================

/// Location service fed from configuration.
///
/// Real devices resolve position through platform APIs outside this crate;
/// when no position is configured we report the permission as denied, which
/// is exactly how a revoked location grant reaches the login flow.
pub struct StaticLocationService {
    location: Option<DeviceLocation>,
}

impl StaticLocationService {
    pub fn from_config(config: &Config) -> Self {
        let location = match (config.device_latitude, config.device_longitude) {
            (Some(latitude), Some(longitude)) => Some(DeviceLocation {
                latitude,
                longitude,
                ip: config.device_ip.clone().unwrap_or_else(|| "0.0.0.0".to_string()),
            }),
            _ => None,
        };
        Self { location }
    }
}

#[async_trait]
impl BaseLocationService for StaticLocationService {
    async fn current(&self) -> Result<DeviceLocation, ClientError> {
        self.location.clone().ok_or_else(|| {
            ClientError::PermissionDenied("location access is not granted".to_string())
        })
    }
}

// =============================================================================
// Wallet Service (balance refresh over the backend API)
// =============================================================================

/// `BaseWalletService` over the backend's balance endpoint.
pub struct ApiWalletService {
    api: Arc<dyn BaseBackendApi>,
}

impl ApiWalletService {
    pub fn new(api: Arc<dyn BaseBackendApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl BaseWalletService for ApiWalletService {
    async fn refresh_balance(&self, token: &str) -> Result<WalletBalance, ApiError> {
        self.api.balance(token).await
    }
}

// =============================================================================
// ClientDeps
// =============================================================================

/// Client dependencies accessible to domain components (traits for testability)
#[derive(Clone)]
pub struct ClientDeps {
    pub api: Arc<dyn BaseBackendApi>,
    pub credential_store: Arc<dyn BaseCredentialStore>,
    pub messaging: Arc<dyn BaseMessagingService>,
    pub location: Arc<dyn BaseLocationService>,
    pub wallet: Arc<dyn BaseWalletService>,
    pub clock: Arc<dyn BaseClock>,
    /// OTP countdown length
    pub otp_ttl: Duration,
    /// Delay between settlement status fetches
    pub settlement_poll_interval: Duration,
}

impl ClientDeps {
    /// Create new ClientDeps with the given dependencies
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn BaseBackendApi>,
        credential_store: Arc<dyn BaseCredentialStore>,
        messaging: Arc<dyn BaseMessagingService>,
        location: Arc<dyn BaseLocationService>,
        wallet: Arc<dyn BaseWalletService>,
        clock: Arc<dyn BaseClock>,
        otp_ttl: Duration,
        settlement_poll_interval: Duration,
    ) -> Self {
        Self {
            api,
            credential_store,
            messaging,
            location,
            wallet,
            clock,
            otp_ttl,
            settlement_poll_interval,
        }
    }

    /// Wire up production dependencies from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api: Arc<dyn BaseBackendApi> = Arc::new(HttpBackendApi::new(
            config.api_base_url.clone(),
            config.request_timeout,
        )?);
        let wagate = Arc::new(WagateService::new(WagateOptions {
            base_url: config.wagate_base_url.clone(),
            api_key: config.wagate_api_key.clone(),
            sender: config.wagate_sender.clone(),
        }));

        Ok(Self {
            credential_store: Arc::new(FileCredentialStore::new(config.credential_path.clone())),
            messaging: Arc::new(WagateAdapter::new(wagate)),
            location: Arc::new(StaticLocationService::from_config(config)),
            wallet: Arc::new(ApiWalletService::new(api.clone())),
            api,
            clock: Arc::new(SystemClock),
            otp_ttl: config.otp_ttl,
            settlement_poll_interval: config.settlement_poll_interval,
        })
    }
}
