use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    /// Upper bound on any single HTTP request. The backend has no server-side
    /// deadline, so an unbounded call would hang a flow forever.
    pub request_timeout: Duration,
    pub credential_path: PathBuf,
    pub otp_ttl: Duration,
    pub settlement_poll_interval: Duration,
    pub wagate_base_url: String,
    pub wagate_api_key: String,
    pub wagate_sender: String,
    pub device_latitude: Option<f64>,
    pub device_longitude: Option<f64>,
    pub device_ip: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            api_base_url: env::var("API_BASE_URL")
                .context("API_BASE_URL must be set")?,
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .context("REQUEST_TIMEOUT_SECS must be a valid number")?,
            ),
            credential_path: env::var("CREDENTIAL_PATH")
                .unwrap_or_else(|_| ".pasarin/credential.json".to_string())
                .into(),
            otp_ttl: Duration::from_secs(
                env::var("OTP_TTL_SECS")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()
                    .context("OTP_TTL_SECS must be a valid number")?,
            ),
            settlement_poll_interval: Duration::from_secs(
                env::var("SETTLEMENT_POLL_INTERVAL_SECS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .context("SETTLEMENT_POLL_INTERVAL_SECS must be a valid number")?,
            ),
            wagate_base_url: env::var("WAGATE_BASE_URL")
                .context("WAGATE_BASE_URL must be set")?,
            wagate_api_key: env::var("WAGATE_API_KEY")
                .context("WAGATE_API_KEY must be set")?,
            wagate_sender: env::var("WAGATE_SENDER")
                .unwrap_or_else(|_| "pasarin".to_string()),
            device_latitude: env::var("DEVICE_LATITUDE")
                .ok()
                .map(|v| v.parse().context("DEVICE_LATITUDE must be a valid number"))
                .transpose()?,
            device_longitude: env::var("DEVICE_LONGITUDE")
                .ok()
                .map(|v| v.parse().context("DEVICE_LONGITUDE must be a valid number"))
                .transpose()?,
            device_ip: env::var("DEVICE_IP").ok(),
        })
    }
}
