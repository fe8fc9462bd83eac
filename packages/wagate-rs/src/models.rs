use serde::Deserialize;

/// Response body from the gateway's send endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SendReport {
    pub status: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub quota_remaining: Option<i64>,
}
