use std::collections::HashMap;

pub mod models;
use reqwest::{header, Client};

use crate::models::SendReport;

/// Delivery channel for an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Sms,
    Whatsapp,
}

impl Channel {
    fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Whatsapp => "whatsapp",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WagateOptions {
    pub base_url: String,
    pub api_key: String,
    pub sender: String,
}

#[derive(Debug, Clone)]
pub struct WagateService {
    options: WagateOptions,
}

impl WagateService {
    pub fn new(options: WagateOptions) -> Self {
        Self { options }
    }

    /// Send a text message to a phone number.
    ///
    /// Fire-and-forget: the gateway queues delivery and we only learn
    /// whether it accepted the request, not whether the handset got it.
    pub async fn send_message(
        &self,
        recipient: &str,
        body: &str,
        channel: Channel,
    ) -> Result<SendReport, &'static str> {
        let url = format!("{}/v1/messages", self.options.base_url.trim_end_matches('/'));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            "Content-Type",
            "application/x-www-form-urlencoded"
                .parse()
                .expect("Header value should parse correctly"),
        );

        let mut form_body: HashMap<&str, String> = HashMap::new();
        form_body.insert("To", recipient.to_string());
        form_body.insert("From", self.options.sender.clone());
        form_body.insert("Body", body.to_string());
        form_body.insert("Channel", channel.as_str().to_string());

        let client = Client::new();
        let res = client
            .post(url)
            .bearer_auth(&self.options.api_key)
            .headers(headers)
            .form(&form_body)
            .send()
            .await;

        match res {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    let error_body = response.text().await.unwrap_or_default();
                    eprintln!("Wagate error ({}): {}", status, error_body);
                    return Err("Wagate returned an error");
                }

                let result = response.json::<SendReport>().await;
                match result {
                    Ok(data) => Ok(data),
                    Err(e) => {
                        eprintln!("Failed to parse Wagate response: {}", e);
                        Err("Error parsing send report")
                    }
                }
            }
            Err(e) => {
                eprintln!("Request to Wagate failed: {}", e);
                Err("Error sending message")
            }
        }
    }
}
