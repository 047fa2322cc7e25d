use anyhow::{Context, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::config::SmsSettings;
use crate::error::PortalError;

/// Outcome of one send attempt. Failures carry the provider's reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub success: bool,
    pub error: Option<String>,
}

impl SendReport {
    pub fn delivered() -> Self {
        Self { success: true, error: None }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self { success: false, error: Some(reason.into()) }
    }
}

/// Something that can deliver a text message to a phone number.
///
/// Sending never returns an error: transport and provider failures are folded
/// into a failed [`SendReport`] so one bad number can't stop a batch.
#[allow(async_fn_in_trait, reason = "gateways are always used as concrete types")]
pub trait Gateway {
    async fn send(&self, phone: &str, message: &str) -> SendReport;
}

#[derive(Serialize)]
struct RequestBody<'a> {
    to: Vec<String>,
    message: &'a str,
    sender_name: &'a str,
    route: &'a str,
}

/// Client for SendChamp's `/sms/send` endpoint.
#[derive(Debug, Clone)]
pub struct SendChampClient {
    client: Client,
    base_url: String,
    api_key: String,
    sender_name: String,
    route: String,
}

impl SendChampClient {
    /// Fails with [`PortalError::GatewayNotConfigured`] when no API key is set.
    pub fn new(settings: &SmsSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or(PortalError::GatewayNotConfigured)?;

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Could not build HTTP client for the SMS gateway")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            sender_name: settings.sender_name.clone(),
            route: settings.route.clone(),
        })
    }

    async fn post(&self, phone: &str, message: &str) -> Result<SendReport> {
        let body = RequestBody {
            to: vec![format_phone(phone)],
            message,
            sender_name: &self.sender_name,
            route: &self.route,
        };

        let headers = HeaderMap::from_iter([
            (header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", self.api_key))?),
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::ACCEPT, HeaderValue::from_static("application/json")),
        ]);

        log::debug!("[sms_send] Sending SMS to {:?}", body.to);

        let response = self.client
            .post(format!("{}/sms/send", self.base_url))
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let http_ok = response.status().is_success();
        let data = response
            .json::<Value>()
            .await
            .context("SMS gateway returned a non-JSON response")?;

        log::debug!("[sms_send] Gateway response: {data}");
        Ok(interpret_response(http_ok, &data))
    }
}

impl Gateway for SendChampClient {
    async fn send(&self, phone: &str, message: &str) -> SendReport {
        if phone.trim().is_empty() || message.is_empty() {
            return SendReport::failed("Phone number and message are required");
        }

        self.post(phone, message)
            .await
            .unwrap_or_else(|err| {
                log::error!("[sms_send] SMS service error: {err:#}");
                SendReport::failed(format!("{err:#}"))
            })
    }
}

/// Numbers are sent with a leading `+`; add one if it's missing.
pub fn format_phone(phone: &str) -> String {
    let phone = phone.trim();
    if phone.starts_with('+') {
        phone.to_string()
    } else {
        format!("+{phone}")
    }
}

/// Maps the provider's reply to a [`SendReport`].
///
/// Success needs a 2xx status and either `code == 200` or `status == "success"`
/// in the body. The failure reason is taken from `message`, then `error`.
pub fn interpret_response(http_ok: bool, data: &Value) -> SendReport {
    let code_ok = data.get("code").and_then(Value::as_u64) == Some(200);
    let status_ok = data.get("status").and_then(Value::as_str) == Some("success");

    if http_ok && (code_ok || status_ok) {
        return SendReport::delivered();
    }

    let reason = ["message", "error"]
        .iter()
        .filter_map(|key| data.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Null | Value::String(_) => None,
            other => Some(other.to_string()),
        })
        .unwrap_or_else(|| String::from("Failed to send SMS"));

    SendReport::failed(reason)
}
