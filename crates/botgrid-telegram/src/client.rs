//! The Telegram HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::{TelegramError, TelegramResult};

/// Response envelope shared by every Bot API method.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

impl ApiEnvelope {
    fn into_result(self) -> TelegramResult<Value> {
        if self.ok {
            Ok(self.result.unwrap_or(Value::Null))
        } else {
            Err(TelegramError::Api {
                code: self.error_code.unwrap_or(0),
                description: self.description.unwrap_or_default(),
            })
        }
    }
}

/// Calls made against the Telegram Bot API on behalf of hosted bots.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Register a webhook URL, optionally pinning a CA certificate for
    /// self-signed gateway TLS.
    async fn set_webhook(
        &self,
        bot_token: &str,
        webhook_url: &str,
        ca_cert: Option<Vec<u8>>,
    ) -> TelegramResult<()>;

    /// Remove a bot's webhook registration.
    async fn delete_webhook(&self, bot_token: &str) -> TelegramResult<()>;

    /// Invoke an arbitrary Bot API method with a JSON params object.
    async fn call_method(
        &self,
        bot_token: &str,
        method: &str,
        params: Option<&Value>,
    ) -> TelegramResult<Value>;
}

/// Reqwest-backed Bot API client.
pub struct TelegramClient {
    base_url: String,
    http: reqwest::Client,
}

impl TelegramClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    fn method_url(&self, bot_token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, bot_token, method)
    }

    async fn decode(response: reqwest::Response) -> TelegramResult<Value> {
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(TelegramError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        let envelope: ApiEnvelope = serde_json::from_slice(&body)?;
        envelope.into_result()
    }
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn set_webhook(
        &self,
        bot_token: &str,
        webhook_url: &str,
        ca_cert: Option<Vec<u8>>,
    ) -> TelegramResult<()> {
        let mut form = Form::new().text("url", webhook_url.to_string());
        if let Some(cert) = ca_cert {
            form = form.part("certificate", Part::bytes(cert).file_name("ca.crt"));
        }

        let response = self
            .http
            .post(self.method_url(bot_token, "setWebhook"))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await?;

        info!(webhook_url, "webhook registered");
        Ok(())
    }

    async fn delete_webhook(&self, bot_token: &str) -> TelegramResult<()> {
        let response = self
            .http
            .post(self.method_url(bot_token, "deleteWebhook"))
            .send()
            .await?;
        Self::decode(response).await?;

        info!("webhook removed");
        Ok(())
    }

    async fn call_method(
        &self,
        bot_token: &str,
        method: &str,
        params: Option<&Value>,
    ) -> TelegramResult<Value> {
        let mut request = self.http.post(self.method_url(bot_token, method));
        if let Some(params) = params {
            request = request.json(params);
        }

        debug!(method, "calling telegram");
        let response = request.send().await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_url_shape() {
        let client = TelegramClient::new("https://api.telegram.org/");
        assert_eq!(
            client.method_url("123:ABC", "sendMessage"),
            "https://api.telegram.org/bot123:ABC/sendMessage"
        );
    }

    #[test]
    fn envelope_ok_yields_result() {
        let envelope: ApiEnvelope =
            serde_json::from_value(json!({"ok": true, "result": {"message_id": 5}})).unwrap();
        assert_eq!(envelope.into_result().unwrap(), json!({"message_id": 5}));
    }

    #[test]
    fn envelope_ok_without_result_yields_null() {
        let envelope: ApiEnvelope = serde_json::from_value(json!({"ok": true})).unwrap();
        assert_eq!(envelope.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn envelope_error_carries_code_and_description() {
        let envelope: ApiEnvelope = serde_json::from_value(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        }))
        .unwrap();
        match envelope.into_result().unwrap_err() {
            TelegramError::Api { code, description } => {
                assert_eq!(code, 400);
                assert_eq!(description, "Bad Request: chat not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
