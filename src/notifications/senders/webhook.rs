use async_trait::async_trait;
use reqwest::{header, Client, Method};
use tera::{Context, Tera};

use super::{NotificationSender, SenderError};
use crate::config::WebhookConfig;
use crate::notifications::models::NotificationPayload;

/// Pushes notifications to a user-supplied webhook.
///
/// POST requests carry either the rendered `body_template` (Tera syntax, with `id`,
/// `title`, `body`, `priority` and `require_interaction` in scope) or the payload
/// serialized as JSON. GET requests carry no body.
pub struct WebhookSender {
    client: Client,
    method: Method,
    config: WebhookConfig,
}

impl WebhookSender {
    pub fn new(config: WebhookConfig) -> Result<Self, SenderError> {
        let method = match config.method.to_uppercase().as_str() {
            "POST" => Method::POST,
            "GET" => Method::GET,
            other => {
                return Err(SenderError::InvalidConfiguration(format!(
                    "Unsupported HTTP method: {other}"
                )));
            }
        };
        if config.url.trim().is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "Webhook URL must not be empty".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            method,
            config,
        })
    }

    fn render_body(&self, payload: &NotificationPayload) -> Result<String, SenderError> {
        let Some(template) = self.config.body_template.as_deref() else {
            return Ok(serde_json::to_string(payload)?);
        };
        let mut context = Context::new();
        context.insert("id", &payload.id);
        context.insert("title", &payload.title);
        context.insert("body", &payload.body);
        context.insert("priority", &payload.priority);
        context.insert("require_interaction", &payload.require_interaction);
        Tera::one_off(template, &context, false)
            .map_err(|e| SenderError::TemplatingError(e.to_string()))
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    fn channel(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<(), SenderError> {
        let mut request_builder = self.client.request(self.method.clone(), &self.config.url);

        if let Some(h) = &self.config.headers {
            let mut header_map = header::HeaderMap::new();
            for (key, value) in h {
                let header_name = header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                    SenderError::InvalidConfiguration(format!("Invalid header name: {e}"))
                })?;
                let header_value = header::HeaderValue::from_str(value).map_err(|e| {
                    SenderError::InvalidConfiguration(format!("Invalid header value: {e}"))
                })?;
                header_map.insert(header_name, header_value);
            }
            request_builder = request_builder.headers(header_map);
        }

        if self.method == Method::POST {
            request_builder = request_builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(self.render_body(payload)?);
        }

        let response = request_builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Webhook returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}
