//! Remote balance lookup against `/api/user/self`.
use async_trait::async_trait;
use reqwest::{header, Client};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Number;
use std::time::Duration;
use tracing::debug;

use crate::error::QuotaError;

/// Raw quota units per one currency unit. Fixed by the remote service.
pub const QUOTA_UNITS_PER_CURRENCY: i64 = 500_000;

const BALANCE_PATH: &str = "/api/user/self";

/// Header names that different backends read the account identity from.
pub const IDENTITY_HEADERS: [&str; 5] = [
    "New-Api-User",
    "Rix-Api-User",
    "Api-User",
    "X-Api-User",
    "User-Id",
];

#[async_trait]
pub trait QuotaFetcher: Send + Sync {
    async fn fetch(
        &self,
        endpoint: &str,
        credential: &str,
        identity: Option<&str>,
    ) -> Result<Decimal, QuotaError>;
}

#[derive(Deserialize)]
struct SelfResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<SelfEnvelope>,
}

#[derive(Deserialize)]
struct SelfEnvelope {
    #[serde(default)]
    data: Option<AccountData>,
}

#[derive(Deserialize)]
struct AccountData {
    #[serde(default)]
    quota: Option<Number>,
}

pub fn balance_url(endpoint: &str) -> String {
    let base = endpoint.strip_suffix('/').unwrap_or(endpoint);
    format!("{base}{BALANCE_PATH}")
}

/// Converts raw quota units into a currency balance.
pub fn quota_to_balance(raw: &Number) -> Result<Decimal, QuotaError> {
    let units = if let Some(v) = raw.as_i64() {
        Decimal::from(v)
    } else if let Some(v) = raw.as_u64() {
        Decimal::from(v)
    } else {
        raw.as_f64()
            .and_then(Decimal::from_f64)
            .ok_or_else(|| QuotaError::ApiError(format!("Quota value {raw} is out of range")))?
    };
    Ok(units / Decimal::from(QUOTA_UNITS_PER_CURRENCY))
}

pub struct HttpQuotaFetcher {
    client: Client,
}

impl HttpQuotaFetcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self, QuotaError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl QuotaFetcher for HttpQuotaFetcher {
    async fn fetch(
        &self,
        endpoint: &str,
        credential: &str,
        identity: Option<&str>,
    ) -> Result<Decimal, QuotaError> {
        let url = balance_url(endpoint);
        let mut request = self
            .client
            .get(&url)
            .bearer_auth(credential)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(identity) = identity.filter(|v| !v.is_empty()) {
            for name in IDENTITY_HEADERS {
                request = request.header(name, identity);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QuotaError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response.bytes().await?;
        let parsed: SelfResponse = serde_json::from_slice(&body)
            .map_err(|e| QuotaError::ApiError(format!("Invalid response body: {e}")))?;

        if !parsed.success {
            return Err(QuotaError::ApiError(
                parsed
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Failed to fetch balance".to_string()),
            ));
        }

        let balance = match parsed.data.and_then(|d| d.data).and_then(|a| a.quota) {
            Some(raw) => quota_to_balance(&raw)?,
            None => Decimal::ZERO,
        };
        debug!(url = %url, balance = %balance, "Parsed balance.");
        Ok(balance)
    }
}
