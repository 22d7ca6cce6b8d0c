//! Client for the external bridge quoting service.

use std::{str::FromStr, sync::Arc, time::Duration};

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::{
    bridge::routes::BridgeRoute,
    proxy::{build_http_client, ProxyPool},
};

/// Token address the quoting service uses for the native asset.
pub const NATIVE_TOKEN: Address = Address::ZERO;

pub const NATIVE_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Error)]
pub enum QuoteError {
    #[error("quote request failed: {0}")]
    Request(String),

    #[error("quote service returned status {0}")]
    Status(u16),

    #[error("malformed quote response: {0}")]
    Decode(String),

    #[error("route '{0}' not present in quote response")]
    MissingRoute(String),

    #[error("route '{route}' is unusable: {reason}")]
    InvalidRoute { route: String, reason: String },
}

/// Body of the quoting `POST`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub host: String,
    pub amount: String,
    pub from_chain_id: String,
    pub to_chain_id: String,
    pub from_token_address: Address,
    pub to_token_address: Address,
    pub from_token_decimals: u8,
    pub to_token_decimals: u8,
    pub from_gas_price: String,
    pub to_gas_price: String,
    pub graffiti: String,
    pub recipient: Address,
    pub sender: Address,
    #[serde(rename = "forceViaL1")]
    pub force_via_l1: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteResponse {
    #[serde(default)]
    pub results: Vec<QuoteEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteEntry {
    pub id: String,
    #[serde(default)]
    pub result: Option<RouteResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub initiating_transaction: Option<InitiatingTransaction>,
}

/// Left loose: the service sends numbers and strings interchangeably.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatingTransaction {
    pub to: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub chain_id: Option<Value>,
}

#[async_trait]
pub trait QuoteService: Send + Sync {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError>;
}

/// Quoting over HTTP, through the pool's current proxy.
pub struct HttpQuoteService {
    api_url: String,
    pool: Arc<ProxyPool>,
    timeout: Duration,
}

impl HttpQuoteService {
    pub fn new(api_url: impl Into<String>, pool: Arc<ProxyPool>, timeout: Duration) -> Self {
        Self {
            api_url: api_url.into(),
            pool,
            timeout,
        }
    }
}

#[async_trait]
impl QuoteService for HttpQuoteService {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError> {
        let proxy = self.pool.current();
        let client = build_http_client(proxy.as_ref(), self.pool.mode(), self.timeout)
            .map_err(|e| QuoteError::Request(e.to_string()))?;

        debug!(url = %self.api_url, amount = %request.amount, "Requesting bridge quote");
        let response = client
            .post(&self.api_url)
            .json(request)
            .send()
            .await
            .map_err(|e| QuoteError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuoteError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| QuoteError::Request(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| QuoteError::Decode(e.to_string()))
    }
}

fn value_to_u256(value: &Value) -> Option<U256> {
    match value {
        Value::String(s) => U256::from_str(s.trim()).ok(),
        Value::Number(n) => n.as_u64().map(U256::from),
        _ => None,
    }
}

fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Picks the entry whose id is `route_id` and turns it into a [`BridgeRoute`].
pub fn extract_route(response: &QuoteResponse, route_id: &str) -> Result<BridgeRoute, QuoteError> {
    let invalid = |reason: &str| QuoteError::InvalidRoute {
        route: route_id.to_string(),
        reason: reason.to_string(),
    };

    let entry = response
        .results
        .iter()
        .find(|entry| entry.id == route_id)
        .ok_or_else(|| QuoteError::MissingRoute(route_id.to_string()))?;

    let tx = entry
        .result
        .as_ref()
        .and_then(|result| result.initiating_transaction.as_ref())
        .ok_or_else(|| invalid("no initiating transaction"))?;

    let destination =
        Address::from_str(tx.to.trim()).map_err(|_| invalid("destination is not an address"))?;
    let call_data = match tx.data.as_deref() {
        Some(data) if !data.is_empty() => {
            Bytes::from_str(data.trim()).map_err(|_| invalid("call data is not hex"))?
        }
        _ => Bytes::new(),
    };
    let declared_value = match &tx.value {
        Some(value) => value_to_u256(value).ok_or_else(|| invalid("value is not a number"))?,
        None => U256::ZERO,
    };

    Ok(BridgeRoute {
        destination,
        call_data,
        declared_value,
        declared_chain_id: tx.chain_id.as_ref().and_then(value_to_u64),
        is_fallback: false,
    })
}
