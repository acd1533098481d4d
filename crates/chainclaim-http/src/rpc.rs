//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Transient failures (connection errors, timeouts, 429/5xx) are retried
//! with exponential backoff. JSON-RPC error objects are returned as-is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chainclaim_core::{InspectError, ReceiptSource, TransactionReceipt};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RpcError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::retry::{RetryConfig, RetryPolicy};

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub retry: RetryConfig,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    timeout_ms: u64,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RpcError::Http(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(config.retry),
            timeout_ms: config.request_timeout.as_millis() as u64,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(e, self.timeout_ms))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RpcError::from_reqwest(e, self.timeout_ms))?;
        if !status.is_success() {
            return Err(RpcError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Send `method(params)` and return the raw `result`.
    pub async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let req = JsonRpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(&req).await {
                Ok(resp) => return resp.into_result().map_err(RpcError::Rpc),
                Err(e) if e.is_retryable() => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            method,
                            url = %self.url,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(attempt, error = %e, method, url = %self.url, "max retries exceeded");
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcError> {
        let value = self.request(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        let quantity: String = self.call("eth_chainId", vec![]).await?;
        parse_quantity(&quantity)
    }

    /// Pending-state nonce of `address`.
    pub async fn transaction_count(&self, address: &str) -> Result<u64, RpcError> {
        let quantity: String = self
            .call(
                "eth_getTransactionCount",
                vec![Value::String(address.to_string()), Value::String("pending".into())],
            )
            .await?;
        parse_quantity(&quantity)
    }

    pub async fn gas_price(&self) -> Result<u64, RpcError> {
        let quantity: String = self.call("eth_gasPrice", vec![]).await?;
        parse_quantity(&quantity)
    }

    pub async fn estimate_gas(&self, from: &str, to: &str, data: &str) -> Result<u64, RpcError> {
        let quantity: String = self
            .call(
                "eth_estimateGas",
                vec![serde_json::json!({ "from": from, "to": to, "data": data })],
            )
            .await?;
        parse_quantity(&quantity)
    }

    /// Broadcast a signed transaction; returns its hash.
    pub async fn send_raw_transaction(&self, raw: &str) -> Result<String, RpcError> {
        self.call("eth_sendRawTransaction", vec![Value::String(raw.to_string())])
            .await
    }

    /// `None` while the node has not indexed `tx_hash`.
    pub async fn fetch_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>, RpcError> {
        self.call("eth_getTransactionReceipt", vec![Value::String(tx_hash.to_string())])
            .await
    }

    /// Poll for `tx_hash` until it is mined or `timeout` elapses.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<TransactionReceipt, RpcError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(receipt) = self.fetch_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            if tokio::time::Instant::now() + poll_interval > deadline {
                return Err(RpcError::Timeout {
                    ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[async_trait]
impl ReceiptSource for HttpRpcClient {
    async fn transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, InspectError> {
        self.fetch_receipt(tx_hash)
            .await
            .map_err(|e| match e {
                RpcError::Deserialization(err) => InspectError::Malformed {
                    tx_hash: tx_hash.to_string(),
                    reason: err.to_string(),
                },
                other => InspectError::Fetch {
                    tx_hash: tx_hash.to_string(),
                    reason: other.to_string(),
                },
            })
    }
}

/// Hex quantity (`"0x38"`) to integer.
fn parse_quantity(quantity: &str) -> Result<u64, RpcError> {
    let digits = quantity
        .strip_prefix("0x")
        .or_else(|| quantity.strip_prefix("0X"))
        .unwrap_or(quantity);
    u64::from_str_radix(digits, 16)
        .map_err(|_| RpcError::Malformed(format!("invalid quantity '{quantity}'")))
}
