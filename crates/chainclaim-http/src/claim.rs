//! The remote claim endpoint (`POST {api_base}/faucet/drip`).
//!
//! The same route serves two purposes. Called with only a recipient it
//! answers `402 Payment Required` and describes the payment it expects.
//! Called with a signed authorization it performs the claim.

use std::time::Duration;

use async_trait::async_trait;
use chainclaim_core::{ClaimError, ClaimTransport, Claimed, Task};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::error::RpcError;

const DRIP_PATH: &str = "/faucet/drip";

#[derive(Debug, Clone)]
pub struct ClaimClientConfig {
    pub request_timeout: Duration,
}

impl Default for ClaimClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// What the endpoint wants paid per claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Base units; the endpoint may send a string or a number.
    #[serde(deserialize_with = "string_or_number")]
    pub amount: String,
    pub network: String,
    pub relayer_contract: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn string_or_number<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match Value::deserialize(de)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[derive(Clone)]
pub struct ClaimClient {
    http: reqwest::Client,
    endpoint: String,
    jwt: String,
    timeout_ms: u64,
}

impl ClaimClient {
    pub fn new(
        api_base: &str,
        jwt: impl Into<String>,
        config: ClaimClientConfig,
    ) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RpcError::Http(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}{DRIP_PATH}", api_base.trim_end_matches('/')),
            jwt: jwt.into(),
            timeout_ms: config.request_timeout.as_millis() as u64,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ask the endpoint what a claim for `recipient` costs.
    ///
    /// Only a `402` carrying `paymentRequirements` is a valid answer.
    pub async fn payment_requirements(
        &self,
        recipient: &str,
    ) -> Result<PaymentRequirements, RpcError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.jwt)
            .json(&json!({ "recipientAddress": recipient }))
            .send()
            .await
            .map_err(|e| RpcError::from_reqwest(e, self.timeout_ms))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| RpcError::from_reqwest(e, self.timeout_ms))?;
        if status != 402 {
            return Err(RpcError::Status { status, body });
        }

        let mut value: Value = serde_json::from_str(&body)?;
        let requirements = value
            .get_mut("paymentRequirements")
            .map(Value::take)
            .ok_or_else(|| RpcError::Malformed("402 without paymentRequirements".into()))?;
        let requirements: PaymentRequirements = serde_json::from_value(requirements)?;

        tracing::info!(
            amount = %requirements.amount,
            network = %requirements.network,
            relayer = %requirements.relayer_contract,
            "payment requirements"
        );
        Ok(requirements)
    }

    /// Bind the client to one recipient, token and payment description.
    pub fn session(
        &self,
        recipient: impl Into<String>,
        token: impl Into<String>,
        requirements: &PaymentRequirements,
    ) -> ClaimSession {
        ClaimSession {
            client: self.clone(),
            recipient: recipient.into(),
            token: token.into(),
            network: requirements.network.clone(),
            relayer_contract: requirements.relayer_contract.clone(),
        }
    }
}

/// A [`ClaimTransport`] that posts each task's signed authorization.
///
/// The task payload is the `paymentPayload.payload` object. Calls are never
/// retried.
pub struct ClaimSession {
    client: ClaimClient,
    recipient: String,
    token: String,
    network: String,
    relayer_contract: String,
}

impl ClaimSession {
    fn body(&self, task: &Task) -> Value {
        json!({
            "recipientAddress": self.recipient,
            "paymentPayload": {
                "token": self.token,
                "payload": task.payload,
            },
            "paymentRequirements": {
                "network": self.network,
                "relayerContract": self.relayer_contract,
            },
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> ClaimError {
        if err.is_timeout() {
            ClaimError::Timeout {
                ms: self.client.timeout_ms,
            }
        } else {
            ClaimError::Transport {
                message: err.to_string(),
                code: None,
            }
        }
    }
}

#[async_trait]
impl ClaimTransport for ClaimSession {
    async fn claim(&self, task: &Task) -> Result<Claimed, ClaimError> {
        let resp = self
            .client
            .http
            .post(&self.client.endpoint)
            .bearer_auth(&self.client.jwt)
            .json(&self.body(task))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
            return Err(ClaimError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value =
            serde_json::from_str(&text).map_err(|e| ClaimError::Decode(e.to_string()))?;
        match value.get("nftTransaction") {
            None | Some(Value::Null) => Ok(Claimed { tx_hash: None }),
            Some(Value::String(tx)) => Ok(Claimed::with_tx(tx.clone())),
            Some(other) => Err(ClaimError::Decode(format!(
                "nftTransaction is not a string: {other}"
            ))),
        }
    }

    fn endpoint(&self) -> &str {
        &self.client.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_accepts_string_or_number() {
        let r: PaymentRequirements = serde_json::from_value(json!({
            "amount": 1000000000000000000u64,
            "network": "bsc",
            "relayerContract": "0x42d5",
            "asset": "0x55d3"
        }))
        .unwrap();
        assert_eq!(r.amount, "1000000000000000000");
        assert_eq!(r.extra["asset"], "0x55d3");

        let r: PaymentRequirements = serde_json::from_value(json!({
            "amount": "5",
            "network": "bsc",
            "relayerContract": "0x42d5"
        }))
        .unwrap();
        assert_eq!(r.amount, "5");

        assert!(serde_json::from_value::<PaymentRequirements>(json!({
            "amount": true,
            "network": "bsc",
            "relayerContract": "0x42d5"
        }))
        .is_err());
    }

    #[test]
    fn endpoint_joins_base() {
        let client =
            ClaimClient::new("https://api.example/v1/", "jwt", ClaimClientConfig::default())
                .unwrap();
        assert_eq!(client.endpoint(), "https://api.example/v1/faucet/drip");
    }
}
