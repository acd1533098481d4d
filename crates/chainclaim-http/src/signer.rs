//! Signing and sending over JSON-RPC.
//!
//! [`RemoteSigner`] is an [`AuthorizationSigner`] backed by an endpoint that
//! holds the key (a node with an unlocked account, or a signing proxy).
//! [`LocalSender`] broadcasts transactions signed in process by a
//! [`LocalSigner`]. Both implement [`TransactionSender`].
//!
//! Sending clients should be built with `RetryConfig::none()`: a send that
//! timed out may still have been accepted.

use std::sync::Arc;

use async_trait::async_trait;
use chainclaim_evm::{AuthorizationError, AuthorizationSigner, LegacyCall, LocalSigner, TypedData};
use serde_json::{json, Value};

use crate::error::RpcError;
use crate::rpc::HttpRpcClient;

/// Headroom added on top of `eth_estimateGas`, in percent.
const GAS_MARGIN_PERCENT: u64 = 20;

/// Sends a contract call from the signer's account.
#[async_trait]
pub trait TransactionSender: Send + Sync {
    /// Account the transaction is sent from.
    fn account(&self) -> &str;

    /// Returns the transaction hash once the node has accepted it.
    async fn send_transaction(&self, to: &str, data: &str) -> Result<String, RpcError>;
}

pub struct RemoteSigner {
    rpc: HttpRpcClient,
    address: String,
}

impl RemoteSigner {
    pub fn new(rpc: HttpRpcClient, address: impl Into<String>) -> Self {
        Self {
            rpc,
            address: address.into(),
        }
    }

    pub fn rpc(&self) -> &HttpRpcClient {
        &self.rpc
    }
}

#[async_trait]
impl TransactionSender for RemoteSigner {
    fn account(&self) -> &str {
        &self.address
    }

    /// `eth_sendTransaction`; the endpoint fills in nonce and gas.
    async fn send_transaction(&self, to: &str, data: &str) -> Result<String, RpcError> {
        self.rpc
            .call(
                "eth_sendTransaction",
                vec![json!({ "from": self.address, "to": to, "data": data })],
            )
            .await
    }
}

#[async_trait]
impl AuthorizationSigner for RemoteSigner {
    fn address(&self) -> &str {
        &self.address
    }

    /// `eth_signTypedData_v4(address, json)`; the typed data travels as a
    /// JSON string, which is what the method expects.
    async fn sign_typed_data(&self, typed: &TypedData) -> Result<String, AuthorizationError> {
        let payload = serde_json::to_string(typed)?;
        self.rpc
            .call(
                "eth_signTypedData_v4",
                vec![Value::String(self.address.clone()), Value::String(payload)],
            )
            .await
            .map_err(|e| AuthorizationError::Signer(e.to_string()))
    }
}

/// Fills nonce and gas from the node, signs locally and broadcasts with
/// `eth_sendRawTransaction`.
pub struct LocalSender {
    rpc: HttpRpcClient,
    signer: Arc<LocalSigner>,
    chain_id: u64,
}

impl LocalSender {
    pub fn new(rpc: HttpRpcClient, signer: Arc<LocalSigner>, chain_id: u64) -> Self {
        Self {
            rpc,
            signer,
            chain_id,
        }
    }
}

#[async_trait]
impl TransactionSender for LocalSender {
    fn account(&self) -> &str {
        self.signer.address()
    }

    async fn send_transaction(&self, to: &str, data: &str) -> Result<String, RpcError> {
        let from = self.signer.address();
        let nonce = self.rpc.transaction_count(from).await?;
        let gas_price = self.rpc.gas_price().await?;
        let estimate = self.rpc.estimate_gas(from, to, data).await?;
        let gas_limit = estimate + estimate * GAS_MARGIN_PERCENT / 100;
        tracing::debug!(nonce, gas_price, gas_limit, "signing transaction locally");

        let raw = self
            .signer
            .sign_legacy_call(&LegacyCall {
                chain_id: self.chain_id,
                nonce,
                gas_price: u128::from(gas_price),
                gas_limit,
                to: to.to_string(),
                data: data.to_string(),
            })
            .map_err(|e| RpcError::Signing(e.to_string()))?;
        self.rpc.send_raw_transaction(&raw).await
    }
}
