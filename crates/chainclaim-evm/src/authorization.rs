//! EIP-712 `TransferWithAuthorization` payloads.
//!
//! Each claim carries a pre-signed authorization. The builder fills in the
//! validity window and a fresh random nonce, renders the typed data in the
//! `eth_signTypedData_v4` shape and delegates signing to an
//! [`AuthorizationSigner`].

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::U256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthorizationError;

pub const DEFAULT_DOMAIN_NAME: &str = "B402";
pub const DEFAULT_DOMAIN_VERSION: &str = "1";

/// Seconds subtracted from "now" for `validAfter`, absorbing clock skew.
pub const VALID_AFTER_SKEW_SECS: u64 = 20;
/// Seconds added to "now" for `validBefore`.
pub const VALIDITY_SECS: u64 = 1800;

const PRIMARY_TYPE: &str = "TransferWithAuthorization";

/// The signed message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAuthorization {
    pub token: String,
    pub from: String,
    pub to: String,
    /// Decimal string; keeps 256-bit values intact through JSON.
    pub value: String,
    pub valid_after: u64,
    pub valid_before: u64,
    /// 32 random bytes, `0x`-prefixed hex.
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl TypedField {
    fn new(name: &str, ty: &str) -> Self {
        Self { name: name.into(), ty: ty.into() }
    }
}

/// Typed data as accepted by `eth_signTypedData_v4`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    pub types: BTreeMap<String, Vec<TypedField>>,
    pub primary_type: String,
    pub domain: AuthorizationDomain,
    pub message: TransferAuthorization,
}

impl TypedData {
    pub fn transfer_with_authorization(
        domain: AuthorizationDomain,
        message: TransferAuthorization,
    ) -> Self {
        let mut types = BTreeMap::new();
        types.insert(
            "EIP712Domain".to_string(),
            vec![
                TypedField::new("name", "string"),
                TypedField::new("version", "string"),
                TypedField::new("chainId", "uint256"),
                TypedField::new("verifyingContract", "address"),
            ],
        );
        types.insert(
            PRIMARY_TYPE.to_string(),
            vec![
                TypedField::new("token", "address"),
                TypedField::new("from", "address"),
                TypedField::new("to", "address"),
                TypedField::new("value", "uint256"),
                TypedField::new("validAfter", "uint256"),
                TypedField::new("validBefore", "uint256"),
                TypedField::new("nonce", "bytes32"),
            ],
        );
        Self {
            types,
            primary_type: PRIMARY_TYPE.to_string(),
            domain,
            message,
        }
    }
}

/// An authorization together with its signature, ready to go on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAuthorization {
    pub authorization: TransferAuthorization,
    pub signature: String,
}

impl SignedAuthorization {
    /// The `paymentPayload.payload` object sent with a claim.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "authorization": self.authorization,
            "signature": self.signature,
        })
    }
}

/// Signing capability for typed data.
#[async_trait]
pub trait AuthorizationSigner: Send + Sync + 'static {
    /// Address the signatures recover to.
    fn address(&self) -> &str;

    async fn sign_typed_data(&self, typed: &TypedData) -> Result<String, AuthorizationError>;
}

pub struct AuthorizationBuilder {
    signer: Arc<dyn AuthorizationSigner>,
    token: String,
    payee: String,
    chain_id: u64,
    domain_name: String,
    domain_version: String,
}

impl AuthorizationBuilder {
    /// Authorizations move `token` from the signer's address to `payee`.
    pub fn new(
        signer: Arc<dyn AuthorizationSigner>,
        token: impl Into<String>,
        payee: impl Into<String>,
        chain_id: u64,
    ) -> Self {
        Self {
            signer,
            token: token.into(),
            payee: payee.into(),
            chain_id,
            domain_name: DEFAULT_DOMAIN_NAME.to_string(),
            domain_version: DEFAULT_DOMAIN_VERSION.to_string(),
        }
    }

    pub fn with_domain(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.domain_name = name.into();
        self.domain_version = version.into();
        self
    }

    pub fn domain(&self, verifying_contract: &str) -> AuthorizationDomain {
        AuthorizationDomain {
            name: self.domain_name.clone(),
            version: self.domain_version.clone(),
            chain_id: self.chain_id,
            verifying_contract: verifying_contract.to_string(),
        }
    }

    /// Build and sign one authorization for `amount` (decimal or `0x` hex).
    pub async fn build(
        &self,
        amount: &str,
        relayer_contract: &str,
    ) -> Result<SignedAuthorization, AuthorizationError> {
        let value = amount
            .trim()
            .parse::<U256>()
            .map_err(|_| AuthorizationError::InvalidAmount(amount.to_string()))?;

        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        let authorization = TransferAuthorization {
            token: self.token.clone(),
            from: self.signer.address().to_string(),
            to: self.payee.clone(),
            value: value.to_string(),
            valid_after: now.saturating_sub(VALID_AFTER_SKEW_SECS),
            valid_before: now + VALIDITY_SECS,
            nonce: random_nonce(),
        };

        let typed =
            TypedData::transfer_with_authorization(self.domain(relayer_contract), authorization);
        let signature = self.signer.sign_typed_data(&typed).await?;

        Ok(SignedAuthorization {
            authorization: typed.message,
            signature,
        })
    }

    /// Sign `count` authorizations sequentially. Stops at the first failure.
    pub async fn build_batch(
        &self,
        count: usize,
        amount: &str,
        relayer_contract: &str,
    ) -> Result<Vec<SignedAuthorization>, AuthorizationError> {
        let mut signed = Vec::with_capacity(count);
        for i in 1..=count {
            signed.push(self.build(amount, relayer_contract).await?);
            if i % 100 == 0 || i == count {
                tracing::info!(signed = i, total = count, "authorizations signed");
            }
        }
        Ok(signed)
    }
}

fn random_nonce() -> String {
    let bytes: [u8; 32] = rand::random();
    format!("0x{}", hex::encode(bytes))
}
