//! Signing with a private key held in process.
//!
//! [`LocalSigner`] hashes `TransferWithAuthorization` typed data the way
//! `eth_signTypedData_v4` does and signs the digest directly, so no node or
//! signing proxy is needed. It also signs legacy (EIP-155) transactions for
//! the one-off allowance approval.

use std::borrow::Cow;

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{sol, Eip712Domain, SolStruct};
use async_trait::async_trait;

use crate::authorization::{AuthorizationSigner, TypedData};
use crate::error::AuthorizationError;

sol! {
    struct TransferWithAuthorization {
        address token;
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

/// A contract call to be signed as a legacy transaction.
#[derive(Debug, Clone)]
pub struct LegacyCall {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: String,
    /// `0x`-prefixed calldata.
    pub data: String,
}

pub struct LocalSigner {
    key: PrivateKeySigner,
    address: String,
}

impl LocalSigner {
    /// Accepts the key as hex, with or without `0x`.
    pub fn from_private_key(key: &str) -> Result<Self, AuthorizationError> {
        let key: PrivateKeySigner = key.trim().parse().map_err(|_| AuthorizationError::InvalidKey)?;
        let address = key.address().to_checksum(None);
        Ok(Self { key, address })
    }

    /// EIP-712 digest of `typed`.
    pub fn signing_hash(typed: &TypedData) -> Result<B256, AuthorizationError> {
        let domain = &typed.domain;
        let domain = Eip712Domain::new(
            Some(Cow::Owned(domain.name.clone())),
            Some(Cow::Owned(domain.version.clone())),
            Some(U256::from(domain.chain_id)),
            Some(parse_address(&domain.verifying_contract)?),
            None,
        );

        let msg = &typed.message;
        let message = TransferWithAuthorization {
            token: parse_address(&msg.token)?,
            from: parse_address(&msg.from)?,
            to: parse_address(&msg.to)?,
            value: msg
                .value
                .parse()
                .map_err(|_| AuthorizationError::InvalidAmount(msg.value.clone()))?,
            validAfter: U256::from(msg.valid_after),
            validBefore: U256::from(msg.valid_before),
            nonce: msg
                .nonce
                .parse()
                .map_err(|_| AuthorizationError::InvalidNonce(msg.nonce.clone()))?,
        };
        Ok(message.eip712_signing_hash(&domain))
    }

    /// Raw signed transaction, `0x`-prefixed, ready for `eth_sendRawTransaction`.
    pub fn sign_legacy_call(&self, call: &LegacyCall) -> Result<String, AuthorizationError> {
        let input: Bytes = call
            .data
            .parse()
            .map_err(|_| AuthorizationError::Signer(format!("invalid calldata '{}'", call.data)))?;
        let tx = TxLegacy {
            chain_id: Some(call.chain_id),
            nonce: call.nonce,
            gas_price: call.gas_price,
            gas_limit: call.gas_limit,
            to: TxKind::Call(parse_address(&call.to)?),
            value: U256::ZERO,
            input,
        };

        let signature = self
            .key
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| AuthorizationError::Signer(e.to_string()))?;
        let envelope = TxEnvelope::Legacy(tx.into_signed(signature));
        Ok(format!("0x{}", hex::encode(envelope.encoded_2718())))
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner").field("address", &self.address).finish()
    }
}

#[async_trait]
impl AuthorizationSigner for LocalSigner {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign_typed_data(&self, typed: &TypedData) -> Result<String, AuthorizationError> {
        let hash = Self::signing_hash(typed)?;
        let signature = self
            .key
            .sign_hash_sync(&hash)
            .map_err(|e| AuthorizationError::Signer(e.to_string()))?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }
}

fn parse_address(addr: &str) -> Result<Address, AuthorizationError> {
    addr.parse()
        .map_err(|_| AuthorizationError::InvalidAddress(addr.to_string()))
}
