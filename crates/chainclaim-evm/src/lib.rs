//! # chainclaim-evm
//!
//! EVM pieces of ChainClaim:
//! - [`Erc721TransferDecoder`]: decodes `Transfer(address,address,uint256)`
//!   logs into receipt records (implements `chainclaim_core::LogDecoder`)
//! - [`CategoryMap`]: fixed token id → category lookup
//! - [`AuthorizationBuilder`]: builds EIP-712 `TransferWithAuthorization`
//!   payloads and hands them to an [`AuthorizationSigner`]
//! - [`LocalSigner`]: an [`AuthorizationSigner`] over an in-process private
//!   key; also signs the approval transaction
//! - [`unlimited_approval_calldata`]: ERC-20 `approve` calldata for the
//!   relayer allowance
//!
//! ## Implementation notes
//! - ERC-721 `Transfer` indexes all three params, so a matching log has
//!   exactly four topics and empty data. ERC-20 `Transfer` shares
//!   `topics[0]` but has three topics and is rejected.

pub mod approval;
pub mod authorization;
pub mod category;
pub mod error;
pub mod local;
pub mod transfer;

pub use approval::{unlimited_approval_calldata, APPROVE_SIGNATURE};
pub use authorization::{
    AuthorizationBuilder, AuthorizationDomain, AuthorizationSigner, SignedAuthorization,
    TransferAuthorization, TypedData,
};
pub use category::CategoryMap;
pub use error::AuthorizationError;
pub use local::{LegacyCall, LocalSigner};
pub use transfer::{keccak256_signature, Erc721TransferDecoder, TRANSFER_SIGNATURE};
