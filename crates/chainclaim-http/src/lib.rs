//! # chainclaim-http
//!
//! reqwest-backed implementations of the ChainClaim seams:
//! - [`ClaimClient`] / [`ClaimSession`]: the remote claim endpoint
//!   (payment-requirements lookup, `ClaimTransport`)
//! - [`HttpRpcClient`]: JSON-RPC 2.0 over HTTP with retry; implements
//!   `ReceiptSource` via `eth_getTransactionReceipt`
//! - [`RemoteSigner`]: `AuthorizationSigner` over `eth_signTypedData_v4`
//! - [`TransactionSender`]: sends the allowance approval, either through
//!   the remote signer or as a locally signed raw transaction
//!   ([`LocalSender`])
//!
//! Claims are never retried: a claim that reached the server may have been
//! honoured, so a repeat could double-spend. Read-only RPC calls are.

pub mod claim;
pub mod error;
pub mod request;
pub mod retry;
pub mod rpc;
pub mod signer;

pub use claim::{ClaimClient, ClaimClientConfig, ClaimSession, PaymentRequirements};
pub use error::RpcError;
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use retry::{RetryConfig, RetryPolicy};
pub use rpc::{HttpClientConfig, HttpRpcClient};
pub use signer::{LocalSender, RemoteSigner, TransactionSender};
