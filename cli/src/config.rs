//! Command-line and environment configuration.
//!
//! Every flag falls back to an environment variable; a `.env` file in the
//! working directory is loaded first.

use std::time::Duration;

use anyhow::bail;
use chainclaim_core::DispatchConfig;
use chainclaim_evm::authorization::{DEFAULT_DOMAIN_NAME, DEFAULT_DOMAIN_VERSION};
use clap::Parser;

use crate::logging::LogConfig;

pub const DEFAULT_RPC: &str = "https://bsc.drpc.org";
pub const DEFAULT_API_BASE: &str = "https://www.b402.ai/api/api/v1";
pub const DEFAULT_RELAY_CONTRACT: &str = "0x42d59C9cb3082d668568FB7260E1413a31cCc297";
pub const DEFAULT_RELAYER: &str = "0xE1Af7DaEa624bA3B5073f24A6Ea5531434D82d88";
/// BSC-USD on BNB Smart Chain.
pub const DEFAULT_TOKEN: &str = "0x55d398326f99059fF775485246999027B3197955";
pub const DEFAULT_NFT_CONTRACT: &str = "0xafcD15f17D042eE3dB94CdF6530A97bf32A74E02";

#[derive(Debug, Parser)]
#[command(name = "chainclaim", version, about = "Fire a fixed batch of signed claims through a bounded worker pool")]
pub struct Cli {
    /// Bearer credential for the claim endpoint.
    #[arg(long, env = "JWT", hide_env_values = true)]
    pub jwt: String,

    /// Number of claims in the batch.
    #[arg(long, env = "MINT_COUNT")]
    pub mint_count: usize,

    /// Concurrent claim calls.
    #[arg(long, env = "WORKER_COUNT", default_value_t = 20)]
    pub worker_count: usize,

    /// Chain JSON-RPC endpoint (receipts, chain id).
    #[arg(long, env = "RPC", default_value = DEFAULT_RPC)]
    pub rpc: String,

    #[arg(long, env = "API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Payee of every transfer authorization.
    #[arg(long, env = "CONTRACTRELAY", default_value = DEFAULT_RELAY_CONTRACT)]
    pub relay_contract: String,

    /// Spender approved by `--approve`.
    #[arg(long, env = "RELAYER", default_value = DEFAULT_RELAYER)]
    pub relayer: String,

    /// Payment token.
    #[arg(long, env = "TOKEN", default_value = DEFAULT_TOKEN)]
    pub token: String,

    /// Contract whose transfers are tallied.
    #[arg(long, env = "NFT_CONTRACT", default_value = DEFAULT_NFT_CONTRACT)]
    pub nft_contract: String,

    /// Payer key. Signs authorizations in process; the wallet address is
    /// derived from it.
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Payer address when signing remotely. Ignored with `PRIVATE_KEY`.
    #[arg(long, env = "WALLET")]
    pub wallet: Option<String>,

    /// Receiver of claimed items. Empty means the payer wallet.
    #[arg(long, env = "RECIPIENT")]
    pub recipient: Option<String>,

    /// JSON-RPC endpoint holding the key for `WALLET`
    /// (`eth_signTypedData_v4`, `eth_sendTransaction`).
    #[arg(long, env = "SIGNER_URL")]
    pub signer_url: Option<String>,

    /// EIP-712 domain name of the authorization.
    #[arg(long, env = "DOMAIN_NAME", default_value = DEFAULT_DOMAIN_NAME)]
    pub domain_name: String,

    #[arg(long, env = "DOMAIN_VERSION", default_value = DEFAULT_DOMAIN_VERSION)]
    pub domain_version: String,

    /// Send an unlimited token approval to `RELAYER` before claiming.
    #[arg(long, env = "APPROVE")]
    pub approve: bool,

    /// Seconds to wait for outstanding receipt lookups after the last claim.
    #[arg(long, env = "RECEIPT_DRAIN_SECS", default_value_t = 10)]
    pub receipt_drain_secs: u64,

    /// Milliseconds to linger after the report before exiting.
    #[arg(long, env = "EXIT_GRACE_MS", default_value_t = 500)]
    pub exit_grace_ms: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Per-crate levels, e.g. `chainclaim-http=debug,chainclaim-core=trace`.
    #[arg(long, env = "LOG_COMPONENTS")]
    pub log_components: Option<String>,

    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

/// Where authorizations get signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningMode {
    Local { private_key: String },
    Remote { wallet: String, signer_url: String },
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Cli {
    /// The configured recipient, or `wallet` when none is set.
    pub fn recipient<'a>(&'a self, wallet: &'a str) -> &'a str {
        non_empty(&self.recipient).unwrap_or(wallet)
    }

    /// `PRIVATE_KEY` wins; otherwise both `WALLET` and `SIGNER_URL` are needed.
    pub fn signing_mode(&self) -> anyhow::Result<SigningMode> {
        if let Some(key) = non_empty(&self.private_key) {
            return Ok(SigningMode::Local {
                private_key: key.to_string(),
            });
        }
        match (non_empty(&self.wallet), non_empty(&self.signer_url)) {
            (Some(wallet), Some(url)) => Ok(SigningMode::Remote {
                wallet: wallet.to_string(),
                signer_url: url.to_string(),
            }),
            (Some(_), None) => bail!("WALLET without PRIVATE_KEY needs SIGNER_URL to sign"),
            _ => bail!("set PRIVATE_KEY, or WALLET together with SIGNER_URL"),
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            workers: self.worker_count,
            receipt_drain_timeout: Duration::from_secs(self.receipt_drain_secs),
        }
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.exit_grace_ms)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            components: self
                .log_components
                .as_deref()
                .map(LogConfig::parse_components)
                .unwrap_or_default(),
            json: self.log_json,
        }
    }
}
