//! ERC-721 `Transfer` log decoding.
//!
//! `topics[0]` of a `Transfer(address,address,uint256)` log is
//! `0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef` for
//! ERC-20 and ERC-721 alike. Only the topic count tells them apart.

use alloy_primitives::{Address, B256, U256};
use chainclaim_core::{LogDecoder, ReceiptLog, ReceiptRecord};
use tiny_keccak::{Hasher, Keccak};

use crate::category::CategoryMap;

pub const TRANSFER_SIGNATURE: &str = "Transfer(address,address,uint256)";

/// keccak256 of a canonical event signature, `0x`-prefixed lowercase hex.
pub fn keccak256_signature(signature: &str) -> String {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(signature.as_bytes());
    hasher.finalize(&mut output);
    format!("0x{}", hex::encode(output))
}

/// Decodes `Transfer(address indexed from, address indexed to, uint256 indexed tokenId)`.
#[derive(Debug, Clone)]
pub struct Erc721TransferDecoder {
    fingerprint: String,
    categories: CategoryMap,
}

impl Erc721TransferDecoder {
    pub fn new(categories: CategoryMap) -> Self {
        Self {
            fingerprint: keccak256_signature(TRANSFER_SIGNATURE),
            categories,
        }
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }
}

impl Default for Erc721TransferDecoder {
    fn default() -> Self {
        Self::new(CategoryMap::tiers())
    }
}

impl LogDecoder for Erc721TransferDecoder {
    fn event_name(&self) -> &str {
        "ERC721Transfer"
    }

    fn decode(&self, log: &ReceiptLog) -> Option<ReceiptRecord> {
        let [signature, _from, to, token_id] = log.topics.as_slice() else {
            return None;
        };
        if !signature.eq_ignore_ascii_case(&self.fingerprint) {
            return None;
        }

        let to = Address::from_word(parse_word(to)?);
        let token_id = U256::from_be_slice(parse_word(token_id)?.as_slice()).to_string();
        let category = self.categories.category(&token_id).to_string();

        Some(ReceiptRecord {
            recipient: to.to_checksum(None),
            token_id,
            category,
        })
    }
}

/// A 32-byte topic; `None` if it is not exactly 32 bytes of hex.
fn parse_word(topic: &str) -> Option<B256> {
    topic.parse::<B256>().ok()
}
