//! ERC-20 `approve(spender, MAX)` calldata for the one-off allowance the
//! relayer needs before it can pull tokens.

use alloy_primitives::{Address, U256};

use crate::error::AuthorizationError;
use crate::transfer::keccak256_signature;

pub const APPROVE_SIGNATURE: &str = "approve(address,uint256)";

/// `0x`-prefixed calldata granting `spender` an unlimited allowance.
pub fn unlimited_approval_calldata(spender: &str) -> Result<String, AuthorizationError> {
    let spender: Address = spender
        .parse()
        .map_err(|_| AuthorizationError::InvalidAddress(spender.to_string()))?;

    let selector = keccak256_signature(APPROVE_SIGNATURE);
    let mut data = String::with_capacity(2 + 8 + 128);
    data.push_str(&selector[..10]);
    data.push_str(&hex::encode(spender.into_word()));
    data.push_str(&hex::encode(U256::MAX.to_be_bytes::<32>()));
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approve_selector_and_layout() {
        let data =
            unlimited_approval_calldata("0xE1Af7DaEa624bA3B5073f24A6Ea5531434D82d88").unwrap();
        assert!(data.starts_with("0x095ea7b3"));
        assert_eq!(data.len(), 10 + 64 + 64);
        assert_eq!(
            &data[10..74],
            "000000000000000000000000e1af7daea624ba3b5073f24a6ea5531434d82d88"
        );
        assert!(data[74..].chars().all(|c| c == 'f'));
    }

    #[test]
    fn rejects_bad_spender() {
        assert!(matches!(
            unlimited_approval_calldata("relayer"),
            Err(AuthorizationError::InvalidAddress(_))
        ));
    }
}
