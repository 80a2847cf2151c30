//! Conversions between ledger values and Solidity ABI types
//!
//! Call data itself is built and parsed by `alloy-sol-types` from the
//! contract's declared interface.

use alloy_primitives::U256;
use num_bigint::BigUint;

pub use alloy_primitives::{keccak256, B256};

use crate::errors::AbiError;
use crate::types::Address;

impl From<Address> for alloy_primitives::Address {
    fn from(address: Address) -> Self {
        alloy_primitives::Address::from(address.0)
    }
}

impl From<alloy_primitives::Address> for Address {
    fn from(address: alloy_primitives::Address) -> Self {
        Address(address.0 .0)
    }
}

/// Narrow an unbounded integer to `uint256`
pub fn to_u256(value: &BigUint) -> Result<U256, AbiError> {
    U256::try_from_be_slice(&value.to_bytes_be())
        .ok_or_else(|| AbiError::Uint256Overflow(value.to_string()))
}

pub fn from_u256(value: U256) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes::<32>())
}

pub fn to_u256_array(values: &[BigUint]) -> Result<Vec<U256>, AbiError> {
    values.iter().map(to_u256).collect()
}

impl From<alloy_sol_types::Error> for AbiError {
    fn from(e: alloy_sol_types::Error) -> Self {
        AbiError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolValue;
    use proptest::prelude::*;

    #[test]
    fn test_address_conversion_keeps_bytes() {
        let address: Address = "9b1c5d60b87402896542869b162039254f764140".parse().unwrap();
        let sol: alloy_primitives::Address = address.into();
        assert_eq!(sol.as_slice(), address.as_bytes());
        assert_eq!(Address::from(sol), address);
    }

    #[test]
    fn test_uint256_bounds() {
        let max = (BigUint::from(1u8) << 256) - 1u8;
        assert_eq!(to_u256(&max).unwrap(), U256::MAX);
        assert_eq!(from_u256(U256::MAX), max);
        assert_eq!(to_u256(&BigUint::from(0u8)).unwrap(), U256::ZERO);

        assert!(matches!(
            to_u256(&(BigUint::from(1u8) << 256)),
            Err(AbiError::Uint256Overflow(_))
        ));
        assert!(matches!(
            to_u256_array(&[BigUint::from(5u8), BigUint::from(1u8) << 300]),
            Err(AbiError::Uint256Overflow(_))
        ));
    }

    #[test]
    fn test_decode_error_is_reported() {
        let err = <(alloy_primitives::Address, U256)>::abi_decode_params(&[0u8; 8], true)
            .map_err(AbiError::from)
            .unwrap_err();
        assert!(matches!(err, AbiError::Decode(_)));
    }

    proptest! {
        #[test]
        fn prop_uint256_conversion_is_lossless(words in proptest::collection::vec(any::<u64>(), 4)) {
            let mut value = BigUint::from(0u8);
            for word in &words {
                value = (value << 64) + BigUint::from(*word);
            }
            prop_assert_eq!(from_u256(to_u256(&value).unwrap()), value);
        }

        #[test]
        fn prop_int64_sign_extension(value in any::<i64>()) {
            let encoded = (value,).abi_encode_params();
            let fill = if value < 0 { 0xff } else { 0x00 };
            prop_assert!(encoded[..24].iter().all(|b| *b == fill));
            let (decoded,) = <(i64,)>::abi_decode_params(&encoded, true).unwrap();
            prop_assert_eq!(decoded, value);
        }
    }
}
