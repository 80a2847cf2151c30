//! Ledger identifiers and the escrow records read back from the contract

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::errors::IdError;

/// Raw 20-byte solidity address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|_| IdError::InvalidAddress(s.to_string()))?;
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| IdError::InvalidAddress(s.to_string()))?;
        Ok(Address(array))
    }
}

/// Parse `shard.realm.num`
fn parse_triple(s: &str) -> Result<(u64, u64, u64), IdError> {
    let invalid = || IdError::InvalidEntityId(s.to_string());
    let mut parts = s.trim().split('.');
    let shard = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let realm = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let num = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok((shard, realm, num))
}

/// Long-zero address layout: 4 bytes shard, 8 bytes realm, 8 bytes num
fn triple_to_address(shard: u64, realm: u64, num: u64) -> Result<Address, IdError> {
    let shard = u32::try_from(shard).map_err(|_| IdError::ShardOutOfRange(shard))?;
    let mut bytes = [0u8; 20];
    bytes[..4].copy_from_slice(&shard.to_be_bytes());
    bytes[4..12].copy_from_slice(&realm.to_be_bytes());
    bytes[12..].copy_from_slice(&num.to_be_bytes());
    Ok(Address(bytes))
}

fn address_to_triple(address: &Address) -> (u64, u64, u64) {
    let b = address.as_bytes();
    let mut shard = [0u8; 4];
    let mut realm = [0u8; 8];
    let mut num = [0u8; 8];
    shard.copy_from_slice(&b[..4]);
    realm.copy_from_slice(&b[4..12]);
    num.copy_from_slice(&b[12..]);
    (
        u32::from_be_bytes(shard) as u64,
        u64::from_be_bytes(realm),
        u64::from_be_bytes(num),
    )
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name {
            pub shard: u64,
            pub realm: u64,
            pub num: u64,
        }

        impl $name {
            pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
                Self { shard, realm, num }
            }

            pub fn to_solidity_address(&self) -> Result<Address, IdError> {
                triple_to_address(self.shard, self.realm, self.num)
            }

            pub fn from_solidity_address(address: &Address) -> Self {
                let (shard, realm, num) = address_to_triple(address);
                Self { shard, realm, num }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let (shard, realm, num) = parse_triple(s)?;
                Ok(Self { shard, realm, num })
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.to_string()
            }
        }
    };
}

entity_id!(
    /// Hedera account identifier
    AccountId
);
entity_id!(
    /// Deployed smart contract identifier
    ContractId
);
entity_id!(
    /// Token (NFT collection) identifier
    TokenId
);
entity_id!(FileId);
entity_id!(TopicId);

impl From<ContractId> for AccountId {
    fn from(id: ContractId) -> Self {
        AccountId::new(id.shard, id.realm, id.num)
    }
}

/// A single NFT: token plus serial number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NftId {
    pub token_id: TokenId,
    pub serial: i64,
}

impl NftId {
    pub fn new(token_id: TokenId, serial: i64) -> Self {
        Self { token_id, serial }
    }
}

impl fmt::Display for NftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.serial, self.token_id)
    }
}

/// Listing state of an offset as reported by `getOffset`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    /// Seller account, `0.0.0` when the offset is not listed
    pub seller: AccountId,
    /// Minimum price in cents
    pub price: BigUint,
    pub hem_approved: bool,
    pub user_approved: bool,
}

impl Offset {
    pub fn is_listed(&self) -> bool {
        self.seller != AccountId::default()
    }
}

/// Purchase pre-authorization as reported by `getPurchaseWhitelist`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseWhitelistEntry {
    pub buyer: AccountId,
    pub price: BigUint,
    pub hem_approved: bool,
}

/// Finality status of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub status: String,
}

impl Receipt {
    pub const SUCCESS: &'static str = "SUCCESS";

    pub fn success() -> Self {
        Self {
            status: Self::SUCCESS.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Self::SUCCESS
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_parsing() {
        let id: AccountId = "0.0.1234".parse().unwrap();
        assert_eq!(id, AccountId::new(0, 0, 1234));
        assert_eq!(id.to_string(), "0.0.1234");

        assert!("0.0".parse::<AccountId>().is_err());
        assert!("0.0.1.2".parse::<AccountId>().is_err());
        assert!("a.b.c".parse::<TokenId>().is_err());
    }

    #[test]
    fn test_solidity_address_layout() {
        let token = TokenId::new(0, 0, 0x1234);
        let address = token.to_solidity_address().unwrap();
        assert_eq!(address.to_string(), "0000000000000000000000000000000000001234");

        let account = AccountId::new(1, 2, 3);
        assert_eq!(
            account.to_solidity_address().unwrap().to_string(),
            "0000000100000000000000020000000000000003"
        );
        assert_eq!(
            AccountId::from_solidity_address(&account.to_solidity_address().unwrap()),
            account
        );
    }

    #[test]
    fn test_shard_out_of_range() {
        let id = ContractId::new(u64::from(u32::MAX) + 1, 0, 1);
        assert!(matches!(
            id.to_solidity_address(),
            Err(IdError::ShardOutOfRange(_))
        ));
    }

    #[test]
    fn test_address_parsing() {
        let with_prefix: Address = "0x9b1c5d60b87402896542869b162039254f764140".parse().unwrap();
        let without: Address = "9b1c5d60b87402896542869b162039254f764140".parse().unwrap();
        assert_eq!(with_prefix, without);
        assert!("0x1234".parse::<Address>().is_err());
        assert!(Address::ZERO.is_zero());
        assert_eq!(AccountId::from_solidity_address(&Address::ZERO), AccountId::default());
    }

    #[test]
    fn test_contract_id_as_account() {
        let contract = ContractId::new(0, 0, 1001);
        let account: AccountId = contract.into();
        assert_eq!(account.to_string(), "0.0.1001");
    }

    #[test]
    fn test_entity_id_serde_as_string() {
        let id = TokenId::new(0, 0, 42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"0.0.42\"");
        let back: TokenId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_offset_listing_state() {
        let unlisted = Offset {
            seller: AccountId::default(),
            price: BigUint::from(0u8),
            hem_approved: false,
            user_approved: false,
        };
        assert!(!unlisted.is_listed());

        let listed = Offset {
            seller: AccountId::new(0, 0, 1002),
            ..unlisted
        };
        assert!(listed.is_listed());
    }
}
