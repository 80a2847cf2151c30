//! Error types for Hem core module

use thiserror::Error;

/// Errors raised while parsing ledger identifiers and addresses
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Invalid entity id `{0}`, expected shard.realm.num")]
    InvalidEntityId(String),

    #[error("Invalid solidity address `{0}`")]
    InvalidAddress(String),

    #[error("Shard {0} does not fit in a solidity address")]
    ShardOutOfRange(u64),
}

/// Errors raised by the exchange-rate arithmetic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateError {
    #[error("HBAR price unavailable or not positive")]
    PriceUnavailable,

    #[error("Amount {0} tinybar does not fit in a signed 64-bit value")]
    AmountOverflow(String),
}

/// Errors raised while converting values to and from Solidity ABI types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("Value {0} does not fit in uint256")]
    Uint256Overflow(String),

    #[error("Malformed ABI data: {0}")]
    Decode(String),
}
