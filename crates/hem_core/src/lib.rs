//! Core functionality for the Hem escrow client
//! Contains ledger identifiers, ABI value conversions and exchange-rate arithmetic

pub mod abi;
pub mod errors;
pub mod rate;
pub mod types;

pub use abi::*;
pub use errors::*;
pub use types::*;
