use hem_core::{AbiError, IdError, RateError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::deploy::DeployError;
use crate::ledger::LedgerError;
use crate::price_oracle::PriceError;

/// Errors surfaced by the account facade and the driver commands
#[derive(Error, Debug)]
pub enum HemError {
    #[error("HBAR price unavailable")]
    PriceUnavailable,
    #[error("Deployment failed: {0}")]
    Deployment(#[from] DeployError),
    /// Non-success receipt status, unchanged
    #[error("{0}")]
    ContractRejection(String),
    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),
    #[error("Invalid identifier: {0}")]
    Id(#[from] IdError),
    #[error("Rate error: {0}")]
    Rate(RateError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<LedgerError> for HemError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(status) => HemError::ContractRejection(status),
            other => HemError::Ledger(other),
        }
    }
}

impl From<PriceError> for HemError {
    fn from(err: PriceError) -> Self {
        match err {
            PriceError::Unavailable => HemError::PriceUnavailable,
        }
    }
}

impl From<RateError> for HemError {
    fn from(err: RateError) -> Self {
        match err {
            RateError::PriceUnavailable => HemError::PriceUnavailable,
            other => HemError::Rate(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_keeps_status() {
        let err: HemError = LedgerError::Rejected("nft length does not match".to_string()).into();
        assert!(matches!(err, HemError::ContractRejection(_)));
        assert_eq!(err.to_string(), "nft length does not match");

        let err: HemError = LedgerError::Transport("timeout".to_string()).into();
        assert!(matches!(err, HemError::Ledger(_)));
    }

    #[test]
    fn test_price_errors_collapse_to_unavailable() {
        assert!(matches!(
            HemError::from(PriceError::Unavailable),
            HemError::PriceUnavailable
        ));
        assert!(matches!(
            HemError::from(RateError::PriceUnavailable),
            HemError::PriceUnavailable
        ));
    }
}
