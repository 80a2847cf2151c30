//! Client for the Hem carbon-offset escrow
//!
//! Connects an account to a ledger, deploys the escrow contracts, converts
//! live HBAR quotes into the contract's exchange rate and drives listings and
//! purchases through role-scoped facades.

pub mod config;
pub mod contract;
pub mod deploy;
pub mod error;
pub mod facade;
#[cfg(feature = "hedera")]
pub mod hedera_ledger;
pub mod ledger;
pub mod price_oracle;
pub mod test_helpers;

pub use config::{Credentials, HemConfig, Network, Role};
pub use contract::Hem;
pub use deploy::{deploy_contract, deploy_hem, ContractArtifact, DeployOptions, Deployment};
pub use error::HemError;
pub use facade::{HemAccount, HemHandle, NftAdmin, PricingAdmin, WhitelistAdmin};
#[cfg(feature = "hedera")]
pub use hedera_ledger::HederaLedger;
pub use ledger::{BalanceOwner, Ledger, LedgerError, NewAccount};
pub use price_oracle::{CoinMarketCapClient, FixedQuote, PriceOracle, QuoteSource};

use std::sync::Arc;

/// Open a ledger for `network` signing as `credentials`.
///
/// `simulated` needs an existing in-memory ledger to join; use
/// [`test_helpers::FakeLedger::as_operator`] for it.
pub fn connect(network: Network, credentials: &Credentials) -> Result<Arc<dyn Ledger>, LedgerError> {
    match network {
        Network::Simulated => Err(LedgerError::Unsupported(
            "the simulated network is joined through FakeLedger::as_operator".to_string(),
        )),
        #[cfg(feature = "hedera")]
        _ => Ok(Arc::new(HederaLedger::connect(network, credentials)?)),
        #[cfg(not(feature = "hedera"))]
        _ => {
            let _ = credentials;
            Err(LedgerError::Unsupported(format!(
                "built without Hedera support, cannot reach {}",
                network
            )))
        }
    }
}
