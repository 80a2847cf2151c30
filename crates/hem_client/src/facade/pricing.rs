use async_trait::async_trait;
use hem_core::{from_u256, to_u256, Receipt, TokenId};
use num_bigint::BigUint;
use tracing::info;

use super::HemHandle;
use crate::contract::Hem;
use crate::error::HemError;
use crate::ledger::BalanceOwner;

/// Exchange-rate administration of the escrow
#[async_trait]
pub trait PricingAdmin: HemHandle {
    /// Store the tinybar-per-cent rate used to settle purchases
    async fn set_tinybar_per_cent(&self, tinybar_per_cent: &BigUint) -> Result<Receipt, HemError> {
        let call = Hem::setTinybarPerCentCall {
            tinybarPerCent: to_u256(tinybar_per_cent)?,
        };
        let receipt = self.execute_function(call, None).await?;
        info!(%tinybar_per_cent, contract_id = %self.contract_id(), "Set tinybar per cent");
        Ok(receipt)
    }

    async fn get_tinybar_per_cent(&self) -> Result<BigUint, HemError> {
        let rate = self.query_function(Hem::getTinybarPerCentCall {}).await?;
        Ok(from_u256(rate.tinybarPerCent))
    }

    /// Number of NFTs of `token_id` held in escrow
    async fn contract_nft_balance(&self, token_id: TokenId) -> Result<u64, HemError> {
        Ok(self
            .ledger()
            .token_balance(BalanceOwner::Contract(self.contract_id()), token_id)
            .await?)
    }
}
