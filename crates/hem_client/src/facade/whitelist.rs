use async_trait::async_trait;
use hem_core::{to_u256_array, AccountId, Receipt, TokenId};
use num_bigint::BigUint;
use tracing::info;

use super::{sol_address, token_addresses, HemHandle};
use crate::contract::Hem;
use crate::error::HemError;

/// Pre-authorization of listings and purchases.
///
/// Array-length parity is checked by the contract, which rejects a mismatch
/// with `nft length does not match`.
#[async_trait]
pub trait WhitelistAdmin: HemHandle {
    async fn whitelist_list(
        &self,
        seller: AccountId,
        token_ids: &[TokenId],
        serials: &[i64],
        prices_in_cents: &[BigUint],
    ) -> Result<Receipt, HemError> {
        let call = Hem::whitelist_listCall {
            seller: sol_address(seller)?,
            tokens: token_addresses(token_ids)?,
            serials: serials.to_vec(),
            prices: to_u256_array(prices_in_cents)?,
        };

        let receipt = self.execute_function(call, None).await?;
        info!(%seller, ?serials, "Whitelisted listing");
        Ok(receipt)
    }

    async fn whitelist_purchase(
        &self,
        buyer: AccountId,
        token_ids: &[TokenId],
        serials: &[i64],
    ) -> Result<Receipt, HemError> {
        let call = Hem::whitelist_purchaseCall {
            buyer: sol_address(buyer)?,
            tokens: token_addresses(token_ids)?,
            serials: serials.to_vec(),
        };

        let receipt = self.execute_function(call, None).await?;
        info!(%buyer, ?serials, "Whitelisted purchase");
        Ok(receipt)
    }
}
