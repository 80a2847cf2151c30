use async_trait::async_trait;
use hem_core::{AccountId, Receipt, TokenId};
use tracing::info;

use super::HemHandle;
use crate::error::HemError;

pub const NFT_NAME: &str = "Demo 3";
pub const NFT_SYMBOL: &str = "Test";
/// Metadata attached to every minted offset
pub const NFT_METADATA_CID: &str = "QmTy8fATSsEJazSekXTyZHuqEFu2H9sqYQGmaBvMW8jTxN";

/// Offset collection administration: creation, minting and KYC
#[async_trait]
pub trait NftAdmin: HemHandle {
    /// Create a KYC-gated collection with this account as treasury
    async fn create_nft(&self) -> Result<TokenId, HemError> {
        let token_id = self.ledger().create_nft(NFT_NAME, NFT_SYMBOL, true).await?;
        info!(%token_id, "Created NFT collection");
        Ok(token_id)
    }

    async fn create_nft_no_kyc(&self) -> Result<TokenId, HemError> {
        let token_id = self
            .ledger()
            .create_nft(NFT_NAME, NFT_SYMBOL, false)
            .await?;
        info!(%token_id, "Created NFT collection without KYC");
        Ok(token_id)
    }

    async fn mint_nfts(&self, token_id: TokenId, amount: usize) -> Result<Receipt, HemError> {
        let metadata = vec![NFT_METADATA_CID.as_bytes().to_vec(); amount];
        let receipt = self.ledger().mint_nfts(token_id, metadata).await?;
        info!(%token_id, amount, "Minted NFTs");
        Ok(receipt)
    }

    async fn grant_kyc(&self, account_id: AccountId, token_id: TokenId) -> Result<Receipt, HemError> {
        Ok(self.ledger().grant_kyc(account_id, token_id).await?)
    }

    /// Grant KYC to the escrow contract's account
    async fn grant_contract_kyc(&self, token_id: TokenId) -> Result<Receipt, HemError> {
        self.grant_kyc(self.contract_id().into(), token_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::tests::market;
    use hem_core::NftId;

    #[tokio::test]
    async fn test_minted_nfts_carry_cid() {
        let m = market().await;
        assert_eq!(m.ledger.token_name(m.token).as_deref(), Some(NFT_NAME));
        for serial in 1..=3 {
            assert_eq!(
                m.ledger.nft_metadata(NftId::new(m.token, serial)),
                Some(NFT_METADATA_CID.as_bytes().to_vec())
            );
        }
        assert_eq!(m.ledger.nft_metadata(NftId::new(m.token, 4)), None);
    }

    #[tokio::test]
    async fn test_kyc_requires_kyc_key() {
        let m = market().await;
        let token = m.admin.create_nft_no_kyc().await.unwrap();
        m.seller.associate_nft(token).await.unwrap();

        let result = m.admin.grant_kyc(m.seller.account_id(), token).await;
        assert!(matches!(
            result,
            Err(HemError::ContractRejection(status)) if status == "TOKEN_HAS_NO_KYC_KEY"
        ));

        // Collections without KYC transfer freely once associated
        m.admin.mint_nfts(token, 1).await.unwrap();
        m.admin
            .transfer_nft(m.seller.account_id(), token, 1)
            .await
            .unwrap();
        assert_eq!(m.seller.nft_balance(token).await.unwrap(), 1);
    }
}
