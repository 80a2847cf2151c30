use crate::context::Session;
use anyhow::Result;
use hem_client::{HemAccount, HemConfig, HemHandle, Network, NewAccount, NftAdmin, Role};
use hem_core::{ContractId, TokenId};

/// Funding of the collection administrator account, in HBAR
const NFT_ADMIN_BALANCE_HBAR: i64 = 100;

/// Collection created for a seller and a buyer
pub struct Seeded {
    pub nft_admin: HemAccount,
    pub nft_admin_account: NewAccount,
    pub token_id: TokenId,
}

pub async fn handle_seed_nfts_command(
    config: &HemConfig,
    network: Network,
    hem_contract_id: ContractId,
    amount: usize,
) -> Result<()> {
    let session = Session::new(config, network);
    let admin = session.account(&session.admin_credentials()?, hem_contract_id)?;
    let seller = session.account(&session.role_credentials(Role::Seller)?, hem_contract_id)?;
    let buyer = session.account(&session.role_credentials(Role::Buyer)?, hem_contract_id)?;

    let serials: Vec<i64> = (1..=amount as i64).collect();
    let seeded = seed(&session, &admin, &seller, &buyer, amount, &serials).await?;

    println!("✅ Seeded {} NFTs to {}", amount, seller.account_id());
    println!("NFT admin account: {}", seeded.nft_admin_account.account_id);
    println!("NFT admin key:     {}", seeded.nft_admin_account.private_key);
    println!("NFT id:            {}", seeded.token_id);
    Ok(())
}

/// Create a KYC collection administered by a fresh account, make it tradable
/// through the escrow and hand `serials` to the seller
pub async fn seed(
    session: &Session<'_>,
    admin: &HemAccount,
    seller: &HemAccount,
    buyer: &HemAccount,
    amount: usize,
    serials: &[i64],
) -> Result<Seeded> {
    let contract_id = admin.contract_id();
    let nft_admin_account = admin.create_account(NFT_ADMIN_BALANCE_HBAR, None).await?;
    let nft_admin = session.join(&nft_admin_account, contract_id)?;

    let token_id = nft_admin.create_nft().await?;
    nft_admin.mint_nfts(token_id, amount).await?;

    seller.associate_nft(token_id).await?;
    buyer.associate_nft(token_id).await?;
    nft_admin.associate_offsets(&[token_id]).await?;

    nft_admin.grant_kyc(seller.account_id(), token_id).await?;
    nft_admin.grant_kyc(buyer.account_id(), token_id).await?;
    nft_admin.grant_contract_kyc(token_id).await?;

    if !serials.is_empty() {
        nft_admin
            .transfer_nfts(seller.account_id(), token_id, serials)
            .await?;
    }

    Ok(Seeded {
        nft_admin,
        nft_admin_account,
        token_id,
    })
}
