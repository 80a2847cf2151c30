use crate::context::Session;
use anyhow::Result;
use hem_client::{Credentials, HemConfig, HemHandle, Network};
use hem_core::{AccountId, ContractId, TokenId};
use std::ops::RangeInclusive;

/// NFT move between two accounts that both sign
pub struct Transfer {
    pub from: Credentials,
    pub to: Credentials,
    pub token_id: TokenId,
    pub serials: RangeInclusive<i64>,
}

pub async fn handle_associate_token_command(
    config: &HemConfig,
    network: Network,
    account_id: AccountId,
    private_key: &str,
    nft_id: TokenId,
    hem_contract_id: ContractId,
) -> Result<()> {
    let session = Session::new(config, network);
    let account = session.account(&Credentials::new(account_id, private_key), hem_contract_id)?;

    let receipt = account.associate_offsets(&[nft_id]).await?;
    println!("The transaction consensus status {}", receipt);
    Ok(())
}

pub async fn handle_transfer_tokens_command(
    config: &HemConfig,
    network: Network,
    transfer: Transfer,
) -> Result<()> {
    let session = Session::new(config, network);
    let sender = session.account(&transfer.from, ContractId::default())?;
    let receiver = session.account(&transfer.to, ContractId::default())?;

    receiver.associate_nft(transfer.token_id).await?;
    println!(
        "✅ {} associated with {}",
        receiver.account_id(),
        transfer.token_id
    );

    let serials: Vec<i64> = transfer.serials.collect();
    if serials.is_empty() {
        println!("❌ Empty serial range, nothing transferred");
        return Ok(());
    }

    let receipt = sender
        .transfer_nfts(receiver.account_id(), transfer.token_id, &serials)
        .await?;
    println!(
        "Transferred {} NFTs of {} from {} to {}: {}",
        serials.len(),
        transfer.token_id,
        sender.account_id(),
        receiver.account_id(),
        receipt
    );
    Ok(())
}
