use crate::context::Session;
use anyhow::Result;
use hem_client::{HemConfig, Network};
use hem_core::{ContractId, Offset, TokenId};

pub async fn handle_get_offset_command(
    config: &HemConfig,
    network: Network,
    hem_contract_id: ContractId,
    token_id: TokenId,
    serial: i64,
) -> Result<()> {
    let session = Session::new(config, network);
    let admin = session.account(&session.admin_credentials()?, hem_contract_id)?;

    let offset = admin.get_offset(token_id, serial).await?;
    println!("Offset {}/{}", token_id, serial);
    print_offset(&offset);
    Ok(())
}

pub fn print_offset(offset: &Offset) {
    println!("  seller:       {}", offset.seller);
    println!("  price:        {} cents", offset.price);
    println!("  hemApproved:  {}", offset.hem_approved);
    println!("  userApproved: {}", offset.user_approved);
}
