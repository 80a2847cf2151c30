use crate::context::Session;
use anyhow::Result;
use hem_client::{deploy_hem, DeployOptions, Deployment, HemConfig, Network};

pub async fn handle_deploy_command(config: &HemConfig, network: Network) -> Result<()> {
    let session = Session::new(config, network);
    let admin = session.admin_credentials()?;
    let deployment = deploy(&session, &admin).await?;

    println!("✅ Deployed on {}", network);
    println!("NFT validator contract: {}", deployment.nft_validator_id);
    println!("Hem contract:           {}", deployment.hem_id);
    Ok(())
}

/// Deploy both contracts signed by `admin`
pub async fn deploy(session: &Session<'_>, admin: &hem_client::Credentials) -> Result<Deployment> {
    let ledger = session.ledger(admin)?;
    let (nft_validator, hem) = session.artifacts()?;
    let deployment = deploy_hem(
        ledger.as_ref(),
        &nft_validator,
        &hem,
        &session.config.deploy,
        &session.config.gas,
        &DeployOptions::default(),
    )
    .await?;
    Ok(deployment)
}
