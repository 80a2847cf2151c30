mod commands;
mod context;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hem_client::{HemConfig, Network};
use hem_core::{AccountId, ContractId, TokenId};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hem")]
#[command(about = "Hem carbon-offset escrow client")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the NFT validator and the escrow contract
    Deploy { network: Network },
    /// Create an offset collection and hand the minted NFTs to the seller
    SeedNfts {
        network: Network,
        hem_contract_id: ContractId,
        amount: usize,
    },
    /// Store the exchange rate; a rate of 0 or less fetches the live one
    SetTinybarPerCent {
        hem_contract_id: ContractId,
        #[arg(allow_negative_numbers = true)]
        rate: i64,
    },
    /// Print the listing state of one offset
    GetOffset {
        network: Network,
        hem_contract_id: ContractId,
        token_id: TokenId,
        serial: i64,
    },
    /// Associate the escrow contract with an NFT collection
    AssociateTokenToContract {
        network: Network,
        account_id: AccountId,
        private_key: String,
        nft_id: TokenId,
        hem_contract_id: ContractId,
    },
    /// Move a serial range of NFTs between two accounts
    TransferTokens {
        network: Network,
        from_id: AccountId,
        from_key: String,
        to_id: AccountId,
        to_key: String,
        token_id: TokenId,
        serial_lo: i64,
        serial_hi: i64,
    },
    /// Print the live tinybar-per-cent rate
    Rate,
    /// Run the full listing and purchase flow
    Demo {
        #[arg(default_value = "simulated")]
        network: Network,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "hem=info,hem_client=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => HemConfig::from_file(path)?,
        None => HemConfig::load()?,
    };

    match cli.command {
        Commands::Deploy { network } => {
            commands::deploy::handle_deploy_command(&config, network).await?;
        }
        Commands::SeedNfts {
            network,
            hem_contract_id,
            amount,
        } => {
            commands::seed::handle_seed_nfts_command(&config, network, hem_contract_id, amount)
                .await?;
        }
        Commands::SetTinybarPerCent {
            hem_contract_id,
            rate,
        } => {
            commands::pricing::handle_set_tinybar_per_cent_command(&config, hem_contract_id, rate)
                .await?;
        }
        Commands::GetOffset {
            network,
            hem_contract_id,
            token_id,
            serial,
        } => {
            commands::offset::handle_get_offset_command(
                &config,
                network,
                hem_contract_id,
                token_id,
                serial,
            )
            .await?;
        }
        Commands::AssociateTokenToContract {
            network,
            account_id,
            private_key,
            nft_id,
            hem_contract_id,
        } => {
            commands::tokens::handle_associate_token_command(
                &config,
                network,
                account_id,
                &private_key,
                nft_id,
                hem_contract_id,
            )
            .await?;
        }
        Commands::TransferTokens {
            network,
            from_id,
            from_key,
            to_id,
            to_key,
            token_id,
            serial_lo,
            serial_hi,
        } => {
            let transfer = commands::tokens::Transfer {
                from: hem_client::Credentials::new(from_id, from_key),
                to: hem_client::Credentials::new(to_id, to_key),
                token_id,
                serials: serial_lo..=serial_hi,
            };
            commands::tokens::handle_transfer_tokens_command(&config, network, transfer).await?;
        }
        Commands::Rate => {
            commands::pricing::handle_rate_command(&config).await?;
        }
        Commands::Demo { network } => {
            commands::demo::handle_demo_command(&config, network).await?;
        }
    }

    Ok(())
}
