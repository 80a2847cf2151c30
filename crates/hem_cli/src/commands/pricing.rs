use crate::context::Session;
use anyhow::Result;
use hem_client::{CoinMarketCapClient, HemConfig, PriceOracle, PricingAdmin};
use hem_core::ContractId;
use num_bigint::BigUint;

pub async fn handle_set_tinybar_per_cent_command(
    config: &HemConfig,
    hem_contract_id: ContractId,
    rate: i64,
) -> Result<()> {
    let session = Session::new(config, config.network);
    let admin = session.account(&session.admin_credentials()?, hem_contract_id)?;

    let tinybar_per_cent = if rate > 0 {
        BigUint::from(rate as u64)
    } else {
        oracle(config).get_tinybar_per_cent().await?
    };

    println!("setTinybarPerCent({}, {})", hem_contract_id, tinybar_per_cent);
    admin.set_tinybar_per_cent(&tinybar_per_cent).await?;

    let stored = admin.get_tinybar_per_cent().await?;
    println!("✅ tinybarPerCent set to: {}", stored);
    Ok(())
}

pub async fn handle_rate_command(config: &HemConfig) -> Result<()> {
    let oracle = oracle(config);
    match oracle.get_hbar_price().await? {
        Some(usd_per_hbar) => println!("HBAR price: ${}", usd_per_hbar),
        None => println!("❌ No HBAR price in the feed response"),
    }

    let tinybar_per_cent = oracle.get_tinybar_per_cent().await?;
    println!("Tinybar per cent: {}", tinybar_per_cent);
    println!("Tinybar per USD:  {}", &tinybar_per_cent * 100u32);
    Ok(())
}

pub fn oracle(config: &HemConfig) -> PriceOracle<CoinMarketCapClient> {
    PriceOracle::new(CoinMarketCapClient::new(config.price_feed.clone()))
}
