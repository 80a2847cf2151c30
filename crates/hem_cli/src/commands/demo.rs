use crate::commands::deploy::deploy;
use crate::commands::offset::print_offset;
use crate::commands::pricing::oracle;
use crate::commands::seed::seed;
use crate::context::Session;
use anyhow::Result;
use hem_client::{
    BalanceOwner, HemAccount, HemConfig, HemHandle, Ledger, Network, PricingAdmin, WhitelistAdmin,
};
use hem_core::rate::{cents_to_tinybar, DEFAULT_TINYBAR_PER_CENT, TINYBAR_PER_HBAR};
use hem_core::TokenId;
use num_bigint::BigUint;
use tracing::warn;

const ACCOUNT_BALANCE_HBAR: i64 = 100;
const MINTED: usize = 10;
const SERIAL: i64 = 1;
const PRICE_IN_CENTS: u32 = 5;

struct Parties<'a> {
    admin: &'a HemAccount,
    alice: &'a HemAccount,
    bob: &'a HemAccount,
}

pub async fn handle_demo_command(config: &HemConfig, network: Network) -> Result<()> {
    let session = Session::new(config, network);
    let admin_credentials = session.admin_credentials()?;

    let deployment = deploy(&session, &admin_credentials).await?;
    let hem_id = deployment.hem_id;
    println!("✅ Hem contract deployed: {}", hem_id);

    let admin = session.account(&admin_credentials, hem_id)?;
    let tinybar_per_cent = live_rate(&session).await?;
    admin.set_tinybar_per_cent(&tinybar_per_cent).await?;

    let alice = session.join(&admin.create_account(ACCOUNT_BALANCE_HBAR, None).await?, hem_id)?;
    let bob = session.join(&admin.create_account(ACCOUNT_BALANCE_HBAR, None).await?, hem_id)?;

    let seeded = seed(&session, &admin, &alice, &bob, MINTED, &[SERIAL]).await?;
    let token = seeded.token_id;
    let parties = Parties {
        admin: &admin,
        alice: &alice,
        bob: &bob,
    };

    println!("\n==== ACCOUNTS ====");
    println!("admin:     {}", admin.account_id());
    println!("nft admin: {}", seeded.nft_admin.account_id());
    println!("alice:     {}", alice.account_id());
    println!("bob:       {}", bob.account_id());
    print_balances(&parties, token).await?;
    println!("\ntinybarPerCent: {}", admin.get_tinybar_per_cent().await?);

    let prices = [BigUint::from(PRICE_IN_CENTS)];

    println!("\n==== STEP 1: whitelist listing ====");
    admin
        .whitelist_list(alice.account_id(), &[token], &[SERIAL], &prices)
        .await?;
    print_offset(&admin.get_offset(token, SERIAL).await?);

    println!("\n==== STEP 2: alice lists ====");
    alice.list(&[token], &[SERIAL], &prices).await?;
    print_offset(&admin.get_offset(token, SERIAL).await?);
    print_balances(&parties, token).await?;

    println!("\n==== STEP 3: whitelist purchase ====");
    admin
        .whitelist_purchase(bob.account_id(), &[token], &[SERIAL])
        .await?;
    let entry = admin.get_purchase_whitelist(token, SERIAL).await?;
    println!("  buyer: {}  price: {}", entry.buyer, entry.price);

    println!("\n==== STEP 4: bob purchases ====");
    let rate = admin.get_tinybar_per_cent().await?;
    let price_in_tinybar = cents_to_tinybar(&prices[0], &rate);
    println!("  price: {} tinybar", price_in_tinybar);
    bob.purchase(&[token], &[SERIAL], &price_in_tinybar).await?;

    print_offset(&admin.get_offset(token, SERIAL).await?);
    print_balances(&parties, token).await?;

    println!("\n✅ Demo complete");
    Ok(())
}

/// Live rate from the price feed; the simulated network falls back to the default
async fn live_rate(session: &Session<'_>) -> Result<BigUint> {
    match oracle(session.config).get_tinybar_per_cent().await {
        Ok(rate) => Ok(rate),
        Err(e) if session.network == Network::Simulated => {
            warn!("{}, using {} tinybar per cent", e, DEFAULT_TINYBAR_PER_CENT);
            Ok(BigUint::from(DEFAULT_TINYBAR_PER_CENT))
        }
        Err(e) => Err(e.into()),
    }
}

async fn print_balances(parties: &Parties<'_>, token: TokenId) -> Result<()> {
    println!("\n==== HBAR BALANCE ====");
    println!("alice:    {}", hbar(parties.alice.hbar_balance().await?));
    println!("bob:      {}", hbar(parties.bob.hbar_balance().await?));
    println!(
        "contract: {}",
        hbar(
            parties
                .admin
                .ledger()
                .hbar_balance(BalanceOwner::Contract(parties.admin.contract_id()))
                .await?
        )
    );

    println!("\n==== NFTs BALANCE ====");
    println!("alice:    {}", parties.alice.nft_balance(token).await?);
    println!("bob:      {}", parties.bob.nft_balance(token).await?);
    println!("contract: {}", parties.admin.contract_nft_balance(token).await?);

    println!("\n==== NFT OWNER ====");
    println!("{}/{}: {}", token, SERIAL, parties.admin.nft_owner(token, SERIAL).await?);
    Ok(())
}

fn hbar(tinybar: i64) -> String {
    format!("{:.8} HBAR", tinybar as f64 / TINYBAR_PER_HBAR as f64)
}
