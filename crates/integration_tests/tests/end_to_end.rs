use hem_client::test_helpers::FakeLedger;
use hem_client::{
    deploy_hem, ContractArtifact, DeployOptions, HemAccount, HemConfig, HemError, HemHandle,
    NftAdmin, PricingAdmin, WhitelistAdmin,
};
use hem_core::rate::{cents_to_tinybar, DEFAULT_TINYBAR_PER_CENT};
use hem_core::{AccountId, TokenId};
use num_bigint::BigUint;
use std::sync::Arc;

struct Escrow {
    ledger: FakeLedger,
    admin: HemAccount,
    nft_admin: HemAccount,
    alice: HemAccount,
    bob: HemAccount,
    token: TokenId,
}

impl Escrow {
    /// Deploy both contracts and seed ten offsets, serial 1 held by alice
    async fn setup() -> Self {
        let ledger = FakeLedger::new();
        let config = HemConfig::default();
        let artifact = ContractArtifact::new("0x608060405234801561001057600080fd5b50").unwrap();
        let deployment = deploy_hem(
            &ledger,
            &artifact,
            &artifact,
            &config.deploy,
            &config.gas,
            &DeployOptions::default(),
        )
        .await
        .unwrap();
        let hem_id = deployment.hem_id;

        let admin = HemAccount::new(Arc::new(ledger.clone()), hem_id);
        let join = |account_id: AccountId, key: &str| {
            HemAccount::new(Arc::new(ledger.as_operator(account_id, key).unwrap()), hem_id)
        };
        let nft_admin = admin.create_account(100, None).await.unwrap();
        let nft_admin = join(nft_admin.account_id, &nft_admin.private_key);
        let alice = admin.create_account(100, None).await.unwrap();
        let alice = join(alice.account_id, &alice.private_key);
        let bob = admin.create_account(100, None).await.unwrap();
        let bob = join(bob.account_id, &bob.private_key);

        let token = nft_admin.create_nft().await.unwrap();
        nft_admin.mint_nfts(token, 10).await.unwrap();
        alice.associate_nft(token).await.unwrap();
        bob.associate_nft(token).await.unwrap();
        nft_admin.associate_offsets(&[token]).await.unwrap();
        nft_admin.grant_kyc(alice.account_id(), token).await.unwrap();
        nft_admin.grant_kyc(bob.account_id(), token).await.unwrap();
        nft_admin.grant_contract_kyc(token).await.unwrap();
        nft_admin
            .transfer_nft(alice.account_id(), token, 1)
            .await
            .unwrap();

        Self {
            ledger,
            admin,
            nft_admin,
            alice,
            bob,
            token,
        }
    }
}

fn cents(value: u32) -> BigUint {
    BigUint::from(value)
}

#[tokio::test]
async fn test_deployment_wires_validator_and_rate() {
    let escrow = Escrow::setup().await;
    assert_eq!(escrow.ledger.contract_count(), 2);
    assert_eq!(
        escrow.admin.get_tinybar_per_cent().await.unwrap(),
        BigUint::from(DEFAULT_TINYBAR_PER_CENT)
    );
    assert_eq!(escrow.alice.nft_balance(escrow.token).await.unwrap(), 1);
    assert_eq!(escrow.nft_admin.nft_balance(escrow.token).await.unwrap(), 9);
}

#[tokio::test]
async fn test_full_listing_and_purchase_flow() {
    let escrow = Escrow::setup().await;
    let Escrow {
        admin,
        alice,
        bob,
        token,
        ..
    } = &escrow;
    let token = *token;

    admin
        .whitelist_list(alice.account_id(), &[token], &[1], &[cents(5)])
        .await
        .unwrap();
    let offset = admin.get_offset(token, 1).await.unwrap();
    assert_eq!(offset.seller, AccountId::default());

    alice.list(&[token], &[1], &[cents(5)]).await.unwrap();
    let offset = admin.get_offset(token, 1).await.unwrap();
    assert_eq!(offset.seller, alice.account_id());
    assert_eq!(offset.price, cents(5));
    assert!(offset.hem_approved);
    assert!(offset.user_approved);
    assert_eq!(alice.nft_balance(token).await.unwrap(), 0);
    assert_eq!(admin.contract_nft_balance(token).await.unwrap(), 1);

    admin
        .whitelist_purchase(bob.account_id(), &[token], &[1])
        .await
        .unwrap();
    let entry = admin.get_purchase_whitelist(token, 1).await.unwrap();
    assert_eq!(entry.buyer, bob.account_id());
    assert_eq!(entry.price, cents(5));

    let alice_before = alice.hbar_balance().await.unwrap();
    let bob_before = bob.hbar_balance().await.unwrap();

    let rate = admin.get_tinybar_per_cent().await.unwrap();
    let price = cents_to_tinybar(&cents(5), &rate);
    assert_eq!(price, BigUint::from(87_616_455u64));
    bob.purchase(&[token], &[1], &price).await.unwrap();

    assert_eq!(alice.hbar_balance().await.unwrap() - alice_before, 87_616_455);
    assert_eq!(bob_before - bob.hbar_balance().await.unwrap(), 137_616_455);
    assert_eq!(bob.nft_owner(token, 1).await.unwrap(), bob.account_id());
    assert_eq!(admin.contract_nft_balance(token).await.unwrap(), 0);

    let offset = admin.get_offset(token, 1).await.unwrap();
    assert_eq!(offset.seller, AccountId::default());
    assert_eq!(offset.price, cents(0));
}

#[tokio::test]
async fn test_underpaid_purchase_is_rejected() {
    let escrow = Escrow::setup().await;
    let Escrow {
        admin,
        alice,
        bob,
        token,
        ..
    } = &escrow;
    let token = *token;

    admin
        .set_tinybar_per_cent(&BigUint::from(100_000_000u64))
        .await
        .unwrap();
    admin
        .whitelist_list(alice.account_id(), &[token], &[1], &[cents(5)])
        .await
        .unwrap();
    alice.list(&[token], &[1], &[cents(5)]).await.unwrap();
    admin
        .whitelist_purchase(bob.account_id(), &[token], &[1])
        .await
        .unwrap();

    // Payment computed at the old rate no longer covers 5 cents
    let stale = cents_to_tinybar(&cents(5), &BigUint::from(DEFAULT_TINYBAR_PER_CENT));
    let result = bob.purchase(&[token], &[1], &stale).await;
    assert!(matches!(
        result,
        Err(HemError::ContractRejection(reason)) if reason == "not enough funds to purchase"
    ));
    assert_eq!(admin.contract_nft_balance(token).await.unwrap(), 1);
}

#[tokio::test]
async fn test_mismatched_listing_is_rejected() {
    let escrow = Escrow::setup().await;
    let result = escrow
        .alice
        .list(&[escrow.token], &[1, 2], &[cents(5)])
        .await;
    assert!(matches!(
        result,
        Err(HemError::ContractRejection(reason)) if reason == "nft length does not match"
    ));
}

#[tokio::test]
async fn test_purchase_without_whitelist_is_rejected() {
    let escrow = Escrow::setup().await;
    let Escrow {
        admin,
        alice,
        bob,
        token,
        ..
    } = &escrow;
    let token = *token;

    admin
        .whitelist_list(alice.account_id(), &[token], &[1], &[cents(5)])
        .await
        .unwrap();
    alice.list(&[token], &[1], &[cents(5)]).await.unwrap();

    let result = bob
        .purchase(&[token], &[1], &BigUint::from(87_616_455u64))
        .await;
    assert!(matches!(
        result,
        Err(HemError::ContractRejection(reason)) if reason == "not whitelisted"
    ));
}

#[tokio::test]
async fn test_never_listed_offset_reads_empty() {
    let escrow = Escrow::setup().await;
    let offset = escrow.bob.get_offset(escrow.token, 7).await.unwrap();
    assert_eq!(offset.seller, AccountId::default());
    assert_eq!(offset.price, cents(0));
    assert!(!offset.hem_approved);
    assert!(!offset.user_approved);
}
