//! Account facade over the escrow contract
//!
//! [`HemAccount`] binds one signing identity to one deployed escrow and
//! exposes the capabilities every account has. Administrative capabilities
//! are separate traits ([`PricingAdmin`], [`WhitelistAdmin`], [`NftAdmin`])
//! built on [`HemHandle`], so a caller picks the roles an account holds.

mod nft_admin;
mod pricing;
mod whitelist;

pub use nft_admin::{NftAdmin, NFT_METADATA_CID, NFT_NAME, NFT_SYMBOL};
pub use pricing::PricingAdmin;
pub use whitelist::WhitelistAdmin;

use std::sync::Arc;

use alloy_sol_types::SolCall;
use async_trait::async_trait;
use hem_core::rate::{padded_payment, tinybar_to_i64};
use hem_core::{
    from_u256, to_u256_array, AbiError, AccountId, ContractId, IdError, NftId, Offset,
    PurchaseWhitelistEntry, Receipt, TokenId, TopicId,
};
use num_bigint::BigUint;
use tracing::{debug, info};

use crate::config::GasSchedule;
use crate::contract::Hem;
use crate::error::HemError;
use crate::ledger::{BalanceOwner, Ledger, NewAccount};

type SolAddress = alloy_primitives::Address;

pub(crate) fn sol_address(account_id: AccountId) -> Result<SolAddress, IdError> {
    Ok(account_id.to_solidity_address()?.into())
}

pub(crate) fn token_address(token_id: TokenId) -> Result<SolAddress, IdError> {
    Ok(token_id.to_solidity_address()?.into())
}

/// Solidity addresses of a list of tokens
pub(crate) fn token_addresses(tokens: &[TokenId]) -> Result<Vec<SolAddress>, IdError> {
    tokens.iter().copied().map(token_address).collect()
}

/// Client handle shared by every role
#[async_trait]
pub trait HemHandle: Send + Sync {
    fn ledger(&self) -> &dyn Ledger;

    fn contract_id(&self) -> ContractId;

    fn gas(&self) -> &GasSchedule;

    /// Signing account
    fn account_id(&self) -> AccountId {
        self.ledger().operator()
    }

    /// Submit a state-changing call and wait for its receipt
    async fn execute_function<C>(
        &self,
        call: C,
        payable_tinybar: Option<i64>,
    ) -> Result<Receipt, HemError>
    where
        C: SolCall + Send + 'static,
    {
        let call_data = call.abi_encode();
        debug!(
            function = C::SIGNATURE,
            contract_id = %self.contract_id(),
            ?payable_tinybar,
            "Executing contract function"
        );

        let receipt = self
            .ledger()
            .execute_contract(
                self.contract_id(),
                self.gas().execute,
                payable_tinybar,
                call_data,
            )
            .await?;
        if !receipt.is_success() {
            return Err(HemError::ContractRejection(receipt.status));
        }
        Ok(receipt)
    }

    /// Read-only call paid with the configured query payment
    async fn query_function<C>(&self, call: C) -> Result<C::Return, HemError>
    where
        C: SolCall + Send + 'static,
    {
        let call_data = call.abi_encode();
        let bytes = self
            .ledger()
            .call_contract(
                self.contract_id(),
                self.gas().query,
                self.gas().query_payment_tinybar,
                call_data,
            )
            .await?;
        Ok(C::abi_decode_returns(&bytes, true).map_err(AbiError::from)?)
    }
}

/// One account acting on one escrow contract
#[derive(Clone)]
pub struct HemAccount {
    ledger: Arc<dyn Ledger>,
    contract_id: ContractId,
    gas: GasSchedule,
}

impl std::fmt::Debug for HemAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HemAccount")
            .field("account_id", &self.ledger.operator())
            .field("contract_id", &self.contract_id)
            .finish()
    }
}

#[async_trait]
impl HemHandle for HemAccount {
    fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }

    fn contract_id(&self) -> ContractId {
        self.contract_id
    }

    fn gas(&self) -> &GasSchedule {
        &self.gas
    }
}

impl PricingAdmin for HemAccount {}
impl WhitelistAdmin for HemAccount {}
impl NftAdmin for HemAccount {}

impl HemAccount {
    pub fn new(ledger: Arc<dyn Ledger>, contract_id: ContractId) -> Self {
        Self {
            ledger,
            contract_id,
            gas: GasSchedule::default(),
        }
    }

    pub fn with_gas(mut self, gas: GasSchedule) -> Self {
        self.gas = gas;
        self
    }

    /// Create an account funded by this one; a key is generated when none is given
    pub async fn create_account(
        &self,
        initial_balance_hbar: i64,
        private_key: Option<&str>,
    ) -> Result<NewAccount, HemError> {
        let account = self
            .ledger
            .create_account(private_key, initial_balance_hbar)
            .await?;
        info!(account_id = %account.account_id, initial_balance_hbar, "Created account");
        Ok(account)
    }

    pub async fn create_topic(&self) -> Result<TopicId, HemError> {
        Ok(self.ledger.create_topic().await?)
    }

    /// HBAR balance of this account in tinybar
    pub async fn hbar_balance(&self) -> Result<i64, HemError> {
        Ok(self
            .ledger
            .hbar_balance(BalanceOwner::Account(self.account_id()))
            .await?)
    }

    /// Number of NFTs of `token_id` held by this account
    pub async fn nft_balance(&self, token_id: TokenId) -> Result<u64, HemError> {
        Ok(self
            .ledger
            .token_balance(BalanceOwner::Account(self.account_id()), token_id)
            .await?)
    }

    pub async fn nft_owner(&self, token_id: TokenId, serial: i64) -> Result<AccountId, HemError> {
        Ok(self.ledger.nft_owner(NftId::new(token_id, serial)).await?)
    }

    pub async fn transfer_nft(
        &self,
        to: AccountId,
        token_id: TokenId,
        serial: i64,
    ) -> Result<Receipt, HemError> {
        self.transfer_nfts(to, token_id, &[serial]).await
    }

    pub async fn transfer_nfts(
        &self,
        to: AccountId,
        token_id: TokenId,
        serials: &[i64],
    ) -> Result<Receipt, HemError> {
        let receipt = self.ledger.transfer_nfts(token_id, serials, to).await?;
        info!(%token_id, ?serials, from = %self.account_id(), %to, "Transferred NFTs");
        Ok(receipt)
    }

    pub async fn associate_nft(&self, token_id: TokenId) -> Result<Receipt, HemError> {
        Ok(self
            .ledger
            .associate_tokens(self.account_id(), &[token_id])
            .await?)
    }

    /// Associate the escrow contract with the given tokens
    pub async fn associate_offsets(&self, token_ids: &[TokenId]) -> Result<Receipt, HemError> {
        let call = Hem::associateOffsetsCall {
            tokens: token_addresses(token_ids)?,
        };
        self.execute_function(call, None).await
    }

    /// Listing state of one offset; unlisted offsets have seller `0.0.0` and price 0
    pub async fn get_offset(&self, token_id: TokenId, serial: i64) -> Result<Offset, HemError> {
        let call = Hem::getOffsetCall {
            token: token_address(token_id)?,
            serial,
        };
        let offset = self.query_function(call).await?;

        Ok(Offset {
            seller: AccountId::from_solidity_address(&offset.seller.into()),
            price: from_u256(offset.price),
            hem_approved: offset.hemApproved,
            user_approved: offset.userApproved,
        })
    }

    pub async fn get_purchase_whitelist(
        &self,
        token_id: TokenId,
        serial: i64,
    ) -> Result<PurchaseWhitelistEntry, HemError> {
        let call = Hem::getPurchaseWhitelistCall {
            token: token_address(token_id)?,
            serial,
        };
        let entry = self.query_function(call).await?;

        Ok(PurchaseWhitelistEntry {
            buyer: AccountId::from_solidity_address(&entry.buyer.into()),
            price: from_u256(entry.price),
            hem_approved: entry.hemApproved,
        })
    }

    pub async fn get_pending_listings(&self, seller: AccountId) -> Result<Vec<[u8; 32]>, HemError> {
        let call = Hem::getPendingListingsCall {
            seller: sol_address(seller)?,
        };
        let pending = self.query_function(call).await?.pending;
        Ok(pending.into_iter().map(|hash| hash.0).collect())
    }

    pub async fn get_pending_purchases(&self, buyer: AccountId) -> Result<Vec<[u8; 32]>, HemError> {
        let call = Hem::getPendingPurchasesCall {
            buyer: sol_address(buyer)?,
        };
        let pending = self.query_function(call).await?.pending;
        Ok(pending.into_iter().map(|hash| hash.0).collect())
    }

    /// List NFTs owned by this account at minimum prices in cents.
    ///
    /// The arrays are positional and are passed to the contract as given.
    pub async fn list(
        &self,
        token_ids: &[TokenId],
        serials: &[i64],
        prices_in_cents: &[BigUint],
    ) -> Result<Receipt, HemError> {
        let call = Hem::list_offsetCall {
            seller: sol_address(self.account_id())?,
            tokens: token_addresses(token_ids)?,
            serials: serials.to_vec(),
            prices: to_u256_array(prices_in_cents)?,
        };

        let receipt = self.execute_function(call, None).await?;
        info!(seller = %self.account_id(), ?serials, "Listed offsets");
        Ok(receipt)
    }

    /// Purchase whitelisted offsets.
    ///
    /// `price_in_tinybar` is padded by 0.5 HBAR before it is attached as the
    /// payable amount.
    pub async fn purchase(
        &self,
        token_ids: &[TokenId],
        serials: &[i64],
        price_in_tinybar: &BigUint,
    ) -> Result<Receipt, HemError> {
        let payment = tinybar_to_i64(&padded_payment(price_in_tinybar))?;

        let call = Hem::purchase_offsetCall {
            buyer: sol_address(self.account_id())?,
            tokens: token_addresses(token_ids)?,
            serials: serials.to_vec(),
        };

        let receipt = self.execute_function(call, Some(payment)).await?;
        info!(buyer = %self.account_id(), ?serials, payment, "Purchased offsets");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{CallKind, FakeLedger};
    use alloy_sol_types::SolConstructor;
    use hem_core::rate::DEFAULT_TINYBAR_PER_CENT;

    /// Admin, seller and buyer around one freshly deployed escrow holding
    /// serial 1 of a KYC token with the seller
    pub(crate) struct Market {
        pub ledger: FakeLedger,
        pub admin: HemAccount,
        pub seller: HemAccount,
        pub buyer: HemAccount,
        pub token: TokenId,
    }

    pub(crate) async fn market() -> Market {
        let ledger = FakeLedger::new();
        let file = ledger.create_file(b"6080").await.unwrap();
        let constructor = Hem::constructorCall {
            nftValidator: alloy_primitives::Address::ZERO,
            tinybarPerCent: alloy_primitives::U256::from(DEFAULT_TINYBAR_PER_CENT),
            testMode: false,
        };
        let contract_id = ledger
            .create_contract(file, 3_000_000, Some(constructor.abi_encode()))
            .await
            .unwrap();

        let admin = HemAccount::new(Arc::new(ledger.clone()), contract_id);
        let account = |created: NewAccount| {
            let handle = ledger
                .as_operator(created.account_id, &created.private_key)
                .unwrap();
            HemAccount::new(Arc::new(handle), contract_id)
        };
        let seller = account(admin.create_account(100, None).await.unwrap());
        let buyer = account(admin.create_account(100, None).await.unwrap());

        let token = admin.create_nft().await.unwrap();
        admin.mint_nfts(token, 3).await.unwrap();
        for party in [&seller, &buyer] {
            party.associate_nft(token).await.unwrap();
            admin.grant_kyc(party.account_id(), token).await.unwrap();
        }
        admin.associate_offsets(&[token]).await.unwrap();
        admin.grant_contract_kyc(token).await.unwrap();
        admin
            .transfer_nft(seller.account_id(), token, 1)
            .await
            .unwrap();

        Market {
            ledger,
            admin,
            seller,
            buyer,
            token,
        }
    }

    #[tokio::test]
    async fn test_never_listed_offset_is_empty() {
        let m = market().await;
        for _ in 0..2 {
            let offset = m.admin.get_offset(m.token, 3).await.unwrap();
            assert_eq!(offset.seller, AccountId::default());
            assert_eq!(offset.price, BigUint::default());
            assert!(!offset.is_listed());
        }

        let call = m.ledger.last_contract_call().unwrap();
        assert_eq!(call.kind, CallKind::Query);
        assert_eq!(call.gas, 500_000);
        assert_eq!(call.tinybar, Some(100_000_000));
    }

    #[tokio::test]
    async fn test_list_round_trip() {
        let m = market().await;
        let prices = [BigUint::from(5u8)];
        m.admin
            .whitelist_list(m.seller.account_id(), &[m.token], &[1], &prices)
            .await
            .unwrap();
        assert_eq!(
            m.admin
                .get_pending_listings(m.seller.account_id())
                .await
                .unwrap()
                .len(),
            1
        );

        m.seller.list(&[m.token], &[1], &prices).await.unwrap();

        let offset = m.admin.get_offset(m.token, 1).await.unwrap();
        assert_eq!(offset.seller, m.seller.account_id());
        assert_eq!(offset.price, BigUint::from(5u8));
        assert!(offset.hem_approved && offset.user_approved);
        assert!(m
            .admin
            .get_pending_listings(m.seller.account_id())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(m.seller.nft_balance(m.token).await.unwrap(), 0);
        assert_eq!(m.admin.contract_nft_balance(m.token).await.unwrap(), 1);
        assert_eq!(
            m.admin.nft_owner(m.token, 1).await.unwrap(),
            AccountId::from(m.admin.contract_id())
        );

        let call = m.ledger.last_contract_call().unwrap();
        assert_eq!(call.selector, Some(Hem::getPendingListingsCall::SELECTOR));
    }

    #[tokio::test]
    async fn test_list_without_whitelist_is_rejected() {
        let m = market().await;
        let result = m.seller.list(&[m.token], &[1], &[BigUint::from(5u8)]).await;
        match result {
            Err(HemError::ContractRejection(status)) => assert_eq!(status, "not whitelisted"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_purchase_pads_payment() {
        let m = market().await;
        let prices = [BigUint::from(5u8)];
        m.admin
            .whitelist_list(m.seller.account_id(), &[m.token], &[1], &prices)
            .await
            .unwrap();
        m.seller.list(&[m.token], &[1], &prices).await.unwrap();
        m.admin
            .whitelist_purchase(m.buyer.account_id(), &[m.token], &[1])
            .await
            .unwrap();

        let entry = m.admin.get_purchase_whitelist(m.token, 1).await.unwrap();
        assert_eq!(entry.buyer, m.buyer.account_id());
        assert!(entry.hem_approved);

        let seller_before = m.seller.hbar_balance().await.unwrap();
        let price_in_tinybar = BigUint::from(DEFAULT_TINYBAR_PER_CENT) * 5u8;
        let receipt = m
            .buyer
            .purchase(&[m.token], &[1], &price_in_tinybar)
            .await
            .unwrap();
        assert!(receipt.is_success());

        let call = m.ledger.last_contract_call().unwrap();
        assert_eq!(call.selector, Some(Hem::purchase_offsetCall::SELECTOR));
        assert_eq!(call.kind, CallKind::Execute);
        assert_eq!(call.gas, 1_000_000);
        assert_eq!(call.tinybar, Some(137_616_455));

        assert_eq!(
            m.seller.hbar_balance().await.unwrap(),
            seller_before + 87_616_455
        );
        assert_eq!(m.admin.nft_owner(m.token, 1).await.unwrap(), m.buyer.account_id());
        assert!(!m.admin.get_offset(m.token, 1).await.unwrap().is_listed());
        assert!(m
            .buyer
            .get_pending_purchases(m.buyer.account_id())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_purchase_amount_must_fit_ledger() {
        let m = market().await;
        let too_large = BigUint::from(u64::MAX);
        let result = m.buyer.purchase(&[m.token], &[1], &too_large).await;
        assert!(matches!(result, Err(HemError::Rate(_))));
        assert!(m
            .ledger
            .contract_calls()
            .iter()
            .all(|c| c.selector != Some(Hem::purchase_offsetCall::SELECTOR)));
    }
}
