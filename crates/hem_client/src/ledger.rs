//! Ledger boundary: the operations the escrow client needs from a Hedera network
//!
//! Each implementation is bound to one operator account that signs every
//! transaction it submits. Mutating operations wait for the finality receipt
//! before returning.

use std::time::Duration;

use async_trait::async_trait;
use hem_core::{AccountId, ContractId, FileId, NftId, Receipt, TokenId, TopicId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The receipt reported a non-success status; the status string is kept verbatim
    #[error("{0}")]
    Rejected(String),
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Receipt is missing the {0}")]
    MissingReceiptField(&'static str),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Invalid entity id: {0}")]
    InvalidId(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Account or contract whose balance is queried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceOwner {
    Account(AccountId),
    Contract(ContractId),
}

/// Freshly created account and its private key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub account_id: AccountId,
    pub private_key: String,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Account that signs and pays for every transaction
    fn operator(&self) -> AccountId;

    /// Create a file keyed by the operator holding `contents`
    async fn create_file(&self, contents: &[u8]) -> Result<FileId, LedgerError>;

    async fn append_file(
        &self,
        file_id: FileId,
        chunk: &[u8],
        valid_duration: Duration,
    ) -> Result<(), LedgerError>;

    async fn create_contract(
        &self,
        bytecode_file_id: FileId,
        gas: u64,
        constructor_parameters: Option<Vec<u8>>,
    ) -> Result<ContractId, LedgerError>;

    async fn execute_contract(
        &self,
        contract_id: ContractId,
        gas: u64,
        payable_tinybar: Option<i64>,
        call_data: Vec<u8>,
    ) -> Result<Receipt, LedgerError>;

    /// Read-only call; returns the raw ABI-encoded result
    async fn call_contract(
        &self,
        contract_id: ContractId,
        gas: u64,
        payment_tinybar: i64,
        call_data: Vec<u8>,
    ) -> Result<Vec<u8>, LedgerError>;

    /// Create an account; a key is generated when none is given
    async fn create_account(
        &self,
        private_key: Option<&str>,
        initial_balance_hbar: i64,
    ) -> Result<NewAccount, LedgerError>;

    async fn create_topic(&self) -> Result<TopicId, LedgerError>;

    /// Balance in tinybar
    async fn hbar_balance(&self, owner: BalanceOwner) -> Result<i64, LedgerError>;

    /// Token balance; zero when the owner holds none
    async fn token_balance(&self, owner: BalanceOwner, token_id: TokenId)
        -> Result<u64, LedgerError>;

    async fn nft_owner(&self, nft_id: NftId) -> Result<AccountId, LedgerError>;

    /// Transfer NFTs from the operator to `to`
    async fn transfer_nfts(
        &self,
        token_id: TokenId,
        serials: &[i64],
        to: AccountId,
    ) -> Result<Receipt, LedgerError>;

    async fn associate_tokens(
        &self,
        account_id: AccountId,
        token_ids: &[TokenId],
    ) -> Result<Receipt, LedgerError>;

    /// Create an NFT collection with the operator as treasury and supply key
    async fn create_nft(&self, name: &str, symbol: &str, kyc: bool)
        -> Result<TokenId, LedgerError>;

    async fn mint_nfts(&self, token_id: TokenId, metadata: Vec<Vec<u8>>)
        -> Result<Receipt, LedgerError>;

    async fn grant_kyc(&self, account_id: AccountId, token_id: TokenId)
        -> Result<Receipt, LedgerError>;
}
