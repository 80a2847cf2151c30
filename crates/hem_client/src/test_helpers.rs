//! In-memory ledger used by tests and the `simulated` network
//!
//! `FakeLedger` keeps accounts, files, tokens and deployed contracts in shared
//! state. Every contract behaves like the Hem escrow: call data is decoded
//! against the `Hem` interface and failing calls report the revert reason as
//! the receipt status. Clones made with [`FakeLedger::as_operator`] share the same state.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use alloy_primitives::U256;
use alloy_sol_types::{SolCall, SolInterface, SolValue};
use async_trait::async_trait;
use hem_core::rate::{cents_to_tinybar, tinybar_to_i64, TINYBAR_PER_HBAR};
use hem_core::{
    from_u256, keccak256, to_u256, AccountId, ContractId, FileId, NftId, Offset,
    PurchaseWhitelistEntry, Receipt, TokenId, TopicId, B256,
};
use num_bigint::BigUint;
use tracing::debug;

use crate::config::Network;
use crate::contract::Hem;
use crate::ledger::{BalanceOwner, Ledger, LedgerError, NewAccount};

type SolAddress = alloy_primitives::Address;

const GENESIS_BALANCE_TINYBAR: i64 = 5_000_000 * TINYBAR_PER_HBAR as i64;
const FIRST_ENTITY_NUM: u64 = 1001;
const ED25519_DER_PREFIX: &str = "302e020100300506032b657004220420";
const REVERT: &str = "CONTRACT_REVERT_EXECUTED";

type Status = &'static str;

fn rejected(status: &str) -> LedgerError {
    LedgerError::Rejected(status.to_string())
}

/// Deterministic DER-encoded key for a generated account
fn derive_key(num: u64) -> String {
    format!(
        "{}{}",
        ED25519_DER_PREFIX,
        hex::encode(keccak256(&num.to_be_bytes()))
    )
}

/// Whether a recorded call was a transaction or a read-only query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Execute,
    Query,
}

/// A contract call as submitted to the fake ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub kind: CallKind,
    pub payer: AccountId,
    pub contract_id: ContractId,
    /// First four bytes of the call data
    pub selector: Option<[u8; 4]>,
    pub gas: u64,
    /// Payable amount for executions, query payment for queries
    pub tinybar: Option<i64>,
}

#[derive(Debug, Default)]
struct AccountState {
    private_key: Option<String>,
    balance: i64,
    associations: HashSet<TokenId>,
    kyc: HashSet<TokenId>,
}

#[derive(Debug)]
struct NftState {
    owner: AccountId,
    metadata: Vec<u8>,
}

#[derive(Debug)]
struct TokenState {
    name: String,
    supply_key: AccountId,
    kyc_key: Option<AccountId>,
    nfts: BTreeMap<i64, NftState>,
}

#[derive(Debug)]
struct FileState {
    owner: AccountId,
    contents: Vec<u8>,
    appends: usize,
}

#[derive(Debug)]
struct ContractState {
    creator: AccountId,
    bytecode_file: FileId,
    constructor: Option<Vec<u8>>,
}

/// Escrow storage of one deployed contract
#[derive(Debug, Default)]
struct Escrow {
    tinybar_per_cent: BigUint,
    offsets: HashMap<NftId, Offset>,
    purchase_whitelist: HashMap<NftId, PurchaseWhitelistEntry>,
    pending_listings: HashMap<AccountId, Vec<[u8; 32]>>,
    pending_purchases: HashMap<AccountId, Vec<[u8; 32]>>,
}

fn account_id(address: SolAddress) -> AccountId {
    AccountId::from_solidity_address(&address.into())
}

fn token_id(address: SolAddress) -> TokenId {
    TokenId::from_solidity_address(&address.into())
}

fn sol_address(account_id: AccountId) -> Result<SolAddress, Status> {
    Ok(account_id.to_solidity_address().map_err(|_| REVERT)?.into())
}

/// A `(party, tokens[], serials[], prices[])` argument list, keyed by the
/// hash of its encoding
struct Batch {
    party: AccountId,
    nfts: Vec<NftId>,
    prices: Vec<BigUint>,
    hash: [u8; 32],
}

impl Batch {
    fn new(
        party: SolAddress,
        tokens: &[SolAddress],
        serials: &[i64],
        prices: Option<&[U256]>,
        args: &[u8],
    ) -> Result<Self, Status> {
        if tokens.len() != serials.len() || prices.is_some_and(|p| p.len() != tokens.len()) {
            return Err("nft length does not match");
        }

        let nfts = tokens
            .iter()
            .zip(serials)
            .map(|(token, serial)| NftId::new(token_id(*token), *serial))
            .collect();

        Ok(Self {
            party: account_id(party),
            nfts,
            prices: prices
                .unwrap_or_default()
                .iter()
                .copied()
                .map(from_u256)
                .collect(),
            hash: keccak256(args).0,
        })
    }
}

fn take_pending(pending: &mut HashMap<AccountId, Vec<[u8; 32]>>, party: AccountId, hash: &[u8; 32]) -> bool {
    let Some(hashes) = pending.get_mut(&party) else {
        return false;
    };
    match hashes.iter().position(|h| h == hash) {
        Some(index) => {
            hashes.remove(index);
            true
        }
        None => false,
    }
}

fn pending_hashes(pending: &HashMap<AccountId, Vec<[u8; 32]>>, party: SolAddress) -> Vec<B256> {
    pending
        .get(&account_id(party))
        .map(|hashes| hashes.iter().copied().map(B256::from).collect())
        .unwrap_or_default()
}

impl Escrow {
    fn query(&self, function: &Hem::HemCalls) -> Result<Vec<u8>, Status> {
        use Hem::HemCalls;

        let returns = match function {
            HemCalls::getTinybarPerCent(_) => {
                let rate = to_u256(&self.tinybar_per_cent).map_err(|_| REVERT)?;
                Hem::getTinybarPerCentCall::abi_encode_returns(&(rate,))
            }
            HemCalls::getOffset(call) => {
                let nft = NftId::new(token_id(call.token), call.serial);
                let offset = self.offsets.get(&nft).cloned().unwrap_or_default();
                Hem::getOffsetCall::abi_encode_returns(&(
                    sol_address(offset.seller)?,
                    to_u256(&offset.price).map_err(|_| REVERT)?,
                    offset.hem_approved,
                    offset.user_approved,
                ))
            }
            HemCalls::getPurchaseWhitelist(call) => {
                let nft = NftId::new(token_id(call.token), call.serial);
                let entry = self.purchase_whitelist.get(&nft).cloned().unwrap_or_default();
                Hem::getPurchaseWhitelistCall::abi_encode_returns(&(
                    sol_address(entry.buyer)?,
                    to_u256(&entry.price).map_err(|_| REVERT)?,
                    entry.hem_approved,
                ))
            }
            HemCalls::getPendingListings(call) => Hem::getPendingListingsCall::abi_encode_returns(
                &(pending_hashes(&self.pending_listings, call.seller),),
            ),
            HemCalls::getPendingPurchases(call) => {
                Hem::getPendingPurchasesCall::abi_encode_returns(&(pending_hashes(
                    &self.pending_purchases,
                    call.buyer,
                ),))
            }
            _ => return Err("LOCAL_CALL_MODIFICATION_EXCEPTION"),
        };
        Ok(returns)
    }
}

/// Caller context of one contract execution
struct Call<'a> {
    caller: AccountId,
    creator: AccountId,
    contract: AccountId,
    payable: i64,
    /// Encoded arguments without the selector
    args: &'a [u8],
}

impl Call<'_> {
    fn require_creator(&self) -> Result<(), Status> {
        if self.caller != self.creator {
            return Err("not authorized");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    next_num: u64,
    accounts: HashMap<AccountId, AccountState>,
    files: HashMap<FileId, FileState>,
    contracts: HashMap<ContractId, ContractState>,
    escrows: HashMap<ContractId, Escrow>,
    tokens: HashMap<TokenId, TokenState>,
    topics: HashSet<TopicId>,
    fail_next_file_create: Option<String>,
    fail_next_append: Option<String>,
    fail_next_contract_create: Option<String>,
    calls: Vec<ContractCall>,
}

impl State {
    fn genesis() -> Self {
        let mut state = State {
            next_num: FIRST_ENTITY_NUM,
            ..State::default()
        };
        state.accounts.insert(
            Network::LOCAL_OPERATOR_ACCOUNT,
            AccountState {
                private_key: Some(Network::LOCAL_OPERATOR_KEY.to_string()),
                balance: GENESIS_BALANCE_TINYBAR,
                ..AccountState::default()
            },
        );
        state
    }

    fn next_num(&mut self) -> u64 {
        let num = self.next_num;
        self.next_num += 1;
        num
    }

    fn account(&self, id: AccountId) -> Result<&AccountState, Status> {
        self.accounts.get(&id).ok_or("INVALID_ACCOUNT_ID")
    }

    fn account_mut(&mut self, id: AccountId) -> Result<&mut AccountState, Status> {
        self.accounts.get_mut(&id).ok_or("INVALID_ACCOUNT_ID")
    }

    /// Check that `payer` exists and can cover `amount`
    fn payer(&self, payer: AccountId, amount: i64) -> Result<(), Status> {
        let account = self.accounts.get(&payer).ok_or("PAYER_ACCOUNT_NOT_FOUND")?;
        if account.balance < amount {
            return Err("INSUFFICIENT_PAYER_BALANCE");
        }
        Ok(())
    }

    fn token(&self, id: TokenId) -> Result<&TokenState, Status> {
        self.tokens.get(&id).ok_or("INVALID_TOKEN_ID")
    }

    fn is_minted(&self, nft: &NftId) -> bool {
        self.tokens
            .get(&nft.token_id)
            .is_some_and(|token| token.nfts.contains_key(&nft.serial))
    }

    fn check_nft_transfer(&self, nft: NftId, from: AccountId, to: AccountId) -> Result<(), Status> {
        let token = self.token(nft.token_id)?;
        let current = token.nfts.get(&nft.serial).ok_or("INVALID_NFT_ID")?;
        if current.owner != from {
            return Err("SENDER_DOES_NOT_OWN_NFT_SERIAL_NO");
        }

        let receiver = self.account(to)?;
        if !receiver.associations.contains(&nft.token_id) {
            return Err("TOKEN_NOT_ASSOCIATED_TO_ACCOUNT");
        }
        if token.kyc_key.is_some() {
            let sender = self.account(from)?;
            if !sender.kyc.contains(&nft.token_id) || !receiver.kyc.contains(&nft.token_id) {
                return Err("ACCOUNT_KYC_NOT_GRANTED_FOR_TOKEN");
            }
        }
        Ok(())
    }

    fn move_nft(&mut self, nft: NftId, to: AccountId) {
        if let Some(entry) = self
            .tokens
            .get_mut(&nft.token_id)
            .and_then(|token| token.nfts.get_mut(&nft.serial))
        {
            entry.owner = to;
        }
    }

    fn transfer_hbar(&mut self, from: AccountId, to: AccountId, amount: i64) -> Result<(), Status> {
        if self.account(from)?.balance < amount {
            return Err("INSUFFICIENT_ACCOUNT_BALANCE");
        }
        self.account(to)?;
        self.account_mut(from)?.balance -= amount;
        self.account_mut(to)?.balance += amount;
        Ok(())
    }

    fn require_valid(&self, nfts: &[NftId]) -> Result<(), Status> {
        if nfts.iter().all(|nft| self.is_minted(nft)) {
            Ok(())
        } else {
            Err("invalid nft")
        }
    }

    fn execute(&mut self, escrow: &mut Escrow, function: Hem::HemCalls, call: &Call) -> Result<(), Status> {
        use Hem::HemCalls;

        match function {
            HemCalls::setTinybarPerCent(args) => {
                call.require_creator()?;
                escrow.tinybar_per_cent = from_u256(args.tinybarPerCent);
            }
            HemCalls::whitelist_list(args) => {
                call.require_creator()?;
                let batch = Batch::new(
                    args.seller,
                    &args.tokens,
                    &args.serials,
                    Some(args.prices.as_slice()),
                    call.args,
                )?;
                self.require_valid(&batch.nfts)?;
                escrow
                    .pending_listings
                    .entry(batch.party)
                    .or_default()
                    .push(batch.hash);
            }
            HemCalls::list_offset(args) => {
                let batch = Batch::new(
                    args.seller,
                    &args.tokens,
                    &args.serials,
                    Some(args.prices.as_slice()),
                    call.args,
                )?;
                self.require_valid(&batch.nfts)?;
                if call.caller != batch.party {
                    return Err("not authorized");
                }
                if !escrow
                    .pending_listings
                    .get(&batch.party)
                    .is_some_and(|hashes| hashes.contains(&batch.hash))
                {
                    return Err("not whitelisted");
                }
                for nft in &batch.nfts {
                    self.check_nft_transfer(*nft, batch.party, call.contract)?;
                }

                take_pending(&mut escrow.pending_listings, batch.party, &batch.hash);
                for (nft, price) in batch.nfts.iter().zip(batch.prices) {
                    self.move_nft(*nft, call.contract);
                    escrow.offsets.insert(
                        *nft,
                        Offset {
                            seller: batch.party,
                            price,
                            hem_approved: true,
                            user_approved: true,
                        },
                    );
                }
            }
            HemCalls::whitelist_purchase(args) => {
                call.require_creator()?;
                let batch = Batch::new(args.buyer, &args.tokens, &args.serials, None, call.args)?;
                self.require_valid(&batch.nfts)?;
                let mut entries = Vec::with_capacity(batch.nfts.len());
                for nft in &batch.nfts {
                    let offset = escrow.offsets.get(nft).ok_or("offset not listed")?;
                    entries.push((
                        *nft,
                        PurchaseWhitelistEntry {
                            buyer: batch.party,
                            price: offset.price.clone(),
                            hem_approved: true,
                        },
                    ));
                }
                escrow.purchase_whitelist.extend(entries);
                escrow
                    .pending_purchases
                    .entry(batch.party)
                    .or_default()
                    .push(batch.hash);
            }
            HemCalls::purchase_offset(args) => {
                let batch = Batch::new(args.buyer, &args.tokens, &args.serials, None, call.args)?;
                if call.caller != batch.party {
                    return Err("not authorized");
                }
                if !escrow
                    .pending_purchases
                    .get(&batch.party)
                    .is_some_and(|hashes| hashes.contains(&batch.hash))
                {
                    return Err("not whitelisted");
                }

                let mut settlements = Vec::with_capacity(batch.nfts.len());
                let mut required: i64 = 0;
                for nft in &batch.nfts {
                    let whitelisted = escrow
                        .purchase_whitelist
                        .get(nft)
                        .is_some_and(|entry| entry.buyer == batch.party);
                    let offset = escrow.offsets.get(nft).filter(|_| whitelisted);
                    let offset = offset.ok_or("not whitelisted")?;
                    let amount = cents_to_tinybar(&offset.price, &escrow.tinybar_per_cent);
                    let amount = tinybar_to_i64(&amount).map_err(|_| "not enough funds to purchase")?;
                    required = required
                        .checked_add(amount)
                        .ok_or("not enough funds to purchase")?;
                    settlements.push((*nft, offset.seller, amount));
                }
                if call.payable < required {
                    return Err("not enough funds to purchase");
                }
                for nft in &batch.nfts {
                    self.check_nft_transfer(*nft, call.contract, batch.party)?;
                }

                self.transfer_hbar(call.caller, call.contract, call.payable)?;
                for (nft, seller, amount) in settlements {
                    self.transfer_hbar(call.contract, seller, amount)?;
                    self.move_nft(nft, batch.party);
                    escrow.offsets.remove(&nft);
                    escrow.purchase_whitelist.remove(&nft);
                }
                take_pending(&mut escrow.pending_purchases, batch.party, &batch.hash);
            }
            HemCalls::associateOffsets(args) => {
                let tokens: Vec<TokenId> = args.tokens.into_iter().map(token_id).collect();
                if !tokens.iter().all(|token| self.tokens.contains_key(token)) {
                    return Err("invalid nft");
                }
                self.account_mut(call.contract)?.associations.extend(tokens);
            }
            HemCalls::getTinybarPerCent(_)
            | HemCalls::getOffset(_)
            | HemCalls::getPurchaseWhitelist(_)
            | HemCalls::getPendingListings(_)
            | HemCalls::getPendingPurchases(_) => {}
        }
        Ok(())
    }
}

/// Shared in-memory ledger bound to one operator account
#[derive(Clone)]
pub struct FakeLedger {
    state: Arc<Mutex<State>>,
    operator: AccountId,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLedger {
    /// Fresh ledger operated by the genesis account `0.0.2`
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::genesis())),
            operator: Network::LOCAL_OPERATOR_ACCOUNT,
        }
    }

    /// Handle on the same ledger signing as `account_id`
    pub fn as_operator(&self, account_id: AccountId, private_key: &str) -> Result<Self, LedgerError> {
        {
            let state = self.state();
            let account = state
                .accounts
                .get(&account_id)
                .ok_or_else(|| rejected("INVALID_ACCOUNT_ID"))?;
            if account.private_key.as_deref() != Some(private_key) {
                return Err(rejected("INVALID_SIGNATURE"));
            }
        }
        Ok(Self {
            state: Arc::clone(&self.state),
            operator: account_id,
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject the next file creation with `status`
    pub fn fail_next_file_create(&self, status: &str) {
        self.state().fail_next_file_create = Some(status.to_string());
    }

    /// Reject the next file append with `status`
    pub fn fail_next_append(&self, status: &str) {
        self.state().fail_next_append = Some(status.to_string());
    }

    /// Reject the next contract creation with `status`
    pub fn fail_next_contract_create(&self, status: &str) {
        self.state().fail_next_contract_create = Some(status.to_string());
    }

    pub fn file_count(&self) -> usize {
        self.state().files.len()
    }

    pub fn file_contents(&self, file_id: FileId) -> Option<Vec<u8>> {
        self.state().files.get(&file_id).map(|f| f.contents.clone())
    }

    pub fn append_count(&self, file_id: FileId) -> usize {
        self.state().files.get(&file_id).map_or(0, |f| f.appends)
    }

    pub fn contract_count(&self) -> usize {
        self.state().contracts.len()
    }

    pub fn file_for_contract(&self, contract_id: ContractId) -> Option<FileId> {
        self.state()
            .contracts
            .get(&contract_id)
            .map(|c| c.bytecode_file)
    }

    /// Encoded constructor parameters a contract was created with
    pub fn constructor_arguments(&self, contract_id: ContractId) -> Option<Vec<u8>> {
        self.state()
            .contracts
            .get(&contract_id)
            .and_then(|c| c.constructor.clone())
    }

    /// Every contract call submitted so far, oldest first
    pub fn contract_calls(&self) -> Vec<ContractCall> {
        self.state().calls.clone()
    }

    pub fn last_contract_call(&self) -> Option<ContractCall> {
        self.state().calls.last().cloned()
    }

    pub fn token_name(&self, token_id: TokenId) -> Option<String> {
        self.state().tokens.get(&token_id).map(|t| t.name.clone())
    }

    pub fn nft_metadata(&self, nft_id: NftId) -> Option<Vec<u8>> {
        self.state()
            .tokens
            .get(&nft_id.token_id)
            .and_then(|t| t.nfts.get(&nft_id.serial))
            .map(|nft| nft.metadata.clone())
    }

    /// Record the call, then decode it against the escrow interface
    fn record_call(
        &self,
        state: &mut State,
        kind: CallKind,
        contract_id: ContractId,
        call_data: &[u8],
        gas: u64,
        tinybar: Option<i64>,
    ) -> Result<Hem::HemCalls, LedgerError> {
        state.calls.push(ContractCall {
            kind,
            payer: self.operator,
            contract_id,
            selector: call_data.get(..4).and_then(|s| s.try_into().ok()),
            gas,
            tinybar,
        });
        Hem::HemCalls::abi_decode(call_data, true).map_err(|_| rejected(REVERT))
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    fn operator(&self) -> AccountId {
        self.operator
    }

    async fn create_file(&self, contents: &[u8]) -> Result<FileId, LedgerError> {
        let mut state = self.state();
        state.payer(self.operator, 0).map_err(rejected)?;
        if let Some(status) = state.fail_next_file_create.take() {
            return Err(LedgerError::Rejected(status));
        }
        let file_id = FileId::new(0, 0, state.next_num());
        state.files.insert(
            file_id,
            FileState {
                owner: self.operator,
                contents: contents.to_vec(),
                appends: 0,
            },
        );
        Ok(file_id)
    }

    async fn append_file(
        &self,
        file_id: FileId,
        chunk: &[u8],
        _valid_duration: Duration,
    ) -> Result<(), LedgerError> {
        let mut state = self.state();
        state.payer(self.operator, 0).map_err(rejected)?;
        if let Some(status) = state.fail_next_append.take() {
            return Err(LedgerError::Rejected(status));
        }

        let file = state
            .files
            .get_mut(&file_id)
            .ok_or_else(|| rejected("INVALID_FILE_ID"))?;
        if file.owner != self.operator {
            return Err(rejected("INVALID_SIGNATURE"));
        }
        file.contents.extend_from_slice(chunk);
        file.appends += 1;
        Ok(())
    }

    async fn create_contract(
        &self,
        bytecode_file_id: FileId,
        _gas: u64,
        constructor_parameters: Option<Vec<u8>>,
    ) -> Result<ContractId, LedgerError> {
        let mut state = self.state();
        state.payer(self.operator, 0).map_err(rejected)?;
        if let Some(status) = state.fail_next_contract_create.take() {
            return Err(LedgerError::Rejected(status));
        }
        let file = state
            .files
            .get(&bytecode_file_id)
            .ok_or_else(|| rejected("INVALID_FILE_ID"))?;
        if file.contents.is_empty() {
            return Err(rejected("CONTRACT_FILE_EMPTY"));
        }

        // Escrow constructor: (address nftValidator, uint256 tinybarPerCent, bool testMode)
        let tinybar_per_cent = constructor_parameters
            .as_deref()
            .and_then(|bytes| <(SolAddress, U256, bool)>::abi_decode_params(bytes, true).ok())
            .map(|(_, rate, _)| from_u256(rate))
            .unwrap_or_default();

        let contract_id = ContractId::new(0, 0, state.next_num());
        state.contracts.insert(
            contract_id,
            ContractState {
                creator: self.operator,
                bytecode_file: bytecode_file_id,
                constructor: constructor_parameters,
            },
        );
        state.escrows.insert(
            contract_id,
            Escrow {
                tinybar_per_cent,
                ..Escrow::default()
            },
        );
        state
            .accounts
            .insert(contract_id.into(), AccountState::default());
        Ok(contract_id)
    }

    async fn execute_contract(
        &self,
        contract_id: ContractId,
        gas: u64,
        payable_tinybar: Option<i64>,
        call_data: Vec<u8>,
    ) -> Result<Receipt, LedgerError> {
        let mut state = self.state();
        let payable = payable_tinybar.unwrap_or(0);
        if payable < 0 {
            return Err(rejected("CONTRACT_NEGATIVE_VALUE"));
        }
        state.payer(self.operator, payable).map_err(rejected)?;
        let creator = state
            .contracts
            .get(&contract_id)
            .map(|c| c.creator)
            .ok_or_else(|| rejected("INVALID_CONTRACT_ID"))?;

        let function = self.record_call(
            &mut state,
            CallKind::Execute,
            contract_id,
            &call_data,
            gas,
            payable_tinybar,
        )?;
        let selector = hex::encode(function.selector());

        let call = Call {
            caller: self.operator,
            creator,
            contract: contract_id.into(),
            payable,
            args: &call_data[4..],
        };
        let mut escrow = state.escrows.remove(&contract_id).unwrap_or_default();
        let result = state.execute(&mut escrow, function, &call);
        state.escrows.insert(contract_id, escrow);
        result.map_err(rejected)?;

        debug!(%contract_id, %selector, "Executed contract call");
        Ok(Receipt::success())
    }

    async fn call_contract(
        &self,
        contract_id: ContractId,
        gas: u64,
        payment_tinybar: i64,
        call_data: Vec<u8>,
    ) -> Result<Vec<u8>, LedgerError> {
        let mut state = self.state();
        state.payer(self.operator, payment_tinybar).map_err(rejected)?;
        if !state.contracts.contains_key(&contract_id) {
            return Err(rejected("INVALID_CONTRACT_ID"));
        }

        let function = self.record_call(
            &mut state,
            CallKind::Query,
            contract_id,
            &call_data,
            gas,
            Some(payment_tinybar),
        )?;

        state
            .escrows
            .get(&contract_id)
            .ok_or(REVERT)
            .and_then(|escrow| escrow.query(&function))
            .map_err(rejected)
    }

    async fn create_account(
        &self,
        private_key: Option<&str>,
        initial_balance_hbar: i64,
    ) -> Result<NewAccount, LedgerError> {
        let mut state = self.state();
        let initial = initial_balance_hbar
            .checked_mul(TINYBAR_PER_HBAR as i64)
            .filter(|amount| *amount >= 0)
            .ok_or_else(|| rejected("INVALID_INITIAL_BALANCE"))?;
        state.payer(self.operator, initial).map_err(rejected)?;

        let num = state.next_num();
        let account_id = AccountId::new(0, 0, num);
        let private_key = private_key
            .map(str::to_string)
            .unwrap_or_else(|| derive_key(num));

        state.account_mut(self.operator).map_err(rejected)?.balance -= initial;
        state.accounts.insert(
            account_id,
            AccountState {
                private_key: Some(private_key.clone()),
                balance: initial,
                ..AccountState::default()
            },
        );
        Ok(NewAccount {
            account_id,
            private_key,
        })
    }

    async fn create_topic(&self) -> Result<TopicId, LedgerError> {
        let mut state = self.state();
        state.payer(self.operator, 0).map_err(rejected)?;
        let topic_id = TopicId::new(0, 0, state.next_num());
        state.topics.insert(topic_id);
        Ok(topic_id)
    }

    async fn hbar_balance(&self, owner: BalanceOwner) -> Result<i64, LedgerError> {
        let state = self.state();
        let account_id = match owner {
            BalanceOwner::Account(id) => id,
            BalanceOwner::Contract(id) => id.into(),
        };
        state
            .account(account_id)
            .map(|account| account.balance)
            .map_err(rejected)
    }

    async fn token_balance(&self, owner: BalanceOwner, token_id: TokenId) -> Result<u64, LedgerError> {
        let state = self.state();
        let account_id = match owner {
            BalanceOwner::Account(id) => id,
            BalanceOwner::Contract(id) => id.into(),
        };
        state.account(account_id).map_err(rejected)?;
        let held = state.tokens.get(&token_id).map_or(0, |token| {
            token.nfts.values().filter(|nft| nft.owner == account_id).count()
        });
        Ok(held as u64)
    }

    async fn nft_owner(&self, nft_id: NftId) -> Result<AccountId, LedgerError> {
        let state = self.state();
        let token = state.token(nft_id.token_id).map_err(rejected)?;
        token
            .nfts
            .get(&nft_id.serial)
            .map(|nft| nft.owner)
            .ok_or_else(|| rejected("INVALID_NFT_ID"))
    }

    async fn transfer_nfts(
        &self,
        token_id: TokenId,
        serials: &[i64],
        to: AccountId,
    ) -> Result<Receipt, LedgerError> {
        let mut state = self.state();
        state.payer(self.operator, 0).map_err(rejected)?;
        if serials.is_empty() {
            return Err(rejected("EMPTY_TOKEN_TRANSFER_BODY"));
        }

        let nfts: Vec<NftId> = serials.iter().map(|s| NftId::new(token_id, *s)).collect();
        for nft in &nfts {
            state
                .check_nft_transfer(*nft, self.operator, to)
                .map_err(rejected)?;
        }
        for nft in nfts {
            state.move_nft(nft, to);
        }
        Ok(Receipt::success())
    }

    async fn associate_tokens(
        &self,
        account_id: AccountId,
        token_ids: &[TokenId],
    ) -> Result<Receipt, LedgerError> {
        let mut state = self.state();
        state.payer(self.operator, 0).map_err(rejected)?;
        if account_id != self.operator {
            return Err(rejected("INVALID_SIGNATURE"));
        }
        for token_id in token_ids {
            state.token(*token_id).map_err(rejected)?;
        }

        let account = state.account_mut(account_id).map_err(rejected)?;
        if token_ids.iter().any(|t| account.associations.contains(t)) {
            return Err(rejected("TOKEN_ALREADY_ASSOCIATED_TO_ACCOUNT"));
        }
        account.associations.extend(token_ids.iter().copied());
        Ok(Receipt::success())
    }

    async fn create_nft(&self, name: &str, symbol: &str, kyc: bool) -> Result<TokenId, LedgerError> {
        let mut state = self.state();
        state.payer(self.operator, 0).map_err(rejected)?;
        let token_id = TokenId::new(0, 0, state.next_num());
        state.tokens.insert(
            token_id,
            TokenState {
                name: name.to_string(),
                supply_key: self.operator,
                kyc_key: kyc.then_some(self.operator),
                nfts: BTreeMap::new(),
            },
        );

        // Treasury is associated and KYC-granted on creation
        let treasury = state.account_mut(self.operator).map_err(rejected)?;
        treasury.associations.insert(token_id);
        treasury.kyc.insert(token_id);
        debug!(%token_id, symbol, "Created NFT collection");
        Ok(token_id)
    }

    async fn mint_nfts(&self, token_id: TokenId, metadata: Vec<Vec<u8>>) -> Result<Receipt, LedgerError> {
        let mut state = self.state();
        state.payer(self.operator, 0).map_err(rejected)?;
        let operator = self.operator;
        let token = state
            .tokens
            .get_mut(&token_id)
            .ok_or_else(|| rejected("INVALID_TOKEN_ID"))?;
        if token.supply_key != operator {
            return Err(rejected("INVALID_SIGNATURE"));
        }

        let mut serial = token.nfts.keys().next_back().copied().unwrap_or(0);
        for metadata in metadata {
            serial += 1;
            token.nfts.insert(
                serial,
                NftState {
                    owner: operator,
                    metadata,
                },
            );
        }
        Ok(Receipt::success())
    }

    async fn grant_kyc(&self, account_id: AccountId, token_id: TokenId) -> Result<Receipt, LedgerError> {
        let mut state = self.state();
        state.payer(self.operator, 0).map_err(rejected)?;
        let token = state.token(token_id).map_err(rejected)?;
        match token.kyc_key {
            None => return Err(rejected("TOKEN_HAS_NO_KYC_KEY")),
            Some(key) if key != self.operator => return Err(rejected("INVALID_SIGNATURE")),
            Some(_) => {}
        }

        let account = state.account_mut(account_id).map_err(rejected)?;
        if !account.associations.contains(&token_id) {
            return Err(rejected("TOKEN_NOT_ASSOCIATED_TO_ACCOUNT"));
        }
        account.kyc.insert(token_id);
        Ok(Receipt::success())
    }
}
