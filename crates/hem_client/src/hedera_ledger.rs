//! `Ledger` backed by a Hedera network through the `hedera` SDK

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use hedera::{
    AccountBalanceQuery, AccountCreateTransaction, Client, ContractCallQuery,
    ContractCreateTransaction, ContractExecuteTransaction, FileAppendTransaction,
    FileCreateTransaction, Hbar, PrivateKey, TokenAssociateTransaction, TokenCreateTransaction,
    TokenGrantKycTransaction, TokenMintTransaction, TokenNftInfoQuery, TokenType,
    TopicCreateTransaction, TransactionReceipt, TransactionResponse, TransferTransaction,
};
use hem_core::{AccountId, ContractId, FileId, NftId, Receipt, TokenId, TopicId};
use tracing::{debug, info};

use crate::config::{Credentials, Network};
use crate::ledger::{BalanceOwner, Ledger, LedgerError, NewAccount};

/// Ledger name of a status (`INSUFFICIENT_PAYER_BALANCE`) from its `Debug` form
fn status_name(status: hedera::Status) -> String {
    let debug = format!("{:?}", status);
    let mut name = String::with_capacity(debug.len() + 8);
    let mut previous: Option<char> = None;
    for c in debug.chars() {
        if c.is_ascii_uppercase()
            && previous.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            name.push('_');
        }
        name.push(c.to_ascii_uppercase());
        previous = Some(c);
    }
    name
}

fn receipt_status(receipt: &TransactionReceipt) -> Receipt {
    Receipt {
        status: status_name(receipt.status),
    }
}

fn ledger_error(err: hedera::Error) -> LedgerError {
    match err {
        hedera::Error::ReceiptStatus { status, .. }
        | hedera::Error::TransactionPreCheckStatus { status, .. }
        | hedera::Error::QueryPreCheckStatus { status, .. } => {
            LedgerError::Rejected(status_name(status))
        }
        other => LedgerError::Transport(other.to_string()),
    }
}

/// Convert between our ids and the SDK's through their shared `shard.realm.num` form
fn convert_id<T>(id: impl Display) -> Result<T, LedgerError>
where
    T: FromStr,
    T::Err: Display,
{
    id.to_string()
        .parse()
        .map_err(|e: T::Err| LedgerError::InvalidId(format!("{}: {}", id, e)))
}

fn serial_number(serial: i64) -> Result<u64, LedgerError> {
    u64::try_from(serial)
        .map_err(|_| LedgerError::Unsupported(format!("negative serial number {}", serial)))
}

fn sdk_duration(duration: Duration) -> Result<time::Duration, LedgerError> {
    time::Duration::try_from(duration)
        .map_err(|e| LedgerError::Unsupported(format!("transaction valid duration: {}", e)))
}

pub struct HederaLedger {
    client: Client,
    operator: AccountId,
    key: PrivateKey,
}

impl HederaLedger {
    /// Build a client for `network` with `credentials` as operator
    pub fn connect(network: Network, credentials: &Credentials) -> Result<Self, LedgerError> {
        let client = match network {
            Network::Mainnet => Client::for_mainnet(),
            Network::Testnet => Client::for_testnet(),
            Network::Previewnet => Client::for_previewnet(),
            Network::Localhost => {
                let mut nodes = HashMap::new();
                nodes.insert(
                    Network::LOCAL_NODE_ADDRESS.to_string(),
                    convert_id::<hedera::AccountId>(Network::LOCAL_NODE_ACCOUNT)?,
                );
                let client = Client::for_network(nodes).map_err(ledger_error)?;
                client
                    .set_mirror_network([Network::LOCAL_MIRROR_ADDRESS.to_string()]);
                client
            }
            Network::Simulated => {
                return Err(LedgerError::Unsupported(
                    "the simulated network has no Hedera client".to_string(),
                ))
            }
        };

        let key = PrivateKey::from_str(&credentials.private_key)
            .map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        client.set_operator(convert_id(credentials.account_id)?, key.clone());
        info!(%network, operator = %credentials.account_id, "Connected to Hedera network");

        Ok(Self {
            client,
            operator: credentials.account_id,
            key,
        })
    }

    async fn receipt(&self, response: TransactionResponse) -> Result<TransactionReceipt, LedgerError> {
        let receipt = response
            .get_receipt(&self.client)
            .await
            .map_err(ledger_error)?;
        debug!(status = ?receipt.status, "Received receipt");
        Ok(receipt)
    }
}

#[async_trait]
impl Ledger for HederaLedger {
    fn operator(&self) -> AccountId {
        self.operator
    }

    async fn create_file(&self, contents: &[u8]) -> Result<FileId, LedgerError> {
        let response = FileCreateTransaction::new()
            .keys([self.key.public_key()])
            .contents(contents.to_vec())
            .execute(&self.client)
            .await
            .map_err(ledger_error)?;
        let file_id = self
            .receipt(response)
            .await?
            .file_id
            .ok_or(LedgerError::MissingReceiptField("file id"))?;
        convert_id(file_id)
    }

    async fn append_file(
        &self,
        file_id: FileId,
        chunk: &[u8],
        valid_duration: Duration,
    ) -> Result<(), LedgerError> {
        let response = FileAppendTransaction::new()
            .file_id(convert_id::<hedera::FileId>(file_id)?)
            .contents(chunk.to_vec())
            .transaction_valid_duration(sdk_duration(valid_duration)?)
            .execute(&self.client)
            .await
            .map_err(ledger_error)?;
        self.receipt(response).await?;
        Ok(())
    }

    async fn create_contract(
        &self,
        bytecode_file_id: FileId,
        gas: u64,
        constructor_parameters: Option<Vec<u8>>,
    ) -> Result<ContractId, LedgerError> {
        let mut transaction = ContractCreateTransaction::new();
        transaction
            .bytecode_file_id(convert_id::<hedera::FileId>(bytecode_file_id)?)
            .gas(gas);
        if let Some(parameters) = constructor_parameters {
            transaction.constructor_parameters(parameters);
        }

        let response = transaction
            .execute(&self.client)
            .await
            .map_err(ledger_error)?;
        let contract_id = self
            .receipt(response)
            .await?
            .contract_id
            .ok_or(LedgerError::MissingReceiptField("contract id"))?;
        convert_id(contract_id)
    }

    async fn execute_contract(
        &self,
        contract_id: ContractId,
        gas: u64,
        payable_tinybar: Option<i64>,
        call_data: Vec<u8>,
    ) -> Result<Receipt, LedgerError> {
        let mut transaction = ContractExecuteTransaction::new();
        transaction
            .contract_id(convert_id::<hedera::ContractId>(contract_id)?)
            .gas(gas)
            .function_parameters(call_data);
        if let Some(tinybar) = payable_tinybar {
            transaction.payable_amount(Hbar::from_tinybars(tinybar));
        }

        let response = transaction
            .execute(&self.client)
            .await
            .map_err(ledger_error)?;
        let receipt = self.receipt(response).await?;
        Ok(receipt_status(&receipt))
    }

    async fn call_contract(
        &self,
        contract_id: ContractId,
        gas: u64,
        payment_tinybar: i64,
        call_data: Vec<u8>,
    ) -> Result<Vec<u8>, LedgerError> {
        let result = ContractCallQuery::new()
            .contract_id(convert_id::<hedera::ContractId>(contract_id)?)
            .gas(gas)
            .function_parameters(call_data)
            .payment_amount(Hbar::from_tinybars(payment_tinybar))
            .execute(&self.client)
            .await
            .map_err(ledger_error)?;
        Ok(result.bytes)
    }

    async fn create_account(
        &self,
        private_key: Option<&str>,
        initial_balance_hbar: i64,
    ) -> Result<NewAccount, LedgerError> {
        let key = match private_key {
            Some(key) => {
                PrivateKey::from_str(key).map_err(|e| LedgerError::InvalidKey(e.to_string()))?
            }
            None => PrivateKey::generate_ed25519(),
        };

        let response = AccountCreateTransaction::new()
            .key(key.public_key())
            .initial_balance(Hbar::new(initial_balance_hbar))
            .execute(&self.client)
            .await
            .map_err(ledger_error)?;
        let account_id = self
            .receipt(response)
            .await?
            .account_id
            .ok_or(LedgerError::MissingReceiptField("account id"))?;

        Ok(NewAccount {
            account_id: convert_id(account_id)?,
            private_key: key.to_string(),
        })
    }

    async fn create_topic(&self) -> Result<TopicId, LedgerError> {
        let response = TopicCreateTransaction::new()
            .execute(&self.client)
            .await
            .map_err(ledger_error)?;
        let topic_id = self
            .receipt(response)
            .await?
            .topic_id
            .ok_or(LedgerError::MissingReceiptField("topic id"))?;
        convert_id(topic_id)
    }

    async fn hbar_balance(&self, owner: BalanceOwner) -> Result<i64, LedgerError> {
        let mut query = AccountBalanceQuery::new();
        match owner {
            BalanceOwner::Account(id) => query.account_id(convert_id(id)?),
            BalanceOwner::Contract(id) => query.contract_id(convert_id(id)?),
        };
        let balance = query.execute(&self.client).await.map_err(ledger_error)?;
        Ok(balance.hbars.to_tinybars())
    }

    #[allow(deprecated)]
    async fn token_balance(
        &self,
        owner: BalanceOwner,
        token_id: TokenId,
    ) -> Result<u64, LedgerError> {
        let mut query = AccountBalanceQuery::new();
        match owner {
            BalanceOwner::Account(id) => query.account_id(convert_id(id)?),
            BalanceOwner::Contract(id) => query.contract_id(convert_id(id)?),
        };
        let balance = query.execute(&self.client).await.map_err(ledger_error)?;
        let token_id: hedera::TokenId = convert_id(token_id)?;
        Ok(balance.tokens.get(&token_id).copied().unwrap_or(0))
    }

    async fn nft_owner(&self, nft_id: NftId) -> Result<AccountId, LedgerError> {
        let token_id: hedera::TokenId = convert_id(nft_id.token_id)?;
        let info = TokenNftInfoQuery::new()
            .nft_id(token_id.nft(serial_number(nft_id.serial)?))
            .execute(&self.client)
            .await
            .map_err(ledger_error)?;
        convert_id(info.account_id)
    }

    async fn transfer_nfts(
        &self,
        token_id: TokenId,
        serials: &[i64],
        to: AccountId,
    ) -> Result<Receipt, LedgerError> {
        let token_id: hedera::TokenId = convert_id(token_id)?;
        let from: hedera::AccountId = convert_id(self.operator)?;
        let to: hedera::AccountId = convert_id(to)?;

        let mut transaction = TransferTransaction::new();
        for serial in serials {
            transaction.nft_transfer(token_id.nft(serial_number(*serial)?), from, to);
        }
        let response = transaction
            .execute(&self.client)
            .await
            .map_err(ledger_error)?;
        let receipt = self.receipt(response).await?;
        Ok(receipt_status(&receipt))
    }

    async fn associate_tokens(
        &self,
        account_id: AccountId,
        token_ids: &[TokenId],
    ) -> Result<Receipt, LedgerError> {
        let token_ids = token_ids
            .iter()
            .map(|id| convert_id::<hedera::TokenId>(id))
            .collect::<Result<Vec<_>, _>>()?;
        let response = TokenAssociateTransaction::new()
            .account_id(convert_id(account_id)?)
            .token_ids(token_ids)
            .execute(&self.client)
            .await
            .map_err(ledger_error)?;
        let receipt = self.receipt(response).await?;
        Ok(receipt_status(&receipt))
    }

    async fn create_nft(&self, name: &str, symbol: &str, kyc: bool) -> Result<TokenId, LedgerError> {
        let mut transaction = TokenCreateTransaction::new();
        transaction
            .name(name)
            .symbol(symbol)
            .token_type(TokenType::NonFungibleUnique)
            .supply_key(self.key.public_key())
            .treasury_account_id(convert_id(self.operator)?);
        if kyc {
            transaction.kyc_key(self.key.public_key());
        }

        let response = transaction
            .execute(&self.client)
            .await
            .map_err(ledger_error)?;
        let token_id = self
            .receipt(response)
            .await?
            .token_id
            .ok_or(LedgerError::MissingReceiptField("token id"))?;
        convert_id(token_id)
    }

    async fn mint_nfts(
        &self,
        token_id: TokenId,
        metadata: Vec<Vec<u8>>,
    ) -> Result<Receipt, LedgerError> {
        let response = TokenMintTransaction::new()
            .token_id(convert_id::<hedera::TokenId>(token_id)?)
            .metadata(metadata)
            .execute(&self.client)
            .await
            .map_err(ledger_error)?;
        let receipt = self.receipt(response).await?;
        Ok(receipt_status(&receipt))
    }

    async fn grant_kyc(
        &self,
        account_id: AccountId,
        token_id: TokenId,
    ) -> Result<Receipt, LedgerError> {
        let response = TokenGrantKycTransaction::new()
            .account_id(convert_id::<hedera::AccountId>(account_id)?)
            .token_id(convert_id::<hedera::TokenId>(token_id)?)
            .execute(&self.client)
            .await
            .map_err(ledger_error)?;
        let receipt = self.receipt(response).await?;
        Ok(receipt_status(&receipt))
    }
}
