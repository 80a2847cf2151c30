//! Contract deployment: bytecode upload followed by contract creation

use std::path::Path;
use std::time::Duration;

use alloy_primitives::U256;
use alloy_sol_types::SolConstructor;
use hem_core::{ContractId, IdError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{DeployConfig, GasSchedule};
use crate::contract::Hem;
use crate::ledger::{Ledger, LedgerError};

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Failed to read contract artifact {path}: {reason}")]
    Artifact { path: String, reason: String },
    #[error("Contract artifact has no bytecode")]
    EmptyBytecode,
    #[error("Bytecode needs {chunks} chunks, at most {max} are allowed")]
    TooManyChunks { chunks: usize, max: usize },
    #[error("Invalid contract id: {0}")]
    ContractId(#[from] IdError),
    #[error("Bytecode file creation failed: {0}")]
    FileCreate(LedgerError),
    #[error("Bytecode append failed: {0}")]
    FileAppend(LedgerError),
    #[error("Contract creation failed: {0}")]
    ContractCreate(LedgerError),
}

/// Compiled contract, hex-encoded as the ledger expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractArtifact {
    pub bytecode: String,
}

impl ContractArtifact {
    pub fn new(bytecode: impl Into<String>) -> Result<Self, DeployError> {
        let bytecode = bytecode.into();
        let trimmed = bytecode.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(DeployError::EmptyBytecode);
        }
        Ok(Self {
            bytecode: trimmed.to_string(),
        })
    }

    /// Read a build artifact (`{"bytecode": "..."}`) or a raw hex file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DeployError> {
        let path = path.as_ref();
        let artifact_error = |reason: String| DeployError::Artifact {
            path: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| artifact_error(e.to_string()))?;
        if content.trim_start().starts_with('{') {
            let parsed: ContractArtifact =
                serde_json::from_str(&content).map_err(|e| artifact_error(e.to_string()))?;
            Self::new(parsed.bytecode)
        } else {
            Self::new(content)
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytecode.as_bytes()
    }
}

/// Upload limits for bytecode files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    pub chunk_size: usize,
    pub max_chunks: usize,
    pub append_valid_duration: Duration,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            max_chunks: 25,
            append_valid_duration: Duration::from_secs(180),
        }
    }
}

/// Ids of a deployed escrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub nft_validator_id: ContractId,
    pub hem_id: ContractId,
}

/// Upload `artifact` and create a contract from it.
///
/// `constructor_parameters` is the ABI encoding of the constructor arguments.
/// Any failing step aborts the deployment; nothing is cleaned up.
pub async fn deploy_contract(
    ledger: &dyn Ledger,
    artifact: &ContractArtifact,
    gas: u64,
    constructor_parameters: Option<Vec<u8>>,
    options: &DeployOptions,
) -> Result<ContractId, DeployError> {
    let bytecode = artifact.as_bytes();
    let chunk_size = options.chunk_size.max(1);
    let chunks = bytecode.len().div_ceil(chunk_size);
    if chunks > options.max_chunks {
        return Err(DeployError::TooManyChunks {
            chunks,
            max: options.max_chunks,
        });
    }

    let file_id = ledger
        .create_file(&[])
        .await
        .map_err(DeployError::FileCreate)?;
    debug!(%file_id, chunks, "Created bytecode file");

    for chunk in bytecode.chunks(chunk_size) {
        ledger
            .append_file(file_id, chunk, options.append_valid_duration)
            .await
            .map_err(DeployError::FileAppend)?;
    }

    let contract_id = ledger
        .create_contract(file_id, gas, constructor_parameters)
        .await
        .map_err(DeployError::ContractCreate)?;
    info!(%contract_id, %file_id, "Contract deployed");

    Ok(contract_id)
}

/// Deploy the NFT validator and the escrow contract wired to it
pub async fn deploy_hem(
    ledger: &dyn Ledger,
    nft_validator: &ContractArtifact,
    hem: &ContractArtifact,
    config: &DeployConfig,
    gas: &GasSchedule,
    options: &DeployOptions,
) -> Result<Deployment, DeployError> {
    let nft_validator_id =
        deploy_contract(ledger, nft_validator, gas.nft_validator_deploy, None, options).await?;

    let constructor = Hem::constructorCall {
        nftValidator: nft_validator_id.to_solidity_address()?.into(),
        tinybarPerCent: U256::from(config.default_tinybar_per_cent),
        testMode: config.test_mode,
    };

    let hem_id = deploy_contract(
        ledger,
        hem,
        gas.hem_deploy,
        Some(constructor.abi_encode()),
        options,
    )
    .await?;

    Ok(Deployment {
        nft_validator_id,
        hem_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::FakeLedger;
    use alloy_sol_types::SolValue;
    use std::io::Write;

    fn artifact(len: usize) -> ContractArtifact {
        ContractArtifact::new("6".repeat(len)).unwrap()
    }

    #[test]
    fn test_artifact_parsing() {
        let mut json = tempfile::NamedTempFile::new().unwrap();
        write!(json, r#"{{"abi": [], "bytecode": "0x6080604052"}}"#).unwrap();
        let parsed = ContractArtifact::from_file(json.path()).unwrap();
        assert_eq!(parsed.bytecode, "6080604052");

        let mut raw = tempfile::NamedTempFile::new().unwrap();
        writeln!(raw, "6080604052").unwrap();
        assert_eq!(
            ContractArtifact::from_file(raw.path()).unwrap().bytecode,
            "6080604052"
        );

        assert!(matches!(
            ContractArtifact::new("0x"),
            Err(DeployError::EmptyBytecode)
        ));
        assert!(matches!(
            ContractArtifact::from_file("/nonexistent/Hem.json"),
            Err(DeployError::Artifact { .. })
        ));
    }

    #[tokio::test]
    async fn test_deploy_uploads_in_chunks() {
        let ledger = FakeLedger::new();
        let options = DeployOptions {
            chunk_size: 10,
            ..DeployOptions::default()
        };

        let contract_id = deploy_contract(&ledger, &artifact(25), 100_000, None, &options)
            .await
            .unwrap();

        let file = ledger.file_for_contract(contract_id).unwrap();
        assert_eq!(ledger.file_contents(file).unwrap(), "6".repeat(25).into_bytes());
        assert_eq!(ledger.append_count(file), 3);
    }

    #[tokio::test]
    async fn test_too_many_chunks_uploads_nothing() {
        let ledger = FakeLedger::new();
        let options = DeployOptions {
            chunk_size: 1,
            max_chunks: 25,
            ..DeployOptions::default()
        };

        let result = deploy_contract(&ledger, &artifact(26), 100_000, None, &options).await;
        assert!(matches!(
            result,
            Err(DeployError::TooManyChunks { chunks: 26, max: 25 })
        ));
        assert_eq!(ledger.file_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_step_aborts_deployment() {
        let ledger = FakeLedger::new();
        ledger.fail_next_append("INSUFFICIENT_PAYER_BALANCE");

        let result =
            deploy_contract(&ledger, &artifact(8), 100_000, None, &DeployOptions::default()).await;
        match result {
            Err(DeployError::FileAppend(LedgerError::Rejected(status))) => {
                assert_eq!(status, "INSUFFICIENT_PAYER_BALANCE")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(ledger.contract_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_file_create_uploads_nothing() {
        let ledger = FakeLedger::new();
        ledger.fail_next_file_create("INSUFFICIENT_PAYER_BALANCE");

        let result =
            deploy_contract(&ledger, &artifact(8), 100_000, None, &DeployOptions::default()).await;
        assert!(matches!(
            result,
            Err(DeployError::FileCreate(LedgerError::Rejected(status)))
                if status == "INSUFFICIENT_PAYER_BALANCE"
        ));
        assert_eq!(ledger.file_count(), 0);
        assert_eq!(ledger.contract_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_contract_create_leaves_no_contract() {
        let ledger = FakeLedger::new();
        ledger.fail_next_contract_create("INSUFFICIENT_GAS");

        let result =
            deploy_contract(&ledger, &artifact(8), 100_000, None, &DeployOptions::default()).await;
        assert!(matches!(
            result,
            Err(DeployError::ContractCreate(LedgerError::Rejected(status)))
                if status == "INSUFFICIENT_GAS"
        ));
        assert_eq!(ledger.contract_count(), 0);
        // The uploaded bytecode file is not cleaned up
        assert_eq!(ledger.file_count(), 1);

        // Only the next creation is rejected
        deploy_contract(&ledger, &artifact(8), 100_000, None, &DeployOptions::default())
            .await
            .unwrap();
        assert_eq!(ledger.contract_count(), 1);
    }

    #[tokio::test]
    async fn test_validator_failure_stops_escrow_deployment() {
        let ledger = FakeLedger::new();
        ledger.fail_next_contract_create("INSUFFICIENT_GAS");

        let result = deploy_hem(
            &ledger,
            &artifact(16),
            &artifact(32),
            &DeployConfig::default(),
            &GasSchedule::default(),
            &DeployOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(DeployError::ContractCreate(_))));
        assert_eq!(ledger.file_count(), 1);
        assert_eq!(ledger.contract_count(), 0);
    }

    #[tokio::test]
    async fn test_deploy_hem_constructor() {
        let ledger = FakeLedger::new();
        let deployment = deploy_hem(
            &ledger,
            &artifact(16),
            &artifact(32),
            &DeployConfig::default(),
            &GasSchedule::default(),
            &DeployOptions::default(),
        )
        .await
        .unwrap();

        assert_ne!(deployment.nft_validator_id, deployment.hem_id);
        let args = ledger.constructor_arguments(deployment.hem_id).unwrap();
        let (validator, rate, test_mode) =
            <(alloy_primitives::Address, U256, bool)>::abi_decode_params(&args, true).unwrap();
        assert_eq!(
            hem_core::Address::from(validator),
            deployment.nft_validator_id.to_solidity_address().unwrap()
        );
        assert_eq!(rate, U256::from(17_523_291u64));
        assert!(!test_mode);
        assert!(ledger.constructor_arguments(deployment.nft_validator_id).is_none());
    }
}
