use anyhow::{Context, Result};
use hem_client::test_helpers::FakeLedger;
use hem_client::{ContractArtifact, Credentials, HemAccount, HemConfig, Ledger, Network, NewAccount, Role};
use hem_core::ContractId;
use std::sync::Arc;
use tracing::{info, warn};

/// Stand-in bytecode deployed on the simulated network, which never executes it
const SIMULATED_BYTECODE: &str = "608060405234801561001057600080fd5b50";

/// Connection state shared by the accounts of one command run.
///
/// The simulated ledger lives only as long as this session, so commands
/// that expect earlier deployments only make sense against a real network.
pub struct Session<'a> {
    pub config: &'a HemConfig,
    pub network: Network,
    simulated: Option<FakeLedger>,
}

impl<'a> Session<'a> {
    pub fn new(config: &'a HemConfig, network: Network) -> Self {
        let simulated = (network == Network::Simulated).then(FakeLedger::new);
        if simulated.is_some() {
            info!("Using an in-memory ledger for this run");
        }
        Self {
            config,
            network,
            simulated,
        }
    }

    pub fn ledger(&self, credentials: &Credentials) -> Result<Arc<dyn Ledger>> {
        match &self.simulated {
            Some(fake) => Ok(Arc::new(
                fake.as_operator(credentials.account_id, &credentials.private_key)?,
            )),
            None => Ok(hem_client::connect(self.network, credentials)
                .with_context(|| format!("Failed to connect to {}", self.network))?),
        }
    }

    /// Facade for `credentials` bound to the escrow at `contract_id`
    pub fn account(&self, credentials: &Credentials, contract_id: ContractId) -> Result<HemAccount> {
        Ok(HemAccount::new(self.ledger(credentials)?, contract_id).with_gas(self.config.gas.clone()))
    }

    pub fn join(&self, created: &NewAccount, contract_id: ContractId) -> Result<HemAccount> {
        self.account(
            &Credentials::new(created.account_id, created.private_key.clone()),
            contract_id,
        )
    }

    /// Credentials of the contract administrator.
    ///
    /// Local networks fall back to the genesis operator when `ADMIN_*` is unset.
    pub fn admin_credentials(&self) -> Result<Credentials> {
        match Credentials::from_env(Role::Admin) {
            Ok(credentials) => Ok(credentials),
            Err(e) if matches!(self.network, Network::Simulated | Network::Localhost) => {
                warn!("{}, signing as the genesis operator", e);
                Ok(Self::genesis_credentials())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn genesis_credentials() -> Credentials {
        Credentials::new(Network::LOCAL_OPERATOR_ACCOUNT, Network::LOCAL_OPERATOR_KEY)
    }

    pub fn role_credentials(&self, role: Role) -> Result<Credentials> {
        Credentials::from_env(role).with_context(|| format!("No credentials for {:?}", role))
    }

    /// Bytecode of the NFT validator and the escrow contract, in that order
    pub fn artifacts(&self) -> Result<(ContractArtifact, ContractArtifact)> {
        let deploy = &self.config.deploy;
        if self.simulated.is_some() {
            let stub = ContractArtifact::new(SIMULATED_BYTECODE)?;
            return Ok((stub.clone(), stub));
        }

        let nft_validator = ContractArtifact::from_file(&deploy.nft_validator_artifact)?;
        let hem = ContractArtifact::from_file(&deploy.hem_artifact)?;
        Ok((nft_validator, hem))
    }
}
