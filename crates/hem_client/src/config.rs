//! Configuration management for the Hem client

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use hem_core::rate::DEFAULT_TINYBAR_PER_CENT;
use hem_core::AccountId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const COINMARKETCAP_QUOTES_URL: &str =
    "https://pro-api.coinmarketcap.com/v2/cryptocurrency/quotes/latest";

/// CoinMarketCap id of HBAR
pub const HBAR_ASSET_ID: u64 = 4642;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Missing environment variable {0}")]
    MissingEnv(String),
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// Ledger network the client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Previewnet,
    /// Local node at 127.0.0.1:50211 with mirror at 127.0.0.1:5600
    Localhost,
    /// In-memory fake ledger
    Simulated,
}

impl Network {
    pub const LOCAL_NODE_ADDRESS: &'static str = "127.0.0.1:50211";
    pub const LOCAL_NODE_ACCOUNT: AccountId = AccountId::new(0, 0, 3);
    pub const LOCAL_MIRROR_ADDRESS: &'static str = "127.0.0.1:5600";
    /// Genesis operator of a local node
    pub const LOCAL_OPERATOR_ACCOUNT: AccountId = AccountId::new(0, 0, 2);
    pub const LOCAL_OPERATOR_KEY: &'static str = "302e020100300506032b65700422042091132178e72057a1d7528025956fe39b0b847f200ab59b2fdd367017f3087137";

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Previewnet => "previewnet",
            Network::Localhost => "localhost",
            Network::Simulated => "simulated",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "previewnet" => Ok(Network::Previewnet),
            "localhost" | "local" => Ok(Network::Localhost),
            "simulated" => Ok(Network::Simulated),
            other => Err(ConfigError::InvalidValue {
                name: "network".to_string(),
                reason: format!("unknown network `{}`", other),
            }),
        }
    }
}

/// External USD price feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeedConfig {
    pub url: String,
    pub api_key: String,
    pub asset_id: u64,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            url: COINMARKETCAP_QUOTES_URL.to_string(),
            api_key: String::new(),
            asset_id: HBAR_ASSET_ID,
        }
    }
}

/// Gas ceilings and query payments used for contract calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    /// Gas for state-changing contract calls
    pub execute: u64,
    /// Gas for read-only contract queries
    pub query: u64,
    /// Query payment in tinybar
    pub query_payment_tinybar: i64,
    pub nft_validator_deploy: u64,
    pub hem_deploy: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            execute: 1_000_000,
            query: 500_000,
            query_payment_tinybar: 100_000_000,
            nft_validator_deploy: 100_000,
            hem_deploy: 3_000_000,
        }
    }
}

/// Contract artifacts and constructor arguments for deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub hem_artifact: PathBuf,
    pub nft_validator_artifact: PathBuf,
    pub default_tinybar_per_cent: u64,
    /// Trailing boolean constructor argument of the escrow contract
    pub test_mode: bool,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            hem_artifact: PathBuf::from("build/Hem.json"),
            nft_validator_artifact: PathBuf::from("build/NFTValidator.json"),
            default_tinybar_per_cent: DEFAULT_TINYBAR_PER_CENT,
            test_mode: false,
        }
    }
}

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HemConfig {
    pub network: Network,
    #[serde(default)]
    pub price_feed: PriceFeedConfig,
    #[serde(default)]
    pub gas: GasSchedule,
    #[serde(default)]
    pub deploy: DeployConfig,
}

impl Default for HemConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            price_feed: PriceFeedConfig::default(),
            gas: GasSchedule::default(),
            deploy: DeployConfig::default(),
        }
    }
}

impl HemConfig {
    /// Load configuration from a specific file, with environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let builder = Self::defaults()?.add_source(config::File::from(path.as_ref()));
        Self::finish(builder)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Self::defaults()?
            .add_source(config::File::with_name("config/hem").required(false));
        Self::finish(builder)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(config::Config::builder()
            .set_default("network", "testnet")?
            .set_default("price_feed.url", COINMARKETCAP_QUOTES_URL)?
            .set_default("price_feed.api_key", "")?
            .set_default("price_feed.asset_id", HBAR_ASSET_ID as i64)?)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let config = builder
            // HEM_NETWORK, HEM_PRICE_FEED__API_KEY, ...
            .add_source(
                config::Environment::with_prefix("HEM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut hem_config: HemConfig = config.try_deserialize()?;
        if hem_config.price_feed.api_key.is_empty() {
            if let Ok(key) = std::env::var("COINMARKETCAP_API_KEY") {
                hem_config.price_feed.api_key = key;
            }
        }
        Ok(hem_config)
    }
}

/// Named account roles whose credentials live in the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Seller,
    Buyer,
}

impl Role {
    fn env_prefix(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Seller => "SELLER",
            Role::Buyer => "BUYER",
        }
    }
}

/// Account id and private key used to sign transactions
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub account_id: AccountId,
    pub private_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(account_id: AccountId, private_key: impl Into<String>) -> Self {
        Self {
            account_id,
            private_key: private_key.into(),
        }
    }

    /// Parse an account id string and private key
    pub fn parse(account_id: &str, private_key: &str) -> Result<Self, ConfigError> {
        let account_id = account_id
            .parse()
            .map_err(|e: hem_core::IdError| ConfigError::InvalidValue {
                name: "account id".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::new(account_id, private_key))
    }

    /// Read `<ROLE>_ACCOUNT_ID` and `<ROLE>_PRIVATE_KEY`
    pub fn from_env(role: Role) -> Result<Self, ConfigError> {
        let id_var = format!("{}_ACCOUNT_ID", role.env_prefix());
        let key_var = format!("{}_PRIVATE_KEY", role.env_prefix());

        let account_id =
            std::env::var(&id_var).map_err(|_| ConfigError::MissingEnv(id_var.clone()))?;
        let private_key =
            std::env::var(&key_var).map_err(|_| ConfigError::MissingEnv(key_var.clone()))?;

        Self::parse(&account_id, &private_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_network_parsing() {
        assert_eq!("testnet".parse::<Network>().unwrap(), Network::Testnet);
        assert_eq!("Localhost".parse::<Network>().unwrap(), Network::Localhost);
        assert_eq!("simulated".parse::<Network>().unwrap(), Network::Simulated);
        assert!("devnet".parse::<Network>().is_err());
    }

    #[test]
    fn test_default_gas_schedule() {
        let gas = GasSchedule::default();
        assert_eq!(gas.execute, 1_000_000);
        assert_eq!(gas.query, 500_000);
        assert_eq!(gas.query_payment_tinybar, 100_000_000);
        assert_eq!(gas.nft_validator_deploy, 100_000);
        assert_eq!(gas.hem_deploy, 3_000_000);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
network = "localhost"

[price_feed]
api_key = "test-key"

[gas]
execute = 2000000

[deploy]
test_mode = true
"#
        )
        .unwrap();

        let config = HemConfig::from_file(file.path()).unwrap();
        assert_eq!(config.network, Network::Localhost);
        assert_eq!(config.price_feed.api_key, "test-key");
        assert_eq!(config.price_feed.asset_id, HBAR_ASSET_ID);
        assert_eq!(config.price_feed.url, COINMARKETCAP_QUOTES_URL);
        assert_eq!(config.gas.execute, 2_000_000);
        assert_eq!(config.gas.query, 500_000);
        assert!(config.deploy.test_mode);
        assert_eq!(config.deploy.default_tinybar_per_cent, DEFAULT_TINYBAR_PER_CENT);
    }

    #[test]
    fn test_credentials_parse_and_redaction() {
        let creds = Credentials::parse("0.0.1002", "302e0201").unwrap();
        assert_eq!(creds.account_id, AccountId::new(0, 0, 1002));
        assert!(!format!("{:?}", creds).contains("302e0201"));
        assert!(Credentials::parse("not-an-id", "key").is_err());
    }

    #[test]
    fn test_missing_credentials() {
        std::env::remove_var("BUYER_ACCOUNT_ID");
        assert!(matches!(
            Credentials::from_env(Role::Buyer),
            Err(ConfigError::MissingEnv(name)) if name == "BUYER_ACCOUNT_ID"
        ));
    }
}
