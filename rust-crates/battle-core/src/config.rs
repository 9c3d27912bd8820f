use crate::{
    amount::Wei,
    battle::{
        Address,
        TxHash,
    },
};
use anyhow::{
    Context,
    ensure,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    ops::RangeInclusive,
    path::Path,
    time::Duration,
};

pub const HASHKEY_CHAIN_ID: u64 = 133;
pub const HASHKEY_CHAIN_NAME: &str = "HashKey Testnet";
pub const HASHKEY_RPC_URL: &str = "https://hashkeychain-testnet.alt.technology";
pub const HASHKEY_EXPLORER_URL: &str = "https://hashkeychain-testnet-explorer.alt.technology";
pub const HASHKEY_CURRENCY_SYMBOL: &str = "HSK";
pub const LOCAL_CHAIN_ID: u64 = 31337;
pub const LOCAL_RPC_URL: &str = "http://127.0.0.1:8545";

pub const DEFAULT_MINIMUM_COMMITTEE: u32 = 3;
pub const DEFAULT_DURATION_DAYS: u8 = 7;
pub const QUIZ_WINDOW: Duration = Duration::from_secs(3);
pub const QUIZ_COUNT_RANGE: RangeInclusive<usize> = 1..=5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub explorer_url: Option<String>,
    pub currency_symbol: String,
    pub factory_address: Option<Address>,
}

impl NetworkConfig {
    pub fn hashkey_testnet() -> Self {
        Self {
            chain_id: HASHKEY_CHAIN_ID,
            name: HASHKEY_CHAIN_NAME.to_string(),
            rpc_url: HASHKEY_RPC_URL.to_string(),
            explorer_url: Some(HASHKEY_EXPLORER_URL.to_string()),
            currency_symbol: HASHKEY_CURRENCY_SYMBOL.to_string(),
            factory_address: None,
        }
    }

    pub fn local() -> Self {
        Self {
            chain_id: LOCAL_CHAIN_ID,
            name: "Local".to_string(),
            rpc_url: LOCAL_RPC_URL.to_string(),
            explorer_url: None,
            currency_symbol: "ETH".to_string(),
            factory_address: None,
        }
    }

    /// Amount in ether followed by the network's currency symbol.
    pub fn format_amount(&self, amount: Wei) -> String {
        format!("{} {}", amount.format_ether(), self.currency_symbol)
    }

    /// Block explorer link for a transaction, when the network has an explorer.
    pub fn tx_url(&self, tx: &TxHash) -> Option<String> {
        self.explorer_url
            .as_deref()
            .map(|base| format!("{}/tx/{tx}", base.trim_end_matches('/')))
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::hashkey_testnet()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    pub network: NetworkConfig,
    pub minimum_committee: u32,
    pub duration_days: u8,
    pub quiz_window_ms: u64,
    /// Accept a challenger without requiring every quiz statement to be filled in.
    pub skip_quiz_validation: bool,
    /// Deploy contracts through the contract gateway; when off battles stay local.
    pub deploy_contracts: bool,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            minimum_committee: DEFAULT_MINIMUM_COMMITTEE,
            duration_days: DEFAULT_DURATION_DAYS,
            quiz_window_ms: QUIZ_WINDOW.as_millis() as u64,
            skip_quiz_validation: false,
            deploy_contracts: true,
        }
    }
}

impl BattleConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.quiz_window_ms > 0, "quiz_window_ms must be greater than zero");
        Ok(())
    }

    pub fn quiz_window(&self) -> Duration {
        Duration::from_millis(self.quiz_window_ms)
    }
}
