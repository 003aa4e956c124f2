use std::{
    env,
    path::{Path, PathBuf},
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the default data directory.
pub const HOME_ENV_VAR: &str = "BUZZKILL_HOME";
const DEFAULT_DIR_NAME: &str = ".buzzkill";

/// User preferences. Every field has a serde default so older files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_locale")]
    pub locale: String,
    #[serde(default = "Config::default_currency")]
    pub currency: String,
    #[serde(default = "Config::default_limit_value")]
    pub default_limit: Decimal,
    #[serde(default = "Config::default_limit_step")]
    pub limit_step: Decimal,
    #[serde(default = "Config::default_preset_limits")]
    pub preset_limits: Vec<Decimal>,
    #[serde(default)]
    pub near_limit_warning: NearLimitWarning,
    /// The limit most recently locked in with `start`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_limit: Option<Decimal>,
    #[serde(default = "Config::default_backup_retention")]
    pub backup_retention: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional directory for the ledger file. Defaults to the session base directory.
    pub data_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: Self::default_locale(),
            currency: Self::default_currency(),
            default_limit: Self::default_limit_value(),
            limit_step: Self::default_limit_step(),
            preset_limits: Self::default_preset_limits(),
            near_limit_warning: NearLimitWarning::default(),
            last_limit: None,
            backup_retention: Self::default_backup_retention(),
            data_root: None,
        }
    }
}

impl Config {
    pub fn default_locale() -> String {
        "en-US".into()
    }

    pub fn default_currency() -> String {
        "USD".into()
    }

    pub fn default_limit_value() -> Decimal {
        Decimal::from(50)
    }

    pub fn default_limit_step() -> Decimal {
        Decimal::from(5)
    }

    pub fn default_preset_limits() -> Vec<Decimal> {
        vec![Decimal::from(30), Decimal::from(50), Decimal::from(100)]
    }

    pub fn default_backup_retention() -> usize {
        5
    }

    /// `$BUZZKILL_HOME`, else `~/.buzzkill`.
    pub fn default_base_dir() -> PathBuf {
        if let Some(home) = env::var_os(HOME_ENV_VAR).filter(|value| !value.is_empty()) {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DIR_NAME)
    }

    pub fn resolve_data_root(&self, base: &Path) -> PathBuf {
        self.data_root
            .clone()
            .unwrap_or_else(|| base.to_path_buf())
    }

    /// The limit `start` uses when none is given: the last one locked in, else the default.
    pub fn suggested_limit(&self) -> Decimal {
        self.last_limit.unwrap_or(self.default_limit)
    }

    /// Positive presets in ascending order without duplicates.
    pub fn presets(&self) -> Vec<Decimal> {
        let mut presets: Vec<Decimal> = self
            .preset_limits
            .iter()
            .copied()
            .filter(|limit| *limit > Decimal::ZERO)
            .collect();
        presets.sort();
        presets.dedup();
        presets
    }

    pub fn near_limit_threshold(&self) -> Option<u8> {
        self.near_limit_warning
            .enabled
            .then(|| self.near_limit_warning.threshold_percent.min(100))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearLimitWarning {
    #[serde(default = "NearLimitWarning::default_enabled")]
    pub enabled: bool,
    #[serde(default = "NearLimitWarning::default_threshold_percent")]
    pub threshold_percent: u8,
}

impl NearLimitWarning {
    fn default_enabled() -> bool {
        true
    }

    fn default_threshold_percent() -> u8 {
        80
    }
}

impl Default for NearLimitWarning {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            threshold_percent: Self::default_threshold_percent(),
        }
    }
}
