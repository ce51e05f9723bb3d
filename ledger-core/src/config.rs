//! Configuration for the ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Fee configuration
    pub fees: FeeConfig,

    /// Reconciliation configuration
    pub reconcile: ReconcileConfig,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            service_name: "ledger-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            fees: FeeConfig::default(),
            reconcile: ReconcileConfig::default(),
            rocksdb: RocksDbConfig::default(),
        }
    }
}

/// Platform fee configuration
///
/// Injected into every credit operation rather than read from a global, so
/// tests and environments can vary it freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Platform's share of each completed payment, in percent (0-100)
    pub platform_percent: Decimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            platform_percent: Decimal::from(20),
        }
    }
}

/// Reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Differences at or below this threshold are treated as rounding noise
    /// and left alone
    pub drift_tolerance: Decimal,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            drift_tolerance: Decimal::new(1, 2), // 0.01
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            target_file_size_mb: 64,
            max_background_jobs: 4,
            enable_statistics: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(percent) = std::env::var("LEDGER_FEE_PERCENT") {
            config.fees.platform_percent = percent
                .parse()
                .map_err(|_| crate::Error::Config(format!("Bad LEDGER_FEE_PERCENT: {}", percent)))?;
        }

        if let Ok(tolerance) = std::env::var("LEDGER_DRIFT_TOLERANCE") {
            config.reconcile.drift_tolerance = tolerance.parse().map_err(|_| {
                crate::Error::Config(format!("Bad LEDGER_DRIFT_TOLERANCE: {}", tolerance))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> crate::Result<()> {
        let percent = self.fees.platform_percent;
        if percent < Decimal::ZERO || percent >= Decimal::ONE_HUNDRED {
            return Err(crate::Error::Config(format!(
                "Platform fee percent must be in [0, 100): {}",
                percent
            )));
        }
        if self.reconcile.drift_tolerance < Decimal::ZERO {
            return Err(crate::Error::Config(
                "Drift tolerance must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "ledger-core");
        assert_eq!(config.fees.platform_percent, Decimal::from(20));
        assert_eq!(config.reconcile.drift_tolerance, Decimal::new(1, 2));
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_full_fee() {
        let mut config = Config::default();
        config.fees.platform_percent = Decimal::ONE_HUNDRED;
        assert!(config.validate().is_err());
    }
}
