//! Configuration for the gateway

use serde::{Deserialize, Serialize};

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Shared secret for webhook signature verification
    pub webhook_secret: String,

    /// Upper bound on any single processor call, in milliseconds
    pub processor_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            webhook_secret: "change-me".to_string(),
            processor_timeout_ms: 10_000,
        }
    }
}

impl GatewayConfig {
    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = GatewayConfig::default();

        if let Ok(secret) = std::env::var("GATEWAY_WEBHOOK_SECRET") {
            config.webhook_secret = secret;
        }

        if let Ok(timeout) = std::env::var("GATEWAY_PROCESSOR_TIMEOUT_MS") {
            config.processor_timeout_ms = timeout.parse().map_err(|_| {
                crate::Error::Config(format!("Bad GATEWAY_PROCESSOR_TIMEOUT_MS: {}", timeout))
            })?;
        }

        Ok(config)
    }

    /// Processor call timeout
    pub fn processor_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.processor_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.processor_timeout_ms, 10_000);
        assert_eq!(
            config.processor_timeout(),
            std::time::Duration::from_secs(10)
        );
    }
}
