use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};
use zkap_storage::BYTES_PER_PASS;

/// Client settings, as found in the client's plugin configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientConfig {
    /// The number of bytes one pass pays for. Must match the server's.
    #[serde(default = "default_pass_value")]
    pub pass_value: NonZeroU64,
}

fn default_pass_value() -> NonZeroU64 {
    BYTES_PER_PASS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pass_value: BYTES_PER_PASS,
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    #[test]
    fn it_defaults_to_a_mebibyte_per_pass() -> Result<()> {
        let config: ClientConfig = serde_json::from_str("{}")?;
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.pass_value.get(), 1024 * 1024);
        Ok(())
    }

    #[test]
    fn it_reads_a_kebab_case_pass_value() -> Result<()> {
        let config: ClientConfig = serde_json::from_str(r#"{ "pass-value": 1000000 }"#)?;
        assert_eq!(config.pass_value.get(), 1_000_000);
        Ok(())
    }

    #[test]
    fn it_rejects_a_zero_pass_value() {
        assert!(serde_json::from_str::<ClientConfig>(r#"{ "pass-value": 0 }"#).is_err());
    }
}
