use std::{num::NonZeroU64, path::PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;
use zkap_pass::SigningKey;

use crate::{BYTES_PER_PASS, ConfigError};

/// Storage server settings, as found in the server's plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// The number of bytes one pass pays for.
    #[serde(default = "default_pass_value")]
    pub pass_value: NonZeroU64,
    /// A file holding the base64 issuer signing key.
    pub ristretto_signing_key_path: PathBuf,
    /// Where clients go to redeem vouchers for tokens.
    pub ristretto_issuer_root_url: Url,
}

fn default_pass_value() -> NonZeroU64 {
    BYTES_PER_PASS
}

/// What a server announces so clients know which issuer it accepts passes
/// from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Announcement {
    /// The issuer clients should redeem vouchers with.
    pub ristretto_issuer_root_url: Url,
    /// The base64 public keys of the accepted issuers.
    pub ristretto_public_keys: Vec<String>,
}

impl ServerConfig {
    /// Reads the signing key file. Surrounding whitespace is ignored.
    pub fn load_signing_key(&self) -> Result<SigningKey, ConfigError> {
        let text = std::fs::read_to_string(&self.ristretto_signing_key_path).map_err(|source| {
            ConfigError::Io {
                path: self.ristretto_signing_key_path.clone(),
                source,
            }
        })?;
        Ok(SigningKey::decode_base64(text.trim())?)
    }

    /// The announcement for a server using `signing_key`.
    pub fn announcement(&self, signing_key: &SigningKey) -> Announcement {
        Announcement {
            ristretto_issuer_root_url: self.ristretto_issuer_root_url.clone(),
            ristretto_public_keys: vec![signing_key.public_key().encode_base64()],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use serde_json::json;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn it_defaults_the_pass_value() -> Result<()> {
        let config: ServerConfig = serde_json::from_value(json!({
            "ristretto-signing-key-path": "/dev/null",
            "ristretto-issuer-root-url": "https://issuer.example/",
        }))?;

        assert_eq!(config.pass_value, BYTES_PER_PASS);
        Ok(())
    }

    #[test]
    fn it_rejects_a_zero_pass_value() {
        let result = serde_json::from_value::<ServerConfig>(json!({
            "pass-value": 0,
            "ristretto-signing-key-path": "/dev/null",
            "ristretto-issuer-root-url": "https://issuer.example/",
        }));

        assert!(result.is_err());
    }

    #[test]
    fn it_loads_a_signing_key_with_trailing_whitespace() -> Result<()> {
        let key = SigningKey::random();
        let mut file = NamedTempFile::new()?;
        writeln!(file, "  {}  ", key.encode_base64())?;

        let config: ServerConfig = serde_json::from_value(json!({
            "pass-value": 1000,
            "ristretto-signing-key-path": file.path(),
            "ristretto-issuer-root-url": "https://issuer.example/",
        }))?;

        assert_eq!(config.pass_value.get(), 1000);
        assert_eq!(config.load_signing_key()?.to_bytes(), key.to_bytes());

        let announcement = config.announcement(&key);
        assert_eq!(
            announcement.ristretto_public_keys,
            vec![key.public_key().encode_base64()]
        );
        assert_eq!(
            serde_json::to_value(&announcement)?["ristretto-issuer-root-url"],
            json!("https://issuer.example/")
        );
        Ok(())
    }

    #[test]
    fn it_reports_a_missing_key_file() -> Result<()> {
        let directory = tempfile::tempdir()?;
        let config = ServerConfig {
            pass_value: BYTES_PER_PASS,
            ristretto_signing_key_path: directory.path().join("missing"),
            ristretto_issuer_root_url: Url::parse("https://issuer.example/")?,
        };

        assert!(matches!(
            config.load_signing_key(),
            Err(ConfigError::Io { .. })
        ));
        Ok(())
    }

    #[test]
    fn it_reports_a_corrupt_key_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "not base64!")?;
        let config = ServerConfig {
            pass_value: BYTES_PER_PASS,
            ristretto_signing_key_path: file.path().to_owned(),
            ristretto_issuer_root_url: Url::parse("https://issuer.example/")?,
        };

        assert!(matches!(
            config.load_signing_key(),
            Err(ConfigError::Key(_))
        ));
        Ok(())
    }
}
