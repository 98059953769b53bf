//! Instance-level settings that influence Git access.
//!
//! Loaded with the following precedence (highest to lowest):
//! 1. Environment variables (`GITWARD__*`)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::command::Protocol;
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use gitward_auth::{KeyAlgorithm, PublicKey};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix; `GITWARD__READ_ONLY_INSTANCE=true`.
pub const ENV_PREFIX: &str = "GITWARD";

/// Restriction value that forbids a key type outright.
pub const FORBIDDEN_KEY_VALUE: i32 = -1;

/// Per-algorithm SSH key rules.
///
/// `0` allows any size, [`FORBIDDEN_KEY_VALUE`] forbids the type and a
/// positive value is the minimum size in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyRestrictions {
    pub rsa: i32,
    pub dsa: i32,
    pub ecdsa: i32,
    pub ed25519: i32,
    pub ecdsa_sk: i32,
    pub ed25519_sk: i32,
}

/// Why a key was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyViolation {
    /// The key type is forbidden; carries the allowed types.
    TypeForbidden(Vec<KeyAlgorithm>),
    /// The key is smaller than the configured minimum.
    TooSmall(u32),
}

impl KeyRestrictions {
    /// Restriction value for an algorithm.
    pub fn restriction(&self, algorithm: KeyAlgorithm) -> i32 {
        match algorithm {
            KeyAlgorithm::Rsa => self.rsa,
            KeyAlgorithm::Dsa => self.dsa,
            KeyAlgorithm::Ecdsa => self.ecdsa,
            KeyAlgorithm::Ed25519 => self.ed25519,
            KeyAlgorithm::EcdsaSk => self.ecdsa_sk,
            KeyAlgorithm::Ed25519Sk => self.ed25519_sk,
        }
    }

    /// Algorithms that are not forbidden.
    pub fn allowed_algorithms(&self) -> Vec<KeyAlgorithm> {
        KeyAlgorithm::ALL
            .into_iter()
            .filter(|algorithm| self.restriction(*algorithm) != FORBIDDEN_KEY_VALUE)
            .collect()
    }

    /// Check a key against the rules.
    pub fn check(&self, key: &PublicKey) -> Result<(), KeyViolation> {
        match self.restriction(key.algorithm) {
            FORBIDDEN_KEY_VALUE => Err(KeyViolation::TypeForbidden(self.allowed_algorithms())),
            min if min > 0 && key.bits < min.unsigned_abs() => {
                Err(KeyViolation::TooSmall(min.unsigned_abs()))
            }
            _ => Ok(()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for algorithm in KeyAlgorithm::ALL {
            let value = self.restriction(algorithm);
            if value < FORBIDDEN_KEY_VALUE {
                return Err(ConfigError::Invalid(format!(
                    "key_restrictions.{}: {value} is below {FORBIDDEN_KEY_VALUE}",
                    algorithm.label().to_ascii_lowercase()
                )));
            }
        }
        Ok(())
    }
}

/// Instance settings consulted by every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Transports Git access is allowed over. `web` is always allowed.
    pub enabled_protocols: Vec<Protocol>,
    /// Allow `git-upload-pack` over HTTP.
    pub upload_pack_over_http: bool,
    /// Allow `git-receive-pack` over HTTP.
    pub receive_pack_over_http: bool,
    /// The whole instance rejects writes (e.g. a secondary or maintenance mode).
    pub read_only_instance: bool,
    /// Users must have accepted the terms of service.
    pub enforce_terms: bool,
    /// Administrators act as owners on every project.
    pub admin_mode: bool,
    /// Public URL of the instance, used in client guidance.
    pub base_url: String,
    /// Prefix for every line of a client-facing message.
    pub message_prefix: String,
    /// SSH key type and size rules.
    pub key_restrictions: KeyRestrictions,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            enabled_protocols: vec![Protocol::Ssh, Protocol::Http],
            upload_pack_over_http: true,
            receive_pack_over_http: true,
            read_only_instance: false,
            enforce_terms: false,
            admin_mode: false,
            base_url: "http://localhost".to_string(),
            message_prefix: "GitLab".to_string(),
            key_restrictions: KeyRestrictions::default(),
        }
    }
}

impl AccessConfig {
    /// Load from an optional TOML file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::Invalid(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("enabled_protocols"),
        );

        let config: AccessConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML string, without environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: AccessConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.message_prefix.contains('\n') {
            return Err(ConfigError::Invalid(
                "message_prefix must be a single line".to_string(),
            ));
        }
        self.key_restrictions.validate()
    }

    /// Whether Git access is allowed over `protocol`.
    pub fn protocol_allowed(&self, protocol: Protocol) -> bool {
        protocol == Protocol::Web || self.enabled_protocols.contains(&protocol)
    }

    /// Clone URL of a project path.
    pub fn url_to_repo(&self, full_path: &str) -> String {
        format!("{}/{}.git", self.base_url.trim_end_matches('/'), full_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AccessConfig::default();
        assert!(config.protocol_allowed(Protocol::Ssh));
        assert!(config.protocol_allowed(Protocol::Http));
        assert!(config.protocol_allowed(Protocol::Web));
        assert_eq!(config.message_prefix, "GitLab");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let config = AccessConfig::from_toml_str(
            r#"
            enabled_protocols = ["http"]
            receive_pack_over_http = false
            base_url = "https://gitlab.example.com/"
            "#,
        )
        .unwrap();

        assert!(!config.protocol_allowed(Protocol::Ssh));
        assert!(config.protocol_allowed(Protocol::Web));
        assert!(!config.receive_pack_over_http);
        assert!(config.upload_pack_over_http);
        assert_eq!(
            config.url_to_repo("acme/api"),
            "https://gitlab.example.com/acme/api.git"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = AccessConfig::from_toml_str(r#"base_url = "gitlab.example.com""#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "read_only_instance = true").unwrap();
        writeln!(file, "admin_mode = true").unwrap();

        let config = AccessConfig::load(Some(file.path())).unwrap();
        assert!(config.read_only_instance);
        assert!(config.admin_mode);
    }

    #[test]
    fn test_key_restrictions() {
        let config = AccessConfig::from_toml_str(
            r#"
            [key_restrictions]
            rsa = 4096
            dsa = -1
            "#,
        )
        .unwrap();
        let rules = config.key_restrictions;

        assert_eq!(
            rules.check(&PublicKey::new(KeyAlgorithm::Rsa, 2048)),
            Err(KeyViolation::TooSmall(4096))
        );
        assert!(rules.check(&PublicKey::new(KeyAlgorithm::Rsa, 4096)).is_ok());
        assert!(rules.check(&PublicKey::new(KeyAlgorithm::Ed25519, 256)).is_ok());

        let Err(KeyViolation::TypeForbidden(allowed)) =
            rules.check(&PublicKey::new(KeyAlgorithm::Dsa, 1024))
        else {
            panic!("dsa keys should be forbidden");
        };
        assert!(!allowed.contains(&KeyAlgorithm::Dsa));
        assert_eq!(allowed.len(), 5);

        let err = AccessConfig::from_toml_str("[key_restrictions]\necdsa = -2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AccessConfig::load(Some(Path::new("/nonexistent/gitward.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
