//! SSH public keys presented by users and deploy keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SSH key algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    Rsa,
    Dsa,
    Ecdsa,
    Ed25519,
    /// ECDSA on a hardware security key.
    EcdsaSk,
    /// Ed25519 on a hardware security key.
    Ed25519Sk,
}

impl KeyAlgorithm {
    /// Every algorithm, in display order.
    pub const ALL: [KeyAlgorithm; 6] = [
        KeyAlgorithm::Rsa,
        KeyAlgorithm::Dsa,
        KeyAlgorithm::Ecdsa,
        KeyAlgorithm::Ed25519,
        KeyAlgorithm::EcdsaSk,
        KeyAlgorithm::Ed25519Sk,
    ];

    /// Name shown to users (e.g. "ED25519_SK").
    pub fn label(self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::Dsa => "DSA",
            KeyAlgorithm::Ecdsa => "ECDSA",
            KeyAlgorithm::Ed25519 => "ED25519",
            KeyAlgorithm::EcdsaSk => "ECDSA_SK",
            KeyAlgorithm::Ed25519Sk => "ED25519_SK",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "rsa" => Ok(KeyAlgorithm::Rsa),
            "dsa" => Ok(KeyAlgorithm::Dsa),
            "ecdsa" => Ok(KeyAlgorithm::Ecdsa),
            "ed25519" => Ok(KeyAlgorithm::Ed25519),
            "ecdsa_sk" => Ok(KeyAlgorithm::EcdsaSk),
            "ed25519_sk" => Ok(KeyAlgorithm::Ed25519Sk),
            other => Err(format!("unknown key algorithm '{other}'")),
        }
    }
}

/// The parts of an SSH public key that access rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    /// Algorithm family.
    pub algorithm: KeyAlgorithm,
    /// Key size in bits.
    pub bits: u32,
}

impl PublicKey {
    pub fn new(algorithm: KeyAlgorithm, bits: u32) -> Self {
        Self { algorithm, bits }
    }
}

impl FromStr for PublicKey {
    type Err = String;

    /// Parse `<algorithm>:<bits>`, e.g. `rsa:4096`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, bits) = s
            .split_once(':')
            .ok_or_else(|| format!("expected <algorithm>:<bits>, got '{s}'"))?;
        let bits = bits
            .parse()
            .map_err(|_| format!("invalid key size '{bits}'"))?;
        Ok(Self::new(algorithm.parse()?, bits))
    }
}
