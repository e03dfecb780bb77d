use serde::{Deserialize, Serialize};
use sonate_crypto::PUBLIC_KEY_SIZE;

use crate::error::IdentityError;

const DID_PREFIX: &str = "did:sonate:";

/// A decentralized identifier, `did:sonate:<hex-encoded Ed25519 public key>`.
///
/// Derived deterministically from the key and immutable once created;
/// looked up by value, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    /// Derive the DID for a public key.
    pub fn from_public_key(public_key: &[u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(format!("{}{}", DID_PREFIX, hex::encode(public_key)))
    }

    /// Parse and validate a DID string.
    pub fn parse(value: &str) -> Result<Self, IdentityError> {
        let encoded = value
            .strip_prefix(DID_PREFIX)
            .ok_or_else(|| IdentityError::InvalidDid(value.to_string()))?;
        let bytes =
            hex::decode(encoded).map_err(|_| IdentityError::InvalidDid(value.to_string()))?;
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(IdentityError::InvalidDid(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// The public key the DID encodes.
    pub fn public_key_bytes(&self) -> Result<[u8; PUBLIC_KEY_SIZE], IdentityError> {
        let encoded = self
            .0
            .strip_prefix(DID_PREFIX)
            .ok_or_else(|| IdentityError::InvalidDid(self.0.clone()))?;
        let bytes =
            hex::decode(encoded).map_err(|_| IdentityError::InvalidDid(self.0.clone()))?;
        bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidDid(self.0.clone()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Did {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
