//! Sonate Secrets - envelope encryption behind pluggable providers.
//!
//! Three interchangeable providers implement the same contract: a local
//! passphrase-derived cipher, a cloud KMS delegate, and a Vault-style
//! reference store. Provider selection happens in [`build_secrets_manager`]
//! only; nothing outside the factory branches on provider identity, and no
//! API exists for falling back to plaintext.

#![deny(unsafe_code)]

pub mod error;
pub mod keystore;
pub mod kms;
pub mod local;
pub mod vault;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::SecretsError;
pub use keystore::{protect_signing_key, restore_signing_key};
pub use kms::KmsSecretsProvider;
pub use local::LocalSecretsProvider;
pub use vault::VaultSecretsProvider;

/// Which provider produced a ciphertext token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Local,
    Kms,
    Vault,
}

/// A self-describing ciphertext. Tokens from one provider are rejected by
/// another instead of being misinterpreted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextToken {
    pub provider: ProviderKind,
    pub key_id: String,
    pub payload: String,
}

/// Symmetric envelope encryption for platform secrets.
#[async_trait]
pub trait SecretsManager: Send + Sync {
    /// Encrypt a payload. `key_id` selects a named key where the provider
    /// supports more than one; `None` uses the configured default.
    async fn encrypt(
        &self,
        plaintext: &[u8],
        key_id: Option<&str>,
    ) -> Result<CiphertextToken, SecretsError>;

    /// Decrypt a token produced by this provider.
    async fn decrypt(&self, token: &CiphertextToken) -> Result<Vec<u8>, SecretsError>;

    /// Whether the backing provider is reachable and serviceable.
    async fn health_check(&self) -> bool;

    fn kind(&self) -> ProviderKind;
}

/// Provider selection, by configuration only.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum SecretsBackend {
    /// Local symmetric cipher; key derived from a passphrase.
    Local { passphrase: String, salt: String },
    /// External key-management service performing envelope encryption.
    Kms {
        endpoint: String,
        key_id: String,
        auth_token: String,
    },
    /// Secret store holding plaintext server-side, token is a reference path.
    Vault {
        addr: String,
        token: String,
        mount: String,
    },
}

/// Build the configured secrets manager.
pub fn build_secrets_manager(
    backend: &SecretsBackend,
) -> Result<Arc<dyn SecretsManager>, SecretsError> {
    match backend {
        SecretsBackend::Local { passphrase, salt } => {
            Ok(Arc::new(LocalSecretsProvider::new(passphrase, salt)?))
        }
        SecretsBackend::Kms {
            endpoint,
            key_id,
            auth_token,
        } => Ok(Arc::new(KmsSecretsProvider::new(
            endpoint, key_id, auth_token,
        ))),
        SecretsBackend::Vault { addr, token, mount } => {
            Ok(Arc::new(VaultSecretsProvider::new(addr, token, mount)))
        }
    }
}
