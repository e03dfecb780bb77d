//! Signing-key protection at rest.
//!
//! A signer's seed never touches disk in the clear: it goes through the
//! configured secrets manager on the way out and back.

use sonate_crypto::SigningKeyPair;
use zeroize::Zeroize;

use crate::error::SecretsError;
use crate::{CiphertextToken, SecretsManager};

/// Encrypt a signing key's seed for storage.
pub async fn protect_signing_key(
    manager: &dyn SecretsManager,
    keypair: &SigningKeyPair,
    key_id: Option<&str>,
) -> Result<CiphertextToken, SecretsError> {
    let mut seed = keypair.seed_bytes();
    let token = manager.encrypt(&seed, key_id).await;
    seed.zeroize();
    token
}

/// Restore a signing key from its protected form.
pub async fn restore_signing_key(
    manager: &dyn SecretsManager,
    token: &CiphertextToken,
) -> Result<SigningKeyPair, SecretsError> {
    let mut seed_bytes = manager.decrypt(token).await?;
    let seed: [u8; 32] = seed_bytes.as_slice().try_into().map_err(|_| {
        SecretsError::InvalidToken(format!(
            "protected seed has {} bytes, expected 32",
            seed_bytes.len()
        ))
    })?;
    seed_bytes.zeroize();
    Ok(SigningKeyPair::from_seed(seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalSecretsProvider;

    #[tokio::test]
    async fn protect_restore_roundtrip() {
        let manager = LocalSecretsProvider::new("passphrase", "sonate-test-salt").unwrap();
        let keypair = SigningKeyPair::generate();

        let token = protect_signing_key(&manager, &keypair, None).await.unwrap();
        let restored = restore_signing_key(&manager, &token).await.unwrap();

        assert_eq!(restored.public_key_hex(), keypair.public_key_hex());
    }

    #[tokio::test]
    async fn wrong_passphrase_cannot_restore() {
        let manager = LocalSecretsProvider::new("passphrase", "sonate-test-salt").unwrap();
        let other = LocalSecretsProvider::new("different", "sonate-test-salt").unwrap();
        let keypair = SigningKeyPair::generate();

        let token = protect_signing_key(&manager, &keypair, None).await.unwrap();
        assert!(restore_signing_key(&other, &token).await.is_err());
    }

    #[tokio::test]
    async fn truncated_seed_is_rejected() {
        let manager = LocalSecretsProvider::new("passphrase", "sonate-test-salt").unwrap();
        let token = manager.encrypt(b"short", None).await.unwrap();
        assert!(matches!(
            restore_signing_key(&manager, &token).await,
            Err(SecretsError::InvalidToken(_))
        ));
    }
}
