//! Cloud-KMS provider: envelope encryption is delegated to an external
//! key-management service; this process never holds the long-term key.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use tracing::warn;

use crate::error::SecretsError;
use crate::{CiphertextToken, ProviderKind, SecretsManager};

pub struct KmsSecretsProvider {
    client: reqwest::Client,
    endpoint: String,
    default_key_id: String,
    auth_token: String,
}

#[derive(Deserialize)]
struct EncryptResponse {
    ciphertext: String,
}

#[derive(Deserialize)]
struct DecryptResponse {
    plaintext: String,
}

impl KmsSecretsProvider {
    pub fn new(endpoint: &str, key_id: &str, auth_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            default_key_id: key_id.to_string(),
            auth_token: auth_token.to_string(),
        }
    }

    fn key_url(&self, key_id: &str, op: &str) -> String {
        format!("{}/v1/keys/{}/{}", self.endpoint, key_id, op)
    }
}

#[async_trait]
impl SecretsManager for KmsSecretsProvider {
    async fn encrypt(
        &self,
        plaintext: &[u8],
        key_id: Option<&str>,
    ) -> Result<CiphertextToken, SecretsError> {
        let key_id = key_id.unwrap_or(&self.default_key_id);
        let response = self
            .client
            .post(self.key_url(key_id, "encrypt"))
            .bearer_auth(&self.auth_token)
            .json(&serde_json::json!({ "plaintext": BASE64.encode(plaintext) }))
            .send()
            .await
            .map_err(|e| SecretsError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SecretsError::EncryptFailed(format!(
                "kms returned {}",
                response.status()
            )));
        }

        let body: EncryptResponse = response
            .json()
            .await
            .map_err(|e| SecretsError::Unavailable(e.to_string()))?;

        Ok(CiphertextToken {
            provider: ProviderKind::Kms,
            key_id: key_id.to_string(),
            payload: body.ciphertext,
        })
    }

    async fn decrypt(&self, token: &CiphertextToken) -> Result<Vec<u8>, SecretsError> {
        if token.provider != ProviderKind::Kms {
            return Err(SecretsError::WrongProvider {
                expected: ProviderKind::Kms,
                actual: token.provider,
            });
        }

        let response = self
            .client
            .post(self.key_url(&token.key_id, "decrypt"))
            .bearer_auth(&self.auth_token)
            .json(&serde_json::json!({ "ciphertext": token.payload }))
            .send()
            .await
            .map_err(|e| SecretsError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SecretsError::DecryptFailed);
        }

        let body: DecryptResponse = response
            .json()
            .await
            .map_err(|e| SecretsError::Unavailable(e.to_string()))?;

        BASE64
            .decode(&body.plaintext)
            .map_err(|e| SecretsError::InvalidToken(e.to_string()))
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/v1/health", self.endpoint))
            .bearer_auth(&self.auth_token)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "kms health check failed");
                false
            }
        }
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Kms
    }
}
