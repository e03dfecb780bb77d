//! Vault-style provider: plaintext is stored server-side under a generated
//! KV path and the reference path is returned as the "ciphertext".

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::SecretsError;
use crate::{CiphertextToken, ProviderKind, SecretsManager};

pub struct VaultSecretsProvider {
    client: reqwest::Client,
    addr: String,
    token: String,
    mount: String,
}

#[derive(Deserialize)]
struct KvReadResponse {
    data: KvReadData,
}

#[derive(Deserialize)]
struct KvReadData {
    data: KvValue,
}

#[derive(Deserialize)]
struct KvValue {
    value: String,
}

impl VaultSecretsProvider {
    pub fn new(addr: &str, token: &str, mount: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            addr: addr.trim_end_matches('/').to_string(),
            token: token.to_string(),
            mount: mount.to_string(),
        }
    }

    fn data_url(&self, path: &str) -> String {
        format!("{}/v1/{}/data/{}", self.addr, self.mount, path)
    }
}

#[async_trait]
impl SecretsManager for VaultSecretsProvider {
    async fn encrypt(
        &self,
        plaintext: &[u8],
        key_id: Option<&str>,
    ) -> Result<CiphertextToken, SecretsError> {
        let namespace = key_id.unwrap_or("sonate");
        let path = format!("{}/{}", namespace, Uuid::new_v4());

        let response = self
            .client
            .post(self.data_url(&path))
            .header("X-Vault-Token", &self.token)
            .json(&serde_json::json!({
                "data": { "value": BASE64.encode(plaintext) }
            }))
            .send()
            .await
            .map_err(|e| SecretsError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SecretsError::EncryptFailed(format!(
                "vault returned {}",
                response.status()
            )));
        }

        Ok(CiphertextToken {
            provider: ProviderKind::Vault,
            key_id: namespace.to_string(),
            payload: path,
        })
    }

    async fn decrypt(&self, token: &CiphertextToken) -> Result<Vec<u8>, SecretsError> {
        if token.provider != ProviderKind::Vault {
            return Err(SecretsError::WrongProvider {
                expected: ProviderKind::Vault,
                actual: token.provider,
            });
        }

        let response = self
            .client
            .get(self.data_url(&token.payload))
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .map_err(|e| SecretsError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SecretsError::DecryptFailed);
        }

        let body: KvReadResponse = response
            .json()
            .await
            .map_err(|e| SecretsError::Unavailable(e.to_string()))?;

        BASE64
            .decode(&body.data.data.value)
            .map_err(|e| SecretsError::InvalidToken(e.to_string()))
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/v1/sys/health", self.addr))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "vault health check failed");
                false
            }
        }
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Vault
    }
}
