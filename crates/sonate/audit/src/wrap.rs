//! Audit decorators.
//!
//! Any component implementing a core trait can be wrapped by another
//! implementation of the same trait that records an audit event and
//! delegates unchanged. This is the standard pattern for adding
//! cross-cutting observability without touching the wrapped contract.

use std::sync::Arc;

use async_trait::async_trait;
use sonate_crypto::{CryptoError, SignatureBundle, Signer};
use sonate_secrets::{CiphertextToken, ProviderKind, SecretsError, SecretsManager};
use sonate_types::ActionOutcome;

use crate::event::{AuditCategory, AuditEvent, AuditSeverity};
use crate::ledger::AuditLedger;

/// Wraps a [`Signer`], emitting one audit event per signing operation.
pub struct AuditedSigner<S: Signer> {
    inner: S,
    ledger: Arc<AuditLedger>,
    component: String,
}

impl<S: Signer> AuditedSigner<S> {
    pub fn new(inner: S, ledger: Arc<AuditLedger>, component: impl Into<String>) -> Self {
        Self {
            inner,
            ledger,
            component: component.into(),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Signer> Signer for AuditedSigner<S> {
    fn sign(&self, message: &[u8]) -> Result<SignatureBundle, CryptoError> {
        let result = self.inner.sign(message);

        let outcome = match &result {
            Ok(_) => ActionOutcome::Success,
            Err(e) => ActionOutcome::failure(e.to_string()),
        };
        let _ = self.ledger.log_event(
            AuditEvent::builder()
                .category(AuditCategory::Security)
                .event_type("signing_operation")
                .severity(AuditSeverity::Info)
                .description(format!("signed {} bytes", message.len()))
                .source(self.component.clone(), "sign")
                .outcome(outcome)
                .metadata("key_id", self.inner.key_id()),
        );

        result
    }

    fn public_key_hex(&self) -> String {
        self.inner.public_key_hex()
    }

    fn key_id(&self) -> String {
        self.inner.key_id()
    }
}

/// Wraps a [`SecretsManager`], emitting one audit event per operation.
pub struct AuditedSecrets<M: SecretsManager> {
    inner: M,
    ledger: Arc<AuditLedger>,
    component: String,
}

impl<M: SecretsManager> AuditedSecrets<M> {
    pub fn new(inner: M, ledger: Arc<AuditLedger>, component: impl Into<String>) -> Self {
        Self {
            inner,
            ledger,
            component: component.into(),
        }
    }

    fn record(&self, method: &'static str, outcome: ActionOutcome) {
        let _ = self.ledger.log_event(
            AuditEvent::builder()
                .category(AuditCategory::Security)
                .event_type("secrets_operation")
                .description(format!("secrets {} via {:?}", method, self.inner.kind()))
                .source(self.component.clone(), method)
                .outcome(outcome),
        );
    }
}

#[async_trait]
impl<M: SecretsManager> SecretsManager for AuditedSecrets<M> {
    async fn encrypt(
        &self,
        plaintext: &[u8],
        key_id: Option<&str>,
    ) -> Result<CiphertextToken, SecretsError> {
        let result = self.inner.encrypt(plaintext, key_id).await;
        let outcome = match &result {
            Ok(_) => ActionOutcome::Success,
            Err(e) => ActionOutcome::failure(e.to_string()),
        };
        self.record("encrypt", outcome);
        result
    }

    async fn decrypt(&self, token: &CiphertextToken) -> Result<Vec<u8>, SecretsError> {
        let result = self.inner.decrypt(token).await;
        let outcome = match &result {
            Ok(_) => ActionOutcome::Success,
            Err(e) => ActionOutcome::failure(e.to_string()),
        };
        self.record("decrypt", outcome);
        result
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }

    fn kind(&self) -> ProviderKind {
        self.inner.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::AuditFilter;
    use sonate_crypto::{verify_signature_hex, Ed25519Signer};
    use sonate_secrets::LocalSecretsProvider;

    #[test]
    fn audited_signer_preserves_signature_contract() {
        let ledger = Arc::new(AuditLedger::in_memory());
        let signer = AuditedSigner::new(Ed25519Signer::generate(), Arc::clone(&ledger), "tests");

        let bundle = signer.sign(b"message").unwrap();
        assert!(verify_signature_hex(
            &signer.public_key_hex(),
            b"message",
            &bundle.hex
        ));

        let page = ledger.query_events(&AuditFilter::default()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.events[0].event_type, "signing_operation");
        assert!(page.events[0].outcome.is_success());
    }

    #[test]
    fn each_signing_operation_is_recorded() {
        let ledger = Arc::new(AuditLedger::in_memory());
        let signer = AuditedSigner::new(Ed25519Signer::generate(), Arc::clone(&ledger), "tests");

        for _ in 0..3 {
            signer.sign(b"m").unwrap();
        }
        assert_eq!(ledger.query_events(&AuditFilter::default()).unwrap().total, 3);
    }

    #[tokio::test]
    async fn audited_secrets_records_both_directions() {
        let ledger = Arc::new(AuditLedger::in_memory());
        let provider = LocalSecretsProvider::new("passphrase", "salt-value").unwrap();
        let secrets = AuditedSecrets::new(provider, Arc::clone(&ledger), "tests");

        let token = secrets.encrypt(b"payload", None).await.unwrap();
        let plaintext = secrets.decrypt(&token).await.unwrap();
        assert_eq!(plaintext, b"payload");

        let page = ledger.query_events(&AuditFilter::default()).unwrap();
        assert_eq!(page.total, 2);
        assert!(page
            .events
            .iter()
            .all(|e| e.event_type == "secrets_operation"));
    }

    #[tokio::test]
    async fn failed_operations_are_recorded_with_failure_outcome() {
        let ledger = Arc::new(AuditLedger::in_memory());
        let provider = LocalSecretsProvider::new("passphrase", "salt-value").unwrap();
        let secrets = AuditedSecrets::new(provider, Arc::clone(&ledger), "tests");

        let bogus = CiphertextToken {
            provider: ProviderKind::Vault,
            key_id: "k".into(),
            payload: "p".into(),
        };
        assert!(secrets.decrypt(&bogus).await.is_err());

        let page = ledger.query_events(&AuditFilter::default()).unwrap();
        assert_eq!(page.total, 1);
        assert!(!page.events[0].outcome.is_success());
    }
}
