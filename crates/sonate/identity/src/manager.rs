use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use sonate_crypto::{verify_signature, Ed25519Signer, Signer};
use sonate_store::RevocationStore;
use sonate_types::CredentialId;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::credential::{
    CapabilityClaim, CredentialProof, CredentialVerification, VerifiableCredential,
    VerificationFailure,
};
use crate::did::Did;
use crate::error::IdentityError;

/// Issues DIDs and capability credentials, and verifies presented
/// credentials against issuer keys and the revocation store.
pub struct DidManager {
    /// Owner identity -> issued DID. Makes `create_did` deterministic per
    /// owner within a process lifetime.
    owners: DashMap<String, Did>,
    /// DID -> controlling signer.
    signers: DashMap<String, Arc<Ed25519Signer>>,
    revocations: Arc<dyn RevocationStore>,
    /// Validity window applied to new credentials; `None` issues
    /// non-expiring credentials.
    credential_ttl: Option<Duration>,
}

impl DidManager {
    pub fn new(revocations: Arc<dyn RevocationStore>) -> Self {
        Self {
            owners: DashMap::new(),
            signers: DashMap::new(),
            revocations,
            credential_ttl: None,
        }
    }

    pub fn with_credential_ttl(mut self, ttl: Duration) -> Self {
        self.credential_ttl = Some(ttl);
        self
    }

    /// Create (or return the existing) DID for an owner identity.
    pub fn create_did(&self, owner_id: &str) -> Did {
        if let Some(existing) = self.owners.get(owner_id) {
            return existing.clone();
        }

        let entry = self.owners.entry(owner_id.to_string()).or_insert_with(|| {
            let signer = Arc::new(Ed25519Signer::generate());
            let did = Did::from_public_key(&signer.public_key_bytes());
            self.signers.insert(did.as_str().to_string(), signer);
            debug!(owner = owner_id, did = %did, "did created");
            did
        });
        entry.clone()
    }

    /// Resolve a DID this manager controls to its signer.
    fn signer_for(&self, did: &Did) -> Result<Arc<Ed25519Signer>, IdentityError> {
        self.signers
            .get(did.as_str())
            .map(|s| Arc::clone(&s))
            .ok_or_else(|| IdentityError::UnknownDid(did.as_str().to_string()))
    }

    /// Mint one credential per capability, each signed over its canonical
    /// body and independently revocable.
    pub fn issue_credentials(
        &self,
        did: &Did,
        capabilities: &[&str],
    ) -> Result<Vec<VerifiableCredential>, IdentityError> {
        let signer = self.signer_for(did)?;
        let now = Utc::now();

        let mut credentials = Vec::with_capacity(capabilities.len());
        for capability in capabilities {
            let mut credential = VerifiableCredential {
                id: CredentialId::new(Uuid::new_v4().to_string()),
                types: vec![
                    "VerifiableCredential".to_string(),
                    "CapabilityCredential".to_string(),
                ],
                issuer: did.clone(),
                subject: did.clone(),
                claims: vec![CapabilityClaim {
                    capability: (*capability).to_string(),
                }],
                issued_at: now,
                expires_at: self.credential_ttl.map(|ttl| now + ttl),
                proof: None,
            };

            let body_hash = credential.body_hash();
            let signature = signer.sign(body_hash.as_bytes())?;
            credential.proof = Some(CredentialProof {
                signature_hex: signature.hex,
                verification_method: signer.key_id(),
                created: now,
            });
            credentials.push(credential);
        }

        debug!(did = %did, count = credentials.len(), "credentials issued");
        Ok(credentials)
    }

    /// Verify a presented credential. Returns a structured result; only a
    /// revocation-store outage is an error.
    pub async fn verify_credential(
        &self,
        credential: &VerifiableCredential,
    ) -> Result<CredentialVerification, IdentityError> {
        let Some(proof) = &credential.proof else {
            return Ok(CredentialVerification::failed(
                VerificationFailure::MissingProof,
            ));
        };

        let Ok(issuer_key) = credential.issuer.public_key_bytes() else {
            return Ok(CredentialVerification::failed(
                VerificationFailure::MalformedIssuer,
            ));
        };

        let Ok(signature) = hex::decode(&proof.signature_hex) else {
            return Ok(CredentialVerification::failed(
                VerificationFailure::SignatureMismatch,
            ));
        };

        let body_hash = credential.body_hash();
        if !verify_signature(&issuer_key, body_hash.as_bytes(), &signature) {
            warn!(credential = %credential.id, issuer = %credential.issuer,
                  "credential signature mismatch");
            return Ok(CredentialVerification::failed(
                VerificationFailure::SignatureMismatch,
            ));
        }

        if credential.is_expired(Utc::now()) {
            return Ok(CredentialVerification::failed(VerificationFailure::Expired));
        }

        if self.revocations.is_revoked(credential.id.as_str()).await? {
            warn!(credential = %credential.id, "revoked credential presented");
            return Ok(CredentialVerification::failed(VerificationFailure::Revoked));
        }

        Ok(CredentialVerification::ok())
    }

    /// Invalidate a credential by id.
    pub async fn revoke_credential(
        &self,
        id: &CredentialId,
        reason: &str,
    ) -> Result<(), IdentityError> {
        self.revocations.revoke(id.as_str(), reason, None).await?;
        Ok(())
    }
}
