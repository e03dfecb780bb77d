use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sonate_crypto::canonical_hash;
use sonate_types::CredentialId;

use crate::did::Did;

/// One capability granted to the subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityClaim {
    pub capability: String,
}

/// Detached proof over the canonical credential body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialProof {
    pub signature_hex: String,
    /// Key id of the issuer key that produced the signature.
    pub verification_method: String,
    pub created: DateTime<Utc>,
}

/// A signed claim binding capabilities to a DID.
///
/// Never mutated post-issuance; revocation is tracked out-of-band in the
/// revocation store under `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifiableCredential {
    pub id: CredentialId,
    pub types: Vec<String>,
    pub issuer: Did,
    pub subject: Did,
    pub claims: Vec<CapabilityClaim>,
    pub issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<CredentialProof>,
}

impl VerifiableCredential {
    /// Canonical hash of the credential body, excluding the proof. This is
    /// exactly what the issuer signed.
    pub fn body_hash(&self) -> String {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.remove("proof");
        }
        canonical_hash(&value)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Outcome of credential verification. Malformed or failing credentials are
/// reported here with a structured reason, never as an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialVerification {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<VerificationFailure>,
}

impl CredentialVerification {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn failed(reason: VerificationFailure) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationFailure {
    MissingProof,
    MalformedIssuer,
    SignatureMismatch,
    Expired,
    Revoked,
}
