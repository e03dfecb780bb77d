use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sonate_crypto::{canonical_hash, sha256_hex};
use sonate_types::SessionId;

/// Sentinel `previous_hash` for the first receipt of a session.
pub const GENESIS_HASH: &str = "GENESIS";

/// Receipt format version, covered by the self hash.
pub const RECEIPT_VERSION: &str = "1.0";

/// One signed, hash-linked record of an agent action.
///
/// The payload is always bound through `payload_hash`; the payload content
/// itself is only embedded when the caller opted in at append time, so a
/// chain can be published without leaking action contents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustReceipt {
    pub version: String,
    /// Content hash of every field below except `signature_hex`.
    pub self_hash: String,
    /// `self_hash` of the prior receipt in this session, or [`GENESIS_HASH`].
    pub previous_hash: String,
    pub session_id: SessionId,
    /// Claimed once per receipt; prevents replay within a session.
    pub session_nonce: String,
    pub timestamp: DateTime<Utc>,
    pub payload_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub signature_hex: String,
    /// Hex-encoded Ed25519 public key that verifies `signature_hex`.
    pub signer_public_key_hex: String,
}

impl TrustReceipt {
    /// Hash a payload the way `append` does.
    pub fn hash_payload(payload: &serde_json::Value) -> String {
        canonical_hash(payload)
    }

    /// Recompute the content hash over the receipt body.
    pub fn compute_self_hash(&self) -> String {
        Self::body_hash(
            &self.previous_hash,
            &self.session_id,
            &self.session_nonce,
            self.timestamp,
            &self.payload_hash,
            &self.signer_public_key_hex,
        )
    }

    pub(crate) fn body_hash(
        previous_hash: &str,
        session_id: &SessionId,
        session_nonce: &str,
        timestamp: DateTime<Utc>,
        payload_hash: &str,
        signer_public_key_hex: &str,
    ) -> String {
        let body = serde_json::json!({
            "version": RECEIPT_VERSION,
            "previous_hash": previous_hash,
            "session_id": session_id.as_str(),
            "session_nonce": session_nonce,
            "timestamp": timestamp.to_rfc3339(),
            "payload_hash": payload_hash,
            "signer_public_key": signer_public_key_hex,
        });
        canonical_hash(&body)
    }

    /// Quick integrity check for a single receipt, hash only.
    pub fn hash_intact(&self) -> bool {
        // Hashes are not secrets, but comparing them in constant time keeps
        // verification timing independent of where a mismatch occurs.
        sonate_crypto::constant_time_eq(
            self.self_hash.as_bytes(),
            self.compute_self_hash().as_bytes(),
        )
    }
}

/// Serialize receipts as JSON lines for export or archival.
pub fn to_json_lines(receipts: &[TrustReceipt]) -> String {
    receipts
        .iter()
        .filter_map(|r| serde_json::to_string(r).ok())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Nonce-store key for a session nonce. Scoped per session so two sessions
/// can never contend on the same claim.
pub(crate) fn nonce_scope(session_id: &SessionId, nonce: &str) -> String {
    sha256_hex(format!("receipt:{}:{}", session_id, nonce).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> TrustReceipt {
        let session_id = SessionId::new("s-1");
        let timestamp = Utc::now();
        let payload_hash = TrustReceipt::hash_payload(&serde_json::json!({"action": "chat"}));
        let self_hash = TrustReceipt::body_hash(
            GENESIS_HASH,
            &session_id,
            "nonce-1",
            timestamp,
            &payload_hash,
            "aa".repeat(32).as_str(),
        );
        TrustReceipt {
            version: RECEIPT_VERSION.to_string(),
            self_hash,
            previous_hash: GENESIS_HASH.to_string(),
            session_id,
            session_nonce: "nonce-1".to_string(),
            timestamp,
            payload_hash,
            payload: None,
            signature_hex: String::new(),
            signer_public_key_hex: "aa".repeat(32),
        }
    }

    #[test]
    fn self_hash_recomputes() {
        let receipt = receipt();
        assert!(receipt.hash_intact());
    }

    #[test]
    fn any_field_change_breaks_hash() {
        let mut tampered = receipt();
        tampered.payload_hash = TrustReceipt::hash_payload(&serde_json::json!({"action": "rm"}));
        assert!(!tampered.hash_intact());

        let mut tampered = receipt();
        tampered.previous_hash = "bogus".into();
        assert!(!tampered.hash_intact());

        let mut tampered = receipt();
        tampered.session_nonce = "other".into();
        assert!(!tampered.hash_intact());
    }

    #[test]
    fn signature_is_outside_the_hash() {
        let mut receipt = receipt();
        receipt.signature_hex = "ff".repeat(64);
        assert!(receipt.hash_intact());
    }

    #[test]
    fn payload_hash_is_canonical() {
        let a = TrustReceipt::hash_payload(&serde_json::json!({"x": 1, "y": 2}));
        let b = TrustReceipt::hash_payload(&serde_json::json!({"y": 2, "x": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn json_lines_one_line_per_receipt() {
        let receipts = vec![receipt(), receipt()];
        let lines = to_json_lines(&receipts);
        assert_eq!(lines.lines().count(), 2);
    }

    #[test]
    fn serialization_roundtrip() {
        let original = receipt();
        let json = serde_json::to_string(&original).unwrap();
        let restored: TrustReceipt = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, original);
        assert!(restored.hash_intact());
    }
}
