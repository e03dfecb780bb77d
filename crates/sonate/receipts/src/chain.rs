use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sonate_crypto::{binding_message, verify_signature_hex, Signer};
use sonate_store::NonceStore;
use sonate_types::SessionId;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ReceiptError;
use crate::receipt::{nonce_scope, TrustReceipt, GENESIS_HASH, RECEIPT_VERSION};

/// Chain construction settings.
#[derive(Clone, Copy, Debug)]
pub struct ReceiptChainConfig {
    /// TTL for claimed receipt nonces.
    pub nonce_ttl_seconds: i64,
}

impl Default for ReceiptChainConfig {
    fn default() -> Self {
        Self {
            nonce_ttl_seconds: 24 * 60 * 60,
        }
    }
}

/// Per-append options.
#[derive(Clone, Copy, Debug, Default)]
pub struct AppendOptions {
    /// Embed the payload content in the receipt instead of only its hash.
    pub include_payload: bool,
}

/// Result of verifying a receipt sequence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainVerification {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broken_at: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ChainVerification {
    fn ok() -> Self {
        Self {
            valid: true,
            broken_at: None,
            reason: None,
        }
    }

    fn broken(index: usize, reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            broken_at: Some(index),
            reason: Some(reason.into()),
        }
    }
}

struct SessionHead {
    last_hash: String,
}

/// Builds the append-only receipt chain for each session.
///
/// Appends within one session are serialized on a per-session lock so no
/// two receipts can claim the same position; different sessions append
/// concurrently. The session head only advances after the receipt is fully
/// built and signed, which is the single commit point per append.
pub struct ReceiptChain {
    signer: Arc<dyn Signer>,
    nonces: Arc<dyn NonceStore>,
    heads: DashMap<String, Arc<Mutex<SessionHead>>>,
    config: ReceiptChainConfig,
}

impl ReceiptChain {
    pub fn new(signer: Arc<dyn Signer>, nonces: Arc<dyn NonceStore>) -> Self {
        Self::with_config(signer, nonces, ReceiptChainConfig::default())
    }

    pub fn with_config(
        signer: Arc<dyn Signer>,
        nonces: Arc<dyn NonceStore>,
        config: ReceiptChainConfig,
    ) -> Self {
        Self {
            signer,
            nonces,
            heads: DashMap::new(),
            config,
        }
    }

    /// Append a receipt describing `payload` to the session's chain.
    pub async fn append(
        &self,
        session_id: &SessionId,
        payload: serde_json::Value,
    ) -> Result<TrustReceipt, ReceiptError> {
        self.append_with_options(session_id, payload, AppendOptions::default())
            .await
    }

    pub async fn append_with_options(
        &self,
        session_id: &SessionId,
        payload: serde_json::Value,
        options: AppendOptions,
    ) -> Result<TrustReceipt, ReceiptError> {
        let head = self
            .heads
            .entry(session_id.as_str().to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(SessionHead {
                    last_hash: GENESIS_HASH.to_string(),
                }))
            })
            .clone();

        let mut head = head.lock().await;

        let session_nonce = Uuid::new_v4().to_string();
        self.nonces
            .mark_used(
                &nonce_scope(session_id, &session_nonce),
                self.config.nonce_ttl_seconds,
            )
            .await?;

        let timestamp = Utc::now();
        let payload_hash = TrustReceipt::hash_payload(&payload);
        let signer_public_key_hex = self.signer.public_key_hex();
        let self_hash = TrustReceipt::body_hash(
            &head.last_hash,
            session_id,
            &session_nonce,
            timestamp,
            &payload_hash,
            &signer_public_key_hex,
        );

        let message = binding_message(&self_hash, session_id.as_str(), &session_nonce);
        let signature = self.signer.sign(&message)?;

        let receipt = TrustReceipt {
            version: RECEIPT_VERSION.to_string(),
            self_hash: self_hash.clone(),
            previous_hash: head.last_hash.clone(),
            session_id: session_id.clone(),
            session_nonce,
            timestamp,
            payload_hash,
            payload: options.include_payload.then_some(payload),
            signature_hex: signature.hex,
            signer_public_key_hex,
        };

        // Commit point: everything above can fail without leaving state.
        head.last_hash = self_hash;
        debug!(session = %session_id, hash = %receipt.self_hash, "receipt appended");
        Ok(receipt)
    }

    /// The current head hash of a session, if any receipts exist.
    pub async fn head(&self, session_id: &SessionId) -> Option<String> {
        let head = self.heads.get(session_id.as_str())?.clone();
        let head = head.lock().await;
        Some(head.last_hash.clone())
    }

    /// Walk a receipt sequence checking linkage and signatures.
    ///
    /// Returns the first index at which the chain breaks. Any out-of-order,
    /// duplicated, or resigned receipt is a hard failure, not a warning.
    pub fn verify_chain(receipts: &[TrustReceipt]) -> ChainVerification {
        let mut seen_hashes: HashSet<&str> = HashSet::new();

        for (index, receipt) in receipts.iter().enumerate() {
            let expected_previous = if index == 0 {
                GENESIS_HASH
            } else {
                receipts[index - 1].self_hash.as_str()
            };

            if receipt.previous_hash != expected_previous {
                warn!(index, "receipt chain linkage broken");
                return ChainVerification::broken(index, "previous_hash mismatch");
            }

            if !seen_hashes.insert(receipt.self_hash.as_str()) {
                warn!(index, "duplicate receipt hash in chain");
                return ChainVerification::broken(index, "duplicate self_hash");
            }

            if !receipt.hash_intact() {
                warn!(index, "receipt content hash mismatch");
                return ChainVerification::broken(index, "self_hash mismatch");
            }

            let message = binding_message(
                &receipt.self_hash,
                receipt.session_id.as_str(),
                &receipt.session_nonce,
            );
            if !verify_signature_hex(
                &receipt.signer_public_key_hex,
                &message,
                &receipt.signature_hex,
            ) {
                warn!(index, "receipt signature invalid");
                return ChainVerification::broken(index, "signature invalid");
            }
        }

        ChainVerification::ok()
    }
}
