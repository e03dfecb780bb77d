//! Sonate Receipts - tamper-evident records of agent actions.
//!
//! Each session carries a singly-linked chain of signed receipts. A
//! receipt's `self_hash` covers its whole body except the signature, the
//! signature covers a binding message derived from `{self_hash, session_id,
//! session_nonce}`, and `previous_hash` links to the prior receipt (or the
//! GENESIS sentinel). Chains are append-only and never truncated or
//! reordered.

#![deny(unsafe_code)]

pub mod chain;
pub mod error;
pub mod receipt;

pub use chain::{AppendOptions, ChainVerification, ReceiptChain, ReceiptChainConfig};
pub use error::ReceiptError;
pub use receipt::{to_json_lines, TrustReceipt, GENESIS_HASH, RECEIPT_VERSION};
