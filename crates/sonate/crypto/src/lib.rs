//! Cryptographic primitives for the Sonate trust substrate.
//!
//! Ed25519 key pairs and signing, SHA-256 canonical-JSON hashing, and the
//! receipt binding message. Callers canonicalize structured data before
//! signing; everything here operates on bytes.

#![deny(unsafe_code)]

pub mod canonical;
pub mod error;
pub mod keys;
pub mod signer;

pub use canonical::{binding_message, canonical_hash, canonical_json, constant_time_eq, sha256_hex};
pub use error::CryptoError;
pub use keys::{SigningKeyPair, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
pub use signer::{verify_signature, verify_signature_hex, Ed25519Signer, SignatureBundle, Signer};
