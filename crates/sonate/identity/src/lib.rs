//! Sonate Identity - decentralized identifiers and verifiable credentials.
//!
//! A `did:sonate` identifier is derived from an Ed25519 public key, so
//! verification needs no registry lookup: the issuer's key travels inside
//! the issuer DID. Credentials are immutable after issuance; invalidation
//! happens out-of-band through the revocation store, keyed by credential id.

#![deny(unsafe_code)]

pub mod credential;
pub mod did;
pub mod error;
pub mod manager;

pub use credential::{
    CapabilityClaim, CredentialProof, CredentialVerification, VerifiableCredential,
    VerificationFailure,
};
pub use did::Did;
pub use error::IdentityError;
pub use manager::DidManager;
