//! Sonate Audit - the platform's append-only audit ledger.
//!
//! Events are validated at the door (missing required context is a hard
//! error, never silently dropped), stamped with the retention policy of
//! their category, and stored write-once. Queries, summaries, and anomaly
//! detectors read; the only thing that ever moves an event is the retention
//! sweep, which relocates it to the archive store without touching its
//! content.

#![deny(unsafe_code)]

pub mod anomaly;
pub mod error;
pub mod event;
pub mod export;
pub mod ledger;
pub mod query;
pub mod retention;
pub mod store;
pub mod summary;
pub mod wrap;

pub use anomaly::{
    ActivitySpikeDetector, Anomaly, AnomalyDetector, BreachPatternDetector, ComplianceGapDetector,
    UnusualSourceDetector,
};
pub use error::AuditError;
pub use event::{
    AuditCategory, AuditEvent, AuditEventBuilder, AuditSeverity, ComplianceTag, EventSource,
    RiskSignal,
};
pub use export::{export_events, ExportFormat};
pub use ledger::{AuditLedger, RetentionReport};
pub use query::{AuditFilter, AuditPage, OutcomeKind};
pub use retention::{RetentionCatalog, RetentionPolicy};
pub use store::{AuditStore, FileAuditStore, MemoryAuditStore};
pub use summary::AuditSummary;
pub use wrap::{AuditedSecrets, AuditedSigner};
