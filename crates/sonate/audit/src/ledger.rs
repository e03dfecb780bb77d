//! The audit ledger facade.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::anomaly::{default_detectors, Anomaly, AnomalyDetector};
use crate::error::AuditError;
use crate::event::AuditEventBuilder;
use crate::query::{AuditFilter, AuditPage};
use crate::retention::RetentionCatalog;
use crate::store::{AuditStore, MemoryAuditStore};
use crate::summary::AuditSummary;

/// Outcome of a retention sweep.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionReport {
    /// Events moved from the active store to the archive.
    pub archived: usize,
    /// Fraction of active events still within their policy window, in
    /// [0, 1]. 1.0 means the active store is fully compliant.
    pub retention_compliance: f64,
}

/// Append-only audit ledger with retention and real-time anomaly checks.
pub struct AuditLedger {
    active: Arc<dyn AuditStore>,
    archive: Arc<dyn AuditStore>,
    retention: RetentionCatalog,
    detectors: Vec<Box<dyn AnomalyDetector>>,
    monitoring: bool,
    last_anomalies: RwLock<Vec<Anomaly>>,
}

impl AuditLedger {
    pub fn new(active: Arc<dyn AuditStore>, archive: Arc<dyn AuditStore>) -> Self {
        Self {
            active,
            archive,
            retention: RetentionCatalog::with_defaults(),
            detectors: default_detectors(),
            monitoring: true,
            last_anomalies: RwLock::new(Vec::new()),
        }
    }

    /// Memory-backed ledger with default policies and detectors.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryAuditStore::new()),
            Arc::new(MemoryAuditStore::new()),
        )
    }

    pub fn with_retention(mut self, retention: RetentionCatalog) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_detectors(mut self, detectors: Vec<Box<dyn AnomalyDetector>>) -> Self {
        self.detectors = detectors;
        self
    }

    /// Disable real-time anomaly checks (summaries stop reporting them too).
    pub fn without_monitoring(mut self) -> Self {
        self.monitoring = false;
        self
    }

    pub fn retention(&self) -> &RetentionCatalog {
        &self.retention
    }

    /// Validate, stamp retention, append, and run real-time anomaly checks.
    pub fn log_event(&self, builder: AuditEventBuilder) -> Result<Uuid, AuditError> {
        let mut event = builder.build()?;

        let policy = self
            .retention
            .policy(event.category)
            .ok_or_else(|| AuditError::UnknownCategory(format!("{:?}", event.category)))?;
        event.compliance.retention_days = policy.retention_days;
        if event.compliance.frameworks.is_empty() {
            event.compliance.frameworks = policy.compliance_frameworks.clone();
        }

        let id = event.id;
        debug!(event = %id, category = ?event.category, "audit event recorded");
        self.active.append(event)?;

        if self.monitoring {
            self.run_detectors()?;
        }

        Ok(id)
    }

    fn run_detectors(&self) -> Result<(), AuditError> {
        let events = self.active.events()?;
        let mut found = Vec::new();
        for detector in &self.detectors {
            for anomaly in detector.detect(&events) {
                warn!(detector = %anomaly.detector, score = anomaly.score,
                      "audit anomaly: {}", anomaly.description);
                found.push(anomaly);
            }
        }
        *self.last_anomalies.write() = found;
        Ok(())
    }

    /// Anomalies found by the most recent detection pass.
    pub fn current_anomalies(&self) -> Vec<Anomaly> {
        self.last_anomalies.read().clone()
    }

    /// Filtered, paginated query over the active store, newest-first.
    pub fn query_events(&self, filter: &AuditFilter) -> Result<AuditPage, AuditError> {
        Ok(filter.apply(&self.active.events()?))
    }

    /// Aggregate summary over the events matching `filter`.
    pub fn generate_summary(&self, filter: &AuditFilter) -> Result<AuditSummary, AuditError> {
        let unpaged = AuditFilter {
            limit: None,
            offset: None,
            ..filter.clone()
        };
        let events = unpaged.apply(&self.active.events()?).events;

        let anomalies = if self.monitoring {
            let mut anomalies = Vec::new();
            for detector in &self.detectors {
                anomalies.extend(detector.detect(&events));
            }
            anomalies
        } else {
            Vec::new()
        };

        Ok(AuditSummary::generate(&events, Utc::now(), anomalies))
    }

    /// Move events past their retention window into the archive. Events are
    /// never deleted; archival relocates them unchanged.
    pub fn run_retention_sweep(&self) -> Result<RetentionReport, AuditError> {
        let now = Utc::now();
        let expired = self.active.take_expired(now)?;
        let archived = expired.len();
        for event in expired {
            self.archive.append(event)?;
        }

        let remaining = self.active.count()?;
        let report = RetentionReport {
            archived,
            // Everything left in the active store is within policy by
            // construction of the sweep.
            retention_compliance: if remaining == 0 && archived == 0 {
                1.0
            } else {
                let active = self.active.events()?;
                let compliant = active
                    .iter()
                    .filter(|e| e.retention_deadline() > now)
                    .count();
                if active.is_empty() {
                    1.0
                } else {
                    compliant as f64 / active.len() as f64
                }
            },
        };

        if report.archived > 0 {
            debug!(archived = report.archived, "retention sweep archived events");
        }
        Ok(report)
    }

    /// Events currently resident in the archive store.
    pub fn archived_events(&self) -> Result<Vec<crate::event::AuditEvent>, AuditError> {
        self.archive.events()
    }
}
