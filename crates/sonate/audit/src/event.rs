//! Audit event model and builder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sonate_types::{ActionOutcome, PrincipalId, RiskLevel, TenantId};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::AuditError;

/// Event categories; each carries its own retention policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Authentication,
    Authorization,
    DataAccess,
    Configuration,
    Security,
    System,
}

impl AuditCategory {
    pub const ALL: [AuditCategory; 6] = [
        AuditCategory::Authentication,
        AuditCategory::Authorization,
        AuditCategory::DataAccess,
        AuditCategory::Configuration,
        AuditCategory::Security,
        AuditCategory::System,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// Where an event originated. Component and method are required context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSource {
    pub component: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Risk annotation attached to an event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub level: RiskLevel,
    pub score: f64,
    pub factors: Vec<String>,
}

impl Default for RiskSignal {
    fn default() -> Self {
        Self {
            level: RiskLevel::Low,
            score: 0.0,
            factors: Vec::new(),
        }
    }
}

/// Compliance stamp: frameworks the event is retained for, and for how long.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceTag {
    pub frameworks: Vec<String>,
    pub retention_days: u32,
}

/// One immutable audit record. Once stored, content fields never change;
/// only its residence (active vs archive store) does.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<PrincipalId>,
    pub category: AuditCategory,
    pub event_type: String,
    pub severity: AuditSeverity,
    pub description: String,
    pub source: EventSource,
    pub outcome: ActionOutcome,
    pub risk: RiskSignal,
    pub compliance: ComplianceTag,
    /// Well-known keys plus an open extension map; required context never
    /// hides in here.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AuditEvent {
    pub fn builder() -> AuditEventBuilder {
        AuditEventBuilder::default()
    }

    /// When the event leaves the active store.
    pub fn retention_deadline(&self) -> DateTime<Utc> {
        self.timestamp + chrono::Duration::days(i64::from(self.compliance.retention_days))
    }
}

/// Builder enforcing the required-field contract: category, type,
/// description, source component, and source method must all be present.
#[derive(Debug, Default)]
pub struct AuditEventBuilder {
    tenant_id: Option<TenantId>,
    user_id: Option<PrincipalId>,
    category: Option<AuditCategory>,
    event_type: Option<String>,
    severity: Option<AuditSeverity>,
    description: Option<String>,
    component: Option<String>,
    method: Option<String>,
    ip: Option<String>,
    outcome: Option<ActionOutcome>,
    risk: Option<RiskSignal>,
    metadata: HashMap<String, serde_json::Value>,
}

impl AuditEventBuilder {
    pub fn tenant(mut self, tenant: TenantId) -> Self {
        self.tenant_id = Some(tenant);
        self
    }

    pub fn user(mut self, user: PrincipalId) -> Self {
        self.user_id = Some(user);
        self
    }

    pub fn category(mut self, category: AuditCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn source(mut self, component: impl Into<String>, method: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self.method = Some(method.into());
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn outcome(mut self, outcome: ActionOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn risk(mut self, risk: RiskSignal) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), value);
        }
        self
    }

    /// Validate and produce the event. Retention is stamped by the ledger,
    /// not here.
    pub fn build(self) -> Result<AuditEvent, AuditError> {
        let category = self.category.ok_or(AuditError::InvalidEvent("category"))?;
        let event_type = self
            .event_type
            .filter(|t| !t.is_empty())
            .ok_or(AuditError::InvalidEvent("event_type"))?;
        let description = self
            .description
            .filter(|d| !d.is_empty())
            .ok_or(AuditError::InvalidEvent("description"))?;
        let component = self
            .component
            .filter(|c| !c.is_empty())
            .ok_or(AuditError::InvalidEvent("source.component"))?;
        let method = self
            .method
            .filter(|m| !m.is_empty())
            .ok_or(AuditError::InvalidEvent("source.method"))?;

        Ok(AuditEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            category,
            event_type,
            severity: self.severity.unwrap_or(AuditSeverity::Info),
            description,
            source: EventSource {
                component,
                method,
                ip: self.ip,
            },
            outcome: self.outcome.unwrap_or(ActionOutcome::Success),
            risk: self.risk.unwrap_or_default(),
            compliance: ComplianceTag::default(),
            metadata: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> AuditEventBuilder {
        AuditEvent::builder()
            .category(AuditCategory::System)
            .event_type("startup")
            .description("substrate started")
            .source("kernel", "boot")
    }

    #[test]
    fn builder_fills_defaults() {
        let event = minimal().build().unwrap();
        assert_eq!(event.severity, AuditSeverity::Info);
        assert!(event.outcome.is_success());
        assert_eq!(event.risk.level, RiskLevel::Low);
        assert!(event.compliance.frameworks.is_empty());
    }

    #[test]
    fn missing_required_fields_are_hard_errors() {
        let err = AuditEvent::builder()
            .event_type("t")
            .description("d")
            .source("c", "m")
            .build()
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidEvent("category")));

        let err = AuditEvent::builder()
            .category(AuditCategory::System)
            .description("d")
            .source("c", "m")
            .build()
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidEvent("event_type")));

        let err = AuditEvent::builder()
            .category(AuditCategory::System)
            .event_type("t")
            .source("c", "m")
            .build()
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidEvent("description")));

        let err = AuditEvent::builder()
            .category(AuditCategory::System)
            .event_type("t")
            .description("d")
            .build()
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidEvent("source.component")));
    }

    #[test]
    fn empty_strings_do_not_satisfy_required_fields() {
        let err = AuditEvent::builder()
            .category(AuditCategory::System)
            .event_type("")
            .description("d")
            .source("c", "m")
            .build()
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidEvent("event_type")));
    }

    #[test]
    fn metadata_accepts_arbitrary_json() {
        let event = minimal()
            .metadata("duration_ms", 1500)
            .metadata("tags", vec!["a", "b"])
            .build()
            .unwrap();
        assert_eq!(event.metadata["duration_ms"], serde_json::json!(1500));
    }

    #[test]
    fn retention_deadline_follows_stamp() {
        let mut event = minimal().build().unwrap();
        event.compliance.retention_days = 30;
        assert_eq!(
            event.retention_deadline(),
            event.timestamp + chrono::Duration::days(30)
        );
    }

    #[test]
    fn serialization_roundtrip() {
        let event = minimal()
            .tenant(TenantId::new("acme"))
            .user(PrincipalId::new("u-1"))
            .ip("10.0.0.1")
            .build()
            .unwrap();
        let json = serde_json::to_string(&event).unwrap();
        let restored: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, event);
    }
}
