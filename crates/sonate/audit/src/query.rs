//! Filtered queries over the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sonate_types::{ActionOutcome, RiskLevel};

use crate::event::{AuditCategory, AuditEvent, AuditSeverity};

/// Outcome discriminant for filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Failure,
    Denied,
}

impl OutcomeKind {
    fn matches(self, outcome: &ActionOutcome) -> bool {
        matches!(
            (self, outcome),
            (OutcomeKind::Success, ActionOutcome::Success)
                | (OutcomeKind::Failure, ActionOutcome::Failure { .. })
                | (OutcomeKind::Denied, ActionOutcome::Denied { .. })
        )
    }
}

/// Query filter. Empty filter matches everything.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub category: Option<AuditCategory>,
    pub severity: Option<AuditSeverity>,
    pub event_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub outcome: Option<OutcomeKind>,
    pub risk_level: Option<RiskLevel>,
    pub framework: Option<String>,
    /// Free-text search over description and metadata values.
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// A page of results, newest-first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditPage {
    pub events: Vec<AuditEvent>,
    pub total: usize,
    pub has_more: bool,
}

impl AuditFilter {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(ref tenant_id) = self.tenant_id {
            if event.tenant_id.as_ref().map(|t| t.as_str()) != Some(tenant_id.as_str()) {
                return false;
            }
        }

        if let Some(ref user_id) = self.user_id {
            if event.user_id.as_ref().map(|u| u.as_str()) != Some(user_id.as_str()) {
                return false;
            }
        }

        if let Some(category) = self.category {
            if event.category != category {
                return false;
            }
        }

        if let Some(severity) = self.severity {
            if event.severity != severity {
                return false;
            }
        }

        if let Some(ref event_type) = self.event_type {
            if &event.event_type != event_type {
                return false;
            }
        }

        if let Some(from) = self.from {
            if event.timestamp < from {
                return false;
            }
        }

        if let Some(to) = self.to {
            if event.timestamp >= to {
                return false;
            }
        }

        if let Some(outcome) = self.outcome {
            if !outcome.matches(&event.outcome) {
                return false;
            }
        }

        if let Some(risk_level) = self.risk_level {
            if event.risk.level != risk_level {
                return false;
            }
        }

        if let Some(ref framework) = self.framework {
            if !event.compliance.frameworks.iter().any(|f| f == framework) {
                return false;
            }
        }

        if let Some(ref search) = self.search {
            let needle = search.to_lowercase();
            let in_description = event.description.to_lowercase().contains(&needle);
            let in_metadata = event
                .metadata
                .values()
                .any(|v| v.to_string().to_lowercase().contains(&needle));
            if !in_description && !in_metadata {
                return false;
            }
        }

        true
    }

    /// Filter, sort newest-first, paginate.
    pub fn apply(&self, events: &[AuditEvent]) -> AuditPage {
        let mut matched: Vec<AuditEvent> =
            events.iter().filter(|e| self.matches(e)).cloned().collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = matched.len();
        let offset = self.offset.unwrap_or(0);
        let matched: Vec<AuditEvent> = matched.into_iter().skip(offset).collect();
        let (events, has_more) = match self.limit {
            Some(limit) if matched.len() > limit => (matched[..limit].to_vec(), true),
            _ => (matched, false),
        };

        AuditPage {
            events,
            total,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonate_types::{PrincipalId, TenantId};

    fn event(category: AuditCategory, description: &str) -> AuditEvent {
        AuditEvent::builder()
            .category(category)
            .event_type("op")
            .description(description)
            .source("tests", "query")
            .build()
            .unwrap()
    }

    fn corpus() -> Vec<AuditEvent> {
        let mut events = vec![
            event(AuditCategory::Authentication, "login succeeded"),
            event(AuditCategory::Authentication, "login failed"),
            event(AuditCategory::System, "substrate started"),
        ];
        events[1].outcome = ActionOutcome::failure("bad password");
        events[1].user_id = Some(PrincipalId::new("mallory"));
        events[2].tenant_id = Some(TenantId::new("acme"));
        events[2].compliance.frameworks = vec!["SOC2".into()];
        events
    }

    #[test]
    fn empty_filter_matches_all() {
        let page = AuditFilter::default().apply(&corpus());
        assert_eq!(page.total, 3);
        assert!(!page.has_more);
    }

    #[test]
    fn category_and_outcome_filters() {
        let filter = AuditFilter {
            category: Some(AuditCategory::Authentication),
            outcome: Some(OutcomeKind::Failure),
            ..Default::default()
        };
        let page = filter.apply(&corpus());
        assert_eq!(page.total, 1);
        assert_eq!(page.events[0].description, "login failed");
    }

    #[test]
    fn tenant_user_and_framework_filters() {
        let events = corpus();

        let by_tenant = AuditFilter {
            tenant_id: Some("acme".into()),
            ..Default::default()
        };
        assert_eq!(by_tenant.apply(&events).total, 1);

        let by_user = AuditFilter {
            user_id: Some("mallory".into()),
            ..Default::default()
        };
        assert_eq!(by_user.apply(&events).total, 1);

        let by_framework = AuditFilter {
            framework: Some("SOC2".into()),
            ..Default::default()
        };
        assert_eq!(by_framework.apply(&events).total, 1);
    }

    #[test]
    fn free_text_search_is_case_insensitive() {
        let filter = AuditFilter {
            search: Some("LOGIN".into()),
            ..Default::default()
        };
        assert_eq!(filter.apply(&corpus()).total, 2);
    }

    #[test]
    fn results_are_newest_first_and_paginated() {
        let mut events = Vec::new();
        let now = Utc::now();
        for i in 0..10 {
            let mut e = event(AuditCategory::System, &format!("event {}", i));
            e.timestamp = now - chrono::Duration::minutes(i);
            events.push(e);
        }

        let filter = AuditFilter {
            limit: Some(3),
            offset: Some(2),
            ..Default::default()
        };
        let page = filter.apply(&events);
        assert_eq!(page.total, 10);
        assert_eq!(page.events.len(), 3);
        assert!(page.has_more);
        assert!(page.events[0].timestamp > page.events[1].timestamp);
        assert_eq!(page.events[0].description, "event 2");
    }

    #[test]
    fn date_range_is_half_open() {
        let events = corpus();
        let cutoff = events[0].timestamp;
        let filter = AuditFilter {
            to: Some(cutoff),
            ..Default::default()
        };
        assert!(filter
            .apply(&events)
            .events
            .iter()
            .all(|e| e.timestamp < cutoff));
    }
}
