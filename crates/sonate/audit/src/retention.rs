//! Per-category retention policies.
//!
//! The catalog is loaded once at startup; the administrative update path
//! replaces a policy atomically instead of mutating it in place.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::event::AuditCategory;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub category: AuditCategory,
    pub retention_days: u32,
    pub compliance_frameworks: Vec<String>,
    pub encryption_required: bool,
    pub access_restricted: bool,
}

/// Retention policy lookup, one policy per category.
pub struct RetentionCatalog {
    policies: RwLock<Arc<HashMap<AuditCategory, RetentionPolicy>>>,
}

impl RetentionCatalog {
    pub fn new(policies: Vec<RetentionPolicy>) -> Self {
        let map = policies.into_iter().map(|p| (p.category, p)).collect();
        Self {
            policies: RwLock::new(Arc::new(map)),
        }
    }

    /// The platform defaults. Security events are kept the longest.
    pub fn with_defaults() -> Self {
        fn policy(
            category: AuditCategory,
            retention_days: u32,
            frameworks: &[&str],
            encryption_required: bool,
            access_restricted: bool,
        ) -> RetentionPolicy {
            RetentionPolicy {
                category,
                retention_days,
                compliance_frameworks: frameworks.iter().map(|f| f.to_string()).collect(),
                encryption_required,
                access_restricted,
            }
        }

        Self::new(vec![
            policy(
                AuditCategory::Authentication,
                365,
                &["SOC2", "GDPR"],
                true,
                false,
            ),
            policy(
                AuditCategory::Authorization,
                365,
                &["SOC2"],
                false,
                false,
            ),
            policy(
                AuditCategory::DataAccess,
                180,
                &["SOC2", "GDPR"],
                true,
                true,
            ),
            policy(
                AuditCategory::Configuration,
                365,
                &["SOC2"],
                false,
                false,
            ),
            policy(
                AuditCategory::Security,
                730,
                &["SOC2", "ISO27001"],
                true,
                true,
            ),
            policy(AuditCategory::System, 90, &["SOC2"], false, false),
        ])
    }

    pub fn policy(&self, category: AuditCategory) -> Option<RetentionPolicy> {
        self.policies.read().get(&category).cloned()
    }

    /// Administrative update: replaces the category's policy as a whole.
    pub fn update_policy(&self, policy: RetentionPolicy) {
        let mut guard = self.policies.write();
        let mut map = (**guard).clone();
        map.insert(policy.category, policy);
        *guard = Arc::new(map);
    }
}

impl Default for RetentionCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}
