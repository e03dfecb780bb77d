//! Sonate Gate - the request admission boundary.
//!
//! One call runs the platform's trust pipeline: the RBAC engine decides
//! allow/deny, the rate limiter decides admit/reject, and on allow+admit
//! the action is minted a trust receipt. An audit event is recorded
//! regardless of outcome. Decisions are machine-readable so an HTTP layer
//! can map them to 403/429 without inspecting internals.

#![deny(unsafe_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sonate_audit::{AuditCategory, AuditEvent, AuditLedger, AuditSeverity};
use sonate_ratelimit::{RateLimitConfig, RateLimitKey, RateLimiter};
use sonate_rbac::{Permission, RbacEngine, User};
use sonate_receipts::{ReceiptChain, ReceiptError, TrustReceipt};
use sonate_types::{ActionOutcome, SessionId, TenantId};
use thiserror::Error;
use tracing::debug;

/// One guarded request presented by an external caller.
#[derive(Clone, Debug)]
pub struct GateRequest {
    pub user: User,
    pub permission: Permission,
    pub tenant: Option<TenantId>,
    pub session_id: SessionId,
    pub endpoint: String,
    pub payload: serde_json::Value,
}

/// The gate's verdict.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// RBAC allowed and quota admitted; the action is receipted.
    Allowed {
        receipt: TrustReceipt,
        remaining: u64,
    },
    /// RBAC denied. Maps to HTTP 403.
    Forbidden { reason: String },
    /// Quota rejected. Maps to HTTP 429.
    Throttled { retry_after_secs: u64 },
}

/// Quota applied to admitted requests.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct QuotaSettings {
    pub max_requests: u64,
    pub window_ms: i64,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_ms: 60_000,
        }
    }
}

/// Gate errors. Denials and throttles are decisions, not errors; only an
/// unusable substrate (receipt or audit failure) surfaces here.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Receipt minting failed: {0}")]
    Receipt(#[from] ReceiptError),

    #[error("Audit ledger rejected event: {0}")]
    Audit(#[from] sonate_audit::AuditError),
}

/// The admission pipeline.
pub struct AdmissionGate {
    rbac: Arc<RbacEngine>,
    limiter: Arc<RateLimiter>,
    receipts: Arc<ReceiptChain>,
    ledger: Arc<AuditLedger>,
    quota: QuotaSettings,
}

impl AdmissionGate {
    pub fn new(
        rbac: Arc<RbacEngine>,
        limiter: Arc<RateLimiter>,
        receipts: Arc<ReceiptChain>,
        ledger: Arc<AuditLedger>,
        quota: QuotaSettings,
    ) -> Self {
        Self {
            rbac,
            limiter,
            receipts,
            ledger,
            quota,
        }
    }

    /// Run the pipeline for one request.
    pub async fn admit(&self, request: GateRequest) -> Result<GateDecision, GateError> {
        let access = self.rbac.check(&request.user, &request.permission);
        if !access.allowed {
            let reason = access
                .reason
                .unwrap_or_else(|| "access denied".to_string());
            self.record(
                &request,
                AuditCategory::Authorization,
                "access_denied",
                AuditSeverity::Medium,
                ActionOutcome::denied(reason.clone()),
            )?;
            return Ok(GateDecision::Forbidden { reason });
        }

        let quota = self
            .limiter
            .check_limit(&RateLimitConfig {
                key: RateLimitKey::new(
                    "user",
                    request.user.id.as_str(),
                    request.endpoint.clone(),
                ),
                max_requests: self.quota.max_requests,
                window_ms: self.quota.window_ms,
            })
            .await;

        if !quota.allowed {
            let retry_after_secs = quota.retry_after_secs.unwrap_or(1);
            self.record(
                &request,
                AuditCategory::Authorization,
                "quota_rejected",
                AuditSeverity::Low,
                ActionOutcome::denied(format!("quota exceeded, retry in {}s", retry_after_secs)),
            )?;
            return Ok(GateDecision::Throttled { retry_after_secs });
        }

        let receipt = match self
            .receipts
            .append(&request.session_id, request.payload.clone())
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                // Integrity failures surface; record them first.
                self.record(
                    &request,
                    AuditCategory::Security,
                    "receipt_failed",
                    AuditSeverity::High,
                    ActionOutcome::failure(e.to_string()),
                )?;
                return Err(e.into());
            }
        };

        self.record(
            &request,
            AuditCategory::DataAccess,
            "action_admitted",
            AuditSeverity::Info,
            ActionOutcome::Success,
        )?;

        debug!(session = %request.session_id, receipt = %receipt.self_hash,
               "request admitted");
        Ok(GateDecision::Allowed {
            receipt,
            remaining: quota.remaining,
        })
    }

    fn record(
        &self,
        request: &GateRequest,
        category: AuditCategory,
        event_type: &str,
        severity: AuditSeverity,
        outcome: ActionOutcome,
    ) -> Result<(), GateError> {
        let mut builder = AuditEvent::builder()
            .category(category)
            .event_type(event_type)
            .severity(severity)
            .description(format!(
                "{} for {} on {}",
                event_type, request.user.id, request.endpoint
            ))
            .source("admission_gate", "admit")
            .user(request.user.id.clone())
            .outcome(outcome)
            .metadata("session_id", request.session_id.as_str())
            .metadata("permission", request.permission.to_string());
        if let Some(tenant) = &request.tenant {
            builder = builder.tenant(tenant.clone());
        }
        self.ledger.log_event(builder)?;
        Ok(())
    }
}
