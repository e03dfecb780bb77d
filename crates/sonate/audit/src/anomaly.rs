//! Anomaly detection over audit events.
//!
//! Each detector is independent and composable: it inspects a slice of
//! events and produces zero or more anomaly signals. The ledger runs the
//! configured set in real time as events arrive and again on demand when a
//! summary is generated.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sonate_types::RiskLevel;
use std::collections::HashMap;

use crate::event::{AuditCategory, AuditEvent};

/// A detected anomaly signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub detector: String,
    pub severity: RiskLevel,
    /// Normalized [0, 1] strength of the signal.
    pub score: f64,
    pub description: String,
    pub detected_at: DateTime<Utc>,
}

/// Pluggable anomaly detection over the event stream.
pub trait AnomalyDetector: Send + Sync {
    fn detect(&self, events: &[AuditEvent]) -> Vec<Anomaly>;

    /// Name of this detector (for provenance tracking).
    fn name(&self) -> &str;
}

/// The standard detector set with default thresholds.
pub fn default_detectors() -> Vec<Box<dyn AnomalyDetector>> {
    vec![
        Box::new(ActivitySpikeDetector::default()),
        Box::new(UnusualSourceDetector::default()),
        Box::new(BreachPatternDetector::default()),
        Box::new(ComplianceGapDetector::default()),
    ]
}

fn hour_bucket(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp)
}

// ── Activity spike ──────────────────────────────────────────────────────

/// Flags hours whose event count exceeds `mean + sigma_threshold * stddev`
/// across the observed hours.
pub struct ActivitySpikeDetector {
    pub sigma_threshold: f64,
}

impl Default for ActivitySpikeDetector {
    fn default() -> Self {
        Self {
            sigma_threshold: 2.0,
        }
    }
}

impl AnomalyDetector for ActivitySpikeDetector {
    fn detect(&self, events: &[AuditEvent]) -> Vec<Anomaly> {
        let mut per_hour: HashMap<DateTime<Utc>, usize> = HashMap::new();
        for event in events {
            *per_hour.entry(hour_bucket(event.timestamp)).or_insert(0) += 1;
        }
        if per_hour.len() < 2 {
            return vec![];
        }

        let counts: Vec<f64> = per_hour.values().map(|&c| c as f64).collect();
        let mean = counts.iter().sum::<f64>() / counts.len() as f64;
        let variance =
            counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / counts.len() as f64;
        let std_dev = variance.sqrt();
        if std_dev < f64::EPSILON {
            return vec![];
        }

        let threshold = mean + self.sigma_threshold * std_dev;
        let mut anomalies: Vec<Anomaly> = per_hour
            .into_iter()
            .filter(|(_, count)| *count as f64 > threshold)
            .map(|(hour, count)| {
                let z = (count as f64 - mean) / std_dev;
                Anomaly {
                    detector: self.name().to_string(),
                    severity: if z > self.sigma_threshold * 2.0 {
                        RiskLevel::High
                    } else {
                        RiskLevel::Medium
                    },
                    score: (z / (self.sigma_threshold * 3.0)).min(1.0),
                    description: format!(
                        "{} events in hour {} exceeds mean {:.1} + {:.0}σ ({:.1})",
                        count,
                        hour.format("%Y-%m-%dT%H:00Z"),
                        mean,
                        self.sigma_threshold,
                        threshold
                    ),
                    detected_at: Utc::now(),
                }
            })
            .collect();
        anomalies.sort_by(|a, b| b.score.total_cmp(&a.score));
        anomalies
    }

    fn name(&self) -> &str {
        "activity_spike"
    }
}

// ── Unusual source ──────────────────────────────────────────────────────

/// Flags a single source IP producing more events than the threshold.
pub struct UnusualSourceDetector {
    pub volume_threshold: usize,
}

impl Default for UnusualSourceDetector {
    fn default() -> Self {
        Self {
            volume_threshold: 100,
        }
    }
}

impl AnomalyDetector for UnusualSourceDetector {
    fn detect(&self, events: &[AuditEvent]) -> Vec<Anomaly> {
        let mut per_ip: HashMap<&str, usize> = HashMap::new();
        for event in events {
            if let Some(ip) = event.source.ip.as_deref() {
                *per_ip.entry(ip).or_insert(0) += 1;
            }
        }

        per_ip
            .into_iter()
            .filter(|(_, count)| *count > self.volume_threshold)
            .map(|(ip, count)| Anomaly {
                detector: self.name().to_string(),
                severity: RiskLevel::Medium,
                score: ((count as f64 / self.volume_threshold as f64) / 4.0).min(1.0),
                description: format!(
                    "source {} produced {} events (threshold {})",
                    ip, count, self.volume_threshold
                ),
                detected_at: Utc::now(),
            })
            .collect()
    }

    fn name(&self) -> &str {
        "unusual_source"
    }
}

// ── Breach pattern ──────────────────────────────────────────────────────

/// Flags authentication failures exceeding a count threshold.
pub struct BreachPatternDetector {
    pub failure_threshold: usize,
}

impl Default for BreachPatternDetector {
    fn default() -> Self {
        Self {
            failure_threshold: 10,
        }
    }
}

impl AnomalyDetector for BreachPatternDetector {
    fn detect(&self, events: &[AuditEvent]) -> Vec<Anomaly> {
        let failures = events
            .iter()
            .filter(|e| e.category == AuditCategory::Authentication && !e.outcome.is_success())
            .count();

        if failures <= self.failure_threshold {
            return vec![];
        }

        vec![Anomaly {
            detector: self.name().to_string(),
            severity: RiskLevel::Critical,
            score: ((failures as f64 / self.failure_threshold as f64) / 4.0).min(1.0),
            description: format!(
                "{} authentication failures (threshold {})",
                failures, self.failure_threshold
            ),
            detected_at: Utc::now(),
        }]
    }

    fn name(&self) -> &str {
        "breach_pattern"
    }
}

// ── Compliance gap ──────────────────────────────────────────────────────

/// Flags a volume of events carrying no compliance-framework tag.
pub struct ComplianceGapDetector {
    pub volume_threshold: usize,
}

impl Default for ComplianceGapDetector {
    fn default() -> Self {
        Self {
            volume_threshold: 50,
        }
    }
}

impl AnomalyDetector for ComplianceGapDetector {
    fn detect(&self, events: &[AuditEvent]) -> Vec<Anomaly> {
        let untagged = events
            .iter()
            .filter(|e| e.compliance.frameworks.is_empty())
            .count();

        if untagged <= self.volume_threshold {
            return vec![];
        }

        vec![Anomaly {
            detector: self.name().to_string(),
            severity: RiskLevel::Medium,
            score: ((untagged as f64 / self.volume_threshold as f64) / 4.0).min(1.0),
            description: format!(
                "{} events missing compliance framework tags (threshold {})",
                untagged, self.volume_threshold
            ),
            detected_at: Utc::now(),
        }]
    }

    fn name(&self) -> &str {
        "compliance_gap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonate_types::ActionOutcome;

    fn event(category: AuditCategory) -> AuditEvent {
        AuditEvent::builder()
            .category(category)
            .event_type("op")
            .description("x")
            .source("tests", "anomaly")
            .build()
            .unwrap()
    }

    #[test]
    fn spike_detector_flags_burst_hour() {
        let now = Utc::now();
        let mut events = Vec::new();
        // Quiet baseline over six hours, then a burst.
        for h in 1..=6 {
            for _ in 0..2 {
                let mut e = event(AuditCategory::System);
                e.timestamp = now - chrono::Duration::hours(h);
                events.push(e);
            }
        }
        for _ in 0..40 {
            let mut e = event(AuditCategory::System);
            e.timestamp = now;
            events.push(e);
        }

        let anomalies = ActivitySpikeDetector::default().detect(&events);
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].score > 0.0);
        assert_eq!(anomalies[0].detector, "activity_spike");
    }

    #[test]
    fn spike_detector_quiet_on_uniform_traffic() {
        let now = Utc::now();
        let mut events = Vec::new();
        for h in 0..6 {
            for _ in 0..5 {
                let mut e = event(AuditCategory::System);
                e.timestamp = now - chrono::Duration::hours(h);
                events.push(e);
            }
        }
        assert!(ActivitySpikeDetector::default().detect(&events).is_empty());
    }

    #[test]
    fn unusual_source_flags_heavy_ip() {
        let mut events = Vec::new();
        for _ in 0..6 {
            let mut e = event(AuditCategory::DataAccess);
            e.source.ip = Some("10.0.0.9".into());
            events.push(e);
        }
        let detector = UnusualSourceDetector {
            volume_threshold: 5,
        };
        let anomalies = detector.detect(&events);
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].description.contains("10.0.0.9"));
    }

    #[test]
    fn unusual_source_ignores_events_without_ip() {
        let events: Vec<_> = (0..20).map(|_| event(AuditCategory::DataAccess)).collect();
        let detector = UnusualSourceDetector {
            volume_threshold: 5,
        };
        assert!(detector.detect(&events).is_empty());
    }

    #[test]
    fn breach_detector_counts_only_auth_failures() {
        let mut events = Vec::new();
        for _ in 0..4 {
            let mut e = event(AuditCategory::Authentication);
            e.outcome = ActionOutcome::failure("bad password");
            events.push(e);
        }
        // Successes and other categories do not count.
        events.push(event(AuditCategory::Authentication));
        let mut denied = event(AuditCategory::Authorization);
        denied.outcome = ActionOutcome::denied("no role");
        events.push(denied);

        let detector = BreachPatternDetector {
            failure_threshold: 3,
        };
        let anomalies = detector.detect(&events);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, RiskLevel::Critical);
        assert!(anomalies[0].description.starts_with("4 "));
    }

    #[test]
    fn compliance_gap_detector_counts_untagged() {
        let mut events: Vec<_> = (0..4).map(|_| event(AuditCategory::System)).collect();
        events.iter_mut().take(1).for_each(|e| {
            e.compliance.frameworks = vec!["SOC2".into()];
        });

        let detector = ComplianceGapDetector {
            volume_threshold: 2,
        };
        let anomalies = detector.detect(&events);
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].description.starts_with("3 "));
    }

    #[test]
    fn detectors_are_quiet_below_thresholds() {
        let events: Vec<_> = (0..3).map(|_| event(AuditCategory::System)).collect();
        for detector in default_detectors() {
            assert!(
                detector.detect(&events).is_empty(),
                "{} fired on quiet traffic",
                detector.name()
            );
        }
    }
}
