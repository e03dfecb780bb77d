//! Aggregate summaries and activity trends.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::anomaly::Anomaly;
use crate::event::AuditEvent;

/// One bucket of an activity trend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendBucket {
    pub bucket: String,
    pub count: usize,
}

/// One entry of a top-N ranking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub key: String,
    pub count: usize,
}

/// Aggregate view over a set of events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total_events: usize,
    pub by_category: HashMap<String, usize>,
    pub by_severity: HashMap<String, usize>,
    pub by_outcome: HashMap<String, usize>,
    pub by_risk_level: HashMap<String, usize>,
    /// Daily activity over the trailing 7 days, oldest first.
    pub daily_trend: Vec<TrendBucket>,
    /// Hourly activity over the trailing 24 hours, oldest first.
    pub hourly_trend: Vec<TrendBucket>,
    pub top_users: Vec<RankedEntry>,
    pub top_sources: Vec<RankedEntry>,
    /// Present when monitoring is active.
    pub anomalies: Vec<Anomaly>,
}

const TOP_N: usize = 5;

impl AuditSummary {
    /// Build a summary at `now`. Trends sort explicitly by bucket; store
    /// iteration order is never relied on.
    pub fn generate(events: &[AuditEvent], now: DateTime<Utc>, anomalies: Vec<Anomaly>) -> Self {
        let mut by_category = HashMap::new();
        let mut by_severity = HashMap::new();
        let mut by_outcome = HashMap::new();
        let mut by_risk_level = HashMap::new();
        let mut users = HashMap::new();
        let mut sources = HashMap::new();

        for event in events {
            *by_category
                .entry(format!("{:?}", event.category))
                .or_insert(0) += 1;
            *by_severity
                .entry(format!("{:?}", event.severity))
                .or_insert(0) += 1;
            let outcome = match &event.outcome {
                sonate_types::ActionOutcome::Success => "Success",
                sonate_types::ActionOutcome::Failure { .. } => "Failure",
                sonate_types::ActionOutcome::Denied { .. } => "Denied",
            };
            *by_outcome.entry(outcome.to_string()).or_insert(0) += 1;
            *by_risk_level
                .entry(format!("{:?}", event.risk.level))
                .or_insert(0) += 1;

            if let Some(user) = &event.user_id {
                *users.entry(user.as_str().to_string()).or_insert(0) += 1;
            }
            *sources
                .entry(event.source.component.clone())
                .or_insert(0usize) += 1;
        }

        Self {
            total_events: events.len(),
            by_category,
            by_severity,
            by_outcome,
            by_risk_level,
            daily_trend: daily_trend(events, now),
            hourly_trend: hourly_trend(events, now),
            top_users: rank(users),
            top_sources: rank(sources),
            anomalies,
        }
    }
}

fn rank(counts: HashMap<String, usize>) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = counts
        .into_iter()
        .map(|(key, count)| RankedEntry { key, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    entries.truncate(TOP_N);
    entries
}

fn daily_trend(events: &[AuditEvent], now: DateTime<Utc>) -> Vec<TrendBucket> {
    (0..7)
        .rev()
        .map(|days_back| {
            let day = now - Duration::days(days_back);
            let bucket = day.format("%Y-%m-%d").to_string();
            let count = events
                .iter()
                .filter(|e| e.timestamp.format("%Y-%m-%d").to_string() == bucket)
                .count();
            TrendBucket { bucket, count }
        })
        .collect()
}

fn hourly_trend(events: &[AuditEvent], now: DateTime<Utc>) -> Vec<TrendBucket> {
    let hour_anchor = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    (0..24)
        .rev()
        .map(|hours_back| {
            let start = hour_anchor - Duration::hours(hours_back);
            let end = start + Duration::hours(1);
            let count = events
                .iter()
                .filter(|e| e.timestamp >= start && e.timestamp < end)
                .count();
            TrendBucket {
                bucket: start.format("%Y-%m-%dT%H:00Z").to_string(),
                count,
            }
        })
        .collect()
}
