//! Audit export in JSON, CSV, and XML.
//!
//! CSV and XML use the fixed, documented field order: id, timestamp,
//! tenantId, userId, category, type, severity, description, outcome,
//! riskLevel, riskScore, sourceComponent, sourceMethod.

use serde::{Deserialize, Serialize};
use sonate_types::ActionOutcome;

use crate::event::AuditEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Csv,
    Xml,
}

const FIELDS: [&str; 13] = [
    "id",
    "timestamp",
    "tenantId",
    "userId",
    "category",
    "type",
    "severity",
    "description",
    "outcome",
    "riskLevel",
    "riskScore",
    "sourceComponent",
    "sourceMethod",
];

pub fn export_events(events: &[AuditEvent], format: ExportFormat) -> String {
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(events).unwrap_or_else(|_| "[]".into()),
        ExportFormat::Csv => export_csv(events),
        ExportFormat::Xml => export_xml(events),
    }
}

fn outcome_label(outcome: &ActionOutcome) -> &'static str {
    match outcome {
        ActionOutcome::Success => "success",
        ActionOutcome::Failure { .. } => "failure",
        ActionOutcome::Denied { .. } => "denied",
    }
}

fn field_values(event: &AuditEvent) -> [String; 13] {
    [
        event.id.to_string(),
        event.timestamp.to_rfc3339(),
        event
            .tenant_id
            .as_ref()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
        event
            .user_id
            .as_ref()
            .map(|u| u.as_str().to_string())
            .unwrap_or_default(),
        format!("{:?}", event.category),
        event.event_type.clone(),
        format!("{:?}", event.severity),
        event.description.clone(),
        outcome_label(&event.outcome).to_string(),
        format!("{:?}", event.risk.level),
        format!("{}", event.risk.score),
        event.source.component.clone(),
        event.source.method.clone(),
    ]
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn export_csv(events: &[AuditEvent]) -> String {
    let mut out = FIELDS.join(",");
    out.push('\n');
    for event in events {
        let row: Vec<String> = field_values(event)
            .iter()
            .map(|v| csv_escape(v))
            .collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn export_xml(events: &[AuditEvent]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<auditEvents>\n");
    for event in events {
        out.push_str("  <event>\n");
        for (field, value) in FIELDS.iter().zip(field_values(event)) {
            out.push_str(&format!(
                "    <{field}>{}</{field}>\n",
                xml_escape(&value)
            ));
        }
        out.push_str("  </event>\n");
    }
    out.push_str("</auditEvents>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditCategory;
    use sonate_types::TenantId;

    fn event(description: &str) -> AuditEvent {
        let mut event = AuditEvent::builder()
            .category(AuditCategory::DataAccess)
            .event_type("read")
            .description(description)
            .source("store", "get")
            .build()
            .unwrap();
        event.tenant_id = Some(TenantId::new("acme"));
        event
    }

    #[test]
    fn csv_has_header_and_fixed_field_order() {
        let out = export_events(&[event("plain")], ExportFormat::Csv);
        let mut lines = out.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,timestamp,tenantId,userId,category,type,severity,description,outcome,riskLevel,riskScore,sourceComponent,sourceMethod"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("DataAccess"));
        assert!(row.contains("plain"));
        assert!(row.ends_with("store,get"));
    }

    #[test]
    fn csv_escapes_embedded_delimiters() {
        let out = export_events(
            &[event("a, \"quoted\" description")],
            ExportFormat::Csv,
        );
        assert!(out.contains("\"a, \"\"quoted\"\" description\""));
    }

    #[test]
    fn xml_escapes_markup() {
        let out = export_events(&[event("a < b & c")], ExportFormat::Xml);
        assert!(out.contains("<description>a &lt; b &amp; c</description>"));
        assert!(out.starts_with("<?xml"));
        assert!(out.trim_end().ends_with("</auditEvents>"));
    }

    #[test]
    fn json_roundtrips() {
        let events = vec![event("one"), event("two")];
        let out = export_events(&events, ExportFormat::Json);
        let restored: Vec<AuditEvent> = serde_json::from_str(&out).unwrap();
        assert_eq!(restored, events);
    }

    #[test]
    fn empty_export_is_well_formed() {
        assert_eq!(export_events(&[], ExportFormat::Json), "[]");
        assert_eq!(export_events(&[], ExportFormat::Csv).lines().count(), 1);
        assert!(export_events(&[], ExportFormat::Xml).contains("<auditEvents>"));
    }
}
