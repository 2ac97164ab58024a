//! Lead data model — the shared shape flowing through every stage.
//!
//! `Prospect` is the pre-persistence form produced by sourcing + enrichment
//! and validated at that boundary. `Lead` is the persisted record the store
//! returns, including outreach history and the activity timeline. Both lists
//! travel as JSON array strings inside the store row; [`parse_event_list`]
//! reads them leniently so a malformed payload never fails the lead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

// ── Stage and status ────────────────────────────────────────────────

/// Outreach lifecycle stage. `Qualified` and `Lost` are terminal: leads in
/// those stages never receive further automated sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    New,
    Contacted,
    Qualified,
    Lost,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Qualified | Self::Lost)
    }

    /// Wire/label form, matching the store's stage column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Lost => "lost",
        }
    }
}

/// Outcome of one send attempt. `DryRun` advances the sequence exactly like
/// `Sent`; `Failed` does not, so the next run re-offers the same number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Pending,
    Sent,
    DryRun,
    Failed,
}

impl SendStatus {
    /// Does this status count as "sent" for sequence advancement?
    pub fn advances_sequence(self) -> bool {
        matches!(self, Self::Sent | Self::DryRun)
    }
}

// ── History and activity ────────────────────────────────────────────

/// One send attempt in a lead's outreach history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailHistoryEntry {
    pub email_number: u8,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
    pub status: SendStatus,
    #[serde(default)]
    pub delivery_id: String,
}

/// One timestamped note in a lead's append-only activity timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ActivityEntry {
    pub fn now(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            timestamp: Utc::now(),
            source: None,
        }
    }
}

// ── Records ─────────────────────────────────────────────────────────

/// A sourced + enriched candidate, not yet persisted. `email` and
/// `company_name` are validated non-empty at the sourcing boundary.
#[derive(Debug, Clone)]
pub struct Prospect {
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: String,
    pub city: String,
    pub state: String,
    pub employee_count: Option<u32>,
    pub title: String,
    pub email_verified: bool,
    /// Filled by the scoring engine.
    pub score: u8,
    pub insight: String,
    pub score_reasons: Vec<String>,
}

/// A persisted lead as returned by the store.
#[derive(Debug, Clone)]
pub struct Lead {
    pub id: String,
    pub email: String,
    pub company_name: String,
    pub contact_name: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: String,
    pub city: String,
    pub state: String,
    pub employee_count: Option<u32>,
    pub title: String,
    pub score: u8,
    pub insight: String,
    pub score_reasons: Vec<String>,
    pub stage: Stage,
    pub email_history: Vec<EmailHistoryEntry>,
    pub activity: Vec<ActivityEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_contacted: Option<DateTime<Utc>>,
}

impl Lead {
    /// Email numbers with a recorded entry that counts as sent.
    pub fn sent_numbers(&self) -> Vec<u8> {
        self.email_history
            .iter()
            .filter(|e| e.status.advances_sequence())
            .map(|e| e.email_number)
            .collect()
    }

    /// The most recent history entry by timestamp, regardless of status.
    /// Sequence timing is measured against this, not the first entry.
    pub fn latest_history_entry(&self) -> Option<&EmailHistoryEntry> {
        self.email_history.iter().max_by_key(|e| e.sent_at)
    }
}

// ── Event-list wire encoding ────────────────────────────────────────

/// Decode a persisted ordered-event-list column.
///
/// Accepts either a JSON array value or a string containing a JSON array
/// (the store keeps these columns as serialized text). Anything malformed
/// reads as empty — a corrupt timeline must not fail the lead.
pub fn parse_event_list<T: DeserializeOwned>(value: Option<&serde_json::Value>) -> Vec<T> {
    match value {
        Some(serde_json::Value::String(s)) => serde_json::from_str(s).unwrap_or_default(),
        Some(v @ serde_json::Value::Array(_)) => {
            serde_json::from_value(v.clone()).unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

/// Encode an ordered-event-list for the store, preserving order.
pub fn encode_event_list<T: Serialize>(list: &[T]) -> String {
    serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(number: u8, status: SendStatus, sent_at: DateTime<Utc>) -> EmailHistoryEntry {
        EmailHistoryEntry {
            email_number: number,
            subject: format!("subject {number}"),
            sent_at,
            status,
            delivery_id: String::new(),
        }
    }

    fn lead_with_history(history: Vec<EmailHistoryEntry>) -> Lead {
        Lead {
            id: "lead-1".into(),
            email: "pete@example.com".into(),
            company_name: "Pete's Lawn Care".into(),
            contact_name: "Pete Alvarez".into(),
            phone: None,
            website: None,
            industry: "landscaping".into(),
            city: "Toms River".into(),
            state: "NJ".into(),
            employee_count: Some(12),
            title: "Owner".into(),
            score: 8,
            insight: String::new(),
            score_reasons: vec![],
            stage: Stage::Contacted,
            email_history: history,
            activity: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_contacted: None,
        }
    }

    #[test]
    fn terminal_stages() {
        assert!(Stage::Qualified.is_terminal());
        assert!(Stage::Lost.is_terminal());
        assert!(!Stage::New.is_terminal());
        assert!(!Stage::Contacted.is_terminal());
    }

    #[test]
    fn stage_wire_form() {
        let json = serde_json::to_value(Stage::Contacted).unwrap();
        assert_eq!(json, "contacted");
        let back: Stage = serde_json::from_value(json).unwrap();
        assert_eq!(back, Stage::Contacted);
        assert_eq!(Stage::Contacted.as_str(), "contacted");
    }

    #[test]
    fn dry_run_counts_as_sent_failed_does_not() {
        assert!(SendStatus::Sent.advances_sequence());
        assert!(SendStatus::DryRun.advances_sequence());
        assert!(!SendStatus::Failed.advances_sequence());
        assert!(!SendStatus::Pending.advances_sequence());
    }

    #[test]
    fn sent_numbers_skips_failed_entries() {
        let now = Utc::now();
        let lead = lead_with_history(vec![
            entry(1, SendStatus::Sent, now - Duration::days(5)),
            entry(2, SendStatus::Failed, now - Duration::days(1)),
        ]);
        assert_eq!(lead.sent_numbers(), vec![1]);
    }

    #[test]
    fn latest_entry_is_by_timestamp_not_position() {
        let now = Utc::now();
        let lead = lead_with_history(vec![
            entry(2, SendStatus::Sent, now - Duration::days(1)),
            entry(1, SendStatus::Sent, now - Duration::days(5)),
        ]);
        assert_eq!(lead.latest_history_entry().unwrap().email_number, 2);
    }

    #[test]
    fn parse_event_list_from_json_string() {
        let raw = serde_json::json!(
            r#"[{"event":"Lead created","timestamp":"2026-07-01T12:00:00Z","source":"web_search"}]"#
        );
        let parsed: Vec<ActivityEntry> = parse_event_list(Some(&raw));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].event, "Lead created");
        assert_eq!(parsed[0].source.as_deref(), Some("web_search"));
    }

    #[test]
    fn parse_event_list_from_json_array() {
        let raw = serde_json::json!([
            {"event": "Email #1 sent", "timestamp": "2026-07-01T12:00:00Z"}
        ]);
        let parsed: Vec<ActivityEntry> = parse_event_list(Some(&raw));
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].source.is_none());
    }

    #[test]
    fn malformed_event_list_reads_as_empty() {
        let raw = serde_json::json!("not json at all {{{");
        let parsed: Vec<ActivityEntry> = parse_event_list(Some(&raw));
        assert!(parsed.is_empty());

        let parsed: Vec<EmailHistoryEntry> = parse_event_list(None);
        assert!(parsed.is_empty());

        let raw = serde_json::json!(42);
        let parsed: Vec<EmailHistoryEntry> = parse_event_list(Some(&raw));
        assert!(parsed.is_empty());
    }

    #[test]
    fn event_list_round_trip_preserves_order() {
        let now = Utc::now();
        let entries = vec![
            entry(1, SendStatus::Sent, now - Duration::days(4)),
            entry(2, SendStatus::DryRun, now),
        ];
        let encoded = encode_event_list(&entries);
        let raw = serde_json::Value::String(encoded);
        let decoded: Vec<EmailHistoryEntry> = parse_event_list(Some(&raw));
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].email_number, 1);
        assert_eq!(decoded[1].email_number, 2);
        assert_eq!(decoded[1].status, SendStatus::DryRun);
    }
}
