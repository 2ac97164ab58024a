//! Reply reconciliation — match inbound replies to leads.
//!
//! Runs on its own trigger, independent of the sequence scheduler. A
//! matched reply short-circuits the sequence: the lead's stage is forced
//! to `qualified`, which every later scheduling decision treats as
//! terminal. Unmatched messages are left unread so a human (or a later
//! run with better data) can still see them.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{Result, StoreError};
use crate::inbox::{Inbox, InboxMessage};
use crate::model::{ActivityEntry, Stage};
use crate::store::{LeadStore, LeadUpdate};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub checked: usize,
    pub matched: usize,
    pub unmatched: usize,
    lines: Vec<String>,
    pub report_path: PathBuf,
}

impl ReconcileReport {
    /// The human-readable run summary, identical to the report file body.
    pub fn summary(&self) -> String {
        self.lines.join("\n")
    }
}

pub struct ReplyReconciler {
    store: Arc<dyn LeadStore>,
    inbox: Arc<dyn Inbox>,
    report_dir: PathBuf,
}

impl ReplyReconciler {
    pub fn new(store: Arc<dyn LeadStore>, inbox: Arc<dyn Inbox>, report_dir: PathBuf) -> Self {
        Self {
            store,
            inbox,
            report_dir,
        }
    }

    pub async fn run(&self) -> Result<ReconcileReport> {
        let today = Utc::now().format("%Y-%m-%d");
        let mut lines = vec![
            format!("--- Inbox reconciliation ({today}) ---"),
            String::new(),
        ];

        let messages = self.inbox.fetch_unseen().await?;
        lines.push(format!("Found {} unseen messages.", messages.len()));
        lines.push(String::new());
        if messages.is_empty() {
            lines.push("No new lead replies.".to_string());
        }

        let mut matched = 0usize;
        let mut unmatched = 0usize;

        for message in &messages {
            lines.push(format!(
                "From: {} / Subject: {}",
                message.sender, message.subject
            ));
            if self.reconcile_message(message).await? {
                matched += 1;
                lines.push("  -> matched lead, stage set to qualified, reply logged".to_string());
            } else {
                unmatched += 1;
                lines.push("  -> no matching lead, left unread".to_string());
            }
            lines.push(String::new());
        }

        let report_path = self.write_report(&today.to_string(), &lines)?;

        let report = ReconcileReport {
            checked: messages.len(),
            matched,
            unmatched,
            lines,
            report_path,
        };
        tracing::info!(
            checked = report.checked,
            matched = report.matched,
            unmatched = report.unmatched,
            "Reconciliation done"
        );
        Ok(report)
    }

    /// Handle one message. Returns whether it matched a lead. Store auth
    /// failures abort the run; other per-message store errors leave the
    /// message unread for the next pass.
    async fn reconcile_message(&self, message: &InboxMessage) -> Result<bool> {
        // Exact-match lookup: case or alias variants of the address miss.
        let lead = match self.store.get_by_email(&message.sender).await {
            Ok(found) => found,
            Err(e @ StoreError::Auth { .. }) => return Err(e.into()),
            Err(e) => {
                tracing::error!(sender = %message.sender, error = %e, "Lead lookup failed");
                return Ok(false);
            }
        };

        let Some(lead) = lead else {
            tracing::info!(sender = %message.sender, "No lead for sender");
            return Ok(false);
        };

        tracing::info!(
            sender = %message.sender,
            lead_id = %lead.id,
            body_preview = %message.body.chars().take(80).collect::<String>(),
            "Reply matched a lead"
        );

        let mut activity = lead.activity.clone();
        activity.push(ActivityEntry::now(format!(
            "Reply received: \"{}\"",
            message.subject
        )));
        let update = LeadUpdate {
            stage: Some(Stage::Qualified),
            activity: Some(activity),
            ..LeadUpdate::default()
        };

        match self.store.update(&lead.id, &update).await {
            Ok(()) => {}
            Err(e @ StoreError::Auth { .. }) => return Err(e.into()),
            Err(e) => {
                // Leave the message unread; the next pass retries it.
                tracing::error!(lead_id = %lead.id, error = %e, "Stage update failed");
                return Ok(false);
            }
        }

        if let Err(e) = self.inbox.mark_seen(&message.uid).await {
            tracing::warn!(uid = %message.uid, error = %e, "Could not mark message seen");
        }
        Ok(true)
    }

    fn write_report(&self, date: &str, lines: &[String]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.report_dir)?;
        let path = self.report_dir.join(format!("inbox-{date}.md"));
        std::fs::write(&path, lines.join("\n"))?;
        Ok(path)
    }
}
