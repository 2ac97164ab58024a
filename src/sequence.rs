//! Sequence scheduling — decide and send the next outreach email per lead.
//!
//! The decision logic ([`next_action`]) is a pure function of the lead's
//! persisted history and the clock; [`SequenceRunner`] applies it over all
//! leads in active stages, renders and sends what is due, and writes the
//! updated history back in a single store update.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::{SenderIdentity, SequenceConfig};
use crate::email::{EmailSender, OutboundEmail};
use crate::error::{Result, StoreError};
use crate::model::{ActivityEntry, EmailHistoryEntry, Lead, SendStatus, Stage};
use crate::store::{LeadStore, LeadUpdate};
use crate::templates;

// ── Decision ────────────────────────────────────────────────────────

/// What the sequence should do for a lead right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Send this email number now.
    Send(u8),
    /// The next email exists but its wait period has not elapsed.
    Wait,
    /// Terminal stage or sequence exhausted; never send again.
    Skip,
}

/// Decide the next action for a lead.
///
/// A `dry_run` history entry counts as sent here: it advanced the sequence
/// when it was recorded, and re-offering the same number would double up
/// once the run goes live. A `failed` entry does not count, so the same
/// number is offered again on the next invocation.
pub fn next_action(lead: &Lead, now: DateTime<Utc>, config: &SequenceConfig) -> NextAction {
    if lead.stage.is_terminal() {
        return NextAction::Skip;
    }

    let sent = lead.sent_numbers();
    let Some(&last) = sent.iter().max() else {
        // Nothing sent yet: the opener is always due immediately.
        return NextAction::Send(1);
    };

    if last >= config.max_emails {
        return NextAction::Skip;
    }
    let next = last + 1;

    // Timing runs from the most recent entry of any status, not the first.
    let Some(latest) = lead.latest_history_entry() else {
        return NextAction::Send(next);
    };
    let required = Duration::days(config.wait_days(next));
    if now.signed_duration_since(latest.sent_at) >= required {
        NextAction::Send(next)
    } else {
        NextAction::Wait
    }
}

// ── Runner ──────────────────────────────────────────────────────────

/// Outcome summary of one sequence invocation.
#[derive(Debug, Clone)]
pub struct SequenceReport {
    pub considered: usize,
    pub processed: usize,
    pub failed: usize,
    pub dry_run: bool,
}

impl SequenceReport {
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "drafted" } else { "sent" };
        format!(
            "Sequence run complete: {} of {} leads {} ({} failed)",
            self.processed - self.failed,
            self.considered,
            verb,
            self.failed
        )
    }
}

/// Runs one sequence pass over all leads in active stages.
///
/// There is no cross-invocation lease: two overlapping runs can both decide
/// the same lead is due and double-send. Runs are expected to be triggered
/// serially by an external scheduler.
pub struct SequenceRunner {
    store: Arc<dyn LeadStore>,
    sender: Arc<dyn EmailSender>,
    config: SequenceConfig,
    identity: SenderIdentity,
}

impl SequenceRunner {
    pub fn new(
        store: Arc<dyn LeadStore>,
        sender: Arc<dyn EmailSender>,
        config: SequenceConfig,
        identity: SenderIdentity,
    ) -> Self {
        Self {
            store,
            sender,
            config,
            identity,
        }
    }

    pub async fn run(&self, dry_run: bool) -> Result<SequenceReport> {
        let mode = if dry_run { "dry_run" } else { "live" };
        tracing::info!(mode, "Sequence run starting");

        let mut leads = self.store.get_by_stage(Stage::Contacted).await?;
        leads.extend(self.store.get_by_stage(Stage::New).await?);

        let now = Utc::now();
        let mut processed = 0usize;
        let mut failed = 0usize;

        for lead in &leads {
            if processed >= self.config.max_sends_per_run {
                tracing::warn!(
                    cap = self.config.max_sends_per_run,
                    "Per-run send cap reached, deferring remaining leads"
                );
                break;
            }

            let number = match next_action(lead, now, &self.config) {
                NextAction::Send(n) => n,
                NextAction::Wait | NextAction::Skip => continue,
            };

            tracing::info!(email = %lead.email, number, "Sending sequence email");
            let rendered = templates::render(lead, number, &self.identity);

            let (status, delivery_id, send_error) = if dry_run {
                (
                    SendStatus::DryRun,
                    format!("dry-{}", Uuid::new_v4()),
                    None,
                )
            } else {
                match self
                    .sender
                    .send(&OutboundEmail {
                        to: lead.email.clone(),
                        subject: rendered.subject.clone(),
                        html: templates::to_html(&rendered.body),
                    })
                    .await
                {
                    Ok(receipt) => (SendStatus::Sent, receipt.id, None),
                    Err(e) => {
                        tracing::error!(email = %lead.email, error = %e, "Send failed");
                        (SendStatus::Failed, String::new(), Some(e.to_string()))
                    }
                }
            };
            processed += 1;
            if status == SendStatus::Failed {
                failed += 1;
            }

            self.record_attempt(lead, number, &rendered.subject, status, delivery_id, send_error)
                .await?;

            // Spread live sends out; the last processed lead needs no pause.
            if !dry_run && processed < self.config.max_sends_per_run {
                tokio::time::sleep(self.config.send_delay).await;
            }
        }

        let report = SequenceReport {
            considered: leads.len(),
            processed,
            failed,
            dry_run,
        };
        tracing::info!(processed = report.processed, failed = report.failed, "Sequence run done");
        Ok(report)
    }

    /// Append the history entry and activity note, advance stage new →
    /// contacted, and stamp `last_contacted`, all in one store write so the
    /// lists move all-or-nothing against the state we read.
    async fn record_attempt(
        &self,
        lead: &Lead,
        number: u8,
        subject: &str,
        status: SendStatus,
        delivery_id: String,
        send_error: Option<String>,
    ) -> Result<()> {
        let now = Utc::now();

        let mut history = lead.email_history.clone();
        history.push(EmailHistoryEntry {
            email_number: number,
            subject: subject.to_string(),
            sent_at: now,
            status,
            delivery_id,
        });

        let note = match (&status, &send_error) {
            (SendStatus::Failed, Some(reason)) => {
                format!("Email #{number} failed: {reason}")
            }
            (SendStatus::DryRun, _) => format!("Email #{number} drafted (dry run)"),
            _ => format!("Email #{number} sent"),
        };
        let mut activity = lead.activity.clone();
        activity.push(ActivityEntry::now(note));

        let update = LeadUpdate {
            stage: (lead.stage == Stage::New && status.advances_sequence())
                .then_some(Stage::Contacted),
            email_history: Some(history),
            activity: Some(activity),
            last_contacted: Some(now),
        };

        match self.store.update(&lead.id, &update).await {
            Ok(()) => Ok(()),
            // Credential failures abort the run; anything else is one lead's
            // problem and the run moves on.
            Err(e @ StoreError::Auth { .. }) => Err(e.into()),
            Err(e) => {
                tracing::error!(email = %lead.email, error = %e, "Failed to record send attempt");
                Ok(())
            }
        }
    }
}
