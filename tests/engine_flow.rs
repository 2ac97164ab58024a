//! End-to-end scenarios for the sequence runner and reply reconciler,
//! driven against in-memory fakes of the store, email, and inbox traits.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use leadflow::config::{SenderIdentity, SequenceConfig};
use leadflow::email::{DeliveryReceipt, EmailSender, NullEmailSender, OutboundEmail};
use leadflow::error::{EmailError, InboxError, StoreError};
use leadflow::inbox::{Inbox, InboxMessage};
use leadflow::model::{EmailHistoryEntry, Lead, SendStatus, Stage};
use leadflow::reconciler::ReplyReconciler;
use leadflow::sequence::SequenceRunner;
use leadflow::store::{LeadStore, LeadUpdate};

// ── Fakes ───────────────────────────────────────────────────────────

struct MemoryStore {
    leads: Mutex<Vec<Lead>>,
}

impl MemoryStore {
    fn new(leads: Vec<Lead>) -> Self {
        Self {
            leads: Mutex::new(leads),
        }
    }

    fn lead(&self, id: &str) -> Lead {
        self.leads
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .expect("lead exists")
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn get_by_email(&self, email: &str) -> Result<Option<Lead>, StoreError> {
        Ok(self
            .leads
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.email == email)
            .cloned())
    }

    async fn get_by_stage(&self, stage: Stage) -> Result<Vec<Lead>, StoreError> {
        Ok(self
            .leads
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.stage == stage)
            .cloned()
            .collect())
    }

    async fn insert_prospect(
        &self,
        _prospect: &leadflow::model::Prospect,
    ) -> Result<Lead, StoreError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn update_prospect(
        &self,
        _id: &str,
        _prospect: &leadflow::model::Prospect,
    ) -> Result<Lead, StoreError> {
        unimplemented!("not exercised by these scenarios")
    }

    async fn update(&self, id: &str, update: &LeadUpdate) -> Result<(), StoreError> {
        let mut leads = self.leads.lock().unwrap();
        let lead = leads
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| StoreError::MissingRow {
                entity: "lead".into(),
                key: id.into(),
            })?;
        if let Some(stage) = update.stage {
            lead.stage = stage;
        }
        if let Some(ref history) = update.email_history {
            lead.email_history = history.clone();
        }
        if let Some(ref activity) = update.activity {
            lead.activity = activity.clone();
        }
        if let Some(last_contacted) = update.last_contacted {
            lead.last_contacted = Some(last_contacted);
        }
        lead.updated_at = Utc::now();
        Ok(())
    }
}

struct RecordingSender {
    sent: Mutex<Vec<OutboundEmail>>,
    fail: bool,
}

impl RecordingSender {
    fn new() -> Self {
        Self {
            sent: Mutex::new(vec![]),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            sent: Mutex::new(vec![]),
            fail: true,
        }
    }

    fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt, EmailError> {
        if self.fail {
            return Err(EmailError::Rejected {
                status: 500,
                body: "provider exploded".into(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(DeliveryReceipt {
            id: format!("re_test_{}", sent.len()),
        })
    }
}

struct MemoryInbox {
    messages: Mutex<Vec<(InboxMessage, bool)>>,
}

impl MemoryInbox {
    fn new(messages: Vec<InboxMessage>) -> Self {
        Self {
            messages: Mutex::new(messages.into_iter().map(|m| (m, false)).collect()),
        }
    }

    fn seen(&self, uid: &str) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|(m, _)| m.uid == uid)
            .map(|(_, seen)| *seen)
            .expect("message exists")
    }
}

#[async_trait]
impl Inbox for MemoryInbox {
    async fn fetch_unseen(&self) -> Result<Vec<InboxMessage>, InboxError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, seen)| !seen)
            .map(|(m, _)| m.clone())
            .collect())
    }

    async fn mark_seen(&self, uid: &str) -> Result<(), InboxError> {
        let mut messages = self.messages.lock().unwrap();
        for (message, seen) in messages.iter_mut() {
            if message.uid == uid {
                *seen = true;
                return Ok(());
            }
        }
        Err(InboxError::Protocol(format!("unknown uid {uid}")))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn fresh_lead(id: &str, email: &str) -> Lead {
    Lead {
        id: id.into(),
        email: email.into(),
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
        stage: Stage::New,
        email_history: vec![],
        activity: vec![],
        created_at: Utc::now(),
        updated_at: Utc::now(),
        last_contacted: None,
    }
}

fn history_entry(number: u8, days_ago: i64) -> EmailHistoryEntry {
    EmailHistoryEntry {
        email_number: number,
        subject: format!("subject {number}"),
        sent_at: Utc::now() - Duration::days(days_ago),
        status: SendStatus::Sent,
        delivery_id: "re_prev".into(),
    }
}

fn fast_config() -> SequenceConfig {
    SequenceConfig {
        send_delay: std::time::Duration::ZERO,
        ..SequenceConfig::default()
    }
}

fn runner(
    store: Arc<MemoryStore>,
    sender: Arc<dyn EmailSender>,
    config: SequenceConfig,
) -> SequenceRunner {
    SequenceRunner::new(store, sender, config, SenderIdentity::default())
}

// ── Sequence scenarios ──────────────────────────────────────────────

#[tokio::test]
async fn fresh_lead_gets_opener_and_moves_to_contacted() {
    let store = Arc::new(MemoryStore::new(vec![fresh_lead("l1", "pete@example.com")]));
    let sender = Arc::new(RecordingSender::new());
    let report = runner(store.clone(), sender.clone(), fast_config())
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "pete@example.com");
    assert!(sent[0].html.contains("Hi Pete,"));

    let lead = store.lead("l1");
    assert_eq!(lead.stage, Stage::Contacted);
    assert_eq!(lead.email_history.len(), 1);
    assert_eq!(lead.email_history[0].email_number, 1);
    assert_eq!(lead.email_history[0].status, SendStatus::Sent);
    assert_eq!(lead.email_history[0].delivery_id, "re_test_1");
    assert!(lead.last_contacted.is_some());
    assert_eq!(lead.activity.len(), 1);
    assert!(lead.activity[0].event.contains("Email #1 sent"));
}

#[tokio::test]
async fn recent_history_waits_and_changes_nothing() {
    let mut lead = fresh_lead("l1", "pete@example.com");
    lead.stage = Stage::Contacted;
    lead.email_history = vec![history_entry(1, 1)];

    let store = Arc::new(MemoryStore::new(vec![lead]));
    let sender = Arc::new(RecordingSender::new());
    let report = runner(store.clone(), sender.clone(), fast_config())
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.processed, 0);
    assert!(sender.sent().is_empty());
    assert_eq!(store.lead("l1").email_history.len(), 1);
}

#[tokio::test]
async fn due_follow_up_sends_email_two() {
    let mut lead = fresh_lead("l1", "pete@example.com");
    lead.stage = Stage::Contacted;
    lead.email_history = vec![history_entry(1, 3)];

    let store = Arc::new(MemoryStore::new(vec![lead]));
    let sender = Arc::new(RecordingSender::new());
    runner(store.clone(), sender.clone(), fast_config())
        .run(false)
        .await
        .unwrap();

    let lead = store.lead("l1");
    assert_eq!(lead.email_history.len(), 2);
    assert_eq!(lead.email_history[1].email_number, 2);
    let sent = sender.sent();
    assert!(sent[0].subject.starts_with("re: "));
}

#[tokio::test]
async fn qualified_lead_with_partial_history_is_never_emailed() {
    let mut lead = fresh_lead("l1", "pete@example.com");
    lead.stage = Stage::Qualified;
    lead.email_history = vec![history_entry(1, 30)];

    let store = Arc::new(MemoryStore::new(vec![lead]));
    let sender = Arc::new(RecordingSender::new());
    let report = runner(store.clone(), sender.clone(), fast_config())
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.processed, 0);
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn dry_run_records_history_without_sending() {
    let store = Arc::new(MemoryStore::new(vec![fresh_lead("l1", "pete@example.com")]));
    let report = runner(store.clone(), Arc::new(NullEmailSender), fast_config())
        .run(true)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    let lead = store.lead("l1");
    assert_eq!(lead.email_history.len(), 1);
    assert_eq!(lead.email_history[0].status, SendStatus::DryRun);
    assert!(lead.email_history[0].delivery_id.starts_with("dry-"));
    // A dry-run entry advances the sequence and the stage.
    assert_eq!(lead.stage, Stage::Contacted);
}

#[tokio::test]
async fn per_run_cap_defers_remaining_leads() {
    let leads = vec![
        fresh_lead("l1", "a@example.com"),
        fresh_lead("l2", "b@example.com"),
        fresh_lead("l3", "c@example.com"),
    ];
    let store = Arc::new(MemoryStore::new(leads));
    let sender = Arc::new(RecordingSender::new());
    let config = SequenceConfig {
        max_sends_per_run: 2,
        ..fast_config()
    };
    let report = runner(store.clone(), sender.clone(), config)
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(sender.sent().len(), 2);
    let untouched: usize = ["l1", "l2", "l3"]
        .iter()
        .filter(|id| store.lead(id).email_history.is_empty())
        .count();
    assert_eq!(untouched, 1);
}

#[tokio::test]
async fn failed_send_records_failure_and_does_not_advance() {
    let store = Arc::new(MemoryStore::new(vec![fresh_lead("l1", "pete@example.com")]));
    let sender = Arc::new(RecordingSender::failing());
    let report = runner(store.clone(), sender, fast_config())
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);

    let lead = store.lead("l1");
    assert_eq!(lead.email_history.len(), 1);
    assert_eq!(lead.email_history[0].status, SendStatus::Failed);
    assert!(lead.email_history[0].delivery_id.is_empty());
    // Still stage new with no sent entry: the next run re-offers email 1.
    assert_eq!(lead.stage, Stage::New);
    assert!(lead.sent_numbers().is_empty());
    assert!(lead.activity[0].event.contains("failed"));
}

// ── Reconciler scenarios ────────────────────────────────────────────

fn reply(uid: &str, sender: &str) -> InboxMessage {
    InboxMessage {
        uid: uid.into(),
        sender: sender.into(),
        subject: "Re: quick thought".into(),
        body: "Sure, call me Thursday.".into(),
    }
}

#[tokio::test]
async fn matched_reply_qualifies_the_lead() {
    let mut lead = fresh_lead("l1", "pete@example.com");
    lead.stage = Stage::Contacted;
    let activity_before = lead.activity.len();

    let store = Arc::new(MemoryStore::new(vec![lead]));
    let inbox = Arc::new(MemoryInbox::new(vec![reply("101", "pete@example.com")]));
    let report_dir = tempfile::tempdir().unwrap();

    let reconciler = ReplyReconciler::new(
        store.clone(),
        inbox.clone(),
        report_dir.path().to_path_buf(),
    );
    let report = reconciler.run().await.unwrap();

    assert_eq!(report.checked, 1);
    assert_eq!(report.matched, 1);
    assert_eq!(report.unmatched, 0);

    let lead = store.lead("l1");
    assert_eq!(lead.stage, Stage::Qualified);
    assert_eq!(lead.activity.len(), activity_before + 1);
    assert!(lead.activity.last().unwrap().event.contains("Re: quick thought"));
    assert!(inbox.seen("101"));

    let written = std::fs::read_to_string(&report.report_path).unwrap();
    assert!(written.contains("pete@example.com"));
    assert!(written.contains("matched lead"));
}

#[tokio::test]
async fn unmatched_reply_leaves_store_and_message_untouched() {
    let lead = fresh_lead("l1", "pete@example.com");
    let store = Arc::new(MemoryStore::new(vec![lead.clone()]));
    let inbox = Arc::new(MemoryInbox::new(vec![reply("102", "stranger@example.com")]));
    let report_dir = tempfile::tempdir().unwrap();

    let reconciler = ReplyReconciler::new(
        store.clone(),
        inbox.clone(),
        report_dir.path().to_path_buf(),
    );
    let report = reconciler.run().await.unwrap();

    assert_eq!(report.matched, 0);
    assert_eq!(report.unmatched, 1);

    let after = store.lead("l1");
    assert_eq!(after.stage, lead.stage);
    assert_eq!(after.activity.len(), lead.activity.len());
    assert!(!inbox.seen("102"));
}

#[tokio::test]
async fn qualified_lead_stays_quiet_after_reply_even_when_due() {
    // Reply first, then a sequence run: the reply must pre-empt the send.
    let mut lead = fresh_lead("l1", "pete@example.com");
    lead.stage = Stage::Contacted;
    lead.email_history = vec![history_entry(1, 10)];

    let store = Arc::new(MemoryStore::new(vec![lead]));
    let inbox = Arc::new(MemoryInbox::new(vec![reply("103", "pete@example.com")]));
    let report_dir = tempfile::tempdir().unwrap();

    ReplyReconciler::new(store.clone(), inbox, report_dir.path().to_path_buf())
        .run()
        .await
        .unwrap();

    let sender = Arc::new(RecordingSender::new());
    let report = runner(store.clone(), sender.clone(), fast_config())
        .run(false)
        .await
        .unwrap();

    assert_eq!(report.processed, 0);
    assert!(sender.sent().is_empty());
    assert_eq!(store.lead("l1").email_history.len(), 1);
}
