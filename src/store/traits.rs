//! `LeadStore` trait — the narrow interface to the remote lead table.
//!
//! The store supports filter-by-field-equality reads, insert, and
//! partial-field update keyed by lead id. History and activity columns are
//! append-only ordered lists; callers read the current lists, append, and
//! write the whole list back so an append is all-or-nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{ActivityEntry, EmailHistoryEntry, Lead, Prospect, Stage};

/// Partial update for a lead row. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct LeadUpdate {
    pub stage: Option<Stage>,
    pub email_history: Option<Vec<EmailHistoryEntry>>,
    pub activity: Option<Vec<ActivityEntry>>,
    pub last_contacted: Option<DateTime<Utc>>,
}

/// Backend-agnostic lead persistence.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Look up a lead by its unique email address (exact match).
    async fn get_by_email(&self, email: &str) -> Result<Option<Lead>, StoreError>;

    /// All leads currently in the given stage, most recently updated first.
    async fn get_by_stage(&self, stage: Stage) -> Result<Vec<Lead>, StoreError>;

    /// Insert a freshly sourced prospect as a new lead (stage `new`, with an
    /// initial activity entry). Returns the stored row.
    async fn insert_prospect(&self, prospect: &Prospect) -> Result<Lead, StoreError>;

    /// Refresh an existing lead's profile and score from a re-sourced
    /// prospect, leaving stage, history, and activity untouched.
    async fn update_prospect(&self, id: &str, prospect: &Prospect) -> Result<Lead, StoreError>;

    /// Apply a partial update to a lead by id.
    async fn update(&self, id: &str, update: &LeadUpdate) -> Result<(), StoreError>;
}
