//! REST lead store — PostgREST-style row API over reqwest.
//!
//! Rows are filtered with `?field=eq.value` query params; writes send
//! `Prefer: return=representation` so the affected row comes back. The
//! history and activity columns hold JSON array strings and are decoded
//! leniently (malformed text reads as an empty list).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::model::{
    ActivityEntry, EmailHistoryEntry, Lead, Prospect, Stage, encode_event_list, parse_event_list,
};
use crate::store::traits::{LeadStore, LeadUpdate};

/// Remote lead store client.
pub struct RestLeadStore {
    config: StoreConfig,
    http: reqwest::Client,
}

impl RestLeadStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/leads", self.config.base_url.trim_end_matches('/'))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let key = self.config.api_key.expose_secret();
        self.http
            .request(method, url)
            .timeout(self.config.timeout)
            .header("apikey", key)
            .header("Authorization", format!("Bearer {key}"))
    }

    /// Map provider status codes: 401/403 are credential problems and fatal
    /// to the run; anything else non-2xx is an item-scoped failure.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(StoreError::Auth {
                status: status.as_u16(),
            });
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body: body.chars().take(300).collect(),
        })
    }

    async fn rows(response: reqwest::Response) -> Result<Vec<LeadRow>, StoreError> {
        Self::check(response)
            .await?
            .json::<Vec<LeadRow>>()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl LeadStore for RestLeadStore {
    async fn get_by_email(&self, email: &str) -> Result<Option<Lead>, StoreError> {
        let response = self
            .request(reqwest::Method::GET, &self.table_url())
            .query(&[("email", format!("eq.{email}")), ("limit", "1".into())])
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let rows = Self::rows(response).await?;
        rows.into_iter().next().map(LeadRow::into_lead).transpose()
    }

    async fn get_by_stage(&self, stage: Stage) -> Result<Vec<Lead>, StoreError> {
        let response = self
            .request(reqwest::Method::GET, &self.table_url())
            .query(&[
                ("stage", format!("eq.{}", stage.as_str())),
                ("order", "updated_at.desc".into()),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let rows = Self::rows(response).await?;
        rows.into_iter().map(LeadRow::into_lead).collect()
    }

    async fn insert_prospect(&self, prospect: &Prospect) -> Result<Lead, StoreError> {
        let now = Utc::now();
        let mut row = prospect_row(prospect, now);
        row["stage"] = serde_json::json!(Stage::New);
        row["created_at"] = serde_json::json!(now);
        row["activity"] = serde_json::json!(encode_event_list(&[ActivityEntry {
            event: "Lead created".to_string(),
            timestamp: now,
            source: Some("web_search".to_string()),
        }]));

        let response = self
            .request(reqwest::Method::POST, &self.table_url())
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let rows = Self::rows(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::MissingRow {
                entity: "lead".to_string(),
                key: prospect.email.clone(),
            })?
            .into_lead()
    }

    async fn update_prospect(&self, id: &str, prospect: &Prospect) -> Result<Lead, StoreError> {
        let row = prospect_row(prospect, Utc::now());
        let response = self
            .request(reqwest::Method::PATCH, &self.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let rows = Self::rows(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::MissingRow {
                entity: "lead".to_string(),
                key: id.to_string(),
            })?
            .into_lead()
    }

    async fn update(&self, id: &str, update: &LeadUpdate) -> Result<(), StoreError> {
        let response = self
            .request(reqwest::Method::PATCH, &self.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .json(&update_row(update, Utc::now()))
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        Self::check(response).await?;
        tracing::debug!(lead_id = %id, "Updated lead");
        Ok(())
    }
}

// ── Wire mapping ────────────────────────────────────────────────────

/// A lead row as the REST API returns it. List columns arrive as JSON
/// values that may themselves be encoded strings.
#[derive(Debug, Deserialize)]
struct LeadRow {
    #[serde(default)]
    id: Option<String>,
    email: String,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    contact_name: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    employee_count: Option<u32>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    score: Option<u8>,
    #[serde(default)]
    insight: Option<String>,
    #[serde(default)]
    score_reasons: Option<serde_json::Value>,
    stage: Stage,
    #[serde(default)]
    email_history: Option<serde_json::Value>,
    #[serde(default)]
    activity: Option<serde_json::Value>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_contacted: Option<DateTime<Utc>>,
}

impl LeadRow {
    fn into_lead(self) -> Result<Lead, StoreError> {
        let id = self.id.ok_or_else(|| {
            StoreError::Serialization(format!("row for {} has no id", self.email))
        })?;
        let email_history: Vec<EmailHistoryEntry> = parse_event_list(self.email_history.as_ref());
        let activity: Vec<ActivityEntry> = parse_event_list(self.activity.as_ref());
        let score_reasons: Vec<String> = parse_event_list(self.score_reasons.as_ref());
        let now = Utc::now();

        Ok(Lead {
            id,
            email: self.email,
            company_name: self.company_name.unwrap_or_default(),
            contact_name: self.contact_name.unwrap_or_default(),
            phone: self.phone,
            website: self.website,
            industry: self.industry.unwrap_or_default(),
            city: self.city.unwrap_or_default(),
            state: self.state.unwrap_or_default(),
            employee_count: self.employee_count,
            title: self.title.unwrap_or_default(),
            score: self.score.unwrap_or_default(),
            insight: self.insight.unwrap_or_default(),
            score_reasons,
            stage: self.stage,
            email_history,
            activity,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
            last_contacted: self.last_contacted,
        })
    }
}

/// Profile + scoring columns written on both insert and re-source update.
fn prospect_row(prospect: &Prospect, now: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "company_name": prospect.company_name,
        "contact_name": prospect.contact_name,
        "email": prospect.email,
        "phone": prospect.phone.clone().unwrap_or_default(),
        "website": prospect.website.clone().unwrap_or_default(),
        "industry": prospect.industry,
        "city": prospect.city,
        "state": prospect.state,
        "employee_count": prospect.employee_count.unwrap_or(0),
        "title": prospect.title,
        "score": prospect.score,
        "insight": prospect.insight,
        "score_reasons": encode_event_list(&prospect.score_reasons),
        "source": "web_search",
        "updated_at": now,
    })
}

fn update_row(update: &LeadUpdate, now: DateTime<Utc>) -> serde_json::Value {
    let mut row = serde_json::Map::new();
    if let Some(stage) = update.stage {
        row.insert("stage".to_string(), serde_json::json!(stage));
    }
    if let Some(ref history) = update.email_history {
        row.insert(
            "email_history".to_string(),
            serde_json::json!(encode_event_list(history)),
        );
    }
    if let Some(ref activity) = update.activity {
        row.insert(
            "activity".to_string(),
            serde_json::json!(encode_event_list(activity)),
        );
    }
    if let Some(last_contacted) = update.last_contacted {
        row.insert("last_contacted".to_string(), serde_json::json!(last_contacted));
    }
    row.insert("updated_at".to_string(), serde_json::json!(now));
    serde_json::Value::Object(row)
}
