//! Hunt pipeline — source, enrich, score, sync, preview.
//!
//! One hunt run pulls a batch of candidates from the search provider,
//! enriches them into validated prospects, scores them against the ICP,
//! upserts them into the lead store (update, never duplicate, keyed by
//! email), and renders an opener preview for each synced lead.

use std::sync::Arc;

use crate::config::{EngineConfig, SenderIdentity};
use crate::error::{Result, StoreError};
use crate::model::{Lead, Prospect};
use crate::scoring::Scorer;
use crate::source::LeadSourcer;
use crate::store::LeadStore;
use crate::templates;

/// Scores at or above this are called out in the run summary.
const HIGH_SCORE: u8 = 7;

#[derive(Debug, Clone, Default)]
pub struct HuntOptions {
    pub city: Option<String>,
    pub niche: Option<String>,
    pub count: Option<usize>,
    pub dry_run: bool,
}

/// Outcome of one hunt run.
#[derive(Debug, Clone)]
pub struct HuntReport {
    pub found: usize,
    pub with_email: usize,
    pub high_score: usize,
    pub created: usize,
    pub updated: usize,
    pub ready: usize,
    /// Top synced leads by score: (score, company, email).
    pub top: Vec<(u8, String, String)>,
    pub dry_run: bool,
}

impl HuntReport {
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("==================================================\n");
        out.push_str("  HUNT RUN COMPLETE\n");
        out.push_str("==================================================\n");
        out.push_str(&format!("  Candidates found:   {}\n", self.found));
        out.push_str(&format!("  With email:         {}\n", self.with_email));
        out.push_str(&format!("  Scored {HIGH_SCORE}+:          {}\n", self.high_score));
        out.push_str(&format!("  Ready for outreach: {}\n", self.ready));
        out.push_str(&format!(
            "  Synced (new/upd):   {}/{}\n",
            self.created, self.updated
        ));
        out.push_str(&format!(
            "  Mode:               {}\n",
            if self.dry_run { "DRY RUN" } else { "LIVE" }
        ));
        if !self.top.is_empty() {
            out.push_str("\n  Top leads:\n");
            for (i, (score, company, email)) in self.top.iter().enumerate() {
                out.push_str(&format!("  {}. [{score}/10] {company} - {email}\n", i + 1));
            }
        }
        out
    }
}

pub struct Hunter {
    sourcer: LeadSourcer,
    scorer: Scorer,
    store: Arc<dyn LeadStore>,
    identity: SenderIdentity,
    config: EngineConfig,
}

impl Hunter {
    pub fn new(
        sourcer: LeadSourcer,
        scorer: Scorer,
        store: Arc<dyn LeadStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            sourcer,
            scorer,
            store,
            identity: config.sender.clone(),
            config,
        }
    }

    pub async fn run(&self, opts: &HuntOptions) -> Result<HuntReport> {
        let limit = opts.count.unwrap_or(self.config.sourcing.leads_per_run);
        tracing::info!(
            city = opts.city.as_deref().unwrap_or("(rotation)"),
            niche = opts.niche.as_deref().unwrap_or("(rotation)"),
            limit,
            "Hunt run starting"
        );

        // 1. Source candidates.
        let candidates = self
            .sourcer
            .source(opts.city.as_deref(), opts.niche.as_deref(), limit)
            .await;
        let found = candidates.len();
        if found == 0 {
            tracing::warn!("No candidates found");
            return Ok(HuntReport {
                found: 0,
                with_email: 0,
                high_score: 0,
                created: 0,
                updated: 0,
                ready: 0,
                top: vec![],
                dry_run: opts.dry_run,
            });
        }

        // 2. Enrich; only candidates with a contact email continue.
        let mut prospects: Vec<Prospect> = Vec::new();
        for candidate in candidates {
            if let Some(prospect) = self.sourcer.enrich(candidate).await {
                prospects.push(prospect);
            }
        }
        tracing::info!(enriched = prospects.len(), of = found, "Enrichment done");

        // 3. Score.
        let mut scored: Vec<Prospect> = Vec::new();
        for prospect in prospects {
            scored.push(self.scorer.score(prospect).await);
        }
        let with_email = scored.len();
        let high_score = scored.iter().filter(|p| p.score >= HIGH_SCORE).count();

        // 4. Sync to the store.
        let (synced, created, updated) = self.sync(&scored).await?;

        // 5. Preview the opener for each synced lead.
        let mut ready = 0usize;
        for lead in &synced {
            let rendered = templates::render(lead, 1, &self.identity);
            tracing::debug!(email = %lead.email, subject = %rendered.subject, "Drafted opener");
            ready += 1;
        }

        let mut top: Vec<(u8, String, String)> = synced
            .iter()
            .map(|l| (l.score, l.company_name.clone(), l.email.clone()))
            .collect();
        top.sort_by(|a, b| b.0.cmp(&a.0));
        top.truncate(10);

        let report = HuntReport {
            found,
            with_email,
            high_score,
            created,
            updated,
            ready,
            top,
            dry_run: opts.dry_run,
        };
        tracing::info!(
            found = report.found,
            with_email = report.with_email,
            high_score = report.high_score,
            "Hunt run done"
        );
        Ok(report)
    }

    /// Upsert each prospect by email: update the existing row or insert a
    /// new one. Item failures are logged and skipped; credential failures
    /// abort the run.
    async fn sync(&self, prospects: &[Prospect]) -> Result<(Vec<Lead>, usize, usize)> {
        let mut synced = Vec::new();
        let mut created = 0usize;
        let mut updated = 0usize;

        for prospect in prospects {
            let result = match self.store.get_by_email(&prospect.email).await {
                Ok(Some(existing)) => self
                    .store
                    .update_prospect(&existing.id, prospect)
                    .await
                    .map(|lead| (lead, false)),
                Ok(None) => self
                    .store
                    .insert_prospect(prospect)
                    .await
                    .map(|lead| (lead, true)),
                Err(e) => Err(e),
            };

            match result {
                Ok((lead, true)) => {
                    created += 1;
                    synced.push(lead);
                }
                Ok((lead, false)) => {
                    updated += 1;
                    synced.push(lead);
                }
                Err(e @ StoreError::Auth { .. }) => return Err(e.into()),
                Err(e) => {
                    tracing::error!(email = %prospect.email, error = %e, "Sync failed for lead");
                }
            }
        }

        tracing::info!(created, updated, "Sync complete");
        Ok((synced, created, updated))
    }
}
