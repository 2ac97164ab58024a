//! Lead scoring — score prospects 1-10 and generate an outreach insight.
//!
//! Scoring is additive: a fixed base plus independent weighted adjustments,
//! each contributing one human-readable reason. The only side effect is a
//! probe against the lead's own website; probe failures are folded into the
//! "no usable site" outcome and never abort scoring. An absent or dead site
//! lowers the numeric score but is the strongest *sales* signal we have, and
//! the narrative frames it that way.

use std::time::{Duration, Instant};

use crate::config::{IcpConfig, ScoringConfig};
use crate::model::Prospect;

// ── Website probe ───────────────────────────────────────────────────

/// Outcome of probing a lead's website.
///
/// `ProbeFailed` (timeout, DNS, TLS, anything) is deliberately distinct from
/// `Unreachable` (non-200 answer) even though both score identically: the
/// caller can tell "the site said no" from "we never heard back".
#[derive(Debug, Clone, PartialEq)]
pub enum SiteProbe {
    Reachable {
        load_time: Duration,
        mobile_optimized: bool,
    },
    Unreachable,
    ProbeFailed,
}

// ── Scorer ──────────────────────────────────────────────────────────

/// Scores prospects against the ideal-customer profile.
pub struct Scorer {
    icp: IcpConfig,
    config: ScoringConfig,
    http: reqwest::Client,
}

impl Scorer {
    pub fn new(icp: IcpConfig, config: ScoringConfig) -> Self {
        Self {
            icp,
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Probe a website for existence and basic quality signals.
    pub async fn probe_site(&self, url: &str) -> SiteProbe {
        let url = if url.starts_with("http") {
            url.to_string()
        } else {
            format!("https://{url}")
        };

        let started = Instant::now();
        let response = self
            .http
            .get(&url)
            .timeout(self.config.probe_timeout)
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
            .send()
            .await;

        match response {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                let load_time = started.elapsed();
                let html = resp.text().await.unwrap_or_default();
                // Viewport meta in the first chunk is our mobile heuristic.
                let head: String = html.chars().take(10_000).collect();
                let mobile_optimized = head.to_lowercase().contains("viewport");
                SiteProbe::Reachable {
                    load_time,
                    mobile_optimized,
                }
            }
            Ok(_) => SiteProbe::Unreachable,
            Err(_) => SiteProbe::ProbeFailed,
        }
    }

    /// Score a prospect, probing its website if one is listed.
    pub async fn score(&self, prospect: Prospect) -> Prospect {
        let probe = match prospect.website.as_deref() {
            Some(url) if !url.is_empty() => Some(self.probe_site(url).await),
            _ => None,
        };
        self.score_with_probe(prospect, probe)
    }

    /// Pure scoring path: all inputs explicit, no network. `probe` is `None`
    /// when the prospect lists no website at all.
    pub fn score_with_probe(&self, mut prospect: Prospect, probe: Option<SiteProbe>) -> Prospect {
        let mut score = self.config.base;
        let mut reasons = Vec::new();

        let insight_branch = match &probe {
            None => {
                score += self.config.no_website;
                reasons.push("No website detected, strong need for an online presence".to_string());
                InsightBranch::Presence
            }
            Some(SiteProbe::Unreachable) => {
                score += self.config.no_website;
                reasons.push("Website unreachable, likely needs a rebuild".to_string());
                InsightBranch::Presence
            }
            Some(SiteProbe::ProbeFailed) => {
                score += self.config.no_website;
                reasons.push("Website check failed, treating as unreachable".to_string());
                InsightBranch::Presence
            }
            Some(SiteProbe::Reachable {
                load_time,
                mobile_optimized,
            }) => {
                if !mobile_optimized {
                    score += self.config.degraded_site;
                    reasons.push("Website not mobile-optimized".to_string());
                    InsightBranch::Modernize
                } else if *load_time > self.config.slow_site_threshold {
                    score += self.config.degraded_site;
                    reasons.push(format!("Slow website ({:.1}s load)", load_time.as_secs_f64()));
                    InsightBranch::Modernize
                } else {
                    reasons.push("Website appears functional".to_string());
                    InsightBranch::Automate
                }
            }
        };

        if let Some(count) = prospect.employee_count
            && count >= self.icp.sweet_spot_min
            && count <= self.icp.sweet_spot_max
        {
            score += self.config.employee_sweet_spot;
            reasons.push(format!("Sweet spot size ({count} employees)"));
        }

        // Owner tier wins over director tier; the two never stack.
        let title = prospect.title.to_lowercase();
        if self.icp.owner_titles.iter().any(|t| title.contains(t)) {
            score += self.config.title_owner;
            reasons.push("Decision maker (owner/C-level)".to_string());
        } else if self.icp.director_titles.iter().any(|t| title.contains(t)) {
            score += self.config.title_director;
            reasons.push("Decision maker (director)".to_string());
        }

        if prospect.email_verified {
            score += self.config.email_verified;
            reasons.push("Email verified".to_string());
        }

        let industry = prospect.industry.to_lowercase();
        if self
            .icp
            .target_industries
            .iter()
            .any(|t| industry.contains(t))
        {
            score += self.config.industry_fit;
            reasons.push(format!("Target industry ({})", prospect.industry));
        }

        prospect.score = score.clamp(1, 10) as u8;
        prospect.insight = build_insight(&prospect.company_name, insight_branch);
        prospect.score_reasons = reasons;

        tracing::info!(
            company = %prospect.company_name,
            score = prospect.score,
            reasons = %prospect.score_reasons.join(", "),
            "Scored prospect"
        );
        prospect
    }
}

/// Which narrative the insight takes, decided by website quality.
#[derive(Debug, Clone, Copy)]
enum InsightBranch {
    /// No usable site at all.
    Presence,
    /// Reachable but slow or not mobile-friendly.
    Modernize,
    /// Healthy site; pitch automation instead.
    Automate,
}

/// Insight narrative. Template 1 opens with the first sentence, so each
/// first sentence must stand on its own.
fn build_insight(company: &str, branch: InsightBranch) -> String {
    match branch {
        InsightBranch::Presence => format!(
            "{company} currently has little to no online presence, which makes them a strong \
             candidate for a full digital build-out. A modern site with automated follow-up \
             could meaningfully lift their customer acquisition."
        ),
        InsightBranch::Modernize => format!(
            "{company}'s current website has room to improve on speed and mobile experience. \
             Modernizing the site and automating customer workflows would be a quick win."
        ),
        InsightBranch::Automate => format!(
            "{company} already has a working web presence but is likely leaving time on the \
             table without automation. Smart follow-up tooling would help them scale \
             operations and customer engagement."
        ),
    }
}
