//! Lead sourcing — find businesses matching the profile via web search.
//!
//! Sourcing searches for social-page-only businesses (a strong cold-sell
//! signal), parses candidates out of the raw results, and enriches each
//! candidate with a contact email and a real website through a second
//! search. Only candidates that come out of enrichment with an email cross
//! the boundary as a validated [`Prospect`].

use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use regex::Regex;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::{SearchConfig, SourcingConfig};
use crate::error::SearchError;
use crate::model::Prospect;

// ── Search provider ─────────────────────────────────────────────────

/// One raw web search result.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

/// Narrow interface to the web search API.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, SearchError>;
}

#[derive(Debug, Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    web: WebResults,
}

#[derive(Debug, Deserialize, Default)]
struct WebResults {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// HTTP search client. Sleeps for the configured delay before every
/// request; the provider allows roughly one request per second.
pub struct HttpSearchProvider {
    config: SearchConfig,
    http: reqwest::Client,
}

impl HttpSearchProvider {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, SearchError> {
        tokio::time::sleep(self.config.request_delay).await;

        let response = self
            .http
            .get(&self.config.base_url)
            .timeout(self.config.timeout)
            .header("X-Subscription-Token", self.config.api_key.expose_secret())
            .query(&[("q", query), ("count", &count.to_string())])
            .send()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;
        Ok(parsed.web.results)
    }
}

// ── Query rotation ──────────────────────────────────────────────────

const ROTATION_CITIES: &[&str] = &[
    "Tampa FL",
    "Orlando FL",
    "Jacksonville FL",
    "Newark NJ",
    "Trenton NJ",
    "Austin TX",
    "Dallas TX",
    "Houston TX",
    "Charlotte NC",
    "Raleigh NC",
    "Nashville TN",
    "Atlanta GA",
    "Phoenix AZ",
    "Denver CO",
    "Portland OR",
    "Columbus OH",
    "Sacramento CA",
    "Pittsburgh PA",
    "Minneapolis MN",
    "Salt Lake City UT",
];

const ROTATION_NICHES: &[&str] = &[
    "restaurant",
    "dental office",
    "law firm",
    "auto repair",
    "fitness gym",
    "real estate agency",
    "landscaping company",
    "construction company",
    "retail store",
    "barbershop",
    "salon",
    "plumber",
    "electrician",
    "cleaning service",
    "roofing company",
    "accounting firm",
];

/// A sourcing query with the city/niche it was built from, so parsed
/// candidates keep their location without re-parsing the query text.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub city: String,
    pub niche: String,
}

impl SearchQuery {
    fn new(city: &str, niche: &str) -> Self {
        Self {
            // Businesses whose only presence is a social page.
            text: format!(r#"site:facebook.com "{niche}" "{city}" -site:yelp.com"#),
            city: city.to_string(),
            niche: niche.to_string(),
        }
    }
}

// ── Candidate parsing and enrichment ────────────────────────────────

/// A parsed search result before enrichment. No contact email yet; it
/// only becomes a [`Prospect`] if enrichment finds one.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub company_name: String,
    pub phone: Option<String>,
    pub social_url: String,
    pub industry: String,
    pub city: String,
    pub state: String,
}

const SOCIAL_DOMAINS: &[&str] = &["facebook", "yelp", "instagram", "twitter", "linkedin"];

fn is_social_url(url: &str) -> bool {
    SOCIAL_DOMAINS.iter().any(|d| url.contains(d))
}

/// Sources and enriches prospects through a [`SearchProvider`].
pub struct LeadSourcer {
    provider: Arc<dyn SearchProvider>,
    config: SourcingConfig,
    phone_re: Regex,
    email_re: Regex,
}

impl LeadSourcer {
    pub fn new(provider: Arc<dyn SearchProvider>, config: SourcingConfig) -> Self {
        Self {
            provider,
            config,
            phone_re: Regex::new(r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap(),
            email_re: Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").unwrap(),
        }
    }

    /// Build the query list: one targeted query when both filters are
    /// given, otherwise a random rotation over cities and niches.
    pub fn build_queries(&self, city: Option<&str>, niche: Option<&str>) -> Vec<SearchQuery> {
        if let (Some(city), Some(niche)) = (city, niche) {
            return vec![SearchQuery::new(city, niche)];
        }

        let mut rng = rand::thread_rng();
        let cities: Vec<&str> = ROTATION_CITIES
            .choose_multiple(&mut rng, 5)
            .copied()
            .collect();
        let niches: Vec<&str> = ROTATION_NICHES
            .choose_multiple(&mut rng, 2)
            .copied()
            .collect();

        cities
            .iter()
            .flat_map(|c| niches.iter().map(|n| SearchQuery::new(c, n)))
            .collect()
    }

    /// Source candidate businesses, up to `limit`. Failed queries are
    /// logged and skipped; the run continues with what it has.
    pub async fn source(
        &self,
        city: Option<&str>,
        niche: Option<&str>,
        limit: usize,
    ) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = Vec::new();

        for query in self.build_queries(city, niche) {
            if candidates.len() >= limit {
                break;
            }

            let hits = match self
                .provider
                .search(&query.text, self.config.results_per_query)
                .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::error!(query = %query.text, error = %e, "Search query failed");
                    continue;
                }
            };

            for hit in hits {
                if let Some(candidate) = self.parse_hit(&hit, &query)
                    && !candidates.iter().any(|c| {
                        c.company_name.eq_ignore_ascii_case(&candidate.company_name)
                    })
                {
                    candidates.push(candidate);
                }
            }
        }

        candidates.truncate(limit);
        tracing::info!(count = candidates.len(), "Sourced candidates");
        candidates
    }

    /// Parse a search hit into a candidate. Non-social results and junk
    /// titles are dropped.
    pub fn parse_hit(&self, hit: &SearchHit, query: &SearchQuery) -> Option<Candidate> {
        let url = hit.url.to_lowercase();
        if !url.contains("facebook.com") && !url.contains("fb.com") {
            return None;
        }

        let name = hit
            .title
            .split(" - ")
            .next()
            .unwrap_or_default()
            .split(" | ")
            .next()
            .unwrap_or_default()
            .trim();
        if name.len() < 3 {
            return None;
        }

        let phone = self
            .phone_re
            .find(&hit.description)
            .map(|m| m.as_str().to_string());

        // "Tampa FL" style: trailing token is the state when present.
        let parts: Vec<&str> = query.city.split_whitespace().collect();
        let (city, state) = if parts.len() > 1 {
            (parts[..parts.len() - 1].join(" "), parts[parts.len() - 1].to_string())
        } else {
            (query.city.clone(), String::new())
        };

        Some(Candidate {
            company_name: name.to_string(),
            phone,
            social_url: hit.url.clone(),
            industry: query.niche.clone(),
            city,
            state,
        })
    }

    /// Enrich a candidate: search for a contact email and a non-social
    /// website. Returns a validated prospect only when an email turns up;
    /// search failures just mean no enrichment.
    pub async fn enrich(&self, candidate: Candidate) -> Option<Prospect> {
        let query = format!(
            r#""{}" "{}" email contact"#,
            candidate.company_name, candidate.city
        );

        let hits = match self.provider.search(&query, 5).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!(company = %candidate.company_name, error = %e, "Enrich failed");
                Vec::new()
            }
        };

        let mut email: Option<String> = None;
        let mut website: Option<String> = None;
        for hit in &hits {
            if email.is_none()
                && !hit.url.contains("facebook")
                && let Some(m) = self.email_re.find(&hit.description)
            {
                email = Some(m.as_str().to_string());
            }
            if !is_social_url(&hit.url) {
                website = Some(hit.url.clone());
                break;
            }
        }

        let Some(email) = email else {
            tracing::debug!(
                company = %candidate.company_name,
                social = %candidate.social_url,
                "No contact email found, dropping candidate"
            );
            return None;
        };
        Some(Prospect {
            company_name: candidate.company_name,
            contact_name: String::new(),
            email,
            phone: candidate.phone,
            website,
            industry: candidate.industry,
            city: candidate.city,
            state: candidate.state,
            employee_count: None,
            title: String::new(),
            email_verified: false,
            score: 0,
            insight: String::new(),
            score_reasons: vec![],
        })
    }
}
