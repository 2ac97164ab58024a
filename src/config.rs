//! Configuration types.
//!
//! Every component takes its slice of configuration at construction; nothing
//! reads the environment after startup. Provider sections (store, search,
//! email, inbox) carry credentials and are built per entry point; tuning
//! sections have `Default` impls mirroring the deployed values.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// ── Provider sections ───────────────────────────────────────────────

/// REST lead store (PostgREST-style row API).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: require_env("LEADFLOW_STORE_URL")?,
            api_key: SecretString::from(require_env("LEADFLOW_STORE_KEY")?),
            timeout: Duration::from_secs(15),
        })
    }
}

/// Web search provider used for sourcing and enrichment.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key: SecretString,
    /// Enforced before every request; the provider allows ~1 req/sec.
    pub request_delay: Duration,
    pub timeout: Duration,
}

impl SearchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: std::env::var("LEADFLOW_SEARCH_URL")
                .unwrap_or_else(|_| "https://api.search.brave.com/res/v1/web/search".to_string()),
            api_key: SecretString::from(require_env("LEADFLOW_SEARCH_API_KEY")?),
            request_delay: Duration::from_millis(1100),
            timeout: Duration::from_secs(15),
        })
    }
}

/// Transactional email provider (HTTP API returning a delivery id).
#[derive(Debug, Clone)]
pub struct EmailProviderConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub from_address: String,
    /// Used for a single retry when the provider rejects the primary
    /// from-domain as unverified.
    pub fallback_from: String,
    pub timeout: Duration,
}

impl EmailProviderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: std::env::var("LEADFLOW_EMAIL_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
            api_key: SecretString::from(require_env("LEADFLOW_EMAIL_API_KEY")?),
            from_address: require_env("LEADFLOW_EMAIL_FROM")?,
            fallback_from: std::env::var("LEADFLOW_EMAIL_FROM_FALLBACK")
                .unwrap_or_else(|_| "onboarding@resend.dev".to_string()),
            timeout: Duration::from_secs(15),
        })
    }
}

/// IMAP inbox the reconciler polls for replies.
#[derive(Debug, Clone)]
pub struct InboxConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub username: String,
    pub password: SecretString,
    pub read_timeout: Duration,
}

impl InboxConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            imap_host: require_env("LEADFLOW_IMAP_HOST")?,
            imap_port: env_or("LEADFLOW_IMAP_PORT", 993),
            username: require_env("LEADFLOW_IMAP_USERNAME")?,
            password: SecretString::from(require_env("LEADFLOW_IMAP_PASSWORD")?),
            read_timeout: Duration::from_secs(30),
        })
    }
}

// ── Tuning sections ─────────────────────────────────────────────────

/// Ideal-customer-profile targets the scorer matches against.
#[derive(Debug, Clone)]
pub struct IcpConfig {
    /// Substring-matched against the lead's industry, lowercased.
    pub target_industries: Vec<String>,
    /// Owner/executive title fragments. Checked before the director tier.
    pub owner_titles: Vec<String>,
    /// Director/manager title fragments.
    pub director_titles: Vec<String>,
    /// Employee-count sweet spot, inclusive.
    pub sweet_spot_min: u32,
    pub sweet_spot_max: u32,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            target_industries: [
                "restaurants",
                "retail",
                "real estate",
                "medical",
                "dental",
                "law firms",
                "fitness",
                "e-commerce",
                "agencies",
                "construction",
                "auto dealers",
            ]
            .map(String::from)
            .to_vec(),
            owner_titles: ["owner", "ceo", "founder", "president", "co-founder", "co-owner"]
                .map(String::from)
                .to_vec(),
            director_titles: [
                "director",
                "general manager",
                "director of operations",
                "vp",
                "vice president",
            ]
            .map(String::from)
            .to_vec(),
            sweet_spot_min: 5,
            sweet_spot_max: 50,
        }
    }
}

/// Additive scoring weights plus website-probe tuning.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub base: i32,
    /// Applied when the site is missing or unreachable. Negative on the
    /// score axis; the rationale frames it as an outreach opportunity.
    pub no_website: i32,
    /// Reachable but slow or not mobile-optimized.
    pub degraded_site: i32,
    pub employee_sweet_spot: i32,
    pub title_owner: i32,
    pub title_director: i32,
    pub email_verified: i32,
    pub industry_fit: i32,
    pub probe_timeout: Duration,
    /// Load times above this count as a slow site.
    pub slow_site_threshold: Duration,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base: 5,
            no_website: -3,
            degraded_site: 1,
            employee_sweet_spot: 2,
            title_owner: 2,
            title_director: 1,
            email_verified: 1,
            industry_fit: 1,
            probe_timeout: Duration::from_secs(8),
            slow_site_threshold: Duration::from_secs(3),
        }
    }
}

/// Timing and caps for the 3-step email sequence.
#[derive(Debug, Clone)]
pub struct SequenceConfig {
    /// Sequence length; email numbers above this are never proposed.
    pub max_emails: u8,
    /// Per-invocation send cap; remaining due leads wait for the next run.
    pub max_sends_per_run: usize,
    /// Pause between consecutive live sends.
    pub send_delay: Duration,
    /// Days since the most recent history entry before email 2 is due.
    pub email_2_wait_days: i64,
    /// Days since the most recent history entry before email 3 is due.
    pub email_3_wait_days: i64,
}

impl SequenceConfig {
    /// Minimum elapsed days before `email_number` may be sent.
    pub fn wait_days(&self, email_number: u8) -> i64 {
        match email_number {
            3 => self.email_3_wait_days,
            _ => self.email_2_wait_days,
        }
    }

    pub fn from_env() -> Self {
        Self {
            max_sends_per_run: env_or("LEADFLOW_MAX_SENDS_PER_RUN", 30),
            send_delay: Duration::from_secs(env_or("LEADFLOW_SEND_DELAY_SECS", 60)),
            ..Self::default()
        }
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            max_emails: 3,
            max_sends_per_run: 30,
            send_delay: Duration::from_secs(60),
            email_2_wait_days: 3,
            email_3_wait_days: 7,
        }
    }
}

/// Lead sourcing tuning.
#[derive(Debug, Clone)]
pub struct SourcingConfig {
    /// Default batch size per hunt run.
    pub leads_per_run: usize,
    /// Results requested per search query.
    pub results_per_query: usize,
}

impl SourcingConfig {
    pub fn from_env() -> Self {
        Self {
            leads_per_run: env_or("LEADFLOW_LEADS_PER_RUN", 50),
            ..Self::default()
        }
    }
}

impl Default for SourcingConfig {
    fn default() -> Self {
        Self {
            leads_per_run: 50,
            results_per_query: 10,
        }
    }
}

/// The human identity outreach is signed with.
#[derive(Debug, Clone)]
pub struct SenderIdentity {
    pub name: String,
    pub company: String,
    pub phone: String,
    pub website: String,
}

impl SenderIdentity {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            name: std::env::var("LEADFLOW_SENDER_NAME").unwrap_or(default.name),
            company: std::env::var("LEADFLOW_SENDER_COMPANY").unwrap_or(default.company),
            phone: std::env::var("LEADFLOW_SENDER_PHONE").unwrap_or(default.phone),
            website: std::env::var("LEADFLOW_SENDER_WEBSITE").unwrap_or(default.website),
        }
    }

    /// First name for the sign-off in follow-up emails.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

impl Default for SenderIdentity {
    fn default() -> Self {
        Self {
            name: "Sam Harlow".to_string(),
            company: "Northlight Digital".to_string(),
            phone: "555-010-4477".to_string(),
            website: "northlight.digital".to_string(),
        }
    }
}

// ── Engine config ───────────────────────────────────────────────────

/// Tuning shared across entry points. Provider sections are built
/// separately because not every command needs every credential.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub icp: IcpConfig,
    pub scoring: ScoringConfig,
    pub sequence: SequenceConfig,
    pub sourcing: SourcingConfig,
    pub sender: SenderIdentity,
    /// Directory the reconciler writes dated run reports into.
    pub report_dir: PathBuf,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            icp: IcpConfig::default(),
            scoring: ScoringConfig::default(),
            sequence: SequenceConfig::from_env(),
            sourcing: SourcingConfig::from_env(),
            sender: SenderIdentity::from_env(),
            report_dir: std::env::var("LEADFLOW_REPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("reports")),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            icp: IcpConfig::default(),
            scoring: ScoringConfig::default(),
            sequence: SequenceConfig::default(),
            sourcing: SourcingConfig::default(),
            sender: SenderIdentity::default(),
            report_dir: PathBuf::from("reports"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_wait_days_by_position() {
        let cfg = SequenceConfig::default();
        assert_eq!(cfg.wait_days(2), 3);
        assert_eq!(cfg.wait_days(3), 7);
    }

    #[test]
    fn sender_first_name() {
        let sender = SenderIdentity::default();
        assert_eq!(sender.first_name(), "Sam");
    }

    #[test]
    fn default_weights_match_deployed_values() {
        let scoring = ScoringConfig::default();
        assert_eq!(scoring.base, 5);
        assert_eq!(scoring.no_website, -3);
        assert_eq!(scoring.title_owner, 2);
        assert_eq!(scoring.title_director, 1);
    }
}
