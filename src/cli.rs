//! CLI — command-line argument parsing.
//!
//! One subcommand per entry point. Each run is a single batch invocation;
//! recurring execution belongs to an external scheduler.

use clap::{Parser, Subcommand};

/// Lead sourcing, scoring, and outreach automation.
#[derive(Parser)]
#[command(name = "leadflow")]
#[command(about = "Lead sourcing, scoring, and outreach automation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Actually call the email provider; the default is a dry run
    #[arg(long, global = true)]
    pub live: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Source, enrich, score, and sync a batch of leads
    Hunt {
        /// Target city, e.g. "Tampa FL" (default: rotation)
        #[arg(long)]
        city: Option<String>,

        /// Target niche, e.g. "restaurant" (default: rotation)
        #[arg(long)]
        niche: Option<String>,

        /// Leads to source this run
        #[arg(long)]
        count: Option<usize>,
    },

    /// Send due sequence emails to leads in active stages
    Sequence,

    /// Check the inbox for replies and qualify matched leads
    Inbox,
}
