use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use leadflow::cli::{Cli, Commands};
use leadflow::config::{
    EmailProviderConfig, EngineConfig, InboxConfig, SearchConfig, StoreConfig,
};
use leadflow::email::{EmailSender, HttpEmailSender, NullEmailSender};
use leadflow::hunter::{HuntOptions, Hunter};
use leadflow::inbox::ImapInbox;
use leadflow::reconciler::ReplyReconciler;
use leadflow::scoring::Scorer;
use leadflow::sequence::SequenceRunner;
use leadflow::source::{HttpSearchProvider, LeadSourcer};
use leadflow::store::{LeadStore, RestLeadStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage (IMAP inbox).
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Log to stderr and to the engine log file.
    let log_file =
        std::env::var("LEADFLOW_LOG_FILE").unwrap_or_else(|_| "leadflow.log".to_string());
    let (file_writer, _log_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(".", log_file));
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(file_writer),
            )
            .init();
    }

    let cli = Cli::parse();
    let dry_run = !cli.live;
    let config = EngineConfig::from_env();

    let store: Arc<dyn LeadStore> = Arc::new(RestLeadStore::new(
        StoreConfig::from_env().context("lead store configuration")?,
    ));

    match cli.command {
        Commands::Hunt { city, niche, count } => {
            let search = SearchConfig::from_env().context("search provider configuration")?;
            let sourcer = LeadSourcer::new(
                Arc::new(HttpSearchProvider::new(search)),
                config.sourcing.clone(),
            );
            let scorer = Scorer::new(config.icp.clone(), config.scoring.clone());
            let hunter = Hunter::new(sourcer, scorer, store, config);

            let report = hunter
                .run(&HuntOptions {
                    city,
                    niche,
                    count,
                    dry_run,
                })
                .await?;
            println!("{}", report.summary());
        }

        Commands::Sequence => {
            let sender: Arc<dyn EmailSender> = if dry_run {
                Arc::new(NullEmailSender)
            } else {
                Arc::new(HttpEmailSender::new(
                    EmailProviderConfig::from_env().context("email provider configuration")?,
                ))
            };
            let runner = SequenceRunner::new(
                store,
                sender,
                config.sequence.clone(),
                config.sender.clone(),
            );

            let report = runner.run(dry_run).await?;
            println!("{}", report.summary());
        }

        Commands::Inbox => {
            let inbox = Arc::new(ImapInbox::new(
                InboxConfig::from_env().context("inbox configuration")?,
            ));
            let reconciler = ReplyReconciler::new(store, inbox, config.report_dir.clone());

            let report = reconciler.run().await?;
            println!("{}", report.summary());
        }
    }

    Ok(())
}
