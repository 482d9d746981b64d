//! CLI for running JSearch ingestions against Postgres.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use job_ingest::agents::jsearch::JSEARCH_SOURCE;
use job_ingest::{
    IngestionOrchestrator, JSearchAgent, JobStore, PostgresStore, RetryPolicy, SearchParams,
    Settings, SourceRateLimiter,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "job-ingest")]
#[command(about = "Rate-limited, deduplicating job posting ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one search against JSearch and store new postings
    Search {
        #[arg(long)]
        query: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        remote_only: bool,
        /// e.g. fulltime, parttime, contractor, intern
        #[arg(long)]
        employment_type: Option<String>,
        #[arg(long, default_value_t = 7)]
        posted_within_days: u32,
        #[arg(long, default_value_t = 50)]
        max_results: usize,
    },

    /// List the most recently posted jobs
    Jobs {
        #[arg(long)]
        source: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,job_ingest=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("Failed to load configuration")?;

    let store = PostgresStore::new(&settings.database_url, settings.database_max_connections)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Search {
            query,
            location,
            remote_only,
            employment_type,
            posted_within_days,
            max_results,
        } => {
            let params = SearchParams {
                query,
                location,
                source: JSEARCH_SOURCE.to_string(),
                remote_only,
                employment_type,
                experience_level: None,
                posted_within_days,
                max_results,
            };
            cmd_search(&settings, store, &params).await
        }
        Commands::Jobs { source, limit } => cmd_jobs(&store, source.as_deref(), limit).await,
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_search(
    settings: &Settings,
    store: PostgresStore,
    params: &SearchParams,
) -> Result<()> {
    let api_key = settings
        .rapidapi_key
        .as_deref()
        .context("RAPIDAPI_KEY must be set to search JSearch")?;

    let limiter = Arc::new(
        SourceRateLimiter::from_config(&settings.ingest).context("Invalid rate limit config")?,
    );
    let agent = JSearchAgent::new(api_key, Arc::clone(&limiter), settings.request_timeout)
        .context("Failed to create JSearch agent")?
        .with_retry(RetryPolicy::new(settings.max_retries, settings.retry_delay));

    let orchestrator = IngestionOrchestrator::new(Arc::new(store), settings.ingest.dedup);
    let summary = orchestrator
        .run(params, &agent)
        .await
        .context("Failed to record search")?;

    let record = &summary.record;
    println!("Search {} {}", record.id, record.status);
    println!("  results:    {}", record.results_count);
    println!("  new:        {}", record.new_count);
    println!("  duplicates: {}", record.duplicate_count);
    println!("  failed:     {}", record.failed_count);
    if let Some(message) = &record.error_message {
        println!("  error:      {}", message);
    }
    for item in summary.failures() {
        if let Err(e) = &item.result {
            println!("  ! {}: {}", item.url, e);
        }
    }

    if let Some(stats) = limiter.stats().get(JSEARCH_SOURCE) {
        println!(
            "Rate limit: {:.1}/{} tokens, {} requests in the last minute ({} rpm)",
            stats.available_tokens,
            stats.capacity,
            stats.requests_last_minute,
            stats.requests_per_minute
        );
    }

    Ok(())
}

async fn cmd_jobs(store: &PostgresStore, source: Option<&str>, limit: usize) -> Result<()> {
    let jobs = store
        .recent_jobs(source, limit)
        .await
        .context("Failed to load jobs")?;

    if jobs.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    for job in jobs {
        let posted = job
            .posted_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        let location = job.location.as_deref().unwrap_or("-");
        println!(
            "{}  {} @ {} ({})  {}",
            posted, job.title, job.company, location, job.apply_url
        );
    }

    Ok(())
}
