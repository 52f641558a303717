///
/// This module implements the CLI interface for weekly-digest: command parsing, argument
/// validation and the async entrypoint shared by `main` and the integration tests.
///
/// All merge logic (normalization, week buckets, the create/append/duplicate protocol)
/// lives in the [`weekly-digest-core`] crate. This module is CLI glue only.
///
/// ## Commands
/// - `serve`: run the webhook server against the configured Ghost site
/// - `submit`: merge one URL into this week's post, print the outcome
/// - `normalize` / `week`: offline helpers printing what the engine would compute
///
/// [`weekly-digest-core`]: ../../weekly-digest-core/
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use weekly_digest_core::merge::{SubmitRequest, WeeklyMergeEngine};
use weekly_digest_core::normalize::normalize;
use weekly_digest_core::week::{parse_time_zone, week_bucket, DEFAULT_TIME_ZONE};

use crate::ghost::GhostClient;
use crate::load_config::load_config;
use crate::server::serve;

/// CLI for weekly-digest: collect posts into one Ghost post per week.
#[derive(Parser)]
#[clap(
    name = "weekly-digest",
    version,
    about = "File X/Twitter post URLs into a weekly Ghost post, once per post"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the webhook that files submitted posts into the weekly post
    Serve {
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Merge a single post URL into the current week's post
    Submit {
        /// Post URL to add
        url: String,
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// IANA time zone overriding the configured one
        #[clap(long)]
        time_zone: Option<String>,
    },
    /// Print the canonical identity of a post URL
    Normalize {
        url: String,
    },
    /// Print the week bucket for an instant
    Week {
        /// IANA time zone to place the instant in
        #[clap(long, env = "WEEK_TIMEZONE", default_value = DEFAULT_TIME_ZONE.name())]
        time_zone: String,
        /// RFC 3339 instant; defaults to now
        #[clap(long)]
        at: Option<String>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Serve { config } => {
            let config = load_config(config.as_deref())?;
            tracing::info!(command = "serve", "Starting webhook server");
            serve(config).await
        }
        Commands::Submit {
            url,
            config,
            time_zone,
        } => {
            let config = load_config(config.as_deref())?;
            tracing::info!(command = "submit", url = %url, "Submitting post");
            let store = GhostClient::new(
                config.ghost_admin_api_url.clone(),
                config.ghost_admin_api_key.clone(),
            );
            let engine = WeeklyMergeEngine::new(store, config.engine.clone());
            let request = SubmitRequest {
                raw_url: url,
                time_zone_override: time_zone,
            };
            match engine.submit_request(&request, Utc::now()).await {
                Ok(outcome) => {
                    tracing::info!(command = "submit", ?outcome, "Submit complete");
                    print_json(&outcome)
                }
                Err(e) => {
                    tracing::error!(command = "submit", error = %e, "Submit failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Normalize { url } => {
            let identity = normalize(&url)?;
            print_json(&identity)
        }
        Commands::Week { time_zone, at } => {
            let tz = parse_time_zone(&time_zone)?;
            let now = match at {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .with_context(|| format!("--at must be an RFC 3339 timestamp, got {raw:?}"))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };
            print_json(&week_bucket(now, tz))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
