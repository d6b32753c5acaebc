mod config;
mod models;
mod pipeline;
mod platform;
mod reconcile;
mod report;
mod storage;
mod utils;
mod wiki;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::secrets::{resolve_api_key, CredentialSource};
use crate::config::AppConfig;
use crate::pipeline::{Invocation, Pipeline, ACK};
use crate::platform::YoutubeClient;
use crate::storage::{DirBucket, Staging};
use crate::wiki::{parse_member_list, WikiScraper};

#[derive(Parser)]
#[command(name = "yt-stats", about = "Channel statistics sync", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file to use instead of config/default.toml + config/local.toml
    #[arg(short, long, global = true, env = "YTSTATS_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Sync a slice of the channel list: `begin-end[-local]`, e.g. `0-10` or `20--local`
    Sync { payload: String },

    /// Show subscriber changes between the last two syncs
    Diff,

    /// Look up channel ids for the member names listed in a file
    WikiIds { members: PathBuf },

    /// List configured channels with their indices
    Channels,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "yt_stats=info,warn",
        1 => "yt_stats=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Sync { payload } => {
            let invocation: Invocation = payload.parse()?;
            let _t = utils::Timer::start(format!("sync {}", payload.trim()));

            let api_key = resolve_api_key(&config, CredentialSource::for_local(invocation.local))?;
            let platform = YoutubeClient::new(&config.api, api_key)?;
            let bucket = DirBucket::open(&config.storage)?;

            let stats = Pipeline::new(config, Box::new(platform), Box::new(bucket))
                .run(&invocation)
                .await?;
            info!(
                "Synced {} channels, {} videos",
                stats.channels_processed,
                utils::fmt_number(stats.videos_fetched as i64)
            );
            println!("{}", ACK);
        }

        Command::Diff => {
            let bucket = DirBucket::open(&config.storage)?;
            let staging = Staging::new(&config.storage)?;
            staging.pull(&bucket)?;

            let diffs = report::subscriber_diffs(&staging.observation_logs()?);
            if diffs.is_empty() {
                println!("No subscriber changes.");
            }
            for diff in &diffs {
                println!("{}", diff.line());
            }
        }

        Command::WikiIds { members } => {
            let text = std::fs::read_to_string(&members)
                .with_context(|| format!("Cannot read member list {:?}", members))?;
            let names = parse_member_list(&text);
            info!("Looking up {} members", names.len());

            let scraper = WikiScraper::new(&config.wiki, &config.api.user_agent)?;
            for member in scraper.channels_of(&names).await? {
                println!("{}", member.yaml_line());
            }
        }

        Command::Channels => {
            if config.channels.is_empty() {
                println!("No channels configured.");
            } else {
                println!("{} channels:", config.channels.len());
                for (i, id) in config.channels.iter().enumerate() {
                    println!("  {:>4}  {}", i, id);
                }
            }
        }
    }

    Ok(())
}
