mod config;
mod db;
mod error;
mod llm;
mod logging;
mod notion;
mod parser;
mod pipeline;
mod render;
mod slack;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::error;

use crate::config::Settings;

#[derive(Parser)]
#[command(
    name = "coffeechat_digest",
    about = "Summarize a week of coffee-chat notes and post them to chat"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, summarize, store and deliver one date range (default: this week Mon-Fri)
    Run {
        /// First day of the range (YYYY-MM-DD)
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,
        /// Last day of the range (YYYY-MM-DD)
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,
        /// Skip the store and print the message instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the text that would be handed to the summarizer
    Flatten {
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,
    },
    /// Parse a summary text file into a record JSON file
    Format {
        /// Summary text produced by the summarizer
        input: PathBuf,
        /// Where to write the record (default: formatted_summary.json)
        #[arg(short, long, default_value = "formatted_summary.json")]
        out: PathBuf,
    },
    /// Deliver a saved record JSON file
    Notify {
        input: PathBuf,
        /// Print the payload instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Show a stored summary by date (YYYY-MM-DD)
    Show { date: NaiveDate },
    /// Show store statistics
    Stats,
}

fn resolve_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> anyhow::Result<(NaiveDate, NaiveDate)> {
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => (s, e),
        _ => pipeline::this_week(),
    };
    if start > end {
        bail!("start date {} is after end date {}", start, end);
    }
    Ok((start, end))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;
    let _log_guard = logging::init(Path::new(&settings.log_dir))?;

    let t0 = Instant::now();

    let result = match cli.command {
        Commands::Run { start, end, dry_run } => {
            let (start, end) = resolve_range(start, end)?;
            let report = pipeline::run(&settings, start, end, dry_run).await;
            match report {
                Ok(report) => {
                    report.print();
                    Ok(())
                }
                Err(e) => {
                    error!("Run aborted: {:#}", e);
                    Err(e)
                }
            }
        }
        Commands::Flatten { start, end } => {
            let (start, end) = resolve_range(start, end)?;
            let notion = notion::NotionClient::new(
                Settings::require(&settings.notion_api_key, "NOTION_API_KEY")?,
                &settings.notion_base_url,
            )?;
            let mut report = pipeline::RunReport::new(start, end);
            let text = pipeline::gather_source_text(&notion, &settings, &mut report).await?;
            println!("{}", text);
            eprintln!(
                "{} pages, {} lines, {} articles",
                report.pages, report.lines, report.articles
            );
            Ok(())
        }
        Commands::Format { input, out } => {
            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {:?}", input))?;
            let record = parser::summary::parse(&raw)?;
            db::save_record(&out, &record)?;
            println!("Record for {} written to {:?}", record.date, out);
            println!("{}", render::text::annotate(&record));
            Ok(())
        }
        Commands::Notify { input, dry_run } => {
            let record = db::load_record(&input)?;
            let message = render::to_message(&record);
            if dry_run {
                println!("{}", serde_json::to_string_pretty(&message)?);
            } else {
                let webhook = Settings::require(&settings.slack_webhook_url, "SLACK_WEBHOOK_URL")?;
                slack::Notifier::new(webhook)?.send(&message).await?;
                println!("Sent {} blocks for {}", message.blocks.len(), record.date);
            }
            Ok(())
        }
        Commands::Show { date } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            match db::fetch_summary(&conn, &date.to_string())? {
                Some(record) => println!("{}", render::text::annotate(&record)),
                None => println!("No summary stored for {}.", date),
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Summaries: {}", s.summaries);
            println!("First:     {}", s.first_date.as_deref().unwrap_or("-"));
            println!("Last:      {}", s.last_date.as_deref().unwrap_or("-"));
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
