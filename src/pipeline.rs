use std::time::Instant;

use anyhow::Result;
use chrono::{Datelike, Duration, Local, NaiveDate};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::Settings;
use crate::db;
use crate::llm::{build_prompts, Summarizer};
use crate::notion::NotionClient;
use crate::parser::blocks::BlockSource;
use crate::parser::{self, articles, summary};
use crate::render;
use crate::slack::Notifier;

/// Monday..Friday of the current week.
pub fn this_week() -> (NaiveDate, NaiveDate) {
    let today = Local::now().date_naive();
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    (monday, monday + Duration::days(4))
}

#[derive(Debug)]
pub enum Persisted {
    Inserted,
    Skipped,
    Failed(String),
    NotAttempted,
}

/// Per-stage outcome of one run.
#[derive(Debug)]
pub struct RunReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub pages: usize,
    pub lines: usize,
    pub articles: usize,
    pub summary_chars: usize,
    pub date: Option<String>,
    pub sections: usize,
    pub persisted: Persisted,
    pub blocks: usize,
    pub delivered: bool,
}

impl RunReport {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        RunReport {
            start,
            end,
            pages: 0,
            lines: 0,
            articles: 0,
            summary_chars: 0,
            date: None,
            sections: 0,
            persisted: Persisted::NotAttempted,
            blocks: 0,
            delivered: false,
        }
    }

    pub fn print(&self) {
        println!("Range:      {} ~ {}", self.start, self.end);
        println!(
            "Fetched:    {} pages, {} lines, {} articles",
            self.pages, self.lines, self.articles
        );
        println!("Summary:    {} chars", self.summary_chars);
        if let Some(date) = &self.date {
            println!("Record:     {} ({} sections)", date, self.sections);
        }
        let stored = match &self.persisted {
            Persisted::Inserted => "saved".to_string(),
            Persisted::Skipped => "already exists, skipped".to_string(),
            Persisted::Failed(e) => format!("failed ({})", e),
            Persisted::NotAttempted => "not attempted".to_string(),
        };
        println!("Store:      {}", stored);
        println!(
            "Delivery:   {} blocks, {}",
            self.blocks,
            if self.delivered { "sent" } else { "not sent" }
        );
    }
}

/// Fetch every page in the range, flatten it and assemble the labelled
/// article text the summarizer reads.
pub async fn gather_source_text(
    notion: &NotionClient,
    settings: &Settings,
    report: &mut RunReport,
) -> Result<String> {
    let database_id = Settings::require(&settings.notion_database_id, "NOTION_DATABASE_ID")?;
    let page_ids = notion
        .query_by_date_range(
            database_id,
            &settings.notion_date_property,
            report.start,
            report.end,
        )
        .await?;
    report.pages = page_ids.len();
    if page_ids.is_empty() {
        return Ok(String::new());
    }

    let pb = ProgressBar::new(page_ids.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages")?
            .progress_chars("=> "),
    );

    let mut all_articles = Vec::new();
    for page_id in &page_ids {
        let blocks = notion.list_children(page_id).await?;
        let (lines, page_articles) = parser::page_to_articles(notion, blocks).await?;
        info!(page_id = %page_id, lines, articles = page_articles.len(), "Page flattened");
        report.lines += lines;
        all_articles.extend(page_articles);
        pb.inc(1);
    }
    pb.finish_and_clear();

    report.articles = all_articles.len();
    Ok(articles::render_articles(&all_articles))
}

/// Run every stage for one date range. Fatal errors abort; a store failure
/// is logged and the run continues to delivery.
pub async fn run(
    settings: &Settings,
    start: NaiveDate,
    end: NaiveDate,
    dry_run: bool,
) -> Result<RunReport> {
    let mut report = RunReport::new(start, end);
    info!("Processing range {} ~ {}", start, end);

    let notion = NotionClient::new(
        Settings::require(&settings.notion_api_key, "NOTION_API_KEY")?,
        &settings.notion_base_url,
    )?;
    let summarizer = Summarizer::new(
        Settings::require(&settings.openai_api_key, "OPENAI_API_KEY")?,
        &settings.openai_model,
        &settings.openai_base_url,
    )?;
    let notifier = if dry_run {
        None
    } else {
        Some(Notifier::new(Settings::require(
            &settings.slack_webhook_url,
            "SLACK_WEBHOOK_URL",
        )?)?)
    };

    // 1. Source pages
    let t_fetch = Instant::now();
    let source_text = gather_source_text(&notion, settings, &mut report).await?;
    if report.pages == 0 {
        warn!("No pages found for {} ~ {}", start, end);
        return Ok(report);
    }
    if source_text.trim().is_empty() {
        warn!("Pages in range produced no text");
        return Ok(report);
    }
    info!("Fetched {} pages in {:.1}s", report.pages, t_fetch.elapsed().as_secs_f64());

    // 2. Summarize
    let t_llm = Instant::now();
    let summary_text = summarizer.summarize(&build_prompts(&source_text)).await?;
    report.summary_chars = summary_text.chars().count();
    info!("Summarized in {:.1}s", t_llm.elapsed().as_secs_f64());

    // 3. Parse
    let record = summary::parse(&summary_text)?;
    report.date = Some(record.date.clone());
    report.sections = record.sections.len();

    // 4. Store
    if !dry_run {
        report.persisted = persist(settings, &record);
    }

    // 5. Deliver
    let message = render::to_message(&record);
    report.blocks = message.blocks.len();
    match notifier {
        Some(notifier) => {
            notifier.send(&message).await?;
            report.delivered = true;
        }
        None => println!("{}", serde_json::to_string_pretty(&message)?),
    }

    Ok(report)
}

fn persist(settings: &Settings, record: &summary::SummaryRecord) -> Persisted {
    let result = db::connect(&settings.db_path).and_then(|conn| {
        db::init_schema(&conn)?;
        db::insert_if_absent(&conn, record)
    });
    match result {
        Ok(true) => {
            info!(date = %record.date, "Summary stored");
            Persisted::Inserted
        }
        Ok(false) => {
            info!(date = %record.date, "Summary already exists, skipped");
            Persisted::Skipped
        }
        Err(e) => {
            warn!(date = %record.date, "Store failed, continuing: {:#}", e);
            Persisted::Failed(e.to_string())
        }
    }
}
