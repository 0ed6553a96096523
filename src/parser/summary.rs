use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

static KOREAN_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{4})년\s*([0-9]{1,2})월\s*([0-9]{1,2})일").unwrap());

pub const SOURCE_LABEL: &str = "테크 트렌드 커피챗";

/// The six category markers, in the order the summarizer is asked to use them.
pub const CATEGORY_EMOJI: [char; 6] = ['🔵', '🟣', '🟡', '🟢', '🟠', '🟤'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryItem {
    pub title: String,
    pub link: Option<String>,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySection {
    pub emoji: String,
    pub category: String,
    pub items: Vec<SummaryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub date: String,
    pub source: String,
    pub sections: Vec<SummarySection>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Category { emoji: char, label: &'a str },
    Title(&'a str),
    Link(&'a str),
    Bullet(&'a str),
    Plain(&'a str),
}

fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim();
    if line.is_empty() {
        return Line::Blank;
    }
    if let Some(emoji) = line.chars().next().filter(|c| CATEGORY_EMOJI.contains(c)) {
        let label = line[emoji.len_utf8()..].trim();
        if !label.is_empty() {
            return Line::Category { emoji, label };
        }
    }
    if line.starts_with('[') {
        Line::Title(line)
    } else if line.starts_with("<http") || line.starts_with("http") {
        Line::Link(line)
    } else if let Some(rest) = line.strip_prefix('-') {
        Line::Bullet(rest.trim())
    } else {
        Line::Plain(line)
    }
}

fn strip_title(line: &str) -> String {
    line.trim_matches(|c| c == '[' || c == ']').trim().to_string()
}

/// Locate the first `YYYY년 M월 D일` in the text and normalise it to `YYYY-MM-DD`.
pub fn extract_date(text: &str) -> Result<String, PipelineError> {
    let caps = KOREAN_DATE_RE
        .captures(text)
        .ok_or_else(|| PipelineError::Format("no date of the form YYYY년 M월 D일".to_string()))?;
    let year: i32 = caps[1].parse().map_err(|_| PipelineError::Format(caps[0].to_string()))?;
    let month: u32 = caps[2].parse().map_err(|_| PipelineError::Format(caps[0].to_string()))?;
    let day: u32 = caps[3].parse().map_err(|_| PipelineError::Format(caps[0].to_string()))?;
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| PipelineError::Format(format!("invalid calendar date: {}", &caps[0])))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Parse summarizer output into a dated record of categorized sections.
///
/// Lines before the first category marker (the heading line) are ignored.
/// Within a section every `[`-line opens a new item; the first link line of
/// an item becomes its link, later ones are dropped; every other line is a
/// bullet.
pub fn parse(raw_text: &str) -> Result<SummaryRecord, PipelineError> {
    let date = extract_date(raw_text)?;

    let mut sections: Vec<SummarySection> = Vec::new();
    let mut item: Option<SummaryItem> = None;

    for raw in raw_text.lines() {
        match classify(raw) {
            Line::Category { emoji, label } => {
                close_item(&mut sections, &mut item);
                sections.push(SummarySection {
                    emoji: emoji.to_string(),
                    category: label.to_string(),
                    items: Vec::new(),
                });
            }
            _ if sections.is_empty() => {}
            Line::Blank => {}
            Line::Title(t) => {
                close_item(&mut sections, &mut item);
                item = Some(new_item(t));
            }
            Line::Link(url) => match item.as_mut() {
                Some(open) => {
                    if open.link.is_none() {
                        open.link = Some(url.to_string());
                    }
                }
                None => item = Some(new_item(url)),
            },
            Line::Bullet(t) | Line::Plain(t) => match item.as_mut() {
                Some(open) => open.bullets.push(t.to_string()),
                None => item = Some(new_item(t)),
            },
        }
    }
    close_item(&mut sections, &mut item);

    Ok(SummaryRecord {
        date,
        source: SOURCE_LABEL.to_string(),
        sections,
        created_at: Utc::now(),
    })
}

fn new_item(title_line: &str) -> SummaryItem {
    SummaryItem {
        title: strip_title(title_line),
        link: None,
        bullets: Vec::new(),
    }
}

fn close_item(sections: &mut [SummarySection], item: &mut Option<SummaryItem>) {
    if let (Some(done), Some(section)) = (item.take(), sections.last_mut()) {
        section.items.push(done);
    }
}
