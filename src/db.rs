use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::parser::summary::{SummaryRecord, SummarySection};

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS summaries (
            date        TEXT PRIMARY KEY,
            source      TEXT NOT NULL,
            sections    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            stored_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Summaries ──

/// Store the record unless one with the same date exists. Returns `false`
/// when the date was already present and nothing was written.
pub fn insert_if_absent(conn: &Connection, record: &SummaryRecord) -> Result<bool> {
    let sections = serde_json::to_string(&record.sections)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO summaries (date, source, sections, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            record.date,
            record.source,
            sections,
            record.created_at.to_rfc3339(),
        ],
    )?;
    Ok(inserted == 1)
}

pub fn fetch_summary(conn: &Connection, date: &str) -> Result<Option<SummaryRecord>> {
    let row: Option<(String, String, String, String)> = conn
        .query_row(
            "SELECT date, source, sections, created_at FROM summaries WHERE date = ?1",
            [date],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;

    let Some((date, source, sections, created_at)) = row else {
        return Ok(None);
    };
    let sections: Vec<SummarySection> =
        serde_json::from_str(&sections).context("Stored sections are not valid JSON")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .context("Stored created_at is not RFC 3339")?
        .with_timezone(&Utc);

    Ok(Some(SummaryRecord {
        date,
        source,
        sections,
        created_at,
    }))
}

// ── Stats ──

pub struct Stats {
    pub summaries: usize,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let (summaries, first_date, last_date): (usize, Option<String>, Option<String>) = conn.query_row(
        "SELECT COUNT(*), MIN(date), MAX(date) FROM summaries",
        [],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;
    Ok(Stats {
        summaries,
        first_date,
        last_date,
    })
}

// ── Record files ──

pub fn save_record(path: &Path, record: &SummaryRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))
}

pub fn load_record(path: &Path) -> Result<SummaryRecord> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("{:?} is not a summary record", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::summary::{SummaryItem, SOURCE_LABEL};

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn record(date: &str, category: &str) -> SummaryRecord {
        SummaryRecord {
            date: date.to_string(),
            source: SOURCE_LABEL.to_string(),
            sections: vec![SummarySection {
                emoji: "🔵".to_string(),
                category: category.to_string(),
                items: vec![SummaryItem {
                    title: "Codex".to_string(),
                    link: Some("<https://openai.com>".to_string()),
                    bullets: vec!["출시됨".to_string()],
                }],
            }],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn second_insert_same_date_is_skipped() {
        let conn = memory();
        assert!(insert_if_absent(&conn, &record("2025-06-04", "AI")).unwrap());
        assert!(!insert_if_absent(&conn, &record("2025-06-04", "전혀 다른 내용")).unwrap());

        let stored = fetch_summary(&conn, "2025-06-04").unwrap().unwrap();
        assert_eq!(stored.sections[0].category, "AI");
        assert_eq!(get_stats(&conn).unwrap().summaries, 1);
    }

    #[test]
    fn fetch_round_trips_sections() {
        let conn = memory();
        let original = record("2025-06-11", "AI");
        insert_if_absent(&conn, &original).unwrap();
        let stored = fetch_summary(&conn, "2025-06-11").unwrap().unwrap();
        assert_eq!(stored.sections, original.sections);
        assert_eq!(stored.created_at.timestamp(), original.created_at.timestamp());
    }

    #[test]
    fn missing_date_is_none() {
        assert!(fetch_summary(&memory(), "1999-01-01").unwrap().is_none());
    }

    #[test]
    fn stats_cover_date_range() {
        let conn = memory();
        for d in ["2025-06-11", "2025-06-04", "2025-06-18"] {
            insert_if_absent(&conn, &record(d, "AI")).unwrap();
        }
        let s = get_stats(&conn).unwrap();
        assert_eq!(s.summaries, 3);
        assert_eq!(s.first_date.as_deref(), Some("2025-06-04"));
        assert_eq!(s.last_date.as_deref(), Some("2025-06-18"));
    }

    #[test]
    fn empty_store_stats() {
        let s = get_stats(&memory()).unwrap();
        assert_eq!(s.summaries, 0);
        assert!(s.first_date.is_none());
    }

    #[test]
    fn on_disk_store_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/digest.sqlite");
        let conn = connect(path.to_str().unwrap()).unwrap();
        init_schema(&conn).unwrap();
        assert!(insert_if_absent(&conn, &record("2025-06-04", "AI")).unwrap());
        assert!(path.exists());
    }

    #[test]
    fn record_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");
        let original = record("2025-06-04", "AI");
        save_record(&path, &original).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"createdAt\""));
        assert!(text.contains("테크 트렌드 커피챗"));

        let loaded = load_record(&path).unwrap();
        assert_eq!(loaded, original);
    }
}
