use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::parser::summary::CATEGORY_EMOJI;

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{4})-([0-9]{2})-([0-9]{2})").unwrap());

/// Hard cap on blocks in one message.
pub const MAX_BLOCKS: usize = 50;
/// Body blocks allowed after the header, leaving one slot for the notice.
pub const BODY_BLOCK_LIMIT: usize = MAX_BLOCKS - 2;
/// Character ceiling of a single section block.
pub const MAX_BLOCK_CHARS: usize = 2900;
pub const TRUNCATION_NOTICE: &str = "_(이후 내용은 생략되었습니다: Slack 블록 수 제한 초과)_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markdown {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageBlock {
    Section { text: Markdown },
    Divider,
}

impl MessageBlock {
    pub fn section(text: &str) -> Self {
        MessageBlock::Section {
            text: Markdown {
                kind: "mrkdwn".to_string(),
                text: truncate_chars(text, MAX_BLOCK_CHARS),
            },
        }
    }

    #[cfg(test)]
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageBlock::Section { text } => Some(&text.text),
            MessageBlock::Divider => None,
        }
    }
}

/// The webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkedMessage {
    pub blocks: Vec<MessageBlock>,
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// `2025-06-04` → `2025년 6월 4일`, first occurrence only.
fn localize_date(header: &str) -> String {
    ISO_DATE_RE
        .replacen(header, 1, |caps: &regex::Captures| {
            let month: u32 = caps[2].parse().unwrap_or_default();
            let day: u32 = caps[3].parse().unwrap_or_default();
            format!("{}년 {}월 {}일", &caps[1], month, day)
        })
        .into_owned()
}

fn is_category_line(line: &str) -> bool {
    let mut chars = line.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !CATEGORY_EMOJI.contains(&first) {
        return false;
    }
    let rest = chars.as_str();
    rest.starts_with(char::is_whitespace) && rest.trim_start().starts_with('*')
}

/// Body blocks collected under the ceiling.
struct Chunker {
    blocks: Vec<MessageBlock>,
    buffer: String,
    truncated: bool,
}

impl Chunker {
    fn push(&mut self, block: MessageBlock) -> bool {
        if self.blocks.len() >= BODY_BLOCK_LIMIT {
            self.truncated = true;
            return false;
        }
        self.blocks.push(block);
        true
    }

    fn flush(&mut self) -> bool {
        let text = std::mem::take(&mut self.buffer);
        let text = text.trim();
        if text.is_empty() {
            return true;
        }
        self.push(MessageBlock::section(text))
    }
}

/// Split annotated text into message blocks: a bold header, then one section
/// per category separated by dividers. Never fails; once the body ceiling is
/// reached the rest of the input is dropped and a notice block is appended.
pub fn render(annotated: &str) -> Vec<MessageBlock> {
    let mut lines = annotated.trim().lines();
    let mut out = Vec::new();

    let Some(header) = lines.next().map(str::trim).filter(|h| !h.is_empty()) else {
        return out;
    };
    out.push(MessageBlock::section(&format!(
        "*{}*",
        truncate_chars(&localize_date(header), MAX_BLOCK_CHARS - 2)
    )));

    let mut chunker = Chunker {
        blocks: Vec::new(),
        buffer: String::new(),
        truncated: false,
    };

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            chunker.buffer.push('\n');
        } else if is_category_line(line) {
            if !chunker.flush() || !chunker.push(MessageBlock::Divider) {
                break;
            }
            chunker.buffer.push_str(line);
            chunker.buffer.push_str("\n\n");
        } else if line.starts_with("• _") {
            chunker.buffer.push('\n');
            chunker.buffer.push_str(line);
            chunker.buffer.push('\n');
        } else {
            chunker.buffer.push_str(line);
            chunker.buffer.push('\n');
        }
    }
    if !chunker.truncated {
        chunker.flush();
    }

    out.extend(chunker.blocks);
    if chunker.truncated {
        out.push(MessageBlock::section(TRUNCATION_NOTICE));
    }
    out
}
