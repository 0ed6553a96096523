use crate::parser::summary::SummaryRecord;

/// Render a record as chat-flavoured markup: one header line, then per
/// category a `*bold*` label and its items as `• *_title_*` lines followed by
/// quoted bullets.
pub fn annotate(record: &SummaryRecord) -> String {
    let mut lines: Vec<String> = vec![
        format!("☕️ {} {} 요약", record.date, record.source),
        String::new(),
    ];

    for section in &record.sections {
        lines.push(format!("{} *{}*", section.emoji, section.category));
        lines.push(String::new());

        for item in &section.items {
            let title = item.title.trim();
            match item.link.as_deref().map(clean_link).filter(|l| !l.is_empty()) {
                Some(link) => lines.push(format!("• *_{}_* | <{}|[링크]>", title, link)),
                None => lines.push(format!("• *_{}_*", title)),
            }
            for bullet in &item.bullets {
                let bullet = bullet.trim();
                if !bullet.is_empty() && !bullet.starts_with("```") {
                    lines.push(format!("> › {}", bullet));
                }
            }
            lines.push(String::new());
        }
        lines.push(String::new());
    }

    lines.join("\n").trim().to_string()
}

/// Drop the angle brackets the summarizer wraps links in.
fn clean_link(link: &str) -> String {
    let link = link.trim();
    link.strip_prefix('<').unwrap_or(link).replace('>', "").trim().to_string()
}
