#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    pub date: Option<String>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub links: Vec<String>,
    pub body: Vec<String>,
}

impl Article {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.links.is_empty() && self.body.is_empty()
    }
}

/// Accumulates one article at a time. Date and author are context that
/// carries over into every article opened after them.
#[derive(Default)]
struct Segmenter {
    date: Option<String>,
    author: Option<String>,
    current: Article,
    articles: Vec<Article>,
}

impl Segmenter {
    fn flush(&mut self) {
        let next = Article {
            date: self.date.clone(),
            author: self.author.clone(),
            ..Article::default()
        };
        let done = std::mem::replace(&mut self.current, next);
        if !done.is_empty() {
            self.articles.push(done);
        }
    }

    fn feed(&mut self, line: &str) {
        if let Some(date) = line.strip_prefix("# ") {
            self.date = Some(date.trim().to_string());
            self.flush();
        } else if line.starts_with('@') {
            self.author = Some(line.to_string());
            self.flush();
        } else if line.starts_with("##") {
            self.flush();
            self.current.title = Some(line.trim_start_matches('#').trim().to_string());
        } else if line.starts_with("http") {
            self.current.links.push(line.to_string());
        } else {
            self.current.body.push(line.to_string());
        }
    }
}

/// Re-group flattened lines into articles using the line-prefix conventions
/// (`# ` date, `@` author, `##` title, `http` link, anything else body).
pub fn segment<S: AsRef<str>>(lines: &[S]) -> Vec<Article> {
    let mut seg = Segmenter::default();
    for line in lines {
        let line = line.as_ref().trim();
        if !line.is_empty() {
            seg.feed(line);
        }
    }
    seg.flush();
    seg.articles
}

/// Render articles as the labelled plain text handed to the summarizer.
pub fn render_articles(articles: &[Article]) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut last_date: Option<&str> = None;
    let mut last_author: Option<&str> = None;

    for article in articles {
        if let Some(date) = article.date.as_deref() {
            if last_date != Some(date) {
                out.push(format!("\n[날짜] {}", date));
                last_date = Some(date);
                last_author = None;
            }
        }
        if let Some(author) = article.author.as_deref() {
            if last_author != Some(author) {
                out.push(format!("\n[작성자] {}", author));
                last_author = Some(author);
            }
        }

        out.push(format!(
            "[제목] {}",
            article.title.as_deref().unwrap_or("(제목 없음)")
        ));
        for link in &article.links {
            out.push(format!("[링크] {}", link));
        }
        if !article.body.is_empty() {
            out.push("[내용]".to_string());
            out.extend(article.body.iter().cloned());
        }
        out.push(String::new());
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_links_and_body() {
        let lines = [
            "# 2025-06-04",
            "## OpenAI Codex",
            "https://openai.com/index/introducing-codex/",
            "- cloud coding agent",
            "-> runs in sandbox",
            "### Gemini update",
            "body text",
        ];
        let articles = segment(&lines);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].date.as_deref(), Some("2025-06-04"));
        assert_eq!(articles[0].title.as_deref(), Some("OpenAI Codex"));
        assert_eq!(articles[0].links, vec!["https://openai.com/index/introducing-codex/"]);
        assert_eq!(articles[0].body, vec!["- cloud coding agent", "-> runs in sandbox"]);
        assert_eq!(articles[1].title.as_deref(), Some("Gemini update"));
        assert_eq!(articles[1].body, vec!["body text"]);
    }

    #[test]
    fn author_tags_following_articles() {
        let lines = ["@kim", "## First", "text", "## Second", "more", "@lee", "## Third"];
        let articles = segment(&lines);
        let authors: Vec<_> = articles.iter().map(|a| a.author.as_deref()).collect();
        assert_eq!(authors, vec![Some("@kim"), Some("@kim"), Some("@lee")]);
    }

    #[test]
    fn empty_shells_discarded() {
        let lines = ["# 2025-06-04", "@kim", "", "   ", "# 2025-06-05"];
        assert!(segment(&lines).is_empty());
    }

    #[test]
    fn untitled_body_before_first_heading() {
        let lines = ["stray note", "## Titled"];
        let articles = segment(&lines);
        assert_eq!(articles.len(), 2);
        assert!(articles[0].title.is_none());
        assert_eq!(articles[0].body, vec!["stray note"]);
    }

    #[test]
    fn rendering_labels_each_part() {
        let lines = ["# 2025-06-04", "@kim", "## Codex", "https://a.example", "point"];
        let text = render_articles(&segment(&lines));
        let expected = "\n[날짜] 2025-06-04\n\n[작성자] @kim\n[제목] Codex\n[링크] https://a.example\n[내용]\npoint\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn rendering_marks_missing_title() {
        let text = render_articles(&segment(&["only body"]));
        assert!(text.starts_with("[제목] (제목 없음)\n[내용]\nonly body"));
    }

    #[test]
    fn author_repeated_under_new_date() {
        let lines = ["# 2025-06-04", "@kim", "## A", "x", "# 2025-06-05", "## B", "y"];
        let text = render_articles(&segment(&lines));
        assert_eq!(text.matches("[작성자] @kim").count(), 2);
        assert!(text.find("[날짜] 2025-06-05").unwrap() < text.rfind("[작성자] @kim").unwrap());
    }

    #[test]
    fn same_author_same_date_labelled_once() {
        let lines = ["# 2025-06-04", "@kim", "## A", "x", "## B", "y"];
        let text = render_articles(&segment(&lines));
        assert_eq!(text.matches("[작성자] @kim").count(), 1);
    }
}
