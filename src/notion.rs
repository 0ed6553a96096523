use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::PipelineError;
use crate::parser::blocks::{BlockKind, BlockSource, ContentBlock};

const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: u32 = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct Listing {
    #[serde(default)]
    results: Vec<Value>,
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

impl Listing {
    fn cursor(&self) -> Option<String> {
        if self.has_more {
            self.next_cursor.clone()
        } else {
            None
        }
    }
}

/// Document backend over the Notion REST API.
pub struct NotionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NotionClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(NotionClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Ids of the database pages whose `date_property` falls in `[start, end]`.
    pub async fn query_by_date_range(
        &self,
        database_id: &str,
        date_property: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>> {
        let url = format!("{}/databases/{}/query", self.base_url, database_id);
        let mut page_ids = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "filter": {
                    "and": [
                        { "property": date_property, "date": { "on_or_after": start.to_string() } },
                        { "property": date_property, "date": { "on_or_before": end.to_string() } }
                    ]
                },
                "page_size": PAGE_SIZE,
            });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }

            let request = self.http.post(&url).json(&body);
            let listing = self.send(request).await?;
            page_ids.extend(
                listing
                    .results
                    .iter()
                    .filter_map(|p| p.get("id").and_then(Value::as_str))
                    .map(str::to_string),
            );

            cursor = listing.cursor();
            if cursor.is_none() {
                break;
            }
        }

        debug!("Database {} returned {} pages", database_id, page_ids.len());
        Ok(page_ids)
    }

    /// One page of children of `block_id`, plus the cursor for the next page.
    pub async fn list_children_page(
        &self,
        block_id: &str,
        cursor: Option<&str>,
    ) -> Result<(Vec<ContentBlock>, Option<String>)> {
        let url = format!("{}/blocks/{}/children", self.base_url, block_id);
        let mut query = vec![("page_size", PAGE_SIZE.to_string())];
        if let Some(c) = cursor {
            query.push(("start_cursor", c.to_string()));
        }

        let listing = self.send(self.http.get(&url).query(&query)).await?;
        let blocks = listing.results.iter().filter_map(parse_block).collect();
        Ok((blocks, listing.cursor()))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Listing> {
        let response = request
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await
            .map_err(|e| PipelineError::capability("document backend", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::capability(
                "document backend",
                format!("HTTP {}: {}", status, body),
            )
            .into());
        }

        response
            .json::<Listing>()
            .await
            .context("Malformed document backend response")
    }
}

impl BlockSource for NotionClient {
    async fn list_children(&self, block_id: &str) -> Result<Vec<ContentBlock>> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let (page, next) = self.list_children_page(block_id, cursor.as_deref()).await?;
            blocks.extend(page);
            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        Ok(blocks)
    }
}

/// Map one API block object onto a `ContentBlock`. Text is the plain text of
/// every rich-text run joined by a space.
fn parse_block(value: &Value) -> Option<ContentBlock> {
    let id = value.get("id")?.as_str()?.to_string();
    let type_name = value.get("type")?.as_str()?;
    let text = value
        .get(type_name)
        .and_then(|body| body.get("rich_text"))
        .and_then(Value::as_array)
        .map(|runs| {
            runs.iter()
                .filter_map(|r| r.get("plain_text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    Some(ContentBlock {
        id,
        kind: BlockKind::from_type(type_name),
        text: text.trim().to_string(),
        has_children: value
            .get("has_children")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}
