use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

const DEFAULT_DATE_PROPERTY: &str = "회의일자";
const DEFAULT_NOTION_BASE_URL: &str = "https://api.notion.com/v1";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_DB_PATH: &str = "data/digest.sqlite";
const DEFAULT_LOG_DIR: &str = "logs";

/// Runtime settings, read from an optional `settings.*` file and then the
/// environment (`NOTION_API_KEY`, `SLACK_WEBHOOK_URL`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub notion_api_key: Option<String>,
    pub notion_database_id: Option<String>,
    #[serde(default = "default_date_property")]
    pub notion_date_property: String,
    #[serde(default = "default_notion_base_url")]
    pub notion_base_url: String,
    pub openai_api_key: Option<String>,
    #[serde(default = "default_model")]
    pub openai_model: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    pub slack_webhook_url: Option<String>,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_date_property() -> String {
    DEFAULT_DATE_PROPERTY.to_string()
}

fn default_notion_base_url() -> String {
    DEFAULT_NOTION_BASE_URL.to_string()
}

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_log_dir() -> String {
    DEFAULT_LOG_DIR.to_string()
}

impl Settings {
    pub fn load() -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::with_name("settings").required(false))
            .add_source(config::Environment::default())
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Return a secret that the current command cannot run without.
    pub fn require<'a>(value: &'a Option<String>, env_name: &str) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("{} environment variable must be set", env_name))
    }
}
