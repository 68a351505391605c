use anyhow::{bail, Context, Result};

use crate::classifier::adapter::DEFAULT_CONFIDENCE_THRESHOLD;

const DEFAULT_CLASSIFIER_URL: &str =
    "https://api-inference.huggingface.co/models/facebook/bart-large-mnli";
const DEFAULT_CLASSIFIER_MODEL: &str = "facebook/bart-large-mnli";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub classifier_url: String,
    /// Without a token every classification takes the fallback path.
    pub classifier_api_token: Option<String>,
    pub classifier_model: String,
    pub confidence_threshold: f64,
    pub classify_concurrency: usize,
    /// `(name, url)` pairs, one HTTP source adapter each.
    pub source_feeds: Vec<(String, String)>,
    /// 0 disables the poll producer.
    pub poll_interval_secs: u64,
    pub handled_page_size: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store_backend: StoreBackend::Postgres,
            database_url: None,
            db_max_connections: 10,
            classifier_url: DEFAULT_CLASSIFIER_URL.to_string(),
            classifier_api_token: None,
            classifier_model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            classify_concurrency: 4,
            source_feeds: Vec::new(),
            poll_interval_secs: 15,
            handled_page_size: 50,
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        let store_backend = match optional_env("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        };
        let database_url = match store_backend {
            StoreBackend::Postgres => Some(require_env("DATABASE_URL")?),
            StoreBackend::Memory => optional_env("DATABASE_URL"),
        };

        let db_max_connections = parse_env("DB_MAX_CONNECTIONS", defaults.db_max_connections)?;
        if db_max_connections == 0 {
            bail!("DB_MAX_CONNECTIONS must be at least 1");
        }

        let confidence_threshold =
            parse_env("CONFIDENCE_THRESHOLD", defaults.confidence_threshold)?;
        if !(0.0..=1.0).contains(&confidence_threshold) {
            bail!("CONFIDENCE_THRESHOLD must be between 0 and 1");
        }
        let classify_concurrency =
            parse_env("CLASSIFY_CONCURRENCY", defaults.classify_concurrency)?;
        if classify_concurrency == 0 {
            bail!("CLASSIFY_CONCURRENCY must be at least 1");
        }

        Ok(Config {
            store_backend,
            database_url,
            db_max_connections,
            classifier_url: optional_env("CLASSIFIER_URL").unwrap_or(defaults.classifier_url),
            classifier_api_token: optional_env("CLASSIFIER_API_TOKEN"),
            classifier_model: optional_env("CLASSIFIER_MODEL").unwrap_or(defaults.classifier_model),
            confidence_threshold,
            classify_concurrency,
            source_feeds: parse_source_feeds(&optional_env("SOURCE_FEEDS").unwrap_or_default())?,
            poll_interval_secs: parse_env("POLL_INTERVAL_SECS", defaults.poll_interval_secs)?,
            handled_page_size: parse_env("HANDLED_PAGE_SIZE", defaults.handled_page_size)?,
            port: parse_env("PORT", defaults.port)?,
            rust_log: optional_env("RUST_LOG").unwrap_or(defaults.rust_log),
        })
    }
}

/// Parses `name=url,name=url`.
pub fn parse_source_feeds(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| -> Result<(String, String)> {
            let (name, url) = pair
                .split_once('=')
                .with_context(|| format!("SOURCE_FEEDS entry '{pair}' must be name=url"))?;
            let (name, url) = (name.trim(), url.trim());
            if name.is_empty() || url.is_empty() {
                bail!("SOURCE_FEEDS entry '{pair}' must be name=url");
            }
            Ok((name.to_lowercase(), url.to_string()))
        })
        .collect()
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} is invalid ('{raw}'): {e}")),
    }
}
