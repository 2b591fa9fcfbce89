//! Typed runtime configuration.
//!
//! Every knob comes from the environment and is validated up front; a
//! missing required variable is fatal before any row work starts.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

pub struct Config {
    pub sheet_id: String,
    pub sheet_tab: String,
    pub sheets_api_key: String,

    pub disk_token: String,
    /// Top-level storage folder the cards are published under.
    pub category: String,

    pub cutout_url: String,
    pub cutout_api_key: Option<String>,

    /// Presence selects the persistent dedup strategy.
    pub database_url: Option<String>,
    pub author_id: Uuid,
    pub author_ver: String,

    pub proxy: Option<String>,
    /// Delay after each published row, to pace the destination API.
    pub pace: Duration,
    pub render_price: bool,
    pub price_column: Option<String>,

    pub assets_dir: PathBuf,
    pub work_dir: PathBuf,
    pub fetch_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let author_id_raw = required("AUTHOR_ID")?;
        let author_id = author_id_raw.parse::<Uuid>().map_err(|_| ConfigError::Invalid {
            key: "AUTHOR_ID",
            value: author_id_raw,
        })?;

        Ok(Self {
            sheet_id: required("SHEET_ID")?,
            sheet_tab: optional("SHEET_TAB").unwrap_or_else(|| "Parts".to_string()),
            sheets_api_key: required("SHEETS_API_KEY")?,

            disk_token: required("DISK_TOKEN")?,
            category: optional("DISK_CATEGORY").unwrap_or_else(|| "Avito".to_string()),

            cutout_url: required("CUTOUT_API_URL")?,
            cutout_api_key: optional("CUTOUT_API_KEY"),

            database_url: optional("DATABASE_URL"),
            author_id,
            author_ver: required("AUTHOR_VER")?,

            proxy: optional("OUTBOUND_PROXY"),
            pace: Duration::from_millis(parsed("PACE_MS")?.unwrap_or(1000)),
            render_price: optional("RENDER_PRICE")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            price_column: optional("PRICE_COLUMN"),

            assets_dir: PathBuf::from(optional("ASSETS_DIR").unwrap_or_else(|| "assets".to_string())),
            work_dir: PathBuf::from(optional("WORK_DIR").unwrap_or_else(|| "work".to_string())),
            fetch_timeout: Duration::from_millis(parsed("FETCH_TIMEOUT_MS")?.unwrap_or(30_000)),
        })
    }

    /// Shared HTTP client: request timeout plus the optional outbound proxy
    /// (proxy credentials are configuration, never code).
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder().timeout(self.fetch_timeout);
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }
        builder.build()
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed(key: &'static str) -> Result<Option<u64>, ConfigError> {
    match optional(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::parse_bool;

    #[test]
    fn bool_flags_accept_common_spellings() {
        assert!(parse_bool("1"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("yes"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("off"));
    }
}
