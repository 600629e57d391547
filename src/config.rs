//! Run configuration
//!
//! Everything the pipelines need to know about their sources and outputs, including the
//! index series to track. [`Config::default`] reproduces the stock setup; a TOML file only
//! has to name the values it changes:
//!
//! ```toml
//! [user]
//! username = "BorisAka"
//! start_year = 2020
//!
//! [[indices.series]]
//! key = "SPX500"
//! symbol = "^GSPC"
//! color = "#38bdf8"
//! ```
//!
//! Listing any `[[indices.series]]` replaces the whole default list.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use time::macros::format_description;
use time::Date;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config file {path:?} failed")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file is not valid TOML")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub fetch: FetchConfig,
    pub user: UserConfig,
    pub indices: IndicesConfig,
}

/// How pages and quotes are requested
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// extra attempts after a timeout
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub user_agent: String,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_retries: 2,
            retry_delay_ms: 1500,
            user_agent: "curl/7.68.0".to_string(),
        }
    }
}

/// The monthly-returns page of a single trader
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserConfig {
    pub username: String,
    /// `{username}` is substituted
    pub page_url: String,
    /// optional pass-through proxy, the page URL replaces any `url` in its query
    pub proxy_url: Option<String>,
    pub fragment_key: String,
    /// years before this are left out of the output
    pub start_year: Option<i32>,
    pub output: PathBuf,
    pub variable: String,
}

impl UserConfig {
    pub fn page_url(&self) -> String {
        self.page_url.replace("{username}", &self.username)
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            username: "AndreaRavalli".to_string(),
            page_url: "https://bullaware.com/etoro/{username}".to_string(),
            proxy_url: None,
            fragment_key: "monthlyReturns".to_string(),
            start_year: None,
            output: PathBuf::from("user_data.js"),
            variable: "fetchedUserReturns".to_string(),
        }
    }
}

/// The stock indices compared against
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndicesConfig {
    /// first day of history, `YYYY-MM-DD`
    pub start: String,
    pub output: PathBuf,
    pub variable: String,
    pub default_color: String,
    pub series: Vec<SeriesConfig>,
}

impl IndicesConfig {
    pub fn start_date(&self) -> Result<Date, ConfigError> {
        Date::parse(&self.start, format_description!("[year]-[month]-[day]"))
            .map_err(|e| ConfigError::Invalid(format!("start date {:?}: {e}", self.start)))
    }
}

impl Default for IndicesConfig {
    fn default() -> Self {
        let series = [
            ("SPX500", "^GSPC", "#38bdf8"),
            ("NSDQ100", "^NDX", "#a855f7"),
            ("SWDA_L", "URTH", "#f472b6"),
            ("EUSTX50", "^STOXX50E", "#fbbf24"),
            ("CHINA50", "FXI", "#ef4444"),
        ]
        .into_iter()
        .map(|(key, symbol, color)| SeriesConfig {
            key: key.to_string(),
            symbol: symbol.to_string(),
            color: Some(color.to_string()),
        })
        .collect();
        Self {
            start: "2000-01-01".to_string(),
            output: PathBuf::from("indices_data.js"),
            variable: "indicesData".to_string(),
            default_color: "#cccccc".to_string(),
            series,
        }
    }
}

/// One tracked index: output key, exchange ticker and display color
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeriesConfig {
    pub key: String,
    pub symbol: String,
    pub color: Option<String>,
}

impl SeriesConfig {
    pub fn color_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.color.as_deref().unwrap_or(default)
    }
}

impl Config {
    /// Reads `path` when given, defaults otherwise, and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user.username.trim().is_empty() {
            return Err(ConfigError::Invalid("username is empty".to_string()));
        }
        if self.indices.series.is_empty() {
            return Err(ConfigError::Invalid("no index series configured".to_string()));
        }
        let mut keys = BTreeSet::new();
        for series in &self.indices.series {
            if !keys.insert(series.key.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "series key {} listed twice",
                    series.key
                )));
            }
        }
        self.indices.start_date()?;
        Ok(())
    }
}
