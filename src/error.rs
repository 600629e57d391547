use std::fmt;

use thiserror::Error;
pub use yieldbook_derive::From;

use crate::compound::CompoundError;
use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::observations::ExtractError;
use crate::yahoo_finance::YahooError;

/// Anything that can stop a single series
///
/// The From derive generates the conversions, e.g.
/// ```ignore
///  impl From<FetchError> for SeriesError {
///      fn from (e: FetchError) -> Self {
///          SeriesError::Fetch(e)
///      }
///  }
/// ```
#[derive(Error, Debug, From)]
pub enum SeriesError {
    #[error(transparent)]
    Fetch(FetchError),
    #[error(transparent)]
    Yahoo(YahooError),
    #[error(transparent)]
    Extract(ExtractError),
    #[error(transparent)]
    Compound(CompoundError),
    #[error(transparent)]
    Io(std::io::Error),
    #[error(transparent)]
    Config(ConfigError),
}

impl SeriesError {
    /// Retrieval problems only cost the series they happened in
    pub fn is_retrieval(&self) -> bool {
        matches!(self, SeriesError::Fetch(_) | SeriesError::Yahoo(_))
    }
}

/// Where in a pipeline run an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Extract,
    Compound,
    Emit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Compound => "compound",
            Stage::Emit => "emit",
        })
    }
}

/// A series error with the series and stage it happened in
#[derive(Error, Debug)]
#[error("{series}: {stage} failed")]
pub struct PipelineError {
    pub series: String,
    pub stage: Stage,
    #[source]
    pub source: SeriesError,
}

/// Attaches series and stage to any error convertible into [`SeriesError`]
pub trait StageContext<T> {
    fn stage(self, series: &str, stage: Stage) -> Result<T, PipelineError>;
}

impl<T, E: Into<SeriesError>> StageContext<T> for Result<T, E> {
    fn stage(self, series: &str, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError {
            series: series.to_string(),
            stage,
            source: e.into(),
        })
    }
}
