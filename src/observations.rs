//! Period-keyed return observations
//!
//! Two ways in: [`ObservationParser::extract`] pattern-matches `"YYYY-M": value` pairs
//! anywhere in a page, and [`fragment_observations`] reads them out of an object
//! literal found by [`crate::fragment::locate`]. Neither drops duplicates, that is the
//! job of [`crate::period_table`].

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("matched numeric text {text:?} is not a finite number")]
    MalformedNumeric { text: String },
    #[error("fragment is not a JSON object")]
    FragmentJson(#[from] serde_json::Error),
    #[error("observation pattern failed to compile")]
    Pattern(#[from] regex::Error),
}

/// One `(year, sub-period, value)` triple as it appeared in the source text
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RawObservation {
    pub year: i32,
    pub sub_period: u32,
    pub value: f64,
}

// a 4 digit year and a 1 or 2 digit month, optionally wrapped in plain or escaped
// quotes, then a colon and a signed decimal
const OBSERVATION_PATTERN: &str =
    r#"(?:\\?["']|\b)(\d{4})-(\d{1,2})(?:\\?["'])?:\s*([+-]?\d+\.?\d*)"#;

/// Scans raw text for `YYYY-M: value` pairs
pub struct ObservationParser {
    pattern: Regex,
}

impl ObservationParser {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            pattern: Regex::new(OBSERVATION_PATTERN)?,
        })
    }

    /// Returns every match in order of appearance, duplicates included.
    ///
    /// No match is an empty vector. A matched value that will not parse means the
    /// pattern and [`parse_number`] disagree, and fails the whole extraction.
    pub fn extract(&self, text: &str) -> Result<Vec<RawObservation>, ExtractError> {
        let mut observations = Vec::new();
        for caps in self.pattern.captures_iter(text) {
            observations.push(RawObservation {
                year: parse_integer(&caps[1])?,
                sub_period: parse_integer(&caps[2])?,
                value: parse_number(&caps[3])?,
            });
        }
        debug!("matched {} observations in {} bytes", observations.len(), text.len());
        Ok(observations)
    }
}

/// Shorthand for a one-off scan with a fresh [`ObservationParser`]
pub fn extract_observations(text: &str) -> Result<Vec<RawObservation>, ExtractError> {
    ObservationParser::new()?.extract(text)
}

/// Parses a signed integer or decimal such as `5`, `-2.0`, `+0.75` or `3.`
pub fn parse_number(text: &str) -> Result<f64, ExtractError> {
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ExtractError::MalformedNumeric {
            text: text.to_string(),
        }),
    }
}

fn parse_integer<T: std::str::FromStr>(text: &str) -> Result<T, ExtractError> {
    text.parse().map_err(|_| ExtractError::MalformedNumeric {
        text: text.to_string(),
    })
}

// `YYYY-M` or `YYYY-MM`, nothing else
fn period_key(key: &str) -> Option<(i32, u32)> {
    let (year, month) = key.split_once('-')?;
    let digits = |s: &str, len: std::ops::RangeInclusive<usize>| {
        len.contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
    };
    if !digits(year, 4..=4) || !digits(month, 1..=2) {
        return None;
    }
    Some((year.parse().ok()?, month.parse().ok()?))
}

/// Reads observations out of a located fragment whose quotes are already normalized.
///
/// Numbers are taken as they are and numeric strings go through [`parse_number`].
/// `null` values and keys not shaped like `YYYY-M` are skipped.
pub fn fragment_observations(json: &str) -> Result<Vec<RawObservation>, ExtractError> {
    let entries: Map<String, Value> = serde_json::from_str(json)?;
    let mut observations = Vec::with_capacity(entries.len());
    for (key, value) in entries.iter() {
        let Some((year, sub_period)) = period_key(key) else {
            debug!("skipping fragment key {key:?}");
            continue;
        };
        let value = match value {
            Value::Number(n) => match n.as_f64() {
                Some(v) => v,
                None => parse_number(&n.to_string())?,
            },
            Value::String(s) => parse_number(s.trim())?,
            Value::Null => continue,
            other => {
                debug!("skipping non-numeric value {other} for {key}");
                continue;
            }
        };
        observations.push(RawObservation {
            year,
            sub_period,
            value,
        });
    }
    Ok(observations)
}
