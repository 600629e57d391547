//! JS output files
//!
//! The front end loads the results with a plain `<script>` tag, so each run writes a single
//! `const <name> = <json>;` statement, the JSON indented by 4 spaces. Key names and nesting
//! are what the page reads and must not change:
//!
//! ```text
//! const fetchedUserReturns = { "2023": 5.99, ... };
//! const indicesData = { "SPX500": { "name": "SPX500", "color": "#38bdf8", "returns": { "2000": -9.1, ... } }, ... };
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::ser::PrettyFormatter;

use crate::compound::AnnualYield;

/// `year -> percent` as the front end reads it
pub fn yield_map(yields: &BTreeMap<i32, AnnualYield>) -> BTreeMap<i32, f64> {
    yields
        .iter()
        .map(|(&year, annual)| (year, annual.percent_yield))
        .collect()
}

/// The yields of one index with the labels it is drawn with
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesResult {
    pub display_name: String,
    pub color_hint: String,
    pub yields: BTreeMap<i32, AnnualYield>,
}

impl Serialize for SeriesResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SeriesResult", 3)?;
        state.serialize_field("name", &self.display_name)?;
        state.serialize_field("color", &self.color_hint)?;
        state.serialize_field("returns", &yield_map(&self.yields))?;
        state.end()
    }
}

/// Index results keyed by series, serialized in the order the series were configured
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexReport {
    series: Vec<(String, SeriesResult)>,
}

impl IndexReport {
    pub fn push(&mut self, key: impl Into<String>, result: SeriesResult) {
        self.series.push((key.into(), result));
    }

    pub fn get(&self, key: &str) -> Option<&SeriesResult> {
        self.series.iter().find(|(k, _)| k == key).map(|(_, r)| r)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl Serialize for IndexReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.series.len()))?;
        for (key, result) in &self.series {
            map.serialize_entry(key, result)?;
        }
        map.end()
    }
}

/// Renders `const <variable> = <value>;`
pub fn render_assignment<T: Serialize + ?Sized>(
    variable: &str,
    value: &T,
) -> Result<String, serde_json::Error> {
    let mut json = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut json, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    // serde_json only ever writes UTF-8
    let json = String::from_utf8_lossy(&json);
    Ok(format!("const {variable} = {json};"))
}

/// Renders the assignment and replaces `path` with it
pub fn write_assignment<T: Serialize + ?Sized>(
    path: &Path,
    variable: &str,
    value: &T,
) -> std::io::Result<()> {
    let content = render_assignment(variable, value)?;
    std::fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yields(entries: &[(i32, f64, usize)]) -> BTreeMap<i32, AnnualYield> {
        entries
            .iter()
            .map(|&(year, percent_yield, sample_count)| {
                (
                    year,
                    AnnualYield {
                        year,
                        percent_yield,
                        sample_count,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn renders_user_returns() {
        let rendered = render_assignment(
            "fetchedUserReturns",
            &yield_map(&yields(&[(2024, -1.0, 12), (2023, 5.99, 3)])),
        )
        .unwrap();
        assert_eq!(
            rendered,
            "const fetchedUserReturns = {\n    \"2023\": 5.99,\n    \"2024\": -1.0\n};"
        );
    }

    #[test]
    fn renders_empty_returns() {
        let rendered = render_assignment("fetchedUserReturns", &BTreeMap::<i32, f64>::new()).unwrap();
        assert_eq!(rendered, "const fetchedUserReturns = {};");
    }

    #[test]
    fn keeps_series_in_configured_order() {
        let mut report = IndexReport::default();
        for (key, color) in [("SPX500", "#38bdf8"), ("CHINA50", "#ef4444")] {
            report.push(
                key,
                SeriesResult {
                    display_name: key.to_string(),
                    color_hint: color.to_string(),
                    yields: yields(&[(2000, 20.0, 252)]),
                },
            );
        }
        let rendered = render_assignment("indicesData", &report).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(rendered.trim_start_matches("const indicesData = ").trim_end_matches(';'))
                .unwrap();
        assert_eq!(json["CHINA50"]["color"], "#ef4444");
        assert_eq!(json["SPX500"]["name"], "SPX500");
        assert_eq!(json["SPX500"]["returns"]["2000"], 20.0);
        assert!(rendered.find("SPX500").unwrap() < rendered.find("CHINA50").unwrap());
        assert_eq!(report.keys().collect::<Vec<_>>(), vec!["SPX500", "CHINA50"]);
    }

    #[test]
    fn writes_and_overwrites_the_file() {
        let path = std::env::temp_dir().join(format!("yieldbook-emit-{}.js", std::process::id()));
        std::fs::write(&path, "stale content that is longer than the new one").unwrap();
        write_assignment(&path, "x", &BTreeMap::from([(2020, 1.5)])).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "const x = {\n    \"2020\": 1.5\n};");
        std::fs::remove_file(&path).unwrap();
    }
}
