use std::collections::BTreeMap;
use std::path::PathBuf;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use yieldbook::compound::{compound_year, DailyBar};
use yieldbook::config::{Config, IndicesConfig};
use yieldbook::emit::{render_assignment, write_assignment, yield_map};
use yieldbook::error::SeriesError;
use yieldbook::fragment::locate;
use yieldbook::observations::extract_observations;
use yieldbook::pipeline::{collect_series, user_yields};
use yieldbook::yahoo_finance::{YResponse, YahooError};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("yieldbook-{}-{name}", std::process::id()))
}

#[test]
fn duplicate_months_compound_once() {
    let page = r#"<html><script>"2023-1": 5.0, "2023-2": -2.0, "2023-2": -2.0, "2023-3": 3.0</script></html>"#;

    assert_eq!(extract_observations(page).unwrap().len(), 4);
    let yields = user_yields(page, "monthlyReturns", None).unwrap();
    assert_eq!(yields.len(), 1);
    assert_eq!(yields[&2023].sample_count, 3);
    assert_relative_eq!(
        yields[&2023].percent_yield,
        ((1.05f64 * 0.98 * 1.03 - 1.0) * 100.0 * 100.0).round() / 100.0
    );
    assert_relative_eq!(yields[&2023].percent_yield, compound_year(&[5.0, -2.0, 3.0]));
}

#[test]
fn locate_and_scan_are_independent() {
    let page = r#"<p>summary "2022-12": 1.5</p><script>self.__next_f.push([1,"{\"profile\":{\"monthlyReturns\":{\"2023-1\":2.0,\"2023-2\":3.0}}}"])</script>"#;
    // the scan sees both the loose value and the embedded ones
    assert_eq!(extract_observations(page).unwrap().len(), 3);
    assert!(locate(page, "monthlyReturns").is_some());
    assert!(locate(page, "weeklyReturns").is_none());

    // the keyed fragment wins when it parses
    let yields = user_yields(page, "monthlyReturns", None).unwrap();
    assert_eq!(yields.keys().copied().collect::<Vec<_>>(), vec![2023]);
    assert_relative_eq!(yields[&2023].percent_yield, 5.06);

    // without it the whole page is used
    let yields = user_yields(page, "weeklyReturns", None).unwrap();
    assert_eq!(yields.keys().copied().collect::<Vec<_>>(), vec![2022, 2023]);
}

#[test]
fn partial_year_keeps_its_sample_count() {
    let page = r#"{"2021-1":1.0,"2021-2":1.0,"2021-3":1.0,"2021-4":1.0,"2021-5":1.0,"2021-6":1.0,
        "2021-7":1.0,"2021-8":1.0,"2021-9":1.0,"2021-10":1.0,"2021-11":1.0,"2021-12":1.0,"2022-6":-4.25}"#;
    let yields = user_yields(page, "monthlyReturns", None).unwrap();
    assert_eq!(yields[&2021].sample_count, 12);
    assert_relative_eq!(yields[&2021].percent_yield, 12.68);
    assert_eq!(yields[&2022].sample_count, 1);
    assert_relative_eq!(yields[&2022].percent_yield, -4.25);
}

#[test]
fn page_without_returns_writes_an_empty_object() {
    let yields = user_yields("<html>maintenance</html>", "monthlyReturns", None).unwrap();
    assert!(yields.is_empty());
    assert_eq!(
        render_assignment("fetchedUserReturns", &yield_map(&yields)).unwrap(),
        "const fetchedUserReturns = {};"
    );
}

#[test]
fn user_output_file() {
    let page = r#"\"2024-1\": 10.0, \"2024-2\": -10.0, \"2024-13\": 50.0"#;
    let yields = user_yields(page, "monthlyReturns", None).unwrap();
    let path = temp_path("user_data.js");
    write_assignment(&path, "fetchedUserReturns", &yield_map(&yields)).unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "const fetchedUserReturns = {\n    \"2024\": -1.0\n};"
    );
    std::fs::remove_file(&path).unwrap();
}

fn bar(date: &str, open: f64, close: f64) -> DailyBar {
    DailyBar {
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open,
        close,
    }
}

#[test]
fn index_report_from_chart_responses() {
    let chart = r#"{"chart":{"result":[{"meta":{"currency":"USD","symbol":"^GSPC"},
        "timestamp":[946909800,977842800,978445800,1009810800],
        "indicators":{"quote":[{"open":[100.0,118.0,121.0,149.0],"close":[101.0,120.0,122.0,150.0]}]}}],"error":null}}"#;
    let spx_bars = YResponse::from_json(chart).unwrap().bars().unwrap();

    let config = IndicesConfig::default();
    let mut outcomes = Vec::new();
    for series in config.series.iter().cloned() {
        let bars = match series.key.as_str() {
            "SPX500" => Ok(spx_bars.clone()),
            "NSDQ100" => Ok(vec![bar("2000-01-03", 3790.55, 3707.83), bar("2000-12-29", 2400.0, 2341.7)]),
            _ => Err(SeriesError::from(YahooError::EmptyDataSet)),
        };
        outcomes.push((series, bars));
    }
    let report = collect_series(&config, outcomes).unwrap();
    assert_eq!(report.keys().collect::<Vec<_>>(), vec!["SPX500", "NSDQ100"]);

    let spx = report.get("SPX500").unwrap();
    assert_relative_eq!(spx.yields[&2000].percent_yield, 20.0);
    assert_relative_eq!(spx.yields[&2001].percent_yield, 25.0);
    assert_relative_eq!(report.get("NSDQ100").unwrap().yields[&2000].percent_yield, -38.22);

    let path = temp_path("indices_data.js");
    write_assignment(&path, &config.variable, &report).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert!(written.starts_with("const indicesData = {\n    \"SPX500\": {\n        \"name\": \"SPX500\",\n        \"color\": \"#38bdf8\",\n        \"returns\": {\n            \"2000\": 20.0,"));
    let json: serde_json::Value = serde_json::from_str(
        written
            .trim_start_matches("const indicesData = ")
            .trim_end_matches(';'),
    )
    .unwrap();
    assert_eq!(json["NSDQ100"]["color"], "#a855f7");
    assert_eq!(json["SPX500"]["returns"], serde_json::json!({"2000": 20.0, "2001": 25.0}));
}

#[test]
fn config_file_round_trip() {
    let path = temp_path("config.toml");
    std::fs::write(
        &path,
        "[user]\nusername = \"BorisAka\"\n\n[fetch]\nmax_retries = 0\n",
    )
    .unwrap();
    let config = Config::load(Some(path.as_path())).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(config.user.page_url(), "https://bullaware.com/etoro/BorisAka");
    assert_eq!(config.fetch.max_retries, 0);
    let years: BTreeMap<i32, f64> = BTreeMap::new();
    assert_eq!(render_assignment(&config.user.variable, &years).unwrap(), "const fetchedUserReturns = {};");
}
