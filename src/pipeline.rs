//! The two runs: RETRIEVE → EXTRACT → AGGREGATE → EMIT
//!
//! [`run_user_returns`] turns one trader's monthly returns page into compounded yearly
//! yields. [`run_indices`] turns daily index prices into close-to-close yearly returns.
//! Both overwrite their output file on every run; nothing else is kept between runs.

use std::collections::BTreeMap;

use reqwest::Client;
use time::{OffsetDateTime, Time};
use tracing::{debug, error, info, warn};

use crate::compound::{compound_monthly, year_over_year, AnnualYield, DailyBar};
use crate::config::{Config, IndicesConfig, SeriesConfig, UserConfig};
use crate::emit::{write_assignment, yield_map, IndexReport, SeriesResult};
use crate::error::{PipelineError, SeriesError, Stage, StageContext};
use crate::fetch::{http_client, PageFetcher};
use crate::fragment::{locate, normalize_quotes};
use crate::observations::{fragment_observations, ExtractError, ObservationParser, RawObservation};
use crate::period_table::{aggregate, Granularity};
use crate::yahoo_finance::get_daily_bars;

/// Observations on a page, read from the keyed fragment when there is a usable one and
/// from the whole text otherwise.
pub fn page_observations(text: &str, fragment_key: &str) -> Result<Vec<RawObservation>, ExtractError> {
    if let Some(fragment) = locate(text, fragment_key) {
        match fragment_observations(&normalize_quotes(fragment)) {
            Ok(observations) => {
                debug!("read {} observations from {fragment_key}", observations.len());
                return Ok(observations);
            }
            Err(ExtractError::FragmentJson(e)) => {
                warn!("{fragment_key} fragment is not JSON ({e}), scanning the whole page")
            }
            Err(e) => return Err(e),
        }
    } else {
        debug!("no {fragment_key} fragment, scanning the whole page");
    }
    ObservationParser::new()?.extract(text)
}

/// Compounded yields of every year on a page, years before `start_year` left out.
///
/// A page without observations gives an empty map.
pub fn user_yields(
    text: &str,
    fragment_key: &str,
    start_year: Option<i32>,
) -> Result<BTreeMap<i32, AnnualYield>, ExtractError> {
    let observations = page_observations(text, fragment_key)?;
    let mut table = aggregate(observations, Granularity::Monthly);
    if let Some(start_year) = start_year {
        table.retain_from(start_year);
    }
    Ok(compound_monthly(&table))
}

fn log_yields(series: &str, yields: &BTreeMap<i32, AnnualYield>, unit: &str) {
    for annual in yields.values() {
        info!(
            "{series} {}: {}% (based on {} {unit})",
            annual.year, annual.percent_yield, annual.sample_count
        );
    }
}

/// Fetches the configured user's page and writes the compounded yields.
pub async fn run_user_returns(
    config: &UserConfig,
    fetcher: &PageFetcher,
) -> Result<BTreeMap<i32, AnnualYield>, PipelineError> {
    let series = config.username.as_str();
    let url = config.page_url();
    info!("fetching {url}");
    let text = fetcher
        .fetch_page(&url, config.proxy_url.as_deref())
        .await
        .stage(series, Stage::Fetch)?;

    let yields = user_yields(&text, &config.fragment_key, config.start_year)
        .stage(series, Stage::Extract)?;
    if yields.is_empty() {
        warn!("no monthly returns found for {series}");
    }
    log_yields(series, &yields, "months");

    write_assignment(&config.output, &config.variable, &yield_map(&yields))
        .stage(series, Stage::Emit)?;
    info!("saved {} years to {}", yields.len(), config.output.display());
    Ok(yields)
}

/// Yields of one index series from its daily bars
pub fn index_series(
    config: &SeriesConfig,
    default_color: &str,
    bars: &[DailyBar],
) -> Result<SeriesResult, SeriesError> {
    Ok(SeriesResult {
        display_name: config.key.clone(),
        color_hint: config.color_or(default_color).to_string(),
        yields: year_over_year(bars)?,
    })
}

/// Collects the series that produced a result, in configured order.
///
/// Retrieval and price problems cost only their own series. Anything else ends the run.
pub fn collect_series<I>(
    config: &IndicesConfig,
    outcomes: I,
) -> Result<IndexReport, PipelineError>
where
    I: IntoIterator<Item = (SeriesConfig, Result<Vec<DailyBar>, SeriesError>)>,
{
    let mut report = IndexReport::default();
    for (series, bars) in outcomes {
        let bars = match bars {
            Ok(bars) => bars,
            Err(e) if e.is_retrieval() => {
                error!("skipping {} ({}): {e}", series.key, series.symbol);
                continue;
            }
            Err(e) => return Err(e).stage(&series.key, Stage::Fetch),
        };
        if bars.is_empty() {
            warn!("no data found for {}", series.symbol);
            continue;
        }
        match index_series(&series, &config.default_color, &bars) {
            Ok(result) => {
                log_yields(&series.key, &result.yields, "days");
                report.push(series.key, result);
            }
            Err(e @ SeriesError::Compound(_)) => error!("skipping {}: {e}", series.key),
            Err(e) => return Err(e).stage(&series.key, Stage::Compound),
        }
    }
    Ok(report)
}

/// Fetches every configured index concurrently and writes their yearly returns.
pub async fn run_indices(
    config: &Config,
    client: &Client,
) -> Result<IndexReport, PipelineError> {
    let indices = &config.indices;
    let start = OffsetDateTime::new_utc(
        indices.start_date().stage(&indices.variable, Stage::Fetch)?,
        Time::MIDNIGHT,
    );
    let end = OffsetDateTime::now_utc();
    info!("fetching {} index series from {}", indices.series.len(), indices.start);

    // series share nothing, each gets its own task
    let handles: Vec<_> = indices
        .series
        .iter()
        .cloned()
        .map(|series| {
            let client = client.clone();
            let symbol = series.symbol.clone();
            let handle = tokio::spawn(async move {
                get_daily_bars(&client, &symbol, &start, &end)
                    .await
                    .map_err(SeriesError::from)
            });
            (series, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (series, handle) in handles {
        match handle.await {
            Ok(bars) => outcomes.push((series, bars)),
            Err(e) => error!("task for {} did not finish: {e}", series.key),
        }
    }

    let report = collect_series(indices, outcomes)?;
    write_assignment(&indices.output, &indices.variable, &report)
        .stage(&indices.variable, Stage::Emit)?;
    info!("saved {} series to {}", report.len(), indices.output.display());
    Ok(report)
}

/// Builds the HTTP plumbing from `config` and runs the user pipeline once.
pub async fn user_returns_once(config: &Config) -> Result<BTreeMap<i32, AnnualYield>, PipelineError> {
    let fetcher = PageFetcher::new(&config.fetch).stage(&config.user.username, Stage::Fetch)?;
    run_user_returns(&config.user, &fetcher).await
}

/// Builds the HTTP plumbing from `config` and runs the index pipeline once.
pub async fn indices_once(config: &Config) -> Result<IndexReport, PipelineError> {
    let client = http_client(&config.fetch).stage(&config.indices.variable, Stage::Fetch)?;
    run_indices(config, &client).await
}
