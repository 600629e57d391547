use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::compound::DailyBar;

#[derive(Error, Debug)]
pub enum YahooError {
    #[error("yahoo! finance reported {code}: {description}")]
    FetchFailed { code: String, description: String },
    #[error("deserializing response from yahoo! finance failed")]
    DeserializeFailed(#[from] serde_json::Error),
    #[error("connection to yahoo! finance server failed")]
    ConnectionFailed(#[from] reqwest::Error),
    #[error("yahoo! finance returned an empty data set")]
    EmptyDataSet,
    #[error("yahoo! finance returned inconsistent data")]
    DataInconsistency,
}

#[derive(Deserialize, Debug)]
pub struct YResponse {
    pub chart: YChart,
}

impl YResponse {
    fn check_consistency(&self) -> Result<&YQuoteBlock, YahooError> {
        if let Some(ref error) = self.chart.error {
            return Err(YahooError::FetchFailed {
                code: error.code.clone(),
                description: error.description.clone(),
            });
        }
        let stock = self
            .chart
            .result
            .as_ref()
            .and_then(|result| result.first())
            .ok_or(YahooError::EmptyDataSet)?;
        let n = stock.timestamp.len();
        if n == 0 {
            return Err(YahooError::EmptyDataSet);
        }
        let quote = stock
            .indicators
            .quote
            .first()
            .ok_or(YahooError::DataInconsistency)?;
        if quote.open.len() != n || quote.close.len() != n {
            return Err(YahooError::DataInconsistency);
        }
        Ok(stock)
    }

    pub fn from_json(json: &str) -> Result<YResponse, YahooError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Daily bars in the order yahoo! sent them, skipping days without a close
    pub fn bars(&self) -> Result<Vec<DailyBar>, YahooError> {
        let stock = self.check_consistency()?;
        let quote = &stock.indicators.quote[0];
        let mut bars = Vec::with_capacity(stock.timestamp.len());
        for (i, &timestamp) in stock.timestamp.iter().enumerate() {
            // reject if close is not set
            let Some(close) = quote.close[i] else {
                continue;
            };
            let Some(date) = DateTime::from_timestamp(timestamp, 0) else {
                return Err(YahooError::DataInconsistency);
            };
            bars.push(DailyBar {
                // exchange-local dates would need the gmtoffset, the year is what matters here
                date: date.date_naive(),
                open: quote.open[i].unwrap_or(0.0),
                close,
            });
        }
        Ok(bars)
    }

    pub fn metadata(&self) -> Result<YMetaData, YahooError> {
        let stock = self.check_consistency()?;
        Ok(stock.meta.to_owned())
    }
}

#[derive(Deserialize, Debug)]
pub struct YChart {
    pub result: Option<Vec<YQuoteBlock>>,
    pub error: Option<YChartError>,
}

#[derive(Deserialize, Debug)]
pub struct YChartError {
    pub code: String,
    pub description: String,
}

#[derive(Deserialize, Debug)]
pub struct YQuoteBlock {
    pub meta: YMetaData,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: QuoteBlock,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct YMetaData {
    pub currency: Option<String>,
    pub symbol: String,
    #[serde(default)]
    pub exchange_name: String,
    #[serde(default)]
    pub instrument_type: String,
}

#[derive(Deserialize, Debug)]
pub struct QuoteBlock {
    quote: Vec<QuoteList>,
}

#[derive(Deserialize, Debug)]
pub struct QuoteList {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}

fn chart_url(symbol: &str, start: &OffsetDateTime, end: &OffsetDateTime) -> String {
    let start = start.unix_timestamp();
    let end = end.unix_timestamp();
    format!("https://query1.finance.yahoo.com/v8/finance/chart/{symbol}?period1={start}&period2={end}&interval=1d&events=div%7Csplit")
}

/// Daily bars for `symbol` between `start` and `end`.
///
/// The client is expected to carry a common user agent, yahoo! rate limits the default one.
pub async fn get_daily_bars(
    client: &Client,
    symbol: &str,
    start: &OffsetDateTime,
    end: &OffsetDateTime,
) -> Result<Vec<DailyBar>, YahooError> {
    let body = client
        .get(chart_url(symbol, start, end))
        .send()
        .await?
        .text()
        .await?;
    let response = YResponse::from_json(&body)?;
    let meta = response.metadata()?;
    debug!(
        "{} on {} quoted in {}",
        meta.symbol,
        meta.exchange_name,
        meta.currency.as_deref().unwrap_or("an unknown currency")
    );
    response.bars()
}
