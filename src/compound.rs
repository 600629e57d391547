//! Annual yields
//!
//! Two separate ways of getting to a yearly percentage, one per pipeline:
//!
//! - [`compound_monthly`] chains explicit monthly percentage returns, `(Π(1 + r/100) - 1) × 100`
//!   with the months taken in ascending order.
//! - [`year_over_year`] works on daily price bars: the last close of each year against the
//!   last close of the year before. The first year of a series has no previous close, so it
//!   is measured from the open of the first bar instead (the anchor year).
//!
//! They are not interchangeable. Compounding the monthly changes of a price series only
//! approximates the close-to-close figure, so each pipeline keeps its own.
//!
//! Every figure is rounded to 2 decimals half away from zero, `round2(0.125) == 0.13`.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use crate::observations::RawObservation;
use crate::period_table::{aggregate, Granularity, PeriodTable};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompoundError {
    #[error("price {price} for {year} cannot anchor a return")]
    InvalidPrice { year: i32, price: f64 },
}

/// Yield of one year and the number of samples behind it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnualYield {
    pub year: i32,
    pub percent_yield: f64,
    pub sample_count: usize,
}

/// A daily bar reduced to what the close-to-close strategy needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
}

/// Rounds to 2 decimals, halves away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compounds percentage returns already in chronological order.
///
/// An empty slice compounds to `0.0`.
pub fn compound_year(returns_percent: &[f64]) -> f64 {
    let growth = returns_percent
        .iter()
        .fold(1.0, |acc, r| acc * (1.0 + r / 100.0));
    round2((growth - 1.0) * 100.0)
}

/// Compounds every year of a monthly table, months in ascending order.
pub fn compound_monthly(table: &PeriodTable) -> BTreeMap<i32, AnnualYield> {
    table
        .years()
        .filter(|(_, months)| !months.is_empty())
        .map(|(year, months)| {
            // BTreeMap values come out sorted by month
            let returns: Vec<f64> = months.values().copied().collect();
            (
                year,
                AnnualYield {
                    year,
                    percent_yield: compound_year(&returns),
                    sample_count: returns.len(),
                },
            )
        })
        .collect()
}

/// Return of the anchor year, measured from its opening price
pub fn anchor_return(open: f64, close: f64) -> f64 {
    (close - open) / open * 100.0
}

/// Return of a year measured from the previous year's close
pub fn close_to_close_return(previous_close: f64, close: f64) -> f64 {
    (close / previous_close - 1.0) * 100.0
}

fn usable(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Year-over-year returns of a daily series, the first year anchored on its opening price.
///
/// Bars may come in any order. The current, unfinished year is measured up to its latest
/// close. An empty series gives an empty map.
pub fn year_over_year(bars: &[DailyBar]) -> Result<BTreeMap<i32, AnnualYield>, CompoundError> {
    let mut bars: Vec<&DailyBar> = bars.iter().collect();
    bars.sort_by_key(|bar| bar.date);
    let Some(first) = bars.first() else {
        return Ok(BTreeMap::new());
    };
    let anchor_open = first.open;

    let mut samples: BTreeMap<i32, usize> = BTreeMap::new();
    for bar in &bars {
        *samples.entry(bar.date.year()).or_default() += 1;
    }
    // chronological order makes the last write the year-end close
    let closes = aggregate(
        bars.iter().map(|bar| RawObservation {
            year: bar.date.year(),
            sub_period: 0,
            value: bar.close,
        }),
        Granularity::Annual,
    );

    let mut yields = BTreeMap::new();
    let mut previous_close: Option<f64> = None;
    for (year, periods) in closes.years() {
        let Some(&close) = periods.get(&0) else {
            continue;
        };
        if !usable(close) {
            return Err(CompoundError::InvalidPrice { year, price: close });
        }
        let percent = match previous_close {
            None if usable(anchor_open) => anchor_return(anchor_open, close),
            None => {
                return Err(CompoundError::InvalidPrice {
                    year,
                    price: anchor_open,
                })
            }
            Some(previous) => close_to_close_return(previous, close),
        };
        yields.insert(
            year,
            AnnualYield {
                year,
                percent_yield: round2(percent),
                sample_count: samples.get(&year).copied().unwrap_or_default(),
            },
        );
        previous_close = Some(close);
    }
    Ok(yields)
}
