//! Annual yields from embedded return data
//!
//! Two pipelines feed a comparison page:
//!
//! - a trader's monthly returns, scraped out of the JSON a performance page embeds in its
//!   HTML and compounded into yearly yields ([`pipeline::run_user_returns`]);
//! - stock indices, whose daily closes from yahoo! finance become close-to-close yearly
//!   returns ([`pipeline::run_indices`]).
//!
//! Usage:
//! ```
//! use yieldbook::pipeline::user_yields;
//!
//! let page = r#"<script>"2023-1": 5.0, "2023-2": -2.0, "2023-2": -2.0, "2023-3": 3.0</script>"#;
//! let yields = user_yields(page, "monthlyReturns", None).unwrap();
//! assert_eq!(yields[&2023].sample_count, 3);
//! assert_eq!(yields[&2023].percent_yield, 5.99);
//! ```

pub mod compound;
pub mod config;
pub mod emit;
pub mod error;
pub mod fetch;
pub mod fragment;
pub mod observations;
pub mod period_table;
pub mod pipeline;
pub mod yahoo_finance;
