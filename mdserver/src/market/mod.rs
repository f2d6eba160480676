//! Market-data contract consumed by the financial tools.
//!
//! Tools hold an `Arc<dyn MarketDataProvider>`; the production implementation
//! is [`YahooFinanceProvider`], tests substitute scripted fakes.

mod yahoo;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use mdcommon::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::SourceError;

pub use yahoo::YahooFinanceProvider;

pub type MarketFuture<'a, T> = BoxFuture<'a, Result<T, SourceError>>;

/// One daily bar, dated in the exchange's local calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTargets {
    pub current: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRow {
    pub period: String,
    pub strong_buy: u32,
    pub buy: u32,
    pub hold: u32,
    pub sell: u32,
    pub strong_sell: u32,
}

/// Ex-dividend date (`YYYY-MM-DD`) to cash amount.
pub type DividendHistory = BTreeMap<String, f64>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorInfo {
    pub sector: Option<String>,
    pub industry: Option<String>,
}

/// Period end date (`YYYY-MM-DD`) to line item to reported value.
pub type Statement = BTreeMap<String, BTreeMap<String, Number>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    pub balance_sheet: Statement,
    pub income_statement: Statement,
    pub cash_flow: Statement,
}

pub trait MarketDataProvider: Send + Sync {
    /// Up to `periods` most recent daily bars, oldest first. An unknown
    /// symbol yields an empty list rather than an error.
    fn recent_history<'a>(
        &'a self,
        ticker: &'a str,
        periods: usize,
    ) -> MarketFuture<'a, Vec<PriceBar>>;

    fn price_targets<'a>(&'a self, ticker: &'a str) -> MarketFuture<'a, PriceTargets>;

    fn recommendations<'a>(&'a self, ticker: &'a str) -> MarketFuture<'a, Vec<RecommendationRow>>;

    fn dividends<'a>(&'a self, ticker: &'a str) -> MarketFuture<'a, DividendHistory>;

    fn sector_info<'a>(&'a self, ticker: &'a str) -> MarketFuture<'a, SectorInfo>;

    fn financial_statements<'a>(&'a self, ticker: &'a str)
    -> MarketFuture<'a, FinancialStatements>;
}
