//! Yahoo Finance adapter over the public chart and quoteSummary endpoints.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{
    DividendHistory, FinancialStatements, MarketDataProvider, MarketFuture, PriceBar,
    PriceTargets, RecommendationRow, SectorInfo, Statement,
};
use crate::SourceError;

const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query2.finance.yahoo.com/v1/test/getcrumb";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// quoteSummary modules and the key holding each module's statement list.
const STATEMENT_MODULES: [(&str, &str); 3] = [
    ("balanceSheetHistory", "balanceSheetStatements"),
    ("incomeStatementHistory", "incomeStatementHistory"),
    ("cashflowStatementHistory", "cashflowStatements"),
];

pub struct YahooFinanceProvider {
    client: Client,
    crumb: Mutex<Option<String>>,
}

impl YahooFinanceProvider {
    pub fn new(user_agent: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .cookie_store(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| SourceError::transport(format!("failed to build http client: {err}")))?;

        Ok(Self::with_client(client))
    }

    /// The client must keep a cookie store; the crumb is bound to a session cookie.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            crumb: Mutex::new(None),
        }
    }

    async fn chart(&self, ticker: &str, range: &str, interval: &str) -> Result<Value, SourceError> {
        let url = format!("{CHART_URL}/{}", urlencoding::encode(ticker));
        let response = self
            .client
            .get(&url)
            .query(&[("range", range), ("interval", interval), ("events", "div")])
            .send()
            .await
            .map_err(|err| SourceError::from_reqwest(err, "Yahoo chart"))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SourceError::not_found(format!(
                "no chart data for {ticker}"
            ))),
            status if !status.is_success() => {
                Err(SourceError::status(status.as_u16(), "Yahoo chart"))
            }
            _ => response
                .json::<Value>()
                .await
                .map_err(|err| SourceError::from_reqwest(err, "Yahoo chart")),
        }
    }

    async fn crumb(&self, refresh: bool) -> Result<String, SourceError> {
        let mut cached = self.crumb.lock().await;
        if refresh {
            *cached = None;
        }
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // Only the session cookie matters here; the page itself answers 404.
        self.client
            .get(COOKIE_URL)
            .send()
            .await
            .map_err(|err| SourceError::from_reqwest(err, "Yahoo cookie handshake"))?;

        let response = self
            .client
            .get(CRUMB_URL)
            .send()
            .await
            .map_err(|err| SourceError::from_reqwest(err, "Yahoo crumb"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::status(status.as_u16(), "Yahoo crumb"));
        }

        let crumb = response
            .text()
            .await
            .map_err(|err| SourceError::from_reqwest(err, "Yahoo crumb"))?
            .trim()
            .to_string();
        if crumb.is_empty() || crumb.contains('<') {
            return Err(SourceError::decode("Yahoo crumb endpoint returned no crumb"));
        }

        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    async fn summary(&self, ticker: &str, modules: &str) -> Result<Map<String, Value>, SourceError> {
        let mut refresh = false;

        loop {
            let crumb = self.crumb(refresh).await?;
            let url = format!("{SUMMARY_URL}/{}", urlencoding::encode(ticker));
            let response = self
                .client
                .get(&url)
                .query(&[("modules", modules), ("crumb", crumb.as_str())])
                .send()
                .await
                .map_err(|err| SourceError::from_reqwest(err, "Yahoo quoteSummary"))?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !refresh {
                tracing::debug!(ticker, "Yahoo crumb rejected; refreshing");
                refresh = true;
                continue;
            }

            // 404 bodies still carry the quoteSummary error envelope.
            if !status.is_success() && status != StatusCode::NOT_FOUND {
                return Err(SourceError::status(status.as_u16(), "Yahoo quoteSummary"));
            }

            let body = response
                .json::<Value>()
                .await
                .map_err(|err| SourceError::from_reqwest(err, "Yahoo quoteSummary"))?;
            return summary_result(&body, ticker);
        }
    }
}

impl MarketDataProvider for YahooFinanceProvider {
    fn recent_history<'a>(
        &'a self,
        ticker: &'a str,
        periods: usize,
    ) -> MarketFuture<'a, Vec<PriceBar>> {
        Box::pin(async move {
            match self.chart(ticker, "5d", "1d").await {
                Ok(body) => parse_history(&body, periods),
                Err(error) if error.kind == crate::SourceErrorKind::NotFound => Ok(Vec::new()),
                Err(error) => Err(error),
            }
        })
    }

    fn price_targets<'a>(&'a self, ticker: &'a str) -> MarketFuture<'a, PriceTargets> {
        Box::pin(async move {
            let result = self.summary(ticker, "financialData").await?;
            Ok(parse_price_targets(&result))
        })
    }

    fn recommendations<'a>(&'a self, ticker: &'a str) -> MarketFuture<'a, Vec<RecommendationRow>> {
        Box::pin(async move {
            let result = self.summary(ticker, "recommendationTrend").await?;
            parse_recommendations(&result)
        })
    }

    fn dividends<'a>(&'a self, ticker: &'a str) -> MarketFuture<'a, DividendHistory> {
        Box::pin(async move {
            let body = self.chart(ticker, "max", "1mo").await?;
            parse_dividends(&body)
        })
    }

    fn sector_info<'a>(&'a self, ticker: &'a str) -> MarketFuture<'a, SectorInfo> {
        Box::pin(async move {
            let result = self.summary(ticker, "assetProfile").await?;
            Ok(parse_sector_info(&result))
        })
    }

    fn financial_statements<'a>(
        &'a self,
        ticker: &'a str,
    ) -> MarketFuture<'a, FinancialStatements> {
        Box::pin(async move {
            let modules = STATEMENT_MODULES
                .iter()
                .map(|(module, _)| *module)
                .collect::<Vec<_>>()
                .join(",");
            let result = self.summary(ticker, &modules).await?;
            Ok(parse_statements(&result))
        })
    }
}

fn chart_result(body: &Value) -> Result<&Value, SourceError> {
    let chart = body
        .get("chart")
        .ok_or_else(|| SourceError::decode("Yahoo chart response has no 'chart' field"))?;

    if let Some(error) = chart.get("error").filter(|error| !error.is_null()) {
        return Err(SourceError::not_found(upstream_description(error)));
    }

    chart
        .get("result")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .ok_or_else(|| SourceError::decode("Yahoo chart response has no result"))
}

fn summary_result(body: &Value, ticker: &str) -> Result<Map<String, Value>, SourceError> {
    let summary = body
        .get("quoteSummary")
        .ok_or_else(|| SourceError::decode("Yahoo quoteSummary response has no 'quoteSummary' field"))?;

    if let Some(error) = summary.get("error").filter(|error| !error.is_null()) {
        return Err(SourceError::not_found(format!(
            "{ticker}: {}",
            upstream_description(error)
        )));
    }

    summary
        .get("result")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| SourceError::not_found(format!("{ticker}: no quote summary available")))
}

fn upstream_description(error: &Value) -> String {
    error
        .get("description")
        .and_then(Value::as_str)
        .or_else(|| error.get("code").and_then(Value::as_str))
        .unwrap_or("unknown upstream error")
        .to_string()
}

/// Yahoo timestamps are UTC seconds; `gmtoffset` shifts them into the exchange calendar.
fn local_date(timestamp: i64, gmt_offset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp + gmt_offset, 0).map(|moment| moment.date_naive())
}

fn gmt_offset(result: &Value) -> i64 {
    result
        .pointer("/meta/gmtoffset")
        .and_then(Value::as_i64)
        .unwrap_or_default()
}

fn parse_history(body: &Value, periods: usize) -> Result<Vec<PriceBar>, SourceError> {
    let result = match chart_result(body) {
        Ok(result) => result,
        Err(error) if error.kind == crate::SourceErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error),
    };

    let offset = gmt_offset(result);
    let Some(timestamps) = result.get("timestamp").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    let quote = result
        .pointer("/indicators/quote/0")
        .ok_or_else(|| SourceError::decode("Yahoo chart result has no quote indicators"))?;
    let closes = quote.get("close").and_then(Value::as_array);
    let volumes = quote.get("volume").and_then(Value::as_array);

    let mut bars = timestamps
        .iter()
        .enumerate()
        .filter_map(|(index, timestamp)| {
            let date = local_date(timestamp.as_i64()?, offset)?;
            let close = closes?.get(index)?.as_f64()?;
            let volume = volumes
                .and_then(|volumes| volumes.get(index))
                .and_then(Value::as_f64)
                .unwrap_or_default();
            Some(PriceBar {
                date,
                close,
                volume: volume.max(0.0) as u64,
            })
        })
        .collect::<Vec<_>>();

    if bars.len() > periods {
        bars.drain(..bars.len() - periods);
    }
    Ok(bars)
}

fn parse_dividends(body: &Value) -> Result<DividendHistory, SourceError> {
    let result = chart_result(body)?;
    let offset = gmt_offset(result);

    let Some(events) = result.pointer("/events/dividends").and_then(Value::as_object) else {
        return Ok(DividendHistory::new());
    };

    Ok(events
        .values()
        .filter_map(|event| {
            let date = local_date(event.get("date")?.as_i64()?, offset)?;
            let amount = event.get("amount")?.as_f64()?;
            Some((date.format("%Y-%m-%d").to_string(), amount))
        })
        .collect())
}

fn raw_number(container: &Value, field: &str) -> Option<f64> {
    container.get(field)?.get("raw")?.as_f64()
}

fn parse_price_targets(result: &Map<String, Value>) -> PriceTargets {
    let Some(data) = result.get("financialData") else {
        return PriceTargets::default();
    };

    PriceTargets {
        current: raw_number(data, "currentPrice"),
        high: raw_number(data, "targetHighPrice"),
        low: raw_number(data, "targetLowPrice"),
        mean: raw_number(data, "targetMeanPrice"),
        median: raw_number(data, "targetMedianPrice"),
    }
}

fn parse_recommendations(
    result: &Map<String, Value>,
) -> Result<Vec<RecommendationRow>, SourceError> {
    let Some(trend) = result.get("recommendationTrend").and_then(|trend| trend.get("trend")) else {
        return Ok(Vec::new());
    };

    serde_json::from_value(trend.clone())
        .map_err(|err| SourceError::decode(format!("unexpected recommendation trend shape: {err}")))
}

fn parse_sector_info(result: &Map<String, Value>) -> SectorInfo {
    let text = |field: &str| {
        result
            .get("assetProfile")
            .and_then(|profile| profile.get(field))
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
    };

    SectorInfo {
        sector: text("sector"),
        industry: text("industry"),
    }
}

fn parse_statement(entries: Option<&Value>) -> Statement {
    let Some(entries) = entries.and_then(Value::as_array) else {
        return Statement::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let period = entry.pointer("/endDate/fmt")?.as_str()?.to_string();
            let items = entry
                .as_object()?
                .iter()
                .filter(|(name, _)| name.as_str() != "endDate" && name.as_str() != "maxAge")
                .filter_map(|(name, value)| {
                    match value.get("raw")? {
                        Value::Number(raw) => Some((name.clone(), raw.clone())),
                        _ => None,
                    }
                })
                .collect::<BTreeMap<_, _>>();
            Some((period, items))
        })
        .collect()
}

fn parse_statements(result: &Map<String, Value>) -> FinancialStatements {
    let [balance, income, cash] = STATEMENT_MODULES.map(|(module, key)| {
        parse_statement(result.get(module).and_then(|module| module.get(key)))
    });

    FinancialStatements {
        balance_sheet: balance,
        income_statement: income,
        cash_flow: cash,
    }
}
