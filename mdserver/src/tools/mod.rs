//! The registry's tool catalog.
//!
//! Every tool body is a total function: upstream faults come back as the
//! `{error}` arm of [`ToolReply`], never as an `Err` across the boundary.
//!
//! ```rust
//! use serde_json::json;
//! use mdserver::ToolReply;
//!
//! let failed: ToolReply<String> = ToolReply::from_result(Err::<String, _>("HTTP 404"));
//! let output = failed.into_output().expect("serializable");
//! assert!(output.is_error);
//! assert_eq!(output.value, json!({"error": "HTTP 404"}));
//! ```

mod market;
mod web;

use std::fmt::Display;
use std::sync::Arc;

use mdtooling::{
    ParameterKind, ReturnShape, ToolDescriptor, ToolError, ToolOutput, ToolParameter,
    ToolRegistry, required_string, required_usize,
};
use serde::Serialize;

use crate::config::ServerConfig;
use crate::market::{MarketDataProvider, YahooFinanceProvider};
use crate::search::{DuckDuckGoSearch, HttpPageFetcher, PageFetcher, SearchProvider};
use crate::SourceError;

pub use market::{
    analyst_price_targets, analyst_recommendations, dividend_history, financial_statements,
    sector_info, stock_summary, summary_text,
};
pub use web::{WebSearchResult, WebSearchResults, web_search};

pub const DEFAULT_MAX_RESULTS: u64 = 2;

/// A tool's declared value or the contained `{error}` mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolReply<T> {
    Value(T),
    Error { error: String },
}

impl<T> ToolReply<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn from_result<E>(result: Result<T, E>) -> Self
    where
        E: Display,
    {
        match result {
            Ok(value) => Self::Value(value),
            Err(error) => Self::error(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn map<U, F>(self, f: F) -> ToolReply<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Value(value) => ToolReply::Value(f(value)),
            Self::Error { error } => ToolReply::Error { error },
        }
    }
}

impl<T> ToolReply<T>
where
    T: Serialize,
{
    pub fn into_output(self) -> Result<ToolOutput, ToolError> {
        match self {
            Self::Error { error } => Ok(ToolOutput::failure(error)),
            Self::Value(value) => serde_json::to_value(value)
                .map(ToolOutput::success)
                .map_err(|err| ToolError::execution(format!("tool result is not serializable: {err}"))),
        }
    }
}

/// Upstream handles shared by every tool.
#[derive(Clone)]
pub struct DataSources {
    pub market: Arc<dyn MarketDataProvider>,
    pub search: Arc<dyn SearchProvider>,
    pub pages: Arc<dyn PageFetcher>,
}

impl DataSources {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        search: Arc<dyn SearchProvider>,
        pages: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            market,
            search,
            pages,
        }
    }

    /// Yahoo Finance, DuckDuckGo, and a plain HTTP page fetcher.
    pub fn live(config: &ServerConfig) -> Result<Self, SourceError> {
        Ok(Self {
            market: Arc::new(YahooFinanceProvider::new(&config.user_agent)?),
            search: Arc::new(DuckDuckGoSearch::new(&config.user_agent)?),
            pages: Arc::new(HttpPageFetcher::new(
                &config.user_agent,
                config.fetch_timeout,
            )?),
        })
    }
}

fn ticker_parameter() -> ToolParameter {
    ToolParameter::required("ticker", ParameterKind::String)
        .with_description("Stock symbol, for example 'AAPL' or 'VALE3.SA'")
}

fn ticker_tool(name: &str, description: &str, returns: ReturnShape) -> ToolDescriptor {
    ToolDescriptor::new(name, description, returns).with_parameter(ticker_parameter())
}

pub fn web_search_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "web_search",
        "Search the web with DuckDuckGo. Returns titles, URLs, snippets, and the readable text of each result page.",
        ReturnShape::Mapping,
    )
    .with_parameter(
        ToolParameter::required("query", ParameterKind::String).with_description("Search terms"),
    )
    .with_parameter(
        ToolParameter::optional(
            "max_results",
            ParameterKind::Integer,
            serde_json::Value::from(DEFAULT_MAX_RESULTS),
        )
        .with_description("Maximum number of results to return"),
    )
}

/// Registers the seven tools against `sources`.
pub fn build_registry(sources: DataSources) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let search = Arc::clone(&sources.search);
    let pages = Arc::clone(&sources.pages);
    registry.register_fn(web_search_descriptor(), move |args, _context| {
        let search = Arc::clone(&search);
        let pages = Arc::clone(&pages);
        async move {
            let query = required_string(&args, "query")?;
            let max_results = required_usize(&args, "max_results")?;
            ToolReply::Value(web_search(search.as_ref(), pages.as_ref(), &query, max_results).await)
                .into_output()
        }
    });

    let market = Arc::clone(&sources.market);
    registry.register_fn(
        ticker_tool(
            "stock_summary",
            "Latest close price, volume, and trading date for a stock.",
            ReturnShape::Text,
        ),
        move |args, _context| {
            let market = Arc::clone(&market);
            async move {
                let ticker = required_string(&args, "ticker")?;
                stock_summary(market.as_ref(), &ticker).await.into_output()
            }
        },
    );

    let market = Arc::clone(&sources.market);
    registry.register_fn(
        ticker_tool(
            "analyst_price_targets",
            "Analyst price targets for a stock: current, high, low, mean, and median.",
            ReturnShape::Mapping,
        ),
        move |args, _context| {
            let market = Arc::clone(&market);
            async move {
                let ticker = required_string(&args, "ticker")?;
                analyst_price_targets(market.as_ref(), &ticker).await.into_output()
            }
        },
    );

    let market = Arc::clone(&sources.market);
    registry.register_fn(
        ticker_tool(
            "analyst_recommendations",
            "Analyst rating history for a stock, one row per period with strong buy to strong sell counts.",
            ReturnShape::Sequence,
        ),
        move |args, _context| {
            let market = Arc::clone(&market);
            async move {
                let ticker = required_string(&args, "ticker")?;
                analyst_recommendations(market.as_ref(), &ticker)
                    .await
                    .into_output()
            }
        },
    );

    let market = Arc::clone(&sources.market);
    registry.register_fn(
        ticker_tool(
            "dividend_history",
            "Dividends paid by a stock, keyed by ex-dividend date.",
            ReturnShape::Mapping,
        ),
        move |args, _context| {
            let market = Arc::clone(&market);
            async move {
                let ticker = required_string(&args, "ticker")?;
                dividend_history(market.as_ref(), &ticker).await.into_output()
            }
        },
    );

    let market = Arc::clone(&sources.market);
    registry.register_fn(
        ticker_tool(
            "sector_info",
            "Sector and industry of the company behind a stock.",
            ReturnShape::Mapping,
        ),
        move |args, _context| {
            let market = Arc::clone(&market);
            async move {
                let ticker = required_string(&args, "ticker")?;
                sector_info(market.as_ref(), &ticker).await.into_output()
            }
        },
    );

    let market = Arc::clone(&sources.market);
    registry.register_fn(
        ticker_tool(
            "financial_statements",
            "Balance sheet, income statement, and cash flow of a company, keyed by period end date.",
            ReturnShape::Mapping,
        ),
        move |args, _context| {
            let market = Arc::clone(&market);
            async move {
                let ticker = required_string(&args, "ticker")?;
                financial_statements(market.as_ref(), &ticker)
                    .await
                    .into_output()
            }
        },
    );

    registry
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn values_serialize_bare_and_errors_as_a_mapping() {
        let text = ToolReply::Value("AAPL Summary:".to_string())
            .into_output()
            .expect("serializable");
        assert_eq!(text.value, json!("AAPL Summary:"));
        assert!(!text.is_error);

        let rows: ToolReply<Vec<u32>> = ToolReply::from_result(Err::<Vec<u32>, _>("quota exceeded"));
        assert!(rows.is_error());
        assert_eq!(
            serde_json::to_value(&rows).expect("serializable"),
            json!({"error": "quota exceeded"})
        );
    }

    #[test]
    fn web_search_defaults_to_two_results() {
        let descriptor = web_search_descriptor();
        let bound = descriptor
            .bind_arguments(json!({"query": "nvda"}).as_object().cloned().unwrap_or_default())
            .expect("should bind");

        assert_eq!(bound["max_results"], json!(2));
        assert_eq!(descriptor.returns, ReturnShape::Mapping);
    }
}
