use crate::market::{
    DividendHistory, FinancialStatements, MarketDataProvider, PriceBar, PriceTargets,
    RecommendationRow, SectorInfo,
};
use crate::{SourceError, ToolReply};

const SUMMARY_PERIODS: usize = 5;

fn normalize(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

fn contain<T>(tool: &'static str, ticker: &str, result: Result<T, SourceError>) -> ToolReply<T> {
    if let Err(error) = &result {
        tracing::warn!(
            phase = "tool",
            event = "upstream_failure",
            tool_name = tool,
            ticker,
            error_kind = ?error.kind,
            error = %error
        );
    }
    ToolReply::from_result(result)
}

/// Renders the latest bar as the multi-line summary text.
pub fn summary_text(ticker: &str, bar: &PriceBar) -> String {
    format!(
        "{ticker} Summary:\nClose Price: ${:.2}\nVolume: {}\nDate: {}\n",
        bar.close,
        bar.volume,
        bar.date.format("%Y-%m-%d")
    )
}

pub async fn stock_summary(market: &dyn MarketDataProvider, ticker: &str) -> ToolReply<String> {
    let symbol = normalize(ticker);
    let history = market.recent_history(&symbol, SUMMARY_PERIODS).await;

    contain("stock_summary", &symbol, history).map(|bars| match bars.last() {
        Some(bar) => summary_text(&symbol, bar),
        None => format!("No recent data found for {symbol}."),
    })
}

pub async fn analyst_price_targets(
    market: &dyn MarketDataProvider,
    ticker: &str,
) -> ToolReply<PriceTargets> {
    let symbol = normalize(ticker);
    let targets = market.price_targets(&symbol).await;
    contain("analyst_price_targets", &symbol, targets)
}

pub async fn analyst_recommendations(
    market: &dyn MarketDataProvider,
    ticker: &str,
) -> ToolReply<Vec<RecommendationRow>> {
    let symbol = normalize(ticker);
    let rows = market.recommendations(&symbol).await;
    contain("analyst_recommendations", &symbol, rows)
}

pub async fn dividend_history(
    market: &dyn MarketDataProvider,
    ticker: &str,
) -> ToolReply<DividendHistory> {
    let symbol = normalize(ticker);
    let dividends = market.dividends(&symbol).await;
    contain("dividend_history", &symbol, dividends)
}

pub async fn sector_info(market: &dyn MarketDataProvider, ticker: &str) -> ToolReply<SectorInfo> {
    let symbol = normalize(ticker);
    let info = market.sector_info(&symbol).await;
    contain("sector_info", &symbol, info)
}

pub async fn financial_statements(
    market: &dyn MarketDataProvider,
    ticker: &str,
) -> ToolReply<FinancialStatements> {
    let symbol = normalize(ticker);
    let statements = market.financial_statements(&symbol).await;
    contain("financial_statements", &symbol, statements)
}
