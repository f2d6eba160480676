use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::Router;
use chrono::NaiveDate;
use mdprovider::ToolCall;
use mdserver::market::{
    DividendHistory, FinancialStatements, MarketDataProvider, MarketFuture, PriceBar,
    PriceTargets, RecommendationRow, SectorInfo, Statement,
};
use mdserver::search::{PageFetcher, SearchFuture, SearchHit, SearchProvider};
use mdserver::{DataSources, RegistryState, SourceError, build_registry, router};
use mdtooling::{RemoteToolRuntime, ToolExecutionContext, ToolRuntime};
use serde_json::{Number, Value, json};
use tokio::sync::oneshot;
use tower::ServiceExt;

struct SteadyMarket;

/// Needs all 17 significant digits to decode to the same `f64`.
const FINE_MEAN: f64 = 0.12545678899999999;

fn statement(items: &[(&str, Number)]) -> Statement {
    let period = items
        .iter()
        .map(|(item, value)| (item.to_string(), value.clone()))
        .collect();
    Statement::from([("2023-09-30".to_string(), period)])
}

fn float(value: f64) -> Number {
    Number::from_f64(value).expect("finite value")
}

impl MarketDataProvider for SteadyMarket {
    fn recent_history<'a>(
        &'a self,
        _ticker: &'a str,
        _periods: usize,
    ) -> MarketFuture<'a, Vec<PriceBar>> {
        Box::pin(async move {
            Ok(vec![PriceBar {
                date: NaiveDate::from_ymd_opt(2024, 6, 14).expect("valid date"),
                close: 212.49,
                volume: 70_122_748,
            }])
        })
    }

    fn price_targets<'a>(&'a self, ticker: &'a str) -> MarketFuture<'a, PriceTargets> {
        Box::pin(async move {
            if ticker == "ZZZZ" {
                return Err(SourceError::status(429, "Yahoo quoteSummary"));
            }
            Ok(PriceTargets {
                current: Some(212.49),
                high: Some(275.0),
                low: Some(164.0),
                mean: Some(FINE_MEAN),
                median: Some(230.1),
            })
        })
    }

    fn recommendations<'a>(&'a self, _ticker: &'a str) -> MarketFuture<'a, Vec<RecommendationRow>> {
        Box::pin(async move {
            Ok(vec![RecommendationRow {
                period: "-1m".to_string(),
                strong_buy: 7,
                buy: 21,
                hold: 14,
                sell: 2,
                strong_sell: 1,
            }])
        })
    }

    fn dividends<'a>(&'a self, _ticker: &'a str) -> MarketFuture<'a, DividendHistory> {
        Box::pin(async move { Ok(DividendHistory::from([("2024-05-10".to_string(), 0.25)])) })
    }

    fn sector_info<'a>(&'a self, _ticker: &'a str) -> MarketFuture<'a, SectorInfo> {
        Box::pin(async move {
            Ok(SectorInfo {
                sector: Some("Technology".to_string()),
                industry: Some("Consumer Electronics".to_string()),
            })
        })
    }

    fn financial_statements<'a>(
        &'a self,
        _ticker: &'a str,
    ) -> MarketFuture<'a, FinancialStatements> {
        Box::pin(async move {
            Ok(FinancialStatements {
                balance_sheet: statement(&[
                    ("Total Assets", Number::from(352_583_000_000_u64)),
                    ("Current Ratio", float(0.98801527402747)),
                ]),
                income_statement: statement(&[
                    ("Net Income", Number::from(96_995_000_000_u64)),
                    ("Diluted EPS", float(6.13)),
                    ("Tax Rate", float(FINE_MEAN)),
                ]),
                cash_flow: statement(&[("Free Cash Flow", Number::from(-1_250_000_i64))]),
            })
        })
    }
}

struct OneHit;

impl SearchProvider for OneHit {
    fn search<'a>(&'a self, _query: &'a str, _max_results: usize) -> SearchFuture<'a, Vec<SearchHit>> {
        Box::pin(async move {
            Ok(vec![SearchHit::new(
                "Apple Newsroom",
                "https://apple.example/news",
                "Latest announcements",
            )])
        })
    }
}

struct UnreachablePages;

impl PageFetcher for UnreachablePages {
    fn fetch_text<'a>(&'a self, url: &'a str) -> SearchFuture<'a, String> {
        Box::pin(async move { Err(SourceError::timeout(format!("{url} timed out"))) })
    }
}

fn state() -> Arc<RegistryState> {
    let sources = DataSources::new(
        Arc::new(SteadyMarket),
        Arc::new(OneHit),
        Arc::new(UnreachablePages),
    );
    Arc::new(RegistryState::new(build_registry(sources)))
}

fn app() -> Router {
    router(state())
}

async fn post_raw(body: &str) -> (StatusCode, Value) {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request should build"),
        )
        .await
        .expect("router is infallible");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be JSON")
    };
    (status, value)
}

async fn rpc(method: &str, params: Value) -> Value {
    let request = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
    let (status, body) = post_raw(&request.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    body
}

#[tokio::test]
async fn health_answers_ok() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router is infallible");

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn initialize_advertises_tools_and_prompts() {
    let body = rpc("initialize", json!({"protocolVersion": "2025-03-26"})).await;

    assert_eq!(body["result"]["protocolVersion"], "2025-03-26");
    assert!(body["result"]["capabilities"]["tools"].is_object());
    assert!(body["result"]["capabilities"]["prompts"].is_object());
    assert_eq!(body["result"]["serverInfo"]["name"], "mdserver");
}

#[tokio::test]
async fn notifications_are_accepted_without_a_body() {
    let (status, body) =
        post_raw(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn tools_list_publishes_schemas() {
    let body = rpc("tools/list", json!({})).await;
    let tools = body["result"]["tools"].as_array().expect("tools array");

    assert_eq!(tools.len(), 7);
    let search = tools
        .iter()
        .find(|tool| tool["name"] == "web_search")
        .expect("web_search is listed");
    assert_eq!(search["inputSchema"]["required"], json!(["query"]));
    assert_eq!(search["inputSchema"]["properties"]["max_results"]["default"], 2);
}

#[tokio::test]
async fn tools_call_returns_text_and_structured_content() {
    let body = rpc(
        "tools/call",
        json!({"name": "stock_summary", "arguments": {"ticker": "aapl"}}),
    )
    .await;
    let expected = "AAPL Summary:\nClose Price: $212.49\nVolume: 70122748\nDate: 2024-06-14\n";

    assert_eq!(body["result"]["isError"], false);
    assert_eq!(body["result"]["structuredContent"], expected);
    assert_eq!(body["result"]["content"][0]["type"], "text");
    assert_eq!(body["result"]["content"][0]["text"], expected);
}

#[tokio::test]
async fn contained_faults_are_flagged_results_not_protocol_errors() {
    let body = rpc(
        "tools/call",
        json!({"name": "analyst_price_targets", "arguments": {"ticker": "zzzz"}}),
    )
    .await;

    assert!(body.get("error").is_none());
    assert_eq!(body["result"]["isError"], true);
    assert_eq!(
        body["result"]["structuredContent"],
        json!({"error": "Yahoo quoteSummary returned HTTP 429"})
    );
}

#[tokio::test]
async fn protocol_errors_use_json_rpc_codes() {
    let (_, parse) = post_raw("{not json").await;
    assert_eq!(parse["error"]["code"], -32700);
    assert_eq!(parse["id"], Value::Null);

    let (_, invalid) = post_raw(r#"{"jsonrpc":"1.0","id":4,"method":"ping"}"#).await;
    assert_eq!(invalid["error"]["code"], -32600);
    assert_eq!(invalid["id"], 4);

    let missing = rpc("resources/list", json!({})).await;
    assert_eq!(missing["error"]["code"], -32601);

    let unknown_tool = rpc("tools/call", json!({"name": "quote", "arguments": {}})).await;
    assert_eq!(unknown_tool["error"]["code"], -32602);

    let bad_arguments = rpc(
        "tools/call",
        json!({"name": "sector_info", "arguments": {"ticker": 42}}),
    )
    .await;
    assert_eq!(bad_arguments["error"]["code"], -32602);
}

#[tokio::test]
async fn prompts_are_listed_and_rendered() {
    let listed = rpc("prompts/list", json!({})).await;
    assert_eq!(listed["result"]["prompts"].as_array().map(Vec::len), Some(2));

    let rendered = rpc(
        "prompts/get",
        json!({"name": "stock_summary_prompt", "arguments": {"ticker": "VALE3.SA"}}),
    )
    .await;
    let text = rendered["result"]["messages"][0]["content"]["text"]
        .as_str()
        .expect("prompt text");
    assert!(text.contains("'VALE3.SA'"));

    let missing = rpc("prompts/get", json!({"name": "stock_summary_prompt"})).await;
    assert_eq!(missing["error"]["code"], -32602);
}

#[tokio::test]
async fn remote_runtime_reproduces_structured_results_exactly() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener.local_addr().expect("listener address");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(mdserver::serve(listener, state(), async move {
        let _ = shutdown_rx.await;
    }));

    let runtime = RemoteToolRuntime::new(format!("http://{address}/mcp"))
        .connect()
        .await
        .expect("connect should succeed");
    assert_eq!(runtime.descriptors().len(), 7);

    let cases = [
        ("analyst_price_targets", json!({"ticker": "AAPL"})),
        ("analyst_recommendations", json!({"ticker": "AAPL"})),
        ("dividend_history", json!({"ticker": "AAPL"})),
        ("sector_info", json!({"ticker": "AAPL"})),
        ("financial_statements", json!({"ticker": "AAPL"})),
        ("web_search", json!({"query": "apple"})),
    ];

    let local = DataSources::new(
        Arc::new(SteadyMarket),
        Arc::new(OneHit),
        Arc::new(UnreachablePages),
    );
    let local = mdtooling::DefaultToolRuntime::new(Arc::new(build_registry(local)));

    for (name, arguments) in cases {
        let call = ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments: arguments.to_string(),
        };
        let remote = runtime
            .execute(call.clone(), ToolExecutionContext::new("s-1"))
            .await
            .expect("remote call should succeed");
        let direct = local
            .execute(call, ToolExecutionContext::new("s-1"))
            .await
            .expect("local call should succeed");

        assert_eq!(remote.output, direct.output, "{name}");
    }

    let search = runtime
        .execute(
            ToolCall {
                id: "call_search".to_string(),
                name: "web_search".to_string(),
                arguments: "{\"query\":\"apple\"}".to_string(),
            },
            ToolExecutionContext::new("s-1"),
        )
        .await
        .expect("search should succeed");
    assert_eq!(search.output.value["results"][0]["full_markdown"], Value::Null);

    let targets = runtime
        .execute(
            ToolCall {
                id: "call_targets".to_string(),
                name: "analyst_price_targets".to_string(),
                arguments: "{\"ticker\":\"AAPL\"}".to_string(),
            },
            ToolExecutionContext::new("s-1"),
        )
        .await
        .expect("targets should succeed");
    assert_eq!(
        targets.output.value["mean"].as_f64().map(f64::to_bits),
        Some(FINE_MEAN.to_bits())
    );

    drop(runtime);
    shutdown_tx.send(()).expect("server still running");
    server
        .await
        .expect("server task joins")
        .expect("server exits cleanly");
}
