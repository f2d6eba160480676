use serde::{Deserialize, Serialize};

use crate::search::{PageFetcher, SearchHit, SearchProvider};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Readable text of the page; `null` when the page could not be fetched.
    pub full_markdown: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchResults {
    pub results: Vec<WebSearchResult>,
}

/// Searches, then fetches each complete hit's page in order.
///
/// A search failure yields no results. Hits missing a title, URL, or snippet
/// are dropped; a failed page fetch only nulls that entry's `full_markdown`.
pub async fn web_search(
    search: &dyn SearchProvider,
    pages: &dyn PageFetcher,
    query: &str,
    max_results: usize,
) -> WebSearchResults {
    tracing::info!(phase = "tool", tool_name = "web_search", query, max_results, "searching");

    let hits = match search.search(query, max_results).await {
        Ok(hits) => hits,
        Err(error) => {
            tracing::warn!(
                phase = "tool",
                event = "search_failure",
                tool_name = "web_search",
                query,
                error_kind = ?error.kind,
                error = %error
            );
            return WebSearchResults::default();
        }
    };

    let mut results = Vec::new();
    for hit in hits {
        if results.len() == max_results {
            break;
        }

        let (title, url, snippet) = match hit {
            SearchHit {
                title: Some(title),
                url: Some(url),
                snippet: Some(snippet),
            } => (title, url, snippet),
            incomplete => {
                tracing::warn!(
                    phase = "tool",
                    event = "incomplete_hit_skipped",
                    tool_name = "web_search",
                    hit = ?incomplete
                );
                continue;
            }
        };

        let full_markdown = match pages.fetch_text(&url).await {
            Ok(text) => Some(text),
            Err(error) => {
                tracing::warn!(
                    phase = "tool",
                    event = "page_fetch_failure",
                    tool_name = "web_search",
                    url = %url,
                    error_kind = ?error.kind,
                    error = %error
                );
                None
            }
        };

        results.push(WebSearchResult {
            title,
            url,
            snippet,
            full_markdown,
        });
    }

    tracing::info!(
        phase = "tool",
        tool_name = "web_search",
        returned = results.len(),
        "search finished"
    );
    WebSearchResults { results }
}
