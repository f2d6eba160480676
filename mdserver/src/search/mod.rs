//! Web search and page retrieval used by `web_search`.

mod duckduckgo;
mod fetch;

use mdcommon::BoxFuture;

use crate::SourceError;

pub use duckduckgo::DuckDuckGoSearch;
pub use fetch::HttpPageFetcher;

pub type SearchFuture<'a, T> = BoxFuture<'a, Result<T, SourceError>>;

/// A raw search hit. Providers report whatever they could extract; fields a
/// provider could not find are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHit {
    pub title: Option<String>,
    pub url: Option<String>,
    pub snippet: Option<String>,
}

impl SearchHit {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
            snippet: Some(snippet.into()),
        }
    }
}

pub trait SearchProvider: Send + Sync {
    /// Returns at most `max_results` raw hits.
    fn search<'a>(&'a self, query: &'a str, max_results: usize) -> SearchFuture<'a, Vec<SearchHit>>;
}

pub trait PageFetcher: Send + Sync {
    /// Fetches `url` and converts its body to readable text.
    fn fetch_text<'a>(&'a self, url: &'a str) -> SearchFuture<'a, String>;
}
