//! DuckDuckGo search over the HTML endpoint, which needs no API key.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use super::{SearchFuture, SearchHit, SearchProvider};
use crate::SourceError;

const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
const SEARCH_TIMEOUT_SECS: u64 = 15;

/// Result links are looked up this far past each title for a snippet.
const SNIPPET_WINDOW: usize = 2000;

pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(user_agent: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .build()
            .map_err(|err| SourceError::transport(format!("failed to build http client: {err}")))?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            endpoint: SEARCH_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl SearchProvider for DuckDuckGoSearch {
    fn search<'a>(&'a self, query: &'a str, max_results: usize) -> SearchFuture<'a, Vec<SearchHit>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.endpoint)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(format!("q={}&b=", urlencoding::encode(query)))
                .send()
                .await
                .map_err(|err| SourceError::from_reqwest(err, "DuckDuckGo"))?;

            let status = response.status();
            if !status.is_success() {
                return Err(SourceError::status(status.as_u16(), "DuckDuckGo"));
            }

            let html = response
                .text()
                .await
                .map_err(|err| SourceError::from_reqwest(err, "DuckDuckGo"))?;

            Ok(parse_results(&html, max_results))
        })
    }
}

/// Extracts result blocks from the HTML page.
///
/// Each block is an `<a class="result__a" href=...>TITLE</a>` followed by an
/// element with `class="result__snippet"`. Blocks missing pieces are still
/// returned, with the missing fields left `None`.
fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    const MARKER: &str = "class=\"result__a\"";

    let mut hits = Vec::new();
    let mut pos = 0;

    while hits.len() < max_results {
        let Some(offset) = html[pos..].find(MARKER) else {
            break;
        };
        let marker_pos = pos + offset;
        pos = marker_pos + MARKER.len();

        let Some(tag_start) = html[..marker_pos].rfind("<a ") else {
            continue;
        };
        let Some(tag_end) = html[tag_start..].find('>').map(|end| tag_start + end) else {
            break;
        };
        let Some(title_end) = html[tag_end..].find("</a>").map(|end| tag_end + end) else {
            break;
        };

        let url = extract_attr(&html[tag_start..tag_end], "href")
            .map(|href| resolve_redirect(&href))
            .filter(|url| !url.is_empty());
        let title = Some(strip_tags(&html[tag_end + 1..title_end])).filter(|title| !title.is_empty());
        let snippet = snippet_after(html, title_end).filter(|snippet| !snippet.is_empty());

        hits.push(SearchHit {
            title,
            url,
            snippet,
        });
        pos = title_end + "</a>".len();
    }

    hits
}

fn snippet_after(html: &str, from: usize) -> Option<String> {
    let mut window_end = (from + SNIPPET_WINDOW).min(html.len());
    while !html.is_char_boundary(window_end) {
        window_end -= 1;
    }
    let window = html.get(from..window_end)?;

    // A snippet that belongs to the next result is not ours.
    let class_pos = window.find("class=\"result__snippet\"")?;
    if window[..class_pos].contains("class=\"result__a\"") {
        return None;
    }

    let body_start = window[class_pos..].find('>')? + class_pos + 1;
    let body_end = window[body_start..]
        .find("</a>")
        .or_else(|| window[body_start..].find("</div>"))?
        + body_start;
    Some(strip_tags(&window[body_start..body_end]))
}

/// DuckDuckGo wraps destinations as `//duckduckgo.com/l/?uddg=ENCODED&...`.
fn resolve_redirect(href: &str) -> String {
    if let Some(rest) = href
        .strip_prefix("//duckduckgo.com/l/?uddg=")
        .or_else(|| href.strip_prefix("/l/?uddg="))
    {
        let encoded = rest.split('&').next().unwrap_or(rest);
        urlencoding::decode(encoded)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| href.to_string())
    } else if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        String::new()
    }
}

fn extract_attr(tag: &str, attr: &str) -> Option<String> {
    let pattern = format!("{attr}=\"");
    let start = tag.find(&pattern)? + pattern.len();
    let end = tag[start..].find('"')? + start;
    Some(decode_entities(&tag[start..end]))
}

fn strip_tags(fragment: &str) -> String {
    let mut text = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    decode_entities(text.trim())
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
