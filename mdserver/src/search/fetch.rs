use std::time::Duration;

use reqwest::Client;

use super::{PageFetcher, SearchFuture};
use crate::SourceError;

const RENDER_WIDTH: usize = 80;

/// Fetches pages over HTTP and renders them as plain text, one client-level
/// timeout bounding each fetch.
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|err| SourceError::transport(format!("failed to build http client: {err}")))?;

        Ok(Self { client })
    }
}

impl PageFetcher for HttpPageFetcher {
    fn fetch_text<'a>(&'a self, url: &'a str) -> SearchFuture<'a, String> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|err| SourceError::from_reqwest(err, url))?;

            let status = response.status();
            if !status.is_success() {
                return Err(SourceError::status(status.as_u16(), url));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|err| SourceError::from_reqwest(err, url))?;

            html2text::from_read(&bytes[..], RENDER_WIDTH)
                .map_err(|err| SourceError::decode(format!("could not render {url}: {err}")))
        })
    }
}
