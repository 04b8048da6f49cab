use crate::{error::WatcherError, PageSource};
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = "TwistedBoardWatcher/1.0 (Discord Bot)";
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// The one HTTP client of the process; clones share its connection pool.
pub fn build_client() -> Result<reqwest::Client, WatcherError> {
    Ok(reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Plain GET, no retries. Timeouts, transport errors and non-2xx all fail the same way.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        HttpFetcher { client }
    }
}

#[async_trait::async_trait]
impl PageSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, WatcherError> {
        debug!("Visit {}", url);
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WatcherError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp.text().await?)
    }
}
