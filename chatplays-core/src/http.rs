//! HTTP client abstraction used by the identity lookups.
//!
//! The resolver only ever needs "GET this URL and give me the body", so that is
//! all the trait exposes. Tests swap in a canned implementation instead of
//! talking to the network.
//!
//! # Example Usage:
//! ```ignore
//! use chatplays_core::http::{HttpClient, DefaultHttpClient};
//!
//! let client: Arc<dyn HttpClient> = Arc::new(DefaultHttpClient::new()?);
//! let body = client.get("https://plc.directory/did:plc:xyz").await?;
//! ```

use std::time::Duration;
use async_trait::async_trait;
use reqwest;
use crate::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET `url`; non-2xx responses are errors.
    async fn get(&self, url: &str) -> Result<String, Error>;
}

#[derive(Clone)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}

impl DefaultHttpClient {
    pub fn new() -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for DefaultHttpClient {
    async fn get(&self, url: &str) -> Result<String, Error> {
        let response = self.client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn builds_with_the_request_timeout() {
        assert_ok!(DefaultHttpClient::new());
    }
}
