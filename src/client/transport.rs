use std::future::Future;

use reqwest::header::RETRY_AFTER;
use url::Url;

use crate::error::DexError;

/// Status, rate-limit hint and body of an HTTP response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `Retry-After` header value.
    pub retry_after: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP GET capability used by [`super::QuoteClient`].
///
/// Implemented for [`reqwest::Client`]; tests plug in
/// [`crate::testing::MockTransport`].
pub trait Transport: Send + Sync {
    fn fetch(&self, url: Url) -> impl Future<Output = Result<HttpResponse, DexError>> + Send;
}

impl Transport for reqwest::Client {
    async fn fetch(&self, url: Url) -> Result<HttpResponse, DexError> {
        let response = reqwest::Client::get(self, url).send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await?;
        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}
