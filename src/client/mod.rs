//! Quoter API client.
//!
//! [`QuoteClient`] builds quote requests for a [`Chain`], drives them through
//! [`retry::with_retry`] and normalizes the response into a [`Quote`].
//!
//! The quoter API always phrases a request as "amount of A to B" where A is
//! the token whose amount is specified, so exact-output requests swap the
//! order of the sell and buy tokens on the wire, see
//! [`QuoteRequest::wire_tokens`].

mod transport;

use std::{sync::Arc, time::Duration};

use alloy::primitives::{I256, U256};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

pub use transport::{HttpResponse, Transport};

use crate::{
    Chain,
    address::ContractAddress,
    error::DexError,
    num,
    retry::{self, RetryConfig},
    types::{Quote, QuoteRequest, Split},
};

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct QuoteClient<T = reqwest::Client> {
    transport: T,
    chain: Chain,
    retry: RetryConfig,
    timeout: Duration,
}

impl QuoteClient<reqwest::Client> {
    pub fn new(chain: Chain) -> Self {
        Self::with_transport(chain, reqwest::Client::new())
    }

    /// Client meant to be shared by the whole application.
    pub fn shared(chain: Chain) -> Arc<Self> {
        Arc::new(Self::new(chain))
    }
}

impl<T: Transport> QuoteClient<T> {
    pub fn with_transport(chain: Chain, transport: T) -> Self {
        Self {
            transport,
            chain,
            retry: RetryConfig::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Timeout of a single attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `{api_url}/{chain_id}/{amount}/{specified_token}/{other_token}`
    pub fn quote_url(&self, request: &QuoteRequest) -> Result<Url, DexError> {
        let invalid = |reason: String| DexError::InvalidChain(format!("{}: {reason}", self.chain.name()));
        let mut url = Url::parse(self.chain.api_url()).map_err(|e| invalid(e.to_string()))?;
        let (from, to) = request.wire_tokens();
        url.path_segments_mut()
            .map_err(|_| invalid("api url can not be a base".to_string()))?
            .pop_if_empty()
            .push(&self.chain.chain_id().to_string())
            .push(&request.amount.to_string())
            .push(&from.to_string())
            .push(&to.to_string());
        Ok(url)
    }

    /// Fetches a quote, retrying transient failures.
    ///
    /// `cancel` aborts the request at any point with [`DexError::Cancelled`].
    pub async fn fetch_quote(
        &self,
        request: &QuoteRequest,
        cancel: &CancellationToken,
    ) -> Result<Quote, DexError> {
        let url = self.quote_url(request)?;
        debug!(%url, "fetching quote");
        retry::with_retry(&self.retry, cancel, move |attempt| {
            let url = url.clone();
            async move {
                trace!(%url, attempt, "quote attempt");
                let response =
                    retry::with_deadline(cancel, self.timeout, self.transport.fetch(url)).await?;
                parse_response(response)
            }
        })
        .await
    }

    /// Quotes `amount` of `sell_token` in the chain's USD stablecoin and
    /// returns the total only.
    pub async fn fetch_quote_in_usdc(
        &self,
        amount: I256,
        sell_token: ContractAddress,
        cancel: &CancellationToken,
    ) -> Result<U256, DexError> {
        let request = QuoteRequest::new(amount, sell_token, self.chain.usd_token());
        self.fetch_quote(&request, cancel).await.map(|q| q.total)
    }

    /// Fetches all quotes concurrently.
    ///
    /// Each request runs under its own child of `cancel`, results are
    /// returned in request order.
    pub async fn fetch_quotes(
        &self,
        requests: &[QuoteRequest],
        cancel: &CancellationToken,
    ) -> Vec<Result<Quote, DexError>> {
        futures::future::join_all(requests.iter().map(|request| {
            let cancel = cancel.child_token();
            async move { self.fetch_quote(request, &cancel).await }
        }))
        .await
    }

    /// Fetches all quotes and returns the index and quote of the best
    /// executable one: the largest total received for exact input requests,
    /// the smallest total paid for exact output requests.
    ///
    /// Meant for candidates of the same direction, e.g. several sell tokens
    /// for one buy token. Mixing exact input and exact output requests fails
    /// with [`DexError::InvalidAmount`] before anything is fetched.
    pub async fn fetch_best_quote(
        &self,
        requests: &[QuoteRequest],
        cancel: &CancellationToken,
    ) -> Result<(usize, Quote), DexError> {
        let exact_output = requests.first().is_some_and(QuoteRequest::is_exact_output);
        if requests.iter().any(|r| r.is_exact_output() != exact_output) {
            return Err(DexError::InvalidAmount(
                "candidates mix exact input and exact output".to_string(),
            ));
        }
        let is_better = |candidate: &Quote, best: &Quote| {
            if exact_output {
                candidate.total < best.total
            } else {
                candidate.total > best.total
            }
        };

        let mut best: Option<(usize, Quote)> = None;
        let mut first_err = None;
        for (idx, result) in self.fetch_quotes(requests, cancel).await.into_iter().enumerate() {
            match result {
                Ok(quote) if quote.is_executable() => {
                    if best.as_ref().is_none_or(|(_, b)| is_better(&quote, b)) {
                        best = Some((idx, quote));
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        best.ok_or_else(|| {
            first_err.unwrap_or_else(|| DexError::Liquidity("no executable route".to_string()))
        })
    }
}

#[derive(Deserialize)]
struct RawQuote {
    #[serde(default)]
    price_impact: Option<f64>,
    #[serde(deserialize_with = "num::serde_int::signed")]
    total_calculated: I256,
    #[serde(default)]
    splits: Vec<Split>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl From<RawQuote> for Quote {
    fn from(raw: RawQuote) -> Self {
        Self {
            price_impact: raw.price_impact.unwrap_or_default(),
            // Sign only marks the direction upstream.
            total: raw.total_calculated.unsigned_abs(),
            splits: raw.splits,
        }
    }
}

/// Classifies a quoter API response.
pub(crate) fn parse_response(response: HttpResponse) -> Result<Quote, DexError> {
    if response.is_success() {
        return parse_quote(&response.body);
    }
    match response.status {
        404 => Err(match serde_json::from_str::<ErrorBody>(&response.body) {
            Ok(body) => DexError::from_api_message(Some(404), body.error),
            Err(_) => DexError::Api {
                status: Some(404),
                message: response.body,
            },
        }),
        429 => Err(DexError::RateLimit {
            retry_after: response
                .retry_after
                .as_deref()
                .and_then(|v| retry::parse_retry_after(v, Utc::now())),
        }),
        status => Err(DexError::Api {
            status: Some(status),
            message: serde_json::from_str::<ErrorBody>(&response.body)
                .map(|b| b.error)
                .unwrap_or(response.body),
        }),
    }
}

fn parse_quote(body: &str) -> Result<Quote, DexError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = error
            .as_str()
            .map(str::to_owned)
            .unwrap_or_else(|| error.to_string());
        return Err(DexError::from_api_message(None, message));
    }
    Ok(serde_json::from_value::<RawQuote>(value)?.into())
}
