//! Quote poller keeping a quote fresh.
//!
//! [`QuotePoller`] fetches a quote immediately on [`QuotePoller::start`] and
//! then on every interval tick, delivering results as [`PollEvent`]s.
//!
//! # Architecture
//!
//! - [`QuotePoller`] - Owns the session (cancellation handle, running flag,
//!   background task) and the target request
//! - [`PollReceiver`] - Event stream of quotes, errors and stop notifications
//!
//! Fetches never overlap: a tick that fires while a fetch is in flight is
//! delayed until the fetch completes, so events arrive in fetch order.
//!
//! # Example
//!
//! ```ignore
//! use ekubo_quoter_sdk::{Chain, client::QuoteClient, poller::*, types::QuoteRequest};
//!
//! let client = QuoteClient::shared(Chain::mainnet());
//! let (mut poller, mut rx) = QuotePoller::new(client, request, PollerConfig::default());
//! poller.start();
//!
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         PollEvent::Quote(quote) => println!("total: {}", quote.total),
//!         PollEvent::Error(err) => eprintln!("quote failed: {err}"),
//!         PollEvent::Stopped(reason) => break,
//!     }
//! }
//! ```

mod session;
mod types;

pub use session::QuotePoller;
pub use types::{PollEvent, PollReceiver, PollerConfig, StopReason};
