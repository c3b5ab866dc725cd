use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    sync::mpsc::{self, OwnedPermit},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::types::{PollEvent, PollReceiver, PollerConfig, StopReason};
use crate::{
    client::{QuoteClient, Transport},
    error::DexError,
    types::QuoteRequest,
};

const DEFAULT_CHANNEL_SIZE: usize = 100;
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Periodically refetches a quote.
///
/// Dropping the poller cancels the running session.
#[derive(Debug)]
pub struct QuotePoller<T: Transport + 'static = reqwest::Client> {
    client: Arc<QuoteClient<T>>,
    request: QuoteRequest,
    config: PollerConfig,
    events: mpsc::Sender<PollEvent>,
    session: Option<Session>,
}

#[derive(Debug)]
struct Session {
    cancel: CancellationToken,
    state: Arc<SessionState>,
    task: JoinHandle<()>,
}

/// State shared by the poller and its session task.
#[derive(Debug)]
struct SessionState {
    running: AtomicBool,
    /// Channel slot held for the session's `Stopped` event, so the stop
    /// notification fits even when the consumer lags behind.
    stop_slot: Mutex<Option<OwnedPermit<PollEvent>>>,
}

impl SessionState {
    fn new(stop_slot: Option<OwnedPermit<PollEvent>>) -> Self {
        Self {
            running: AtomicBool::new(true),
            stop_slot: Mutex::new(stop_slot),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn has_stop_slot(&self) -> bool {
        self.slot().is_some()
    }

    fn set_stop_slot(&self, permit: OwnedPermit<PollEvent>) {
        *self.slot() = Some(permit);
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<OwnedPermit<PollEvent>>> {
        self.stop_slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ends the session and delivers `Stopped(reason)`. Returns false if
    /// the session had already ended.
    fn finish(&self, reason: StopReason, events: &mpsc::Sender<PollEvent>) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        let event = PollEvent::Stopped(reason);
        match self.slot().take() {
            Some(permit) => {
                permit.send(event);
            }
            // Only a session that never got a slot and so never sent an
            // event, the channel is full of events of an earlier session.
            None => {
                if events.try_send(event).is_err() {
                    warn!(?reason, "event channel full or closed, stop notification dropped");
                }
            }
        }
        true
    }
}

impl<T: Transport + 'static> QuotePoller<T> {
    pub fn new(
        client: Arc<QuoteClient<T>>,
        request: QuoteRequest,
        config: PollerConfig,
    ) -> (Self, PollReceiver) {
        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);
        (
            Self {
                client,
                request,
                config,
                events: tx,
                session: None,
            },
            PollReceiver::new(rx),
        )
    }

    pub fn request(&self) -> &QuoteRequest {
        &self.request
    }

    pub fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.state.is_running())
    }

    /// Starts polling, the first fetch is issued immediately.
    ///
    /// No-op if already running. Must be called within a Tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let cancel = CancellationToken::new();
        let state = Arc::new(SessionState::new(
            self.events.clone().try_reserve_owned().ok(),
        ));
        let task = tokio::spawn(run_session(
            self.client.clone(),
            self.request.clone(),
            self.config,
            self.events.clone(),
            cancel.clone(),
            state.clone(),
        ));
        info!(
            sell_token = %self.request.sell_token,
            buy_token = %self.request.buy_token,
            amount = %self.request.amount,
            "quote polling started"
        );
        self.session = Some(Session {
            cancel,
            state,
            task,
        });
    }

    /// Stops polling and cancels the in-flight fetch.
    ///
    /// No-op if not running. Otherwise [`StopReason::Manual`] is the last
    /// event of the session.
    pub async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        session.cancel.cancel();
        if let Err(err) = session.task.await {
            warn!(%err, "quote polling task failed");
        }
        // Never blocks, the caller may be the only consumer.
        if session.state.finish(StopReason::Manual, &self.events) {
            info!("quote polling stopped");
        }
    }

    /// Changes the polled request. A running session is restarted so the
    /// new request is fetched immediately.
    pub async fn update_request(&mut self, update: impl FnOnce(&mut QuoteRequest)) {
        update(&mut self.request);
        if self.is_running() {
            self.stop().await;
            self.start();
        }
    }
}

impl<T: Transport + 'static> Drop for QuotePoller<T> {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.cancel.cancel();
        }
    }
}

async fn run_session<T: Transport + 'static>(
    client: Arc<QuoteClient<T>>,
    request: QuoteRequest,
    config: PollerConfig,
    events: mpsc::Sender<PollEvent>,
    cancel: CancellationToken,
    state: Arc<SessionState>,
) {
    if !state.has_stop_slot() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            permit = events.clone().reserve_owned() => match permit {
                Ok(permit) => state.set_stop_slot(permit),
                Err(_) => return,
            },
        }
    }

    let threshold = config.error_threshold.max(1);
    let mut ticker = tokio::time::interval(config.interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_errors = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let fetch_cancel = cancel.child_token();
        let event = match client.fetch_quote(&request, &fetch_cancel).await {
            Ok(quote) => {
                consecutive_errors = 0;
                debug!(total = %quote.total, splits = quote.splits.len(), "quote refreshed");
                PollEvent::Quote(quote)
            }
            // Own shutdown.
            Err(DexError::Cancelled) if cancel.is_cancelled() => break,
            Err(err) => {
                consecutive_errors += 1;
                warn!(%err, consecutive_errors, threshold, "quote refresh failed");
                PollEvent::Error(err)
            }
        };
        if !send(&events, &cancel, event).await {
            break;
        }

        if consecutive_errors >= threshold {
            if state.finish(StopReason::Errors, &events) {
                warn!(consecutive_errors, "too many errors, quote polling stopped");
            }
            break;
        }
    }
}

/// Returns false when the session should end.
async fn send(
    events: &mpsc::Sender<PollEvent>,
    cancel: &CancellationToken,
    event: PollEvent,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        res = events.send(event) => res.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;
    use crate::{
        Chain,
        client::HttpResponse,
        retry::RetryConfig,
        testing::{self, MockTransport},
    };

    const INTERVAL: Duration = Duration::from_secs(5);

    fn poller(
        transport: &MockTransport,
        threshold: u32,
    ) -> (QuotePoller<MockTransport>, PollReceiver) {
        let client = QuoteClient::with_transport(Chain::mainnet(), transport.clone())
            .with_retry(RetryConfig::none());
        QuotePoller::new(
            Arc::new(client),
            QuoteRequest::new(testing::eth_amount(1), testing::ETH, testing::STRK),
            PollerConfig::new(INTERVAL, threshold),
        )
    }

    fn server_error() -> HttpResponse {
        HttpResponse::new(502, "bad gateway")
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fetch_is_immediate() {
        let transport =
            MockTransport::new().with_fallback(HttpResponse::ok(testing::quote_json("-7", 1)));
        let (mut poller, mut rx) = poller(&transport, 3);

        let started = tokio::time::Instant::now();
        poller.start();
        assert!(poller.is_running());
        assert!(matches!(rx.recv().await, Some(PollEvent::Quote(q)) if q.total == U256::from(7)));
        assert_eq!(started.elapsed(), Duration::ZERO);

        // Then once per interval.
        assert!(matches!(rx.recv().await, Some(PollEvent::Quote(_))));
        assert_eq!(started.elapsed(), INTERVAL);
        assert!(matches!(rx.recv().await, Some(PollEvent::Quote(_))));
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let transport =
            MockTransport::new().with_fallback(HttpResponse::ok(testing::quote_json("-7", 1)));
        let (mut poller, mut rx) = poller(&transport, 3);

        poller.start();
        poller.start();
        assert!(matches!(rx.recv().await, Some(PollEvent::Quote(_))));
        tokio::time::sleep(INTERVAL / 2).await;
        assert_eq!(transport.request_count(), 1);
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_threshold_stops_once() {
        let transport = MockTransport::new().with_fallback(server_error());
        let (mut poller, mut rx) = poller(&transport, 3);

        poller.start();
        for _ in 0..3 {
            assert!(matches!(rx.recv().await, Some(PollEvent::Error(_))));
        }
        assert!(matches!(
            rx.recv().await,
            Some(PollEvent::Stopped(StopReason::Errors))
        ));
        assert!(!poller.is_running());

        tokio::time::sleep(INTERVAL * 10).await;
        assert_eq!(transport.request_count(), 3);
        assert!(rx.try_recv().is_none());

        // Already idle, no second stop notification.
        poller.stop().await;
        assert!(rx.try_recv().is_none());
    }

    fn lagging_poller(transport: &MockTransport) -> (QuotePoller<MockTransport>, PollReceiver) {
        let client = QuoteClient::with_transport(Chain::mainnet(), transport.clone())
            .with_retry(RetryConfig::none());
        QuotePoller::new(
            Arc::new(client),
            QuoteRequest::new(testing::eth_amount(1), testing::ETH, testing::STRK),
            PollerConfig::new(Duration::from_millis(10), DEFAULT_CHANNEL_SIZE as u32),
        )
    }

    fn drain(rx: &mut PollReceiver) -> (usize, Vec<StopReason>) {
        let (mut errors, mut stops) = (0, Vec::new());
        while let Some(event) = rx.try_recv() {
            match event {
                PollEvent::Error(_) => errors += 1,
                PollEvent::Stopped(reason) => stops.push(reason),
                PollEvent::Quote(_) => panic!("unexpected quote"),
            }
        }
        (errors, stops)
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_stop_reaches_lagging_consumer() {
        let transport = MockTransport::new().with_fallback(server_error());
        let (mut poller, mut rx) = lagging_poller(&transport);

        poller.start();
        tokio::time::sleep(Duration::from_secs(5)).await;
        // One slot stays reserved for the stop notification.
        assert_eq!(transport.request_count(), DEFAULT_CHANNEL_SIZE);

        for _ in 0..DEFAULT_CHANNEL_SIZE {
            assert!(matches!(rx.recv().await, Some(PollEvent::Error(_))));
        }
        assert!(matches!(
            rx.recv().await,
            Some(PollEvent::Stopped(StopReason::Errors))
        ));
        assert!(!poller.is_running());

        poller.stop().await;
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_stop_reaches_lagging_consumer() {
        let transport = MockTransport::new().with_fallback(server_error());
        let (mut poller, mut rx) = lagging_poller(&transport);

        poller.start();
        tokio::time::sleep(Duration::from_secs(5)).await;
        poller.stop().await;

        // The blocked error is cancelled with the session.
        let (errors, stops) = drain(&mut rx);
        assert_eq!(errors, DEFAULT_CHANNEL_SIZE - 1);
        assert_eq!(stops, [StopReason::Manual]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_error_count() {
        let transport = MockTransport::new()
            .with_fallback(HttpResponse::ok(testing::quote_json("-7", 1)));
        transport
            .push(server_error())
            .push(server_error())
            .push(HttpResponse::ok(testing::quote_json("-7", 1)))
            .push(server_error())
            .push(server_error());
        let (mut poller, mut rx) = poller(&transport, 3);

        poller.start();
        let mut kinds = Vec::new();
        for _ in 0..6 {
            kinds.push(match rx.recv().await.unwrap() {
                PollEvent::Quote(_) => "quote",
                PollEvent::Error(_) => "error",
                PollEvent::Stopped(_) => "stopped",
            });
        }
        assert_eq!(kinds, ["error", "error", "quote", "error", "error", "quote"]);
        assert!(poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_stop() {
        let transport =
            MockTransport::new().with_fallback(HttpResponse::ok(testing::quote_json("-7", 1)));
        let (mut poller, mut rx) = poller(&transport, 3);

        poller.start();
        assert!(matches!(rx.recv().await, Some(PollEvent::Quote(_))));
        poller.stop().await;
        assert!(!poller.is_running());
        assert!(matches!(
            rx.recv().await,
            Some(PollEvent::Stopped(StopReason::Manual))
        ));

        poller.stop().await;
        tokio::time::sleep(INTERVAL * 3).await;
        assert!(rx.try_recv().is_none());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_swallows_own_cancellation() {
        let transport = MockTransport::new()
            .with_delay(Duration::from_secs(30))
            .with_fallback(HttpResponse::ok(testing::quote_json("-7", 1)));
        let (mut poller, mut rx) = poller(&transport, 3);

        poller.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.request_count(), 1);
        poller.stop().await;

        assert!(matches!(
            rx.recv().await,
            Some(PollEvent::Stopped(StopReason::Manual))
        ));
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_request_restarts() {
        let transport =
            MockTransport::new().with_fallback(HttpResponse::ok(testing::quote_json("-7", 1)));
        let (mut poller, mut rx) = poller(&transport, 3);

        // Idle update only changes the request.
        poller
            .update_request(|r| r.amount = testing::eth_amount(2))
            .await;
        assert!(!poller.is_running());
        assert_eq!(transport.request_count(), 0);

        poller.start();
        assert!(matches!(rx.recv().await, Some(PollEvent::Quote(_))));

        poller.update_request(|r| r.buy_token = testing::USDC).await;
        assert!(poller.is_running());
        assert!(matches!(
            rx.recv().await,
            Some(PollEvent::Stopped(StopReason::Manual))
        ));
        assert!(matches!(rx.recv().await, Some(PollEvent::Quote(_))));

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].path().contains("2000000000000000000"));
        assert!(requests[1].path().ends_with(&testing::USDC.to_string()));
    }
}
