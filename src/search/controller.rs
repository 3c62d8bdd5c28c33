//! Search request controller
//!
//! Owns the lifecycle of a search: at most one request is in flight, every
//! request races a hard deadline, and every outcome is folded into a
//! [`SearchRequestState`] published through a `watch` channel.

use super::backend::SearchBackend;
use super::models::{
    ErrorKind, Hostel, RequestToken, SearchRequestState, NETWORK_ERROR_MESSAGE,
    SERVER_ERROR_FALLBACK, TIMEOUT_MESSAGE,
};
use crate::config::{Settings, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::error::{Result, SearchError};
use crate::network::HttpClient;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Single-flight search controller
///
/// `submit_query` publishes `Pending` synchronously and runs the request on a
/// spawned task, so it must be called from inside a Tokio runtime.
pub struct SearchController {
    shared: Arc<Shared>,
    backend: Arc<dyn SearchBackend>,
    timeout: Duration,
}

/// State shared between the controller and its request tasks
struct Shared {
    state: watch::Sender<SearchRequestState>,
    inflight: Mutex<InFlight>,
}

#[derive(Default)]
struct InFlight {
    /// Last token handed out
    issued: u64,
    /// Submission whose outcome may still be published
    current: Option<RequestToken>,
    /// Cancels the current request's call and deadline together
    cancel: Option<CancellationToken>,
}

/// How a request task finished
enum Outcome {
    Completed(Result<Value>),
    TimedOut,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, InFlight> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `state` only if `token` is still the current submission
    ///
    /// Runs under the same lock `submit_query` holds while superseding, so a
    /// stale outcome can never land after a newer `Pending`.
    fn resolve(&self, token: RequestToken, state: SearchRequestState) -> bool {
        let mut inflight = self.lock();
        if inflight.current != Some(token) {
            return false;
        }
        inflight.cancel = None;
        self.state.send_replace(state);
        true
    }
}

impl SearchController {
    /// Create a controller with the default 30 second deadline
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self::with_timeout(backend, Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS))
    }

    /// Create a controller with a custom deadline
    pub fn with_timeout(backend: Arc<dyn SearchBackend>, timeout: Duration) -> Self {
        let (state, _) = watch::channel(SearchRequestState::Idle);
        Self {
            shared: Arc::new(Shared {
                state,
                inflight: Mutex::new(InFlight::default()),
            }),
            backend,
            timeout,
        }
    }

    /// Build a controller backed by the HTTP client described in `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let client = HttpClient::with_settings(&settings.client)?;
        Ok(Self::with_timeout(
            Arc::new(client),
            settings.client.request_timeout(),
        ))
    }

    /// Deadline applied to every submission
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Submit a query, superseding any request still in flight
    ///
    /// The query is forwarded as-is; empty strings are not rejected.
    pub fn submit_query(&self, query: impl Into<String>) -> RequestToken {
        let query = query.into();
        let deadline = Instant::now() + self.timeout;
        let cancel = CancellationToken::new();

        let token = {
            let mut inflight = self.shared.lock();
            if let Some(previous) = inflight.cancel.take() {
                previous.cancel();
                if let Some(superseded) = inflight.current {
                    debug!(token = %superseded, "Superseding in-flight search");
                }
            }
            inflight.issued += 1;
            let token = RequestToken(inflight.issued);
            inflight.current = Some(token);
            inflight.cancel = Some(cancel.clone());
            self.shared.state.send_replace(SearchRequestState::Pending {
                token,
                query: query.clone(),
            });
            token
        };

        info!(%token, query = %query, "Submitting search to {}", self.backend.name());

        tokio::spawn(run_request(
            self.shared.clone(),
            self.backend.clone(),
            token,
            query,
            deadline,
            cancel,
        ));

        token
    }

    /// Cancel any in-flight request and go back to `Idle`
    pub fn clear(&self) {
        let mut inflight = self.shared.lock();
        if let Some(cancel) = inflight.cancel.take() {
            cancel.cancel();
        }
        inflight.current = None;
        self.shared.state.send_replace(SearchRequestState::Idle);
    }

    /// Whether a request is still waiting for its outcome
    pub fn is_in_flight(&self) -> bool {
        self.shared.lock().cancel.is_some()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SearchRequestState {
        self.shared.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SearchRequestState> {
        self.shared.state.subscribe()
    }

    /// Wait for the terminal state of `token`
    ///
    /// Returns `None` once the submission has been superseded or cleared.
    pub async fn settled(&self, token: RequestToken) -> Option<SearchRequestState> {
        let mut rx = self.subscribe();
        let state = rx
            .wait_for(|state| state.token() != Some(token) || state.is_terminal())
            .await
            .ok()?
            .clone();
        (state.token() == Some(token) && state.is_terminal()).then_some(state)
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        if let Some(cancel) = self.shared.lock().cancel.take() {
            cancel.cancel();
        }
    }
}

/// Race the backend call against the deadline and cancellation
async fn run_request(
    shared: Arc<Shared>,
    backend: Arc<dyn SearchBackend>,
    token: RequestToken,
    query: String,
    deadline: Instant,
    cancel: CancellationToken,
) {
    let start = Instant::now();

    // Whichever branch loses is dropped, which aborts the HTTP call or timer.
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(%token, "Search cancelled before it resolved");
            return;
        }
        _ = tokio::time::sleep_until(deadline) => Outcome::TimedOut,
        result = backend.search(&query) => Outcome::Completed(result),
    };

    let elapsed_ms = start.elapsed().as_millis() as u64;
    let state = classify(token, query, outcome);

    let failure = state.error().map(|(kind, message)| (kind, message.to_string()));
    let found = state.results().len();

    if !shared.resolve(token, state) {
        debug!(%token, elapsed_ms, "Discarding outcome of superseded search");
        return;
    }

    match failure {
        Some((kind, message)) => {
            warn!(%token, elapsed_ms, %kind, "Search failed: {}", message);
        }
        None => info!(%token, elapsed_ms, "Search returned {} hostels", found),
    }
}

/// Fold an outcome into the state published for `token`
fn classify(token: RequestToken, query: String, outcome: Outcome) -> SearchRequestState {
    let failed = |query, kind, message: String| SearchRequestState::Failed {
        token,
        query,
        kind,
        message,
    };

    match outcome {
        Outcome::TimedOut => failed(query, ErrorKind::Timeout, TIMEOUT_MESSAGE.to_string()),
        Outcome::Completed(Ok(body)) => SearchRequestState::Succeeded {
            token,
            query,
            results: Hostel::list_from(body),
        },
        Outcome::Completed(Err(SearchError::Status { status, body })) => {
            debug!(%token, status, "Search service returned an error status");
            failed(query, ErrorKind::ServerError, server_message(&body))
        }
        Outcome::Completed(Err(err)) => {
            debug!(%token, error = %err, "Search request failed");
            failed(
                query,
                ErrorKind::NetworkError,
                NETWORK_ERROR_MESSAGE.to_string(),
            )
        }
    }
}

/// Extract the `error` string from a failure body, or fall back to the generic message
fn server_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|value| value.get("error"))
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| SERVER_ERROR_FALLBACK.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    /// Backend whose behaviour is a function of the query
    struct FnBackend<F>(F);

    #[async_trait]
    impl<F> SearchBackend for FnBackend<F>
    where
        F: Fn(String) -> BoxFuture<'static, Result<Value>> + Send + Sync,
    {
        async fn search(&self, query: &str) -> Result<Value> {
            (self.0)(query.to_string()).await
        }
    }

    fn controller<F>(f: F) -> SearchController
    where
        F: Fn(String) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
    {
        SearchController::new(Arc::new(FnBackend(f)))
    }

    fn respond(body: Value) -> SearchController {
        controller(move |_| {
            let body = body.clone();
            async move { Ok::<_, SearchError>(body) }.boxed()
        })
    }

    fn fail_with(make: fn() -> SearchError) -> SearchController {
        controller(move |_| async move { Err::<Value, _>(make()) }.boxed())
    }

    /// Sets a flag when the backend future is dropped
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_submit_publishes_pending_synchronously() {
        let controller = controller(|_| futures::future::pending().boxed());
        assert_eq!(controller.state(), SearchRequestState::Idle);

        let token = controller.submit_query("cheap rooms");
        assert_eq!(
            controller.state(),
            SearchRequestState::Pending {
                token,
                query: "cheap rooms".into()
            }
        );
        assert!(controller.is_in_flight());
    }

    #[tokio::test]
    async fn test_success_keeps_query_and_results() {
        let controller = respond(json!([{"id": "1", "name": "Sunrise"}]));
        let token = controller.submit_query("near campus");

        let state = controller.settled(token).await.unwrap();
        assert_eq!(state.query(), Some("near campus"));
        assert_eq!(state.results().len(), 1);
        assert_eq!(state.results()[0].name(), Some("Sunrise"));
        assert!(!controller.is_in_flight());
    }

    #[tokio::test]
    async fn test_non_array_body_is_empty_success() {
        let controller = respond(json!({"message": "No matching hostels found"}));
        let token = controller.submit_query("castle");

        let state = controller.settled(token).await.unwrap();
        assert!(matches!(state, SearchRequestState::Succeeded { ref results, .. } if results.is_empty()));
    }

    #[tokio::test]
    async fn test_empty_query_is_forwarded() {
        let controller = controller(|query| async move { Ok::<_, SearchError>(json!([{ "name": query }])) }.boxed());
        let token = controller.submit_query("");
        assert!(controller.state().is_pending());

        let state = controller.settled(token).await.unwrap();
        assert_eq!(state.query(), Some(""));
        assert_eq!(state.results()[0].name(), Some(""));
    }

    #[tokio::test]
    async fn test_server_error_message_from_body() {
        let controller = fail_with(|| SearchError::Status {
            status: 500,
            body: r#"{"error":"index unavailable"}"#.into(),
        });
        let token = controller.submit_query("x");

        let state = controller.settled(token).await.unwrap();
        assert_eq!(
            state.error(),
            Some((ErrorKind::ServerError, "index unavailable"))
        );
        assert!(state.results().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_without_usable_body() {
        let controller = fail_with(|| SearchError::Status {
            status: 502,
            body: "<html>Bad Gateway</html>".into(),
        });
        let token = controller.submit_query("x");

        let state = controller.settled(token).await.unwrap();
        assert_eq!(state.error(), Some((ErrorKind::ServerError, "Search failed")));
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let controller = fail_with(|| SearchError::Http("connection refused".into()));
        let token = controller.submit_query("x");

        let state = controller.settled(token).await.unwrap();
        assert_eq!(
            state.error(),
            Some((ErrorKind::NetworkError, NETWORK_ERROR_MESSAGE))
        );
    }

    #[tokio::test]
    async fn test_unreadable_success_body_is_network_error() {
        let controller = fail_with(|| SearchError::Parse("expected value".into()));
        let token = controller.submit_query("x");

        let state = controller.settled(token).await.unwrap();
        assert_eq!(state.error().map(|(kind, _)| kind), Some(ErrorKind::NetworkError));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_at_deadline() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = dropped.clone();
        let controller = controller(move |_| {
            let guard = DropFlag(flag.clone());
            async move {
                let _guard = guard;
                futures::future::pending::<Result<Value>>().await
            }
            .boxed()
        });

        let start = Instant::now();
        let token = controller.submit_query("never answers");
        let state = controller.settled(token).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(state.error(), Some((ErrorKind::Timeout, TIMEOUT_MESSAGE)));
        assert!(elapsed >= Duration::from_millis(30_000));
        assert!(elapsed < Duration::from_millis(30_100));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_just_before_deadline_wins() {
        let controller = controller(|_| {
            async move {
                tokio::time::sleep(Duration::from_millis(29_999)).await;
                Ok::<_, SearchError>(json!([]))
            }
            .boxed()
        });
        let token = controller.submit_query("slow but fine");

        let state = controller.settled(token).await.unwrap();
        assert!(matches!(state, SearchRequestState::Succeeded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_submission_wins_regardless_of_arrival_order() {
        let dropped = Arc::new(AtomicBool::new(false));
        let started = Arc::new(Notify::new());
        let (flag, first_started) = (dropped.clone(), started.clone());
        let controller = controller(move |query| {
            let guard = (query == "first").then(|| {
                first_started.notify_one();
                DropFlag(flag.clone())
            });
            async move {
                let _guard = guard;
                let delay = if query == "first" { 10_000 } else { 1_000 };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<_, SearchError>(json!([{ "name": query }]))
            }
            .boxed()
        });

        let first = controller.submit_query("first");
        started.notified().await;
        let second = controller.submit_query("second");
        assert!(second > first);
        assert_eq!(second.get(), first.get() + 1);
        assert_eq!(controller.state().query(), Some("second"));

        let state = controller.settled(second).await.unwrap();
        assert_eq!(state.results()[0].name(), Some("second"));
        assert_eq!(controller.settled(first).await, None);
        assert!(dropped.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(20_000)).await;
        assert_eq!(controller.state().token(), Some(second));
        assert_eq!(controller.state().results()[0].name(), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_controller_cancels_request() {
        let dropped = Arc::new(AtomicBool::new(false));
        let started = Arc::new(Notify::new());
        let (flag, backend_started) = (dropped.clone(), started.clone());
        let controller = controller(move |_| {
            backend_started.notify_one();
            let guard = DropFlag(flag.clone());
            async move {
                let _guard = guard;
                futures::future::pending::<Result<Value>>().await
            }
            .boxed()
        });

        let mut rx = controller.subscribe();
        controller.submit_query("abandoned");
        started.notified().await;
        assert!(!dropped.load(Ordering::SeqCst));

        drop(controller);
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(dropped.load(Ordering::SeqCst));
        assert!(rx.borrow_and_update().is_pending());
    }

    #[tokio::test]
    async fn test_stale_outcome_is_discarded() {
        let controller = controller(|_| futures::future::pending().boxed());
        let first = controller.submit_query("a");
        let second = controller.submit_query("b");

        let stale = SearchRequestState::Succeeded {
            token: first,
            query: "a".into(),
            results: vec![],
        };
        assert!(!controller.shared.resolve(first, stale));
        assert_eq!(
            controller.state(),
            SearchRequestState::Pending {
                token: second,
                query: "b".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_and_goes_idle() {
        let controller = controller(|_| {
            async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, SearchError>(json!([{"name": "late"}]))
            }
            .boxed()
        });
        let token = controller.submit_query("anything");
        controller.clear();

        assert_eq!(controller.state(), SearchRequestState::Idle);
        assert!(!controller.is_in_flight());
        assert_eq!(controller.settled(token).await, None);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(controller.state(), SearchRequestState::Idle);
    }

    #[tokio::test]
    async fn test_settled_returns_result_published_earlier() {
        let controller = respond(json!([{"name": "Harbour"}]));
        let token = controller.submit_query("sea view");

        let mut rx = controller.subscribe();
        rx.wait_for(SearchRequestState::is_terminal).await.unwrap();

        let state = controller.settled(token).await.unwrap();
        assert_eq!(state.results()[0].name(), Some("Harbour"));
    }

    #[tokio::test]
    async fn test_subscriber_sees_pending_then_terminal() {
        let controller = respond(json!([]));
        let mut rx = controller.subscribe();

        let token = controller.submit_query("q");
        assert!(rx.borrow_and_update().is_pending());

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert!(state.is_terminal());
        assert_eq!(state.token(), Some(token));
    }

    #[test]
    fn test_server_message_extraction() {
        assert_eq!(server_message(r#"{"error":"index unavailable"}"#), "index unavailable");
        assert_eq!(server_message(r#"{"error":""}"#), "Search failed");
        assert_eq!(server_message(r#"{"error":42}"#), "Search failed");
        assert_eq!(server_message(r#"{"detail":"nope"}"#), "Search failed");
        assert_eq!(server_message(""), "Search failed");
    }
}
