//! Background search with debouncing and stale-result dropping.
//!
//! The owner thread sends tagged requests to a worker thread and the worker
//! answers with tagged responses. Only the response to the latest request is
//! applied; anything older is dropped on arrival.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::{SearchMatch, SearchState, find_matches};
use crate::document::Fragment;

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub seq: u64,
    pub query: String,
    pub fragments: Arc<Vec<Fragment>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResponse {
    pub seq: u64,
    pub query: String,
    pub matches: Vec<SearchMatch>,
}

/// Run a query on the calling thread.
pub fn search_blocking(fragments: &[Fragment], query: &str) -> Vec<SearchMatch> {
    find_matches(fragments, query)
}

/// Worker thread scanning fragments for queued requests.
///
/// When several requests are queued only the newest one is scanned.
#[derive(Debug)]
pub struct SearchWorker {
    requests: Option<Sender<SearchRequest>>,
    responses: Receiver<SearchResponse>,
    handle: Option<JoinHandle<()>>,
}

impl SearchWorker {
    pub fn spawn() -> std::io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<SearchRequest>();
        let (response_tx, response_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("instaview-search".to_string())
            .spawn(move || run_worker(&request_rx, &response_tx))?;
        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            handle: Some(handle),
        })
    }

    /// Queue a request. Returns false if the worker has gone away.
    pub fn submit(&self, request: SearchRequest) -> bool {
        let Some(requests) = &self.requests else {
            return false;
        };
        trace!(seq = request.seq, query = %request.query, "queue search");
        requests.send(request).is_ok()
    }

    pub fn try_recv(&self) -> Option<SearchResponse> {
        self.responses.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<SearchResponse> {
        match self.responses.recv_timeout(timeout) {
            Ok(response) => Some(response),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for SearchWorker {
    fn drop(&mut self) {
        self.requests = None;
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("search worker panicked");
        }
    }
}

fn run_worker(requests: &Receiver<SearchRequest>, responses: &Sender<SearchResponse>) {
    while let Ok(mut request) = requests.recv() {
        while let Ok(newer) = requests.try_recv() {
            trace!(skipped = request.seq, seq = newer.seq, "coalescing search requests");
            request = newer;
        }
        let matches = find_matches(&request.fragments, &request.query);
        debug!(seq = request.seq, matches = matches.len(), "search finished");
        let response = SearchResponse {
            seq: request.seq,
            query: request.query,
            matches,
        };
        if responses.send(response).is_err() {
            break;
        }
    }
}

/// Holds the latest query edit until it has been stable for `delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDebouncer {
    delay_ms: u64,
    pending: Option<(String, u64)>,
}

impl SearchDebouncer {
    pub const fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    pub fn queue(&mut self, query: impl Into<String>, now_ms: u64) {
        self.pending = Some((query.into(), now_ms));
    }

    pub fn take_ready(&mut self, now_ms: u64) -> Option<String> {
        let (_, queued_at) = self.pending.as_ref()?;
        if now_ms.saturating_sub(*queued_at) >= self.delay_ms {
            self.pending.take().map(|(query, _)| query)
        } else {
            None
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Owner-side search driver: debounce, dispatch, and apply only fresh results.
#[derive(Debug)]
pub struct SearchController {
    worker: SearchWorker,
    debouncer: SearchDebouncer,
    next_seq: u64,
    latest_seq: u64,
    state: SearchState,
}

impl SearchController {
    pub fn new(debounce_ms: u64) -> std::io::Result<Self> {
        Ok(Self {
            worker: SearchWorker::spawn()?,
            debouncer: SearchDebouncer::new(debounce_ms),
            next_seq: 0,
            latest_seq: 0,
            state: SearchState::default(),
        })
    }

    pub const fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SearchState {
        &mut self.state
    }

    pub const fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    pub const fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Record a query edit. Blank queries clear results immediately.
    pub fn query_changed(&mut self, query: &str, now_ms: u64) {
        if query.trim().is_empty() {
            self.clear();
            return;
        }
        self.debouncer.queue(query, now_ms);
    }

    /// Dispatch the debounced query once it is ready. Returns its sequence number.
    pub fn tick(&mut self, fragments: &Arc<Vec<Fragment>>, now_ms: u64) -> Option<u64> {
        let query = self.debouncer.take_ready(now_ms)?;
        Some(self.dispatch(fragments, query))
    }

    /// Send `query` to the worker right away, bypassing the debounce.
    pub fn dispatch(&mut self, fragments: &Arc<Vec<Fragment>>, query: String) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.latest_seq = seq;
        crate::perf::log_event("search.dispatch", format!("seq={seq} query={query}"));
        if !self.worker.submit(SearchRequest {
            seq,
            query,
            fragments: Arc::clone(fragments),
        }) {
            warn!(seq, "search worker is not running");
        }
        seq
    }

    /// Make every in-flight result stale and drop the current results.
    pub fn clear(&mut self) {
        self.debouncer.cancel();
        self.next_seq += 1;
        self.latest_seq = self.next_seq;
        self.state.clear();
    }

    /// Apply a response if it answers the latest request. Returns true if applied.
    pub fn accept(&mut self, response: SearchResponse) -> bool {
        if response.seq != self.latest_seq {
            debug!(seq = response.seq, latest = self.latest_seq, "dropping stale search result");
            return false;
        }
        self.state.set_results(response.query, response.matches);
        true
    }

    /// Drain finished responses. Returns true if the results changed.
    pub fn poll(&mut self) -> bool {
        let mut applied = false;
        while let Some(response) = self.worker.try_recv() {
            applied |= self.accept(response);
        }
        applied
    }

    /// Block until the latest request is answered or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        while let Some(response) = self.worker.recv_timeout(timeout) {
            if self.accept(response) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{RichText, TextSlot};

    fn fragments(texts: &[&str]) -> Arc<Vec<Fragment>> {
        Arc::new(
            texts
                .iter()
                .enumerate()
                .map(|(owner, text)| Fragment {
                    owner,
                    slot: TextSlot::Text,
                    text: Arc::new(RichText::plain(*text)),
                })
                .collect(),
        )
    }

    #[test]
    fn test_debouncer_waits_for_delay() {
        let mut debouncer = SearchDebouncer::new(300);
        debouncer.queue("he", 1000);
        debouncer.queue("hello", 1100);
        assert_eq!(debouncer.take_ready(1300), None);
        assert_eq!(debouncer.take_ready(1400), Some("hello".to_string()));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_debouncer_cancel() {
        let mut debouncer = SearchDebouncer::new(10);
        debouncer.queue("x", 0);
        debouncer.cancel();
        assert_eq!(debouncer.take_ready(100), None);
    }

    #[test]
    fn test_worker_answers_request() {
        let worker = SearchWorker::spawn().unwrap();
        assert!(worker.submit(SearchRequest {
            seq: 1,
            query: "world".to_string(),
            fragments: fragments(&["hello world"]),
        }));
        let response = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(response.seq, 1);
        assert_eq!(response.matches.len(), 1);
    }

    #[test]
    fn test_stale_response_is_dropped() {
        let mut controller = SearchController::new(0).unwrap();
        let stale = SearchResponse {
            seq: 1,
            query: "old".to_string(),
            matches: vec![SearchMatch {
                owner: 0,
                fragment: 0,
                start: 0,
                len: 3,
            }],
        };
        controller.latest_seq = 2;
        assert!(!controller.accept(stale));
        assert!(controller.state().matches().is_empty());

        let fresh = SearchResponse {
            seq: 2,
            query: "new".to_string(),
            matches: Vec::new(),
        };
        assert!(controller.accept(fresh));
        assert_eq!(controller.state().query(), "new");
    }

    #[test]
    fn test_older_result_never_replaces_newer() {
        let mut controller = SearchController::new(0).unwrap();
        let fragments = fragments(&["alpha beta", "beta"]);
        controller.dispatch(&fragments, "alpha".to_string());
        let latest = controller.dispatch(&fragments, "beta".to_string());
        assert!(controller.wait(Duration::from_secs(5)));
        assert_eq!(controller.latest_seq(), latest);
        assert_eq!(controller.state().query(), "beta");
        assert_eq!(controller.state().matches().len(), 2);
        // Anything still in flight is older and must not apply.
        controller.poll();
        assert_eq!(controller.state().query(), "beta");
    }

    #[test]
    fn test_clear_makes_in_flight_results_stale() {
        let mut controller = SearchController::new(0).unwrap();
        let fragments = fragments(&["alpha"]);
        controller.dispatch(&fragments, "alpha".to_string());
        controller.clear();
        assert!(!controller.wait(Duration::from_millis(200)));
        assert!(controller.state().matches().is_empty());
    }

    #[test]
    fn test_debounced_dispatch() {
        let mut controller = SearchController::new(100).unwrap();
        let fragments = fragments(&["gamma"]);
        controller.query_changed("gam", 0);
        assert!(controller.is_pending());
        assert_eq!(controller.tick(&fragments, 50), None);
        let seq = controller.tick(&fragments, 100).unwrap();
        assert!(controller.wait(Duration::from_secs(5)));
        assert_eq!(controller.latest_seq(), seq);
        assert_eq!(controller.state().matches().len(), 1);

        controller.query_changed("  ", 200);
        assert!(controller.state().matches().is_empty());
        assert!(!controller.is_pending());
    }
}
