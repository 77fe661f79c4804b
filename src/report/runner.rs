use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::debounce::Debouncer;
use super::query::{ReportQuery, SearchRequest};
use super::sequencer::SearchSequencer;
use crate::api::{ApiError, Page};

/// A server search endpoint behind one report view.
#[async_trait]
pub trait SearchBackend: Send + Sync + 'static {
    type Row: Clone + Send + Sync + 'static;

    async fn search(&self, request: &SearchRequest) -> Result<Page<Self::Row>, ApiError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportState<R> {
    pub rows: Vec<R>,
    pub total_count: u64,
    pub page: u32,
    pub loading: bool,
    pub error: Option<String>,
    /// Request the rows above answer.
    pub request: Option<SearchRequest>,
    pub searches_issued: u64,
}

impl<R> Default for ReportState<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            total_count: 0,
            page: 1,
            loading: false,
            error: None,
            request: None,
            searches_issued: 0,
        }
    }
}

/// Debounced query changes in, search results out. Responses that belong to
/// a superseded search are dropped when the sequencer guards.
pub struct ReportRunner<B: SearchBackend> {
    debouncer: Debouncer<SearchRequest>,
    state: watch::Receiver<ReportState<B::Row>>,
}

impl<B: SearchBackend> ReportRunner<B> {
    pub fn spawn(backend: Arc<B>, window: Duration, sequencer: Arc<SearchSequencer>) -> Self {
        let (debouncer, mut settled) = Debouncer::<SearchRequest>::spawn(window);
        let (state_tx, state) = watch::channel(ReportState::default());
        let state_tx = Arc::new(state_tx);

        tokio::spawn(async move {
            while let Some(request) = settled.recv().await {
                let ticket = sequencer.issue();
                state_tx.send_modify(|s| {
                    s.loading = true;
                    s.searches_issued += 1;
                });
                debug!(ticket = ticket.id(), page = request.page, "report search issued");

                let backend = backend.clone();
                let sequencer = sequencer.clone();
                let state_tx = state_tx.clone();
                tokio::spawn(async move {
                    let result = backend.search(&request).await;
                    if !sequencer.is_current(ticket) {
                        debug!(ticket = ticket.id(), "stale report response dropped");
                        return;
                    }
                    state_tx.send_modify(|s| {
                        s.loading = false;
                        match result {
                            Ok(page) => {
                                s.rows = page.items;
                                s.total_count = page.total_count;
                                s.page = page.page;
                                s.error = None;
                            }
                            Err(err) => {
                                warn!(error = %err, "report search failed");
                                s.error = Some(err.to_string());
                            }
                        }
                        s.request = Some(request);
                    });
                });
            }
        });

        Self { debouncer, state }
    }

    /// Queues the current controls; searches start once they settle.
    pub fn submit(&self, query: &ReportQuery) -> bool {
        self.debouncer.push(query.to_request())
    }

    pub fn state(&self) -> watch::Receiver<ReportState<B::Row>> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> ReportState<B::Row> {
        self.state.borrow().clone()
    }
}
