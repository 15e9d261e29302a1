//! Search-as-you-type sessions
//!
//! Every input change issues a new query with the next sequence number.
//! Inference can finish out of order, so a completion is applied only if it
//! belongs to the most recently issued query: last issued wins, not last
//! completed.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::search::{QueryEngine, QueryResult};

/// Handle for one issued query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueryTicket {
    sequence: u64,
}

impl QueryTicket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// What happened to a completed query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The results are now the displayed results
    Applied(Vec<QueryResult>),
    /// A newer query was issued meanwhile; the results were dropped
    Stale { sequence: u64, latest: u64 },
}

#[derive(Debug, Default)]
struct Displayed {
    sequence: u64,
    results: Vec<QueryResult>,
}

/// One search box bound to a query engine
pub struct SearchSession {
    engine: Arc<QueryEngine>,
    issued: AtomicU64,
    displayed: Mutex<Displayed>,
}

impl SearchSession {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        Self {
            engine,
            issued: AtomicU64::new(0),
            displayed: Mutex::new(Displayed::default()),
        }
    }

    pub fn engine(&self) -> &Arc<QueryEngine> {
        &self.engine
    }

    /// Take the next sequence number, making every earlier ticket stale
    pub fn issue(&self) -> QueryTicket {
        QueryTicket {
            sequence: self.issued.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    /// Sequence number of the most recently issued query (0 before any)
    pub fn latest(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Handle an input change: issue, run, and apply unless superseded
    ///
    /// A failed query that is still current clears the displayed results and
    /// returns the error; the engine itself stays usable.
    pub async fn on_input(&self, text: &str) -> Result<QueryOutcome> {
        let ticket = self.issue();
        log::debug!("Query #{}: {:?}", ticket.sequence, text);

        let outcome = self.engine.search(text).await;
        self.complete(ticket, outcome)
    }

    /// Apply the outcome of a ticket's query if it is still the latest
    pub fn complete(
        &self,
        ticket: QueryTicket,
        outcome: Result<Vec<QueryResult>>,
    ) -> Result<QueryOutcome> {
        let mut displayed = self.displayed.lock();

        let latest = self.latest();
        if ticket.sequence != latest || ticket.sequence < displayed.sequence {
            log::debug!(
                "Dropping stale query #{} (latest #{})",
                ticket.sequence,
                latest
            );
            return Ok(QueryOutcome::Stale {
                sequence: ticket.sequence,
                latest,
            });
        }

        displayed.sequence = ticket.sequence;
        match outcome {
            Ok(results) => {
                displayed.results = results.clone();
                Ok(QueryOutcome::Applied(results))
            }
            Err(e) => {
                log::warn!("Query #{} failed: {}", ticket.sequence, e);
                displayed.results.clear();
                Err(e)
            }
        }
    }

    /// Currently displayed results
    pub fn results(&self) -> Vec<QueryResult> {
        self.displayed.lock().results.clone()
    }

    /// Sequence number of the displayed results (0 before any)
    pub fn displayed_sequence(&self) -> u64 {
        self.displayed.lock().sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::embedding::Embedder;
    use crate::error::IndexError;
    use crate::index::{EmbeddingIndex, PageEmbedding};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::oneshot;

    /// Fixed vectors per text; texts with a gate wait until it is released
    struct GatedEmbedder {
        vectors: HashMap<&'static str, Vec<f32>>,
        gates: Mutex<HashMap<&'static str, oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl Embedder for GatedEmbedder {
        async fn embed(&self, text: &str) -> crate::error::Result<Vec<f32>> {
            let gate = self.gates.lock().remove(text);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| IndexError::embedding(text, "unknown text"))
        }

        fn model_id(&self) -> &str {
            "gated"
        }
    }

    fn engine_with_gate(gated_text: &'static str) -> (Arc<QueryEngine>, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let embedder = GatedEmbedder {
            vectors: HashMap::from([
                ("install", vec![1.0, 0.0]),
                ("search", vec![0.0, 1.0]),
                ("skewed", vec![1.0, 0.0, 0.0]),
            ]),
            gates: Mutex::new(HashMap::from([(gated_text, rx)])),
        };
        let index = EmbeddingIndex::from_entries(vec![
            PageEmbedding::new("install.md", vec![1.0, 0.0]),
            PageEmbedding::new("search.md", vec![0.0, 1.0]),
        ])
        .unwrap();
        let engine = QueryEngine::new(
            Arc::new(index),
            Arc::new(embedder),
            SearchConfig { limit: 1 },
        );
        (Arc::new(engine), tx)
    }

    fn top_path(session: &SearchSession) -> Option<String> {
        session.results().first().map(|r| r.path.clone())
    }

    #[test]
    fn test_tickets_are_monotonic() {
        let (engine, _gate) = engine_with_gate("install");
        let session = SearchSession::new(engine);
        assert_eq!(session.latest(), 0);

        let first = session.issue();
        let second = session.issue();
        assert!(second > first);
        assert_eq!(second.sequence(), 2);
        assert_eq!(session.latest(), 2);
    }

    #[test]
    fn test_out_of_order_completion_is_dropped() {
        let (engine, _gate) = engine_with_gate("install");
        let session = SearchSession::new(engine);
        let newer_results = vec![QueryResult {
            path: "search.md".to_string(),
            score: 1.0,
        }];

        let first = session.issue();
        let second = session.issue();

        let applied = session.complete(second, Ok(newer_results.clone())).unwrap();
        assert_eq!(applied, QueryOutcome::Applied(newer_results.clone()));

        let stale = session
            .complete(
                first,
                Ok(vec![QueryResult {
                    path: "install.md".to_string(),
                    score: 1.0,
                }]),
            )
            .unwrap();
        assert_eq!(
            stale,
            QueryOutcome::Stale {
                sequence: 1,
                latest: 2
            }
        );
        assert_eq!(session.results(), newer_results);
        assert_eq!(session.displayed_sequence(), 2);
    }

    #[tokio::test]
    async fn test_slow_earlier_query_does_not_overwrite_newer() {
        let (engine, release_install) = engine_with_gate("install");
        let session = Arc::new(SearchSession::new(engine));

        let background = Arc::clone(&session);
        let first = tokio::spawn(async move { background.on_input("install").await });
        while session.latest() < 1 {
            tokio::task::yield_now().await;
        }

        let second = session.on_input("search").await.unwrap();
        assert!(matches!(second, QueryOutcome::Applied(_)));
        assert_eq!(top_path(&session).as_deref(), Some("search.md"));

        release_install.send(()).unwrap();
        let first = first.await.unwrap().unwrap();
        assert_eq!(
            first,
            QueryOutcome::Stale {
                sequence: 1,
                latest: 2
            }
        );
        assert_eq!(top_path(&session).as_deref(), Some("search.md"));
    }

    #[tokio::test]
    async fn test_failed_query_clears_results_but_engine_survives() {
        let (engine, _gate) = engine_with_gate("never-used");
        let session = SearchSession::new(engine);

        session.on_input("install").await.unwrap();
        assert_eq!(top_path(&session).as_deref(), Some("install.md"));

        let err = session.on_input("skewed").await.unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
        assert!(session.results().is_empty());
        assert!(session.engine().is_enabled());

        session.on_input("search").await.unwrap();
        assert_eq!(top_path(&session).as_deref(), Some("search.md"));
    }

    #[tokio::test]
    async fn test_clearing_the_input_clears_results() {
        let (engine, _gate) = engine_with_gate("never-used");
        let session = SearchSession::new(engine);

        session.on_input("search").await.unwrap();
        assert!(!session.results().is_empty());

        let outcome = session.on_input("").await.unwrap();
        assert_eq!(outcome, QueryOutcome::Applied(Vec::new()));
        assert!(session.results().is_empty());
    }
}
