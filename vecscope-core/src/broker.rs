//! Request broker
//!
//! Controller side of the worker protocol. Every request gets a fresh id and
//! a pending record before it is sent; the dispatcher task settles exactly
//! that record when the correlated response arrives, whatever the arrival
//! order. If the worker goes away, every pending request is rejected and the
//! readiness signal is failed once.

use crate::error::{Result, VecscopeError};
use crate::protocol::{EmbeddingPayload, RequestId, TextInput, WorkerRequest, WorkerResponse};
use crate::readiness::ReadinessSignal;
use crate::worker::WorkerChannels;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Correlation record for one in-flight request
struct PendingRequest {
    kind: &'static str,
    reply: oneshot::Sender<Result<WorkerResponse>>,
}

#[derive(Default)]
struct PendingTable {
    requests: HashMap<RequestId, PendingRequest>,
    /// Set once the worker is gone; no new records are accepted after that.
    disconnected: bool,
}

struct BrokerInner {
    next_id: AtomicU64,
    pending: Mutex<PendingTable>,
    requests: mpsc::UnboundedSender<WorkerRequest>,
    readiness: ReadinessSignal,
}

/// Issues correlated requests to a worker and routes its responses
#[derive(Clone)]
pub struct RequestBroker {
    inner: Arc<BrokerInner>,
}

impl RequestBroker {
    /// Take over a worker's channels and start dispatching its responses.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(channels: WorkerChannels) -> Self {
        let WorkerChannels {
            requests,
            responses,
        } = channels;

        let inner = Arc::new(BrokerInner {
            next_id: AtomicU64::new(0),
            pending: Mutex::new(PendingTable::default()),
            requests,
            readiness: ReadinessSignal::new(),
        });

        tokio::spawn(dispatch(Arc::clone(&inner), responses));
        Self { inner }
    }

    /// Model readiness as reported by the worker
    pub fn readiness(&self) -> &ReadinessSignal {
        &self.inner.readiness
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().requests.len()
    }

    /// Embed one text (`dims = [D]`) or a batch (`dims = [N, D]`).
    pub async fn embed(&self, text: impl Into<TextInput>) -> Result<EmbeddingPayload> {
        let text = text.into();
        match self.request(|id| WorkerRequest::Embed { id, text }).await? {
            WorkerResponse::Complete { embedding, .. } => Ok(embedding),
            other => Err(unexpected("complete", &other)),
        }
    }

    /// Fit the worker's reducer on the corpus and get its coordinates.
    pub async fn reduce_corpus(&self, embedding: &EmbeddingPayload) -> Result<Vec<Vec<f32>>> {
        let embedding = embedding.clone();
        match self
            .request(|id| WorkerRequest::ReduceCorpus { id, embedding })
            .await?
        {
            WorkerResponse::CorpusReduced { corpus_3d, .. } => Ok(corpus_3d),
            other => Err(unexpected("corpusReduced", &other)),
        }
    }

    /// Project embeddings into the already fitted space.
    pub async fn project_query(&self, embedding: &EmbeddingPayload) -> Result<Vec<Vec<f32>>> {
        let embedding = embedding.clone();
        match self
            .request(|id| WorkerRequest::ProjectQuery { id, embedding })
            .await?
        {
            WorkerResponse::QueryProjected { query_3d, .. } => Ok(query_3d),
            other => Err(unexpected("queryProjected", &other)),
        }
    }

    async fn request<F>(&self, build: F) -> Result<WorkerResponse>
    where
        F: FnOnce(RequestId) -> WorkerRequest,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let request = build(id);
        let (reply, settled) = oneshot::channel();

        {
            let mut table = self.inner.pending.lock();
            if table.disconnected {
                return Err(VecscopeError::transport("embedding worker is not running"));
            }
            table.requests.insert(
                id,
                PendingRequest {
                    kind: request.kind(),
                    reply,
                },
            );
        }

        if self.inner.requests.send(request).is_err() {
            self.inner.pending.lock().requests.remove(&id);
            return Err(VecscopeError::transport("embedding worker is not running"));
        }

        settled
            .await
            .map_err(|_| VecscopeError::transport(format!("request {} was abandoned", id)))?
    }
}

/// Route worker responses to their pending records until the worker exits.
///
/// The worker counts as gone when its response channel closes or when it
/// stops receiving requests, whichever comes first.
async fn dispatch(inner: Arc<BrokerInner>, mut responses: mpsc::UnboundedReceiver<WorkerResponse>) {
    loop {
        tokio::select! {
            biased;
            response = responses.recv() => match response {
                Some(response) => route(&inner, response),
                None => break,
            },
            _ = inner.requests.closed() => {
                // Deliver whatever the worker sent before it went away.
                while let Ok(response) = responses.try_recv() {
                    route(&inner, response);
                }
                break;
            }
        }
    }

    // The worker is gone: reject everything still waiting.
    let orphaned: Vec<(RequestId, PendingRequest)> = {
        let mut table = inner.pending.lock();
        table.disconnected = true;
        table.requests.drain().collect()
    };
    log::error!(
        "Embedding worker terminated with {} pending requests",
        orphaned.len()
    );
    for (id, pending) in orphaned {
        let _ = pending.reply.send(Err(VecscopeError::transport(format!(
            "embedding worker terminated before answering {} request {}",
            pending.kind, id
        ))));
    }
    inner
        .readiness
        .mark_failed("embedding worker terminated unexpectedly");
}

fn route(inner: &BrokerInner, response: WorkerResponse) {
    match response {
        WorkerResponse::Ready => {
            log::info!("Embedding worker is ready.");
            inner.readiness.mark_ready();
        }
        WorkerResponse::Error { id: None, error } => {
            log::error!("Worker error: {}", error);
            inner.readiness.mark_failed(error);
        }
        response => settle(inner, response),
    }
}

fn settle(inner: &BrokerInner, response: WorkerResponse) {
    let Some(id) = response.id() else {
        return;
    };
    let Some(pending) = inner.pending.lock().requests.remove(&id) else {
        log::debug!("Discarding {} response for unknown request {}", response.kind(), id);
        return;
    };

    let outcome = match response {
        WorkerResponse::Error { error, .. } => {
            log::warn!("Worker rejected {} request {}: {}", pending.kind, id, error);
            Err(VecscopeError::Rejected(error))
        }
        other => Ok(other),
    };
    // The caller may have stopped waiting; nothing to do then.
    let _ = pending.reply.send(outcome);
}

fn unexpected(expected: &str, got: &WorkerResponse) -> VecscopeError {
    VecscopeError::protocol(format!("expected {} response, got {}", expected, got.kind()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readiness::Readiness;
    use std::time::Duration;

    /// Broker wired to channels the test drives by hand.
    fn manual_broker() -> (
        RequestBroker,
        mpsc::UnboundedReceiver<WorkerRequest>,
        mpsc::UnboundedSender<WorkerResponse>,
    ) {
        let (channels, requests, responses) = WorkerChannels::pair();
        (RequestBroker::connect(channels), requests, responses)
    }

    fn payload(value: f32) -> EmbeddingPayload {
        EmbeddingPayload {
            data: vec![value],
            dims: vec![1],
            dtype: "float32".into(),
        }
    }

    async fn wait_for_pending(broker: &RequestBroker, count: usize) {
        while broker.pending_count() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_out_of_order_responses_reach_their_callers() {
        let (broker, mut requests, responses) = manual_broker();

        let calls: Vec<_> = ["one", "two", "three"]
            .into_iter()
            .map(|text| {
                let broker = broker.clone();
                tokio::spawn(async move { (text, broker.embed(text).await) })
            })
            .collect();

        // Record which text each id carried
        let mut by_id = HashMap::new();
        for _ in 0..3 {
            match requests.recv().await.unwrap() {
                WorkerRequest::Embed { id, text: TextInput::Single(text) } => {
                    by_id.insert(id, text);
                }
                other => panic!("unexpected request {:?}", other),
            }
        }
        let mut ids: Vec<RequestId> = by_id.keys().copied().collect();
        ids.sort_unstable();

        // Answer in order 3, 1, 2; each payload encodes the text length
        for &id in &[ids[2], ids[0], ids[1]] {
            responses
                .send(WorkerResponse::Complete {
                    id,
                    embedding: payload(by_id[&id].len() as f32),
                })
                .unwrap();
        }

        for call in calls {
            let (text, result) = call.await.unwrap();
            assert_eq!(result.unwrap().data, vec![text.len() as f32]);
        }
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_ids_increase_monotonically() {
        let (broker, mut requests, _responses) = manual_broker();
        for _ in 0..3 {
            let broker = broker.clone();
            tokio::spawn(async move { broker.embed("x").await });
        }
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(requests.recv().await.unwrap().id());
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_error_response_rejects_only_its_request() {
        let (broker, mut requests, responses) = manual_broker();

        let failing = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.project_query(&payload(1.0)).await })
        };
        let first = requests.recv().await.unwrap().id();
        let healthy = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.project_query(&payload(2.0)).await })
        };
        let second = requests.recv().await.unwrap().id();

        responses
            .send(WorkerResponse::failure(
                first,
                "Reducer has not been initialized. Call 'reduceCorpus' first.",
            ))
            .unwrap();
        responses
            .send(WorkerResponse::QueryProjected {
                id: second,
                query_3d: vec![vec![1.0, 2.0, 3.0]],
            })
            .unwrap();

        let err = failing.await.unwrap().unwrap_err();
        assert!(matches!(err, VecscopeError::Rejected(_)));
        assert!(err.to_string().contains("not been initialized"));
        assert_eq!(healthy.await.unwrap().unwrap(), vec![vec![1.0, 2.0, 3.0]]);
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let (broker, _requests, responses) = manual_broker();
        responses
            .send(WorkerResponse::Complete { id: 42, embedding: payload(0.0) })
            .unwrap();
        responses.send(WorkerResponse::Ready).unwrap();

        tokio::time::timeout(Duration::from_secs(1), broker.readiness().wait_ready())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_fatal_error_leaves_pending_requests_alone() {
        let (broker, mut requests, responses) = manual_broker();
        let call = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.embed("still valid").await })
        };
        let id = requests.recv().await.unwrap().id();

        responses.send(WorkerResponse::fatal("model failed")).unwrap();
        let mut rx = broker.readiness().subscribe();
        rx.wait_for(|s| s.is_failed()).await.unwrap();
        assert_eq!(broker.pending_count(), 1);

        responses
            .send(WorkerResponse::Complete { id, embedding: payload(3.0) })
            .unwrap();
        assert_eq!(call.await.unwrap().unwrap().data, vec![3.0]);
    }

    #[tokio::test]
    async fn test_worker_crash_rejects_all_pending_and_fails_once() {
        let (broker, requests, responses) = manual_broker();
        let mut readiness = broker.readiness().subscribe();

        let calls: Vec<_> = (0..2)
            .map(|_| {
                let broker = broker.clone();
                tokio::spawn(async move { broker.embed("pending").await })
            })
            .collect();
        wait_for_pending(&broker, 2).await;

        // Worker dies abnormally: both channel ends vanish
        drop(responses);
        drop(requests);

        for call in calls {
            let err = call.await.unwrap().unwrap_err();
            assert!(matches!(err, VecscopeError::Transport(_)));
        }

        readiness.changed().await.unwrap();
        assert!(readiness.borrow_and_update().is_failed());
        assert!(!readiness.has_changed().unwrap());
        assert_eq!(broker.pending_count(), 0);

        // New requests fail fast instead of hanging
        let late = broker.embed("late").await.unwrap_err();
        assert!(matches!(late, VecscopeError::Transport(_)));
        assert!(!readiness.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_worker_abort_while_loading_rejects_pending() {
        use crate::embedding::EngineHandle;
        use crate::reduce::ReducerConfig;
        use crate::worker::EmbeddingWorker;

        let engine = Arc::new(EngineHandle::new(|| {
            std::thread::sleep(Duration::from_millis(1500));
            Err(VecscopeError::model("load took too long"))
        }));
        let (channels, worker) = EmbeddingWorker::spawn(engine, ReducerConfig::default());
        let broker = RequestBroker::connect(channels);

        let call = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.embed("x").await })
        };
        wait_for_pending(&broker, 1).await;

        worker.abort();
        let _ = worker.await;

        let err = tokio::time::timeout(Duration::from_millis(500), call)
            .await
            .expect("pending request settled while the model was still loading")
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, VecscopeError::Transport(_)));
        assert!(broker.readiness().current().is_failed());
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_response_kind_is_protocol_error() {
        let (broker, mut requests, responses) = manual_broker();
        let call = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.reduce_corpus(&payload(1.0)).await })
        };
        let id = requests.recv().await.unwrap().id();
        responses
            .send(WorkerResponse::Complete { id, embedding: payload(1.0) })
            .unwrap();
        assert!(matches!(
            call.await.unwrap(),
            Err(VecscopeError::Protocol(_))
        ));
        assert_eq!(broker.readiness().current(), Readiness::NotReady);
    }
}
