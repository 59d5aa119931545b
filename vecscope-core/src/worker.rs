//! Embedding worker
//!
//! Owns the engine handle and the fitted reducer, and answers protocol
//! commands on its own task. Inference and fitting run on the blocking pool
//! so the controlling side is never stalled.
//!
//! Lifecycle: `Uninitialized -> Loading -> Ready -> (Failed | Terminated)`.
//! Loading starts as soon as the worker is spawned; embed commands received
//! meanwhile wait for the shared load and are answered once it settles.

use crate::embedding::{EngineHandle, EngineStatus};
use crate::error::{Result, VecscopeError};
use crate::protocol::{EmbeddingPayload, RequestId, TextInput, WorkerRequest, WorkerResponse};
use crate::reduce::{create_reducer, into_rows, DimensionalityReducer, ReducerConfig};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
    Terminated,
}

/// Controller-side ends of a worker's message channels
pub struct WorkerChannels {
    pub requests: mpsc::UnboundedSender<WorkerRequest>,
    pub responses: mpsc::UnboundedReceiver<WorkerResponse>,
}

impl WorkerChannels {
    /// A pair of channels with nothing on the other side yet.
    ///
    /// Returns the controller ends plus the worker ends.
    pub fn pair() -> (
        Self,
        mpsc::UnboundedReceiver<WorkerRequest>,
        mpsc::UnboundedSender<WorkerResponse>,
    ) {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();
        (
            Self {
                requests: req_tx,
                responses: resp_rx,
            },
            req_rx,
            resp_tx,
        )
    }
}

type SharedReducer = Arc<dyn DimensionalityReducer>;

/// Command handler owning the engine and the fitted reducer
pub struct EmbeddingWorker {
    engine: Arc<EngineHandle>,
    reducer_config: ReducerConfig,
    reducer: Option<SharedReducer>,
    terminated: bool,
}

impl EmbeddingWorker {
    pub fn new(engine: Arc<EngineHandle>, reducer_config: ReducerConfig) -> Self {
        Self {
            engine,
            reducer_config,
            reducer: None,
            terminated: false,
        }
    }

    /// Spawn the worker on the current runtime and start loading the model.
    pub fn spawn(
        engine: Arc<EngineHandle>,
        reducer_config: ReducerConfig,
    ) -> (WorkerChannels, JoinHandle<()>) {
        let (channels, requests, responses) = WorkerChannels::pair();
        let worker = Self::new(engine, reducer_config);
        let join = tokio::spawn(worker.run(requests, responses));
        (channels, join)
    }

    pub fn state(&self) -> WorkerState {
        if self.terminated {
            return WorkerState::Terminated;
        }
        match self.engine.status() {
            EngineStatus::Uninitialized => WorkerState::Uninitialized,
            EngineStatus::Loading => WorkerState::Loading,
            EngineStatus::Ready => WorkerState::Ready,
            EngineStatus::Failed => WorkerState::Failed,
        }
    }

    /// Serve commands until the request channel closes or nobody listens.
    pub async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
        responses: mpsc::UnboundedSender<WorkerResponse>,
    ) {
        self.spawn_initial_load(responses.clone());

        while let Some(request) = requests.recv().await {
            let response = self.handle(request).await;
            if responses.send(response).is_err() {
                log::debug!("Response channel closed, stopping worker");
                break;
            }
        }

        self.terminated = true;
        log::info!("Embedding worker terminated");
    }

    /// Load the model eagerly and announce the outcome without an id.
    fn spawn_initial_load(&self, responses: mpsc::UnboundedSender<WorkerResponse>) {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            let started = Instant::now();
            let message = match engine.get().await {
                Ok(engine) => {
                    log::info!(
                        "Embedding worker is ready ({}, {}d) after {:?}",
                        engine.model_name(),
                        engine.dimension(),
                        started.elapsed()
                    );
                    WorkerResponse::Ready
                }
                Err(e) => {
                    log::error!("Embedding model failed to load: {}", e);
                    WorkerResponse::fatal(e.to_string())
                }
            };
            let _ = responses.send(message);
        });
    }

    /// Answer one command. Failures become an `error` response for its id and
    /// never disturb state used by later commands.
    pub async fn handle(&mut self, request: WorkerRequest) -> WorkerResponse {
        let id = request.id();
        let kind = request.kind();
        let outcome = match request {
            WorkerRequest::Embed { id, text } => self.embed(id, text).await,
            WorkerRequest::ReduceCorpus { id, embedding } => self.reduce_corpus(id, embedding).await,
            WorkerRequest::ProjectQuery { id, embedding } => self.project_query(id, embedding).await,
        };

        outcome.unwrap_or_else(|e| {
            log::warn!("Worker {} request {} failed: {}", kind, id, e);
            WorkerResponse::failure(id, e.to_string())
        })
    }

    async fn embed(&self, id: RequestId, text: TextInput) -> Result<WorkerResponse> {
        let engine = self.engine.get().await?;
        let single = text.is_single();
        let batch = run_blocking(move || engine.embed(&text)).await?;
        Ok(WorkerResponse::Complete {
            id,
            embedding: EmbeddingPayload::from_batch(batch, single),
        })
    }

    async fn reduce_corpus(
        &mut self,
        id: RequestId,
        embedding: EmbeddingPayload,
    ) -> Result<WorkerResponse> {
        let mut reducer = create_reducer(&self.reducer_config)?;
        let batch = embedding.to_batch()?;

        let started = Instant::now();
        let (reducer, points) = run_blocking(move || {
            let points = reducer.fit_transform(batch.view()?)?;
            Ok((reducer, points))
        })
        .await?;
        log::info!(
            "Reduced corpus of {} items to {}d in {:?}",
            points.nrows(),
            points.ncols(),
            started.elapsed()
        );

        // Only a successful fit replaces the previous basis.
        self.reducer = Some(Arc::from(reducer));
        Ok(WorkerResponse::CorpusReduced {
            id,
            corpus_3d: into_rows(points),
        })
    }

    async fn project_query(
        &self,
        id: RequestId,
        embedding: EmbeddingPayload,
    ) -> Result<WorkerResponse> {
        let reducer = self.reducer.clone().ok_or_else(|| {
            VecscopeError::state("Reducer has not been initialized. Call 'reduceCorpus' first.")
        })?;
        let batch = embedding.to_batch()?;
        let points = run_blocking(move || reducer.transform(batch.view()?)).await?;
        Ok(WorkerResponse::QueryProjected {
            id,
            query_3d: into_rows(points),
        })
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VecscopeError::other(format!("worker task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{HashingEmbedder, VectorEngine};

    fn hashing_handle(dim: usize) -> Arc<EngineHandle> {
        Arc::new(EngineHandle::ready(VectorEngine::new(Arc::new(
            HashingEmbedder::new(dim).unwrap(),
        ))))
    }

    fn corpus() -> TextInput {
        TextInput::Batch(vec![
            "the cat sat on the mat".into(),
            "my dog chases squirrels".into(),
            "the sun is a star".into(),
            "stock markets fell sharply".into(),
        ])
    }

    async fn embed_payload(worker: &mut EmbeddingWorker, id: RequestId, text: TextInput) -> EmbeddingPayload {
        match worker.handle(WorkerRequest::Embed { id, text }).await {
            WorkerResponse::Complete { embedding, .. } => embedding,
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_project_before_reduce_is_error_response() {
        let mut worker = EmbeddingWorker::new(hashing_handle(16), ReducerConfig::default());
        let query = embed_payload(&mut worker, 1, "a query".into()).await;

        let response = worker
            .handle(WorkerRequest::ProjectQuery { id: 2, embedding: query })
            .await;
        match response {
            WorkerResponse::Error { id, error } => {
                assert_eq!(id, Some(2));
                assert!(error.contains("not been initialized"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reduce_then_project() {
        let mut worker = EmbeddingWorker::new(hashing_handle(16), ReducerConfig::default());
        let corpus = embed_payload(&mut worker, 1, corpus()).await;
        assert_eq!(corpus.dims, vec![4, 16]);

        let reduced = worker
            .handle(WorkerRequest::ReduceCorpus { id: 2, embedding: corpus })
            .await;
        match reduced {
            WorkerResponse::CorpusReduced { id, corpus_3d } => {
                assert_eq!(id, 2);
                assert_eq!(corpus_3d.len(), 4);
                assert!(corpus_3d.iter().all(|p| p.len() == 3));
            }
            other => panic!("unexpected response {:?}", other),
        }

        let query = embed_payload(&mut worker, 3, "a cat on a mat".into()).await;
        assert_eq!(query.dims, vec![16]);
        match worker
            .handle(WorkerRequest::ProjectQuery { id: 4, embedding: query })
            .await
        {
            WorkerResponse::QueryProjected { id, query_3d } => {
                assert_eq!(id, 4);
                assert_eq!(query_3d.len(), 1);
                assert_eq!(query_3d[0].len(), 3);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_reduce_keeps_previous_basis() {
        let mut worker = EmbeddingWorker::new(hashing_handle(8), ReducerConfig::default());
        let corpus = embed_payload(&mut worker, 1, corpus()).await;
        worker
            .handle(WorkerRequest::ReduceCorpus { id: 2, embedding: corpus })
            .await;

        let malformed = EmbeddingPayload {
            data: vec![1.0, 2.0, 3.0],
            dims: vec![2, 8],
            dtype: "float32".into(),
        };
        let failed = worker
            .handle(WorkerRequest::ReduceCorpus { id: 3, embedding: malformed })
            .await;
        assert!(matches!(failed, WorkerResponse::Error { id: Some(3), .. }));

        let query = embed_payload(&mut worker, 4, "the sun".into()).await;
        let projected = worker
            .handle(WorkerRequest::ProjectQuery { id: 5, embedding: query })
            .await;
        assert!(matches!(projected, WorkerResponse::QueryProjected { id: 5, .. }));
    }

    #[tokio::test]
    async fn test_empty_embed_is_per_request_error() {
        let mut worker = EmbeddingWorker::new(hashing_handle(8), ReducerConfig::default());
        let response = worker
            .handle(WorkerRequest::Embed { id: 9, text: TextInput::Batch(vec![]) })
            .await;
        assert!(matches!(response, WorkerResponse::Error { id: Some(9), .. }));

        // Still usable afterwards
        let ok = worker.handle(WorkerRequest::Embed { id: 10, text: "fine".into() }).await;
        assert!(matches!(ok, WorkerResponse::Complete { id: 10, .. }));
    }

    #[tokio::test]
    async fn test_spawned_worker_announces_ready() {
        let (mut channels, _join) = EmbeddingWorker::spawn(hashing_handle(8), ReducerConfig::default());
        assert_eq!(channels.responses.recv().await, Some(WorkerResponse::Ready));

        channels
            .requests
            .send(WorkerRequest::Embed { id: 0, text: "hello".into() })
            .unwrap();
        let response = channels.responses.recv().await.unwrap();
        assert_eq!(response.id(), Some(0));
    }

    #[tokio::test]
    async fn test_load_failure_is_unsolicited_error() {
        let handle = Arc::new(EngineHandle::new(|| Err(VecscopeError::model("no weights"))));
        let (mut channels, _join) = EmbeddingWorker::spawn(handle, ReducerConfig::default());

        channels
            .requests
            .send(WorkerRequest::Embed { id: 1, text: "hello".into() })
            .unwrap();

        let mut fatal = 0;
        let mut rejected = 0;
        for _ in 0..2 {
            match channels.responses.recv().await.unwrap() {
                WorkerResponse::Error { id: None, error } => {
                    assert!(error.contains("no weights"));
                    fatal += 1;
                }
                WorkerResponse::Error { id: Some(1), .. } => rejected += 1,
                other => panic!("unexpected response {:?}", other),
            }
        }
        assert_eq!((fatal, rejected), (1, 1));
    }

    #[tokio::test]
    async fn test_state_tracks_engine_and_termination() {
        let handle = Arc::new(EngineHandle::new(|| {
            Ok(VectorEngine::new(Arc::new(HashingEmbedder::new(4)?)))
        }));
        let mut worker = EmbeddingWorker::new(Arc::clone(&handle), ReducerConfig::default());
        assert_eq!(worker.state(), WorkerState::Uninitialized);

        worker.handle(WorkerRequest::Embed { id: 0, text: "x".into() }).await;
        assert_eq!(worker.state(), WorkerState::Ready);

        worker.terminated = true;
        assert_eq!(worker.state(), WorkerState::Terminated);
    }
}
