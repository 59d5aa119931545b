//! Vecscope Core
//!
//! Embedding and projection pipeline for an interactive semantic-search
//! demo: a corpus is embedded once, projected to 3-D with PCA, and every
//! query is embedded, projected into the same space and ranked by cosine
//! similarity.
//!
//! ## Architecture
//!
//! ```text
//! SearchOrchestrator -> RequestBroker ==(WorkerRequest)==> EmbeddingWorker
//!         ^                   |                              |- EngineHandle (VectorEngine, loaded once)
//!         |                   <==(WorkerResponse)============|- fitted DimensionalityReducer
//!      SearchView        ReadinessSignal
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vecscope_core::{
//!     Corpus, EmbeddingConfig, EmbeddingWorker, EngineHandle, NullView, ReducerConfig,
//!     RequestBroker, SearchOrchestrator, VectorEngine,
//! };
//!
//! let config = EmbeddingConfig::default();
//! let engine = Arc::new(EngineHandle::new(move || VectorEngine::load(&config, None)));
//! let (channels, _worker) = EmbeddingWorker::spawn(engine, ReducerConfig::default());
//! let broker = RequestBroker::connect(channels);
//!
//! let search = SearchOrchestrator::new(broker, Corpus::default(), Arc::new(NullView));
//! search.start().await?;
//! let results = search.search("a feline rested").await?;
//! ```

pub mod broker;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod protocol;
pub mod readiness;
pub mod reduce;
pub mod search;
pub mod view;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use broker::RequestBroker;
pub use corpus::{Corpus, DEFAULT_CORPUS};
pub use embedding::{
    EmbeddingBatch, EmbeddingConfig, EngineHandle, EngineStatus, ModelChoice, TextEmbedder,
    VectorEngine,
};
pub use error::{Result, VecscopeError};
pub use protocol::{EmbeddingPayload, RequestId, TextInput, WorkerRequest, WorkerResponse};
pub use readiness::{Readiness, ReadinessSignal};
pub use reduce::{create_reducer, DimensionalityReducer, Pca, ProjectionBasis, ReducerConfig};
pub use search::{CorpusIndex, SearchOrchestrator};
pub use view::{Coordinate3D, NullView, SearchResult, SearchState, SearchView};
pub use worker::{EmbeddingWorker, WorkerChannels, WorkerState};
