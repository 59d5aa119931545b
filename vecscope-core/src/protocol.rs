//! Worker protocol types
//!
//! Commands sent to the embedding worker and the responses it produces.
//! The JSON form uses a `type` tag, e.g.
//! `{"type":"embed","id":3,"text":["a","b"]}` or
//! `{"type":"error","id":3,"error":"..."}`.

use crate::embedding::EmbeddingBatch;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Request correlation id
pub type RequestId = u64;

/// Text to embed: one string, or a sequence embedded in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextInput {
    Single(String),
    Batch(Vec<String>),
}

impl TextInput {
    pub fn texts(&self) -> Vec<&str> {
        match self {
            Self::Single(text) => vec![text.as_str()],
            Self::Batch(texts) => texts.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Self::Single(_))
    }
}

impl From<&str> for TextInput {
    fn from(text: &str) -> Self {
        Self::Single(text.to_string())
    }
}

impl From<String> for TextInput {
    fn from(text: String) -> Self {
        Self::Single(text)
    }
}

impl From<Vec<String>> for TextInput {
    fn from(texts: Vec<String>) -> Self {
        Self::Batch(texts)
    }
}

fn default_dtype() -> String {
    "float32".to_string()
}

/// Tensor-like embedding result: flat `data` shaped by `dims`
///
/// `dims` is `[D]` for a single text and `[N, D]` for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingPayload {
    pub data: Vec<f32>,
    pub dims: Vec<usize>,
    #[serde(rename = "type", default = "default_dtype")]
    pub dtype: String,
}

impl EmbeddingPayload {
    /// Package a batch; `single` selects the `[D]` shape for one-row batches.
    pub fn from_batch(batch: EmbeddingBatch, single: bool) -> Self {
        let dims = if single && batch.rows() == 1 {
            vec![batch.dim()]
        } else {
            vec![batch.rows(), batch.dim()]
        };
        Self {
            data: batch.into_inner(),
            dims,
            dtype: default_dtype(),
        }
    }

    /// Reshape into rows, validating the declared shape.
    pub fn to_batch(&self) -> Result<EmbeddingBatch> {
        EmbeddingBatch::from_shape(self.data.clone(), &self.dims)
    }
}

/// Command sent to the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerRequest {
    Embed {
        id: RequestId,
        text: TextInput,
    },
    ReduceCorpus {
        id: RequestId,
        embedding: EmbeddingPayload,
    },
    ProjectQuery {
        id: RequestId,
        embedding: EmbeddingPayload,
    },
}

impl WorkerRequest {
    pub fn id(&self) -> RequestId {
        match self {
            Self::Embed { id, .. } | Self::ReduceCorpus { id, .. } | Self::ProjectQuery { id, .. } => {
                *id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Embed { .. } => "embed",
            Self::ReduceCorpus { .. } => "reduceCorpus",
            Self::ProjectQuery { .. } => "projectQuery",
        }
    }
}

/// Message produced by the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerResponse {
    /// Model loaded; unsolicited
    Ready,
    Complete {
        id: RequestId,
        embedding: EmbeddingPayload,
    },
    CorpusReduced {
        id: RequestId,
        #[serde(rename = "corpus3D")]
        corpus_3d: Vec<Vec<f32>>,
    },
    QueryProjected {
        id: RequestId,
        #[serde(rename = "query3D")]
        query_3d: Vec<Vec<f32>>,
    },
    /// Per-request failure, or a fatal worker error when `id` is absent
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<RequestId>,
        error: String,
    },
}

impl WorkerResponse {
    pub fn id(&self) -> Option<RequestId> {
        match self {
            Self::Ready => None,
            Self::Complete { id, .. }
            | Self::CorpusReduced { id, .. }
            | Self::QueryProjected { id, .. } => Some(*id),
            Self::Error { id, .. } => *id,
        }
    }

    pub fn failure(id: RequestId, error: impl Into<String>) -> Self {
        Self::Error {
            id: Some(id),
            error: error.into(),
        }
    }

    pub fn fatal(error: impl Into<String>) -> Self {
        Self::Error {
            id: None,
            error: error.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Complete { .. } => "complete",
            Self::CorpusReduced { .. } => "corpusReduced",
            Self::QueryProjected { .. } => "queryProjected",
            Self::Error { .. } => "error",
        }
    }
}
