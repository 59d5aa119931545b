//! Owned-once engine handle
//!
//! The engine is loaded at most once. Every caller shares the same in-flight
//! load, and the outcome (including a failure) is cached for the lifetime of
//! the handle.

use super::engine::VectorEngine;
use crate::error::{Result, VecscopeError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

type Loader = Box<dyn FnOnce() -> Result<VectorEngine> + Send + 'static>;

/// Where the engine is in its one-time initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// Lazily loaded, shared [`VectorEngine`]
pub struct EngineHandle {
    cell: OnceCell<std::result::Result<Arc<VectorEngine>, String>>,
    loader: Mutex<Option<Loader>>,
    loading: AtomicBool,
}

impl EngineHandle {
    /// Create a handle that runs `loader` on the blocking pool on first use.
    pub fn new<F>(loader: F) -> Self
    where
        F: FnOnce() -> Result<VectorEngine> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            loader: Mutex::new(Some(Box::new(loader))),
            loading: AtomicBool::new(false),
        }
    }

    /// Create a handle around an engine that is already loaded.
    pub fn ready(engine: VectorEngine) -> Self {
        Self {
            cell: OnceCell::new_with(Some(Ok(Arc::new(engine)))),
            loader: Mutex::new(None),
            loading: AtomicBool::new(false),
        }
    }

    /// Get the engine, loading it if nobody has yet.
    ///
    /// A failed load is returned as [`VecscopeError::Model`] to this and
    /// every later caller; the loader is never run twice.
    pub async fn get(&self) -> Result<Arc<VectorEngine>> {
        let outcome = self
            .cell
            .get_or_init(|| async {
                self.loading.store(true, Ordering::SeqCst);
                let outcome = self.run_loader().await;
                self.loading.store(false, Ordering::SeqCst);
                outcome
            })
            .await;

        match outcome {
            Ok(engine) => Ok(Arc::clone(engine)),
            Err(msg) => Err(VecscopeError::model(msg.clone())),
        }
    }

    async fn run_loader(&self) -> std::result::Result<Arc<VectorEngine>, String> {
        let loader = self
            .loader
            .lock()
            .take()
            .ok_or_else(|| "engine loader already consumed".to_string())?;

        match tokio::task::spawn_blocking(loader).await {
            Ok(Ok(engine)) => Ok(Arc::new(engine)),
            Ok(Err(e)) => {
                log::error!("Embedding engine failed to load: {}", e);
                Err(e.to_string())
            }
            Err(join_err) => {
                log::error!("Embedding engine loader panicked: {}", join_err);
                Err(format!("engine loader panicked: {}", join_err))
            }
        }
    }

    pub fn status(&self) -> EngineStatus {
        match self.cell.get() {
            Some(Ok(_)) => EngineStatus::Ready,
            Some(Err(_)) => EngineStatus::Failed,
            None if self.loading.load(Ordering::SeqCst) => EngineStatus::Loading,
            None => EngineStatus::Uninitialized,
        }
    }
}
