//! Runtime configuration shared by the CLI commands

use std::path::{Path, PathBuf};
use std::sync::Arc;
use vecscope_core::{EmbeddingConfig, EngineHandle, ReducerConfig, VectorEngine};

/// Everything needed to bring up an engine and a worker
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub embedding: EmbeddingConfig,
    pub reducer: ReducerConfig,
    /// Install root used to find bundled model weights
    pub install_root: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(embedding: EmbeddingConfig, reducer: ReducerConfig) -> Self {
        Self {
            embedding,
            reducer,
            install_root: install_root(),
        }
    }

    /// Engine handle whose model is loaded on first use.
    pub fn engine_handle(&self) -> Arc<EngineHandle> {
        let embedding = self.embedding.clone();
        let install_root = self.install_root.clone();
        Arc::new(EngineHandle::new(move || {
            VectorEngine::load(&embedding, install_root.as_deref())
        }))
    }
}

/// Resolve the install root from the binary location.
pub fn install_root() -> Option<PathBuf> {
    let root = std::env::current_exe()
        .ok()
        .and_then(|exe| install_root_for(&exe));
    tracing::debug!("Install root for models: {:?}", root);
    root
}

fn install_root_for(exe: &Path) -> Option<PathBuf> {
    let exe_dir = exe.parent()?;
    if exe_dir.ends_with("debug") || exe_dir.ends_with("release") {
        // target/<profile>/vecscope -> project root
        exe_dir.parent()?.parent().map(Path::to_path_buf)
    } else {
        // <root>/bin/vecscope
        exe_dir.parent().map(Path::to_path_buf)
    }
}
