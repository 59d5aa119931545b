//! Model cache discovery
//!
//! Decides where ONNX weights are read from (and downloaded to).

use std::path::{Path, PathBuf};

/// Environment variable that overrides every other location
pub const MODELS_PATH_ENV: &str = "VECSCOPE_MODELS_PATH";

/// Find the model cache directory with priority:
/// 1. VECSCOPE_MODELS_PATH environment variable
/// 2. Bundled location (`<install_root>/models`)
/// 3. User home directory (~/.vecscope/models)
/// 4. `.vecscope-models` in the working directory
///
/// Only the first two must already exist; the others are created by the
/// downloader on first use.
pub fn find_model_cache_dir(install_root: Option<&Path>) -> PathBuf {
    // Priority 1: explicit override
    if let Ok(models_path) = std::env::var(MODELS_PATH_ENV) {
        let path = PathBuf::from(&models_path);
        if path.is_dir() {
            log::info!("Using {}: {}", MODELS_PATH_ENV, path.display());
            return path;
        }
        log::warn!("{} set but directory not found: {}", MODELS_PATH_ENV, models_path);
    }

    // Priority 2: bundled with the install
    if let Some(bundled) = bundled_models_dir(install_root) {
        log::info!("Using bundled models: {}", bundled.display());
        return bundled;
    }

    // Priority 3: user home directory
    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        let user_path = PathBuf::from(home).join(".vecscope").join("models");
        log::info!("Using user model cache: {}", user_path.display());
        return user_path;
    }

    PathBuf::from(".vecscope-models")
}

fn bundled_models_dir(install_root: Option<&Path>) -> Option<PathBuf> {
    let bundled = install_root?.join("models");
    bundled.is_dir().then_some(bundled)
}
