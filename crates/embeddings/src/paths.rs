use std::path::{Path, PathBuf};

pub const MODEL_DIR_ENV: &str = "LITMAP_MODEL_DIR";
pub const CACHE_DIR_NAME: &str = "litmap";
pub const MODELS_DIR_NAME: &str = "models";
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Resolves the directory holding `manifest.json` and the per-model asset folders.
///
/// Order: `LITMAP_MODEL_DIR`, a `models/` folder found walking up from the executable,
/// then from the current directory, then the XDG cache, then `~/.cache`.
#[must_use]
pub fn model_dir() -> PathBuf {
    if let Ok(path) = std::env::var(MODEL_DIR_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(found) = exe.parent().and_then(find_models_upwards) {
            return found;
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if let Some(found) = find_models_upwards(&cwd) {
            return found;
        }
    }

    if let Ok(path) = std::env::var("XDG_CACHE_HOME") {
        return PathBuf::from(path)
            .join(CACHE_DIR_NAME)
            .join(MODELS_DIR_NAME);
    }

    std::env::var("HOME")
        .map_or_else(|_| PathBuf::from("."), PathBuf::from)
        .join(".cache")
        .join(CACHE_DIR_NAME)
        .join(MODELS_DIR_NAME)
}

fn find_models_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(MODELS_DIR_NAME);
        if candidate.join(MANIFEST_FILE_NAME).exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}
