use crate::error::{EmbeddingError, Result};
use crate::paths::MANIFEST_FILE_NAME;
use serde::Deserialize;
use std::fmt::Display;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_MODEL_ID: &str = "all-minilm-l6";
pub const EMBEDDING_MODEL_ENV: &str = "LITMAP_EMBEDDING_MODEL";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelId(String);

impl Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ModelId {
    #[must_use]
    pub fn from_raw(model_name: &str) -> Self {
        let model_name = model_name.trim().to_ascii_lowercase();
        let normalized = match model_name.as_str() {
            "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => DEFAULT_MODEL_ID,
            "" => DEFAULT_MODEL_ID,
            other => other,
        };
        Self(normalized.to_string())
    }

    #[must_use]
    pub fn from_env() -> Self {
        let raw = std::env::var(EMBEDDING_MODEL_ENV).unwrap_or_default();
        Self::from_raw(&raw)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug)]
pub struct ModelSpec {
    pub id: ModelId,
    pub onnx_rel_path: PathBuf,
    pub tokenizer_rel_path: PathBuf,
    pub dimension: usize,
    pub max_length: usize,
    pub max_batch: usize,
}

#[derive(Clone, Debug)]
pub struct ModelAssets {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

impl ModelSpec {
    fn builtin(id: ModelId) -> Self {
        Self {
            id,
            onnx_rel_path: PathBuf::from("model.onnx"),
            tokenizer_rel_path: PathBuf::from("tokenizer.json"),
            dimension: 384,
            max_length: 256,
            max_batch: 32,
        }
    }

    #[must_use]
    pub fn assets_in(&self, model_dir: &Path) -> ModelAssets {
        let model_dir = model_dir.join(self.id.as_str());
        ModelAssets {
            model_path: model_dir.join(&self.onnx_rel_path),
            tokenizer_path: model_dir.join(&self.tokenizer_rel_path),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelsManifest {
    schema_version: u32,
    models: Vec<ManifestModel>,
}

#[derive(Debug, Deserialize)]
struct ManifestModel {
    id: String,
    dimension: usize,
    max_length: usize,
    max_batch: usize,
    #[serde(default)]
    assets: Vec<ManifestAsset>,
}

#[derive(Debug, Deserialize)]
struct ManifestAsset {
    path: String,
}

/// Looks up `id` in `<model_dir>/manifest.json`.
///
/// Without a manifest only the default MiniLM model is known, with its stock layout.
pub fn load_model_spec(model_dir: &Path, id: &ModelId) -> Result<ModelSpec> {
    let manifest_path = model_dir.join(MANIFEST_FILE_NAME);
    if !manifest_path.exists() {
        if id.as_str() == DEFAULT_MODEL_ID {
            return Ok(ModelSpec::builtin(id.clone()));
        }
        return Err(EmbeddingError::Manifest(format!(
            "Unknown embedding model id '{id}' and no models manifest found at {}",
            manifest_path.display()
        )));
    }

    let raw = std::fs::read_to_string(&manifest_path).map_err(|e| {
        EmbeddingError::Manifest(format!(
            "Failed to read models manifest {}: {e}",
            manifest_path.display()
        ))
    })?;
    let manifest: ModelsManifest = serde_json::from_str(&raw).map_err(|e| {
        EmbeddingError::Manifest(format!(
            "Invalid models manifest {}: {e}",
            manifest_path.display()
        ))
    })?;
    if manifest.schema_version != 1 {
        return Err(EmbeddingError::Manifest(format!(
            "Unsupported models manifest schema_version {} (expected 1)",
            manifest.schema_version
        )));
    }

    let model = manifest
        .models
        .iter()
        .find(|m| ModelId::from_raw(&m.id) == *id)
        .ok_or_else(|| {
            let available = manifest
                .models
                .iter()
                .map(|m| m.id.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            EmbeddingError::Manifest(format!(
                "Unknown embedding model id '{id}'. Available: {available}"
            ))
        })?;

    let prefix = format!("{}/", model.id);
    let mut onnx_rel_path: Option<PathBuf> = None;
    let mut tokenizer_rel_path: Option<PathBuf> = None;
    for asset in &model.assets {
        let Some(rel) = asset.path.strip_prefix(&prefix) else {
            continue;
        };
        let asset_path = Path::new(asset.path.as_str());
        if onnx_rel_path.is_none()
            && asset_path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"))
        {
            onnx_rel_path = Some(safe_rel_path(&model.id, rel)?);
        }
        if tokenizer_rel_path.is_none()
            && asset_path
                .file_name()
                .is_some_and(|name| name.eq_ignore_ascii_case("tokenizer.json"))
        {
            tokenizer_rel_path = Some(safe_rel_path(&model.id, rel)?);
        }
    }

    Ok(ModelSpec {
        id: id.clone(),
        onnx_rel_path: onnx_rel_path.unwrap_or_else(|| PathBuf::from("model.onnx")),
        tokenizer_rel_path: tokenizer_rel_path.unwrap_or_else(|| PathBuf::from("tokenizer.json")),
        dimension: model.dimension,
        max_length: model.max_length,
        max_batch: model.max_batch.max(1),
    })
}

fn safe_rel_path(model_id: &str, rel: &str) -> Result<PathBuf> {
    let path = Path::new(rel);
    let mut has_component = false;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(EmbeddingError::Manifest(format!(
                    "Invalid asset path for model '{model_id}': '{rel}' must be relative"
                )));
            }
            Component::ParentDir => {
                return Err(EmbeddingError::Manifest(format!(
                    "Invalid asset path for model '{model_id}': '{rel}' must not contain '..'"
                )));
            }
            Component::CurDir => {}
            Component::Normal(_) => has_component = true,
        }
    }
    if !has_component {
        return Err(EmbeddingError::Manifest(format!(
            "Invalid asset path for model '{model_id}': path is empty"
        )));
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, body: &str) {
        std::fs::write(dir.join(MANIFEST_FILE_NAME), body).expect("write manifest");
    }

    #[test]
    fn model_id_normalizes_aliases() {
        assert_eq!(ModelId::from_raw("All-MiniLM-L6-v2").as_str(), DEFAULT_MODEL_ID);
        assert_eq!(ModelId::from_raw("  ").as_str(), DEFAULT_MODEL_ID);
        assert_eq!(ModelId::from_raw("BGE-small").as_str(), "bge-small");
    }

    #[test]
    fn default_model_works_without_manifest() {
        let dir = TempDir::new().unwrap();
        let spec = load_model_spec(dir.path(), &ModelId::from_raw(DEFAULT_MODEL_ID)).unwrap();
        assert_eq!(spec.dimension, 384);
        assert_eq!(spec.onnx_rel_path, PathBuf::from("model.onnx"));
    }

    #[test]
    fn unknown_model_without_manifest_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = load_model_spec(dir.path(), &ModelId::from_raw("e5-large")).unwrap_err();
        assert!(err.to_string().contains("no models manifest"), "{err}");
    }

    #[test]
    fn manifest_assets_are_resolved() {
        let dir = TempDir::new().unwrap();
        write_manifest(
            dir.path(),
            r#"{"schema_version":1,"models":[
                {"id":"m1","dimension":8,"max_length":16,"max_batch":0,
                 "assets":[{"path":"m1/onnx/model.onnx"},{"path":"m1/tokenizer.json"}]}
            ]}"#,
        );
        let spec = load_model_spec(dir.path(), &ModelId::from_raw("m1")).unwrap();
        assert_eq!(spec.onnx_rel_path, PathBuf::from("onnx/model.onnx"));
        assert_eq!(spec.tokenizer_rel_path, PathBuf::from("tokenizer.json"));
        assert_eq!(spec.max_batch, 1);
        let assets = spec.assets_in(dir.path());
        assert_eq!(assets.model_path, dir.path().join("m1/onnx/model.onnx"));
    }

    #[test]
    fn manifest_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        write_manifest(
            dir.path(),
            r#"{"schema_version":1,"models":[
                {"id":"m1","dimension":8,"max_length":16,"max_batch":2,
                 "assets":[{"path":"m1/../evil.onnx"}]}
            ]}"#,
        );
        let err = load_model_spec(dir.path(), &ModelId::from_raw("m1")).unwrap_err();
        assert!(err.to_string().contains("must not contain '..'"), "{err}");
    }

    #[test]
    fn manifest_rejects_absolute_paths() {
        let dir = TempDir::new().unwrap();
        write_manifest(
            dir.path(),
            r#"{"schema_version":1,"models":[
                {"id":"m1","dimension":8,"max_length":16,"max_batch":2,
                 "assets":[{"path":"m1//etc/passwd.onnx"}]}
            ]}"#,
        );
        let err = load_model_spec(dir.path(), &ModelId::from_raw("m1")).unwrap_err();
        assert!(err.to_string().contains("must be relative"), "{err}");
    }

    #[test]
    fn manifest_schema_version_is_checked() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), r#"{"schema_version":2,"models":[]}"#);
        let err = load_model_spec(dir.path(), &ModelId::from_raw("m1")).unwrap_err();
        assert!(err.to_string().contains("schema_version 2"), "{err}");
    }
}
