use crate::error::{ClassifierError, Result};
use crate::item::ItemField;
use crate::strategy::ClassifierStrategy;
use crate::taxonomy::Taxonomy;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

const BUILTIN_PROFILE: &str = include_str!("../../../profiles/default.json");

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Off means every semantic path is skipped, whatever the environment says.
    pub enabled: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusteringConfig {
    pub min_k: usize,
    pub max_k: usize,
    pub seed: u64,
    pub n_init: usize,
    pub max_iterations: usize,
}

/// Everything an engine needs, resolved from a profile merged over the bundled defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub min_corpus_chars: usize,
    pub keyword_weight_divisor: f32,
    pub strategy: ClassifierStrategy,
    pub enforce_coverage: bool,
    pub fields: Vec<ItemField>,
    pub embedding: EmbeddingConfig,
    pub clustering: ClusteringConfig,
    /// Closed taxonomy with the coverage guarantee.
    pub categories: Taxonomy,
    /// Research-approach taxonomy whose labels feed clustering.
    pub approaches: Taxonomy,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProfile {
    schema_version: Option<u32>,
    min_corpus_chars: Option<usize>,
    keyword_weight_divisor: Option<f32>,
    strategy: Option<ClassifierStrategy>,
    enforce_coverage: Option<bool>,
    fields: Option<Vec<ItemField>>,
    embedding: Option<RawEmbeddingConfig>,
    clustering: Option<RawClusteringConfig>,
    categories: Option<Taxonomy>,
    approaches: Option<Taxonomy>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEmbeddingConfig {
    enabled: Option<bool>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClusteringConfig {
    min_k: Option<usize>,
    max_k: Option<usize>,
    seed: Option<u64>,
    n_init: Option<usize>,
    max_iterations: Option<usize>,
}

impl EngineConfig {
    /// The bundled profile.
    pub fn builtin() -> Result<Self> {
        Self::from_raw(parse_raw(BUILTIN_PROFILE.as_bytes())?)
    }

    /// Parses a JSON or TOML profile and fills unset keys from the bundled profile.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let base = parse_raw(BUILTIN_PROFILE.as_bytes())?;
        let overlay = parse_raw(bytes)?;
        Self::from_raw(merge_raw(base, overlay))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes).map_err(|err| match err {
            ClassifierError::Profile(msg) => {
                ClassifierError::Profile(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    fn from_raw(raw: RawProfile) -> Result<Self> {
        if let Some(version) = raw.schema_version {
            if version != 1 {
                return Err(ClassifierError::Profile(format!(
                    "schema_version {version} is not supported (expected 1)"
                )));
            }
        }

        let missing = |key: &str| ClassifierError::Profile(format!("missing required key '{key}'"));
        let embedding = raw.embedding.unwrap_or_default();
        let clustering = raw.clustering.unwrap_or_default();
        let config = Self {
            min_corpus_chars: raw.min_corpus_chars.unwrap_or(15),
            keyword_weight_divisor: raw.keyword_weight_divisor.unwrap_or(20.0),
            strategy: raw.strategy.unwrap_or(ClassifierStrategy::Hybrid),
            enforce_coverage: raw.enforce_coverage.unwrap_or(true),
            fields: raw.fields.unwrap_or_else(|| ItemField::ALL.to_vec()),
            embedding: EmbeddingConfig {
                enabled: embedding.enabled.unwrap_or(true),
                timeout: Duration::from_millis(embedding.timeout_ms.unwrap_or(30_000)),
            },
            clustering: ClusteringConfig {
                min_k: clustering.min_k.unwrap_or(2),
                max_k: clustering.max_k.unwrap_or(6),
                seed: clustering.seed.unwrap_or(42),
                n_init: clustering.n_init.unwrap_or(10),
                max_iterations: clustering.max_iterations.unwrap_or(100),
            },
            categories: raw.categories.ok_or_else(|| missing("categories"))?,
            approaches: raw.approaches.ok_or_else(|| missing("approaches"))?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ClassifierError::Profile(msg));
        if !(self.keyword_weight_divisor > 0.0 && self.keyword_weight_divisor.is_finite()) {
            return invalid(format!(
                "keyword_weight_divisor must be a positive number, got {}",
                self.keyword_weight_divisor
            ));
        }
        if self.fields.is_empty() {
            return invalid("fields must not be empty".to_string());
        }
        if self.embedding.timeout.is_zero() {
            return invalid("embedding.timeout_ms must be positive".to_string());
        }
        let clustering = &self.clustering;
        if clustering.min_k == 0 || clustering.min_k > clustering.max_k {
            return invalid(format!(
                "clustering requires 1 <= min_k <= max_k, got min_k={} max_k={}",
                clustering.min_k, clustering.max_k
            ));
        }
        if clustering.n_init == 0 || clustering.max_iterations == 0 {
            return invalid("clustering.n_init and clustering.max_iterations must be positive".to_string());
        }
        self.categories.validate()?;
        self.approaches.validate()
    }
}

fn merge_raw(base: RawProfile, overlay: RawProfile) -> RawProfile {
    let embedding = match (base.embedding, overlay.embedding) {
        (Some(base), Some(overlay)) => Some(RawEmbeddingConfig {
            enabled: overlay.enabled.or(base.enabled),
            timeout_ms: overlay.timeout_ms.or(base.timeout_ms),
        }),
        (base, overlay) => overlay.or(base),
    };
    let clustering = match (base.clustering, overlay.clustering) {
        (Some(base), Some(overlay)) => Some(RawClusteringConfig {
            min_k: overlay.min_k.or(base.min_k),
            max_k: overlay.max_k.or(base.max_k),
            seed: overlay.seed.or(base.seed),
            n_init: overlay.n_init.or(base.n_init),
            max_iterations: overlay.max_iterations.or(base.max_iterations),
        }),
        (base, overlay) => overlay.or(base),
    };

    RawProfile {
        schema_version: overlay.schema_version.or(base.schema_version),
        min_corpus_chars: overlay.min_corpus_chars.or(base.min_corpus_chars),
        keyword_weight_divisor: overlay.keyword_weight_divisor.or(base.keyword_weight_divisor),
        strategy: overlay.strategy.or(base.strategy),
        enforce_coverage: overlay.enforce_coverage.or(base.enforce_coverage),
        fields: overlay.fields.or(base.fields),
        embedding,
        clustering,
        categories: overlay.categories.or(base.categories),
        approaches: overlay.approaches.or(base.approaches),
    }
}

/// JSON first, then TOML converted to JSON so both formats share one schema.
fn parse_raw(bytes: &[u8]) -> Result<RawProfile> {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(json_err) => {
            let utf8 = std::str::from_utf8(bytes)
                .map_err(|err| ClassifierError::Profile(format!("{json_err}; {err}")))?;
            let toml_value: toml::Value = toml::from_str(utf8).map_err(|toml_err| {
                ClassifierError::Profile(format!(
                    "not valid JSON ({json_err}) or TOML ({toml_err})"
                ))
            })?;
            serde_json::to_value(toml_value).map_err(|err| {
                ClassifierError::Profile(format!("failed to convert TOML profile: {err}"))
            })?
        }
    };

    reject_unknown_keys(&value)?;
    serde_json::from_value(value).map_err(|err| ClassifierError::Profile(err.to_string()))
}

const PROFILE_KEYS: &[&str] = &[
    "schema_version",
    "min_corpus_chars",
    "keyword_weight_divisor",
    "strategy",
    "enforce_coverage",
    "fields",
    "embedding",
    "clustering",
    "categories",
    "approaches",
];
const EMBEDDING_KEYS: &[&str] = &["enabled", "timeout_ms"];
const CLUSTERING_KEYS: &[&str] = &["min_k", "max_k", "seed", "n_init", "max_iterations"];
const TAXONOMY_KEYS: &[&str] = &["name", "general_label", "unclassified_label", "categories"];
const CATEGORY_KEYS: &[&str] = &["name", "keywords", "prototype"];

/// Reports every unknown key with its full path, e.g. `categories.categories[2].weight`.
fn reject_unknown_keys(value: &Value) -> Result<()> {
    fn check(value: &Value, path: &str, allowed: &[&str], unknown: &mut Vec<String>) {
        let Some(map) = value.as_object() else {
            return;
        };
        for key in map.keys() {
            if !allowed.contains(&key.as_str()) {
                unknown.push(if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                });
            }
        }
    }

    let mut unknown = Vec::new();
    let Some(root) = value.as_object() else {
        return Err(ClassifierError::Profile(
            "profile must be a table/object".to_string(),
        ));
    };
    check(value, "", PROFILE_KEYS, &mut unknown);
    if let Some(embedding) = root.get("embedding") {
        check(embedding, "embedding", EMBEDDING_KEYS, &mut unknown);
    }
    if let Some(clustering) = root.get("clustering") {
        check(clustering, "clustering", CLUSTERING_KEYS, &mut unknown);
    }
    for taxonomy in ["categories", "approaches"] {
        let Some(table) = root.get(taxonomy) else {
            continue;
        };
        check(table, taxonomy, TAXONOMY_KEYS, &mut unknown);
        if let Some(categories) = table.get("categories").and_then(Value::as_array) {
            for (i, category) in categories.iter().enumerate() {
                check(
                    category,
                    &format!("{taxonomy}.categories[{i}]"),
                    CATEGORY_KEYS,
                    &mut unknown,
                );
            }
        }
    }

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(ClassifierError::Profile(format!(
            "unknown keys: {}",
            unknown.join(", ")
        )))
    }
}
