use crate::cache::BackendCache;
use crate::error::{EmbeddingError, Result};
use crate::manifest::{load_model_spec, ModelId, ModelSpec};
use crate::paths::model_dir;
use ndarray::{Array, Axis, Ix2, Ix3};
use once_cell::sync::OnceCell;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionInputs};
use ort::value::{DynTensor, Tensor};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tokio::task::spawn_blocking;

pub const EMBEDDING_MODE_ENV: &str = "LITMAP_EMBEDDING_MODE";

/// How the process obtains sentence embeddings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EmbeddingMode {
    /// ONNX Runtime inference with the configured model.
    Fast,
    /// Deterministic hashed vectors. Opt-in only, meant for tests and dry runs.
    Stub,
    /// No embeddings; callers take their non-ML paths.
    Off,
}

impl EmbeddingMode {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "fast" => Ok(Self::Fast),
            "stub" => Ok(Self::Stub),
            "off" | "none" | "disabled" => Ok(Self::Off),
            other => Err(EmbeddingError::Disabled(format!(
                "Unsupported {EMBEDDING_MODE_ENV} '{other}' (expected 'fast', 'stub' or 'off')"
            ))),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::parse(&std::env::var(EMBEDDING_MODE_ENV).unwrap_or_default())
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Stub => "stub",
            Self::Off => "off",
        }
    }
}

static BACKENDS: OnceCell<Mutex<BackendCache<OrtBackend>>> = OnceCell::new();

struct OrtBackend {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    max_length: usize,
    max_batch: usize,
    dimension: usize,
}

impl OrtBackend {
    fn new(spec: &ModelSpec, model_dir: &Path) -> Result<Self> {
        if !tokenizers::utils::parallelism::is_parallelism_configured() {
            tokenizers::utils::parallelism::set_parallelism(false);
        }

        let assets = spec.assets_in(model_dir);
        if !assets.model_path.exists() || !assets.tokenizer_path.exists() {
            return Err(EmbeddingError::ModelLoad(format!(
                "Model files for '{}' are missing. Expected ONNX at {} and tokenizer at {} (set LITMAP_MODEL_DIR to point elsewhere).",
                spec.id,
                assets.model_path.display(),
                assets.tokenizer_path.display(),
            )));
        }

        let mut tokenizer = Tokenizer::from_file(&assets.tokenizer_path)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Tokenizer load failed: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..PaddingParams::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: spec.max_length,
                ..TruncationParams::default()
            }))
            .map_err(|e| EmbeddingError::ModelLoad(format!("Tokenizer truncation failed: {e}")))?;

        let session = Session::builder()
            .map_err(|e| EmbeddingError::ModelLoad(format!("{e}")))?
            .with_intra_threads(default_intra_threads())
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to set ORT threads: {e}")))?
            .with_intra_op_spinning(false)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to set ORT spinning: {e}")))?
            .with_execution_providers(vec![CPUExecutionProvider::default().build()])
            .map_err(|e| {
                EmbeddingError::ModelLoad(format!("Failed to register CPU execution provider: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                EmbeddingError::ModelLoad(format!("Failed to set optimization level: {e}"))
            })?
            .commit_from_file(&assets.model_path)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to load ONNX model: {e}")))?;

        log::info!(
            "Loaded ONNX model '{}' (dim {}, max_length {}, batch {})",
            spec.id,
            spec.dimension,
            spec.max_length,
            spec.max_batch
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            max_length: spec.max_length,
            max_batch: spec.max_batch,
            dimension: spec.dimension,
        })
    }

    fn embed_batch_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.max_batch) {
            let encodings = self
                .tokenizer
                .encode_batch(batch.to_vec(), true)
                .map_err(|e| EmbeddingError::Inference(format!("Tokenization failed: {e}")))?;
            if encodings.is_empty() {
                continue;
            }

            let seq_len = encodings[0].len();
            if seq_len > self.max_length {
                return Err(EmbeddingError::Inference(format!(
                    "Tokenized length {seq_len} exceeds max_length {}",
                    self.max_length
                )));
            }
            if encodings.iter().any(|e| e.len() != seq_len) {
                return Err(EmbeddingError::Inference(
                    "Inconsistent sequence lengths after padding".to_string(),
                ));
            }
            let (ids, masks, type_ids, mask_rows) = build_flat_tensors(&encodings, seq_len);

            let shape = (batch.len(), seq_len);
            let mut available: HashMap<&str, DynTensor> = HashMap::new();
            for (name, data) in [
                ("input_ids", ids),
                ("attention_mask", masks),
                ("token_type_ids", type_ids),
            ] {
                let array = Array::from_shape_vec(shape, data)
                    .map_err(|e| EmbeddingError::Inference(format!("{name} shape error: {e}")))?;
                let tensor = Tensor::from_array(array.into_dyn())
                    .map_err(|e| EmbeddingError::Inference(format!("{e}")))?
                    .upcast();
                available.insert(name, tensor);
            }

            let array = {
                let mut session = self.session.lock().map_err(|_| {
                    EmbeddingError::Inference("Failed to lock ONNX session".into())
                })?;

                let mut feed: HashMap<String, DynTensor> = HashMap::new();
                for input in &session.inputs {
                    let tensor = available.remove(input.name.as_str()).ok_or_else(|| {
                        EmbeddingError::Inference(format!(
                            "Unsupported ONNX input '{}'",
                            input.name
                        ))
                    })?;
                    feed.insert(input.name.clone(), tensor);
                }

                let outputs = session
                    .run(SessionInputs::from(feed))
                    .map_err(|e| EmbeddingError::Inference(format!("ONNX forward failed: {e}")))?;
                if outputs.len() == 0 {
                    return Err(EmbeddingError::Inference(
                        "ONNX returned no outputs".to_string(),
                    ));
                }
                let array = outputs[0]
                    .try_extract_array::<f32>()
                    .map_err(|e| {
                        EmbeddingError::Inference(format!("Failed to decode ONNX output: {e}"))
                    })?
                    .to_owned();
                drop(outputs);
                array
            };
            results.extend(embeddings_from_output(array, &mask_rows, self.dimension)?);
        }

        Ok(results)
    }
}

fn default_intra_threads() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if cpus <= 4 {
        1
    } else if cpus <= 12 {
        2
    } else {
        4
    }
}

fn build_flat_tensors(
    encodings: &[Encoding],
    seq_len: usize,
) -> (Vec<i64>, Vec<i64>, Vec<i64>, Vec<Vec<i64>>) {
    let mut ids = Vec::with_capacity(encodings.len() * seq_len);
    let mut masks = Vec::with_capacity(encodings.len() * seq_len);
    let mut type_ids = Vec::with_capacity(encodings.len() * seq_len);
    let mut mask_rows = Vec::with_capacity(encodings.len());

    for encoding in encodings {
        let encoding_ids = encoding.get_ids();
        let encoding_masks = encoding.get_attention_mask();
        let encoding_types = encoding.get_type_ids();
        for idx in 0..seq_len {
            ids.push(i64::from(*encoding_ids.get(idx).unwrap_or(&0)));
            masks.push(i64::from(*encoding_masks.get(idx).unwrap_or(&0)));
            type_ids.push(i64::from(*encoding_types.get(idx).unwrap_or(&0)));
        }
        mask_rows.push(
            encoding_masks
                .iter()
                .take(seq_len)
                .map(|v| i64::from(*v))
                .collect(),
        );
    }

    (ids, masks, type_ids, mask_rows)
}

fn embeddings_from_output(
    array: ndarray::ArrayD<f32>,
    mask_rows: &[Vec<i64>],
    expected_dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::new();
    match array.ndim() {
        2 => {
            let pooled = array
                .into_dimensionality::<Ix2>()
                .map_err(|e| EmbeddingError::Inference(format!("Bad output shape: {e}")))?;
            for row in pooled.outer_iter() {
                out.push(finish_vector(row.to_vec(), expected_dimension)?);
            }
        }
        3 => {
            let hidden = array
                .into_dimensionality::<Ix3>()
                .map_err(|e| EmbeddingError::Inference(format!("Bad output shape: {e}")))?;
            for (idx, sample) in hidden.outer_iter().enumerate() {
                let mask = mask_rows
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| vec![1; sample.len_of(Axis(0))]);
                out.push(finish_vector(mean_pool(sample, &mask), expected_dimension)?);
            }
        }
        _ => {
            return Err(EmbeddingError::Inference(format!(
                "Unexpected ONNX output dims: {:?}",
                array.shape()
            )));
        }
    }
    Ok(out)
}

fn finish_vector(mut vec: Vec<f32>, expected: usize) -> Result<Vec<f32>> {
    if vec.len() != expected {
        return Err(EmbeddingError::InvalidDimension {
            expected,
            actual: vec.len(),
        });
    }
    normalize(&mut vec);
    Ok(vec)
}

fn mean_pool(sample: ndarray::ArrayView2<'_, f32>, mask: &[i64]) -> Vec<f32> {
    let hidden = sample.len_of(Axis(1));
    let mut sum = vec![0.0f32; hidden];
    let mut count = 0.0f32;

    for (token_idx, token) in sample.outer_iter().enumerate() {
        if *mask.get(token_idx).unwrap_or(&0) == 0 {
            continue;
        }
        count += 1.0;
        for (dim, value) in token.iter().enumerate() {
            sum[dim] += value;
        }
    }

    if count > 0.0 {
        for value in &mut sum {
            *value /= count;
        }
    }
    sum
}

pub(crate) fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

pub(crate) fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let mantissa = ((bits >> 32) as u32) >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

enum EmbeddingBackend {
    Ort(Arc<OrtBackend>),
    Stub,
}

/// A loaded sentence-embedding model producing unit-length vectors.
pub struct EmbeddingModel {
    id: ModelId,
    mode: EmbeddingMode,
    dimension: usize,
    backend: EmbeddingBackend,
}

impl EmbeddingModel {
    /// Loads the model selected by `LITMAP_EMBEDDING_MODE` / `LITMAP_EMBEDDING_MODEL`.
    ///
    /// Returns [`EmbeddingError::Disabled`] in `off` mode. ONNX sessions are shared across the
    /// process; concurrent first calls load the model once.
    pub fn from_env() -> Result<Self> {
        Self::load(EmbeddingMode::from_env()?, &ModelId::from_env(), &model_dir())
    }

    pub fn load(mode: EmbeddingMode, id: &ModelId, model_dir: &Path) -> Result<Self> {
        if mode == EmbeddingMode::Off {
            return Err(EmbeddingError::Disabled(format!(
                "{EMBEDDING_MODE_ENV}=off"
            )));
        }

        let spec = load_model_spec(model_dir, id)?;
        let backend = match mode {
            EmbeddingMode::Stub => EmbeddingBackend::Stub,
            _ => {
                let cache = BACKENDS.get_or_init(Mutex::default);
                let backend =
                    BackendCache::get_or_load(cache, id, || OrtBackend::new(&spec, model_dir))?;
                EmbeddingBackend::Ort(backend)
            }
        };

        Ok(Self {
            id: id.clone(),
            mode,
            dimension: spec.dimension,
            backend,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    #[must_use]
    pub const fn mode(&self) -> EmbeddingMode {
        self.mode
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        match &self.backend {
            EmbeddingBackend::Stub => Ok(texts
                .iter()
                .map(|text| stub_embed(text, self.dimension))
                .collect()),
            EmbeddingBackend::Ort(backend) => {
                let backend = backend.clone();
                let owned = texts.to_vec();
                spawn_blocking(move || backend.embed_batch_blocking(&owned))
                    .await
                    .map_err(|e| EmbeddingError::Inference(format!("Join error: {e}")))?
            }
        }
    }

    #[must_use]
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}
