use crate::error::{EmbeddingError, Result};
use crate::Embedder;
use ndarray::{Array, Array1, ArrayD, ArrayView2, Axis, Ix2, Ix3};
use ort::session::{builder::GraphOptimizationLevel, Session, SessionInputs};
use ort::value::{DynTensor, Tensor};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
const MAX_LENGTH: usize = 512;

/// Local transformer exported to ONNX; one vector per text is the mean of the
/// final hidden states over the attended token positions.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl OnnxEmbedder {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join(MODEL_FILE);
        let tokenizer_path = model_dir.join(TOKENIZER_FILE);
        if !model_path.exists() || !tokenizer_path.exists() {
            return Err(EmbeddingError::ModelLoad(format!(
                "Model files are missing. Expected ONNX at {} and tokenizer at {} (set MENTOR_MODEL_DIR).",
                model_path.display(),
                tokenizer_path.display(),
            )));
        }

        if !tokenizers::utils::parallelism::is_parallelism_configured() {
            tokenizers::utils::parallelism::set_parallelism(false);
        }
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Tokenizer load failed: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..PaddingParams::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_LENGTH,
                ..TruncationParams::default()
            }))
            .map_err(|e| EmbeddingError::ModelLoad(format!("Tokenizer truncation failed: {e}")))?;

        let threads = std::thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(1);
        let session = Session::builder()
            .map_err(|e| EmbeddingError::ModelLoad(format!("{e}")))?
            .with_intra_threads(threads)
            .map_err(|e| {
                EmbeddingError::ModelLoad(format!("Failed to set ORT intra threads: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                EmbeddingError::ModelLoad(format!("Failed to set optimization level: {e}"))
            })?
            .commit_from_file(&model_path)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to load ONNX model: {e}")))?;

        log::info!(
            "Loaded ONNX embedding model from {} (max_length {MAX_LENGTH})",
            model_dir.display()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }
}

impl Embedder for OnnxEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenization(e.to_string()))?;

        let seq_len = encodings.first().map_or(0, Encoding::len);
        if encodings.iter().any(|e| e.len() != seq_len) {
            return Err(EmbeddingError::Tokenization(
                "Inconsistent sequence lengths after padding".to_string(),
            ));
        }
        let FlatBatch {
            ids,
            attention_mask,
            type_ids,
            mask_rows,
        } = FlatBatch::from_encodings(&encodings);
        let shape = (encodings.len(), seq_len);

        let mut available: HashMap<&str, DynTensor> = HashMap::new();
        for (name, values) in [
            ("input_ids", ids),
            ("attention_mask", attention_mask),
            ("token_type_ids", type_ids),
        ] {
            let array = Array::from_shape_vec(shape, values)
                .map_err(|e| EmbeddingError::Inference(format!("{name} shape error: {e}")))?;
            let tensor = Tensor::from_array(array.into_dyn())
                .map_err(|e| EmbeddingError::Inference(format!("{e}")))?
                .upcast();
            available.insert(name, tensor);
        }

        let hidden = {
            let mut session = self.session.lock().map_err(|_| {
                EmbeddingError::Inference("Failed to lock ONNX session".to_string())
            })?;

            let mut feed: HashMap<String, DynTensor> = HashMap::new();
            for input in &session.inputs {
                let value = available.remove(input.name.as_str()).ok_or_else(|| {
                    EmbeddingError::Inference(format!("Unsupported ONNX input '{}'", input.name))
                })?;
                feed.insert(input.name.clone(), value);
            }

            let outputs = session
                .run(SessionInputs::from(feed))
                .map_err(|e| EmbeddingError::Inference(format!("ONNX forward failed: {e}")))?;
            if outputs.len() == 0 {
                return Err(EmbeddingError::Inference(
                    "ONNX returned no outputs".to_string(),
                ));
            }
            let hidden = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| {
                    EmbeddingError::Inference(format!("Failed to decode ONNX output: {e}"))
                })?
                .to_owned();

            drop(outputs);
            drop(session);
            hidden
        };

        pool_hidden_states(hidden, &mask_rows)
    }
}

/// Collapse model output to one vector per sample. Rank-3 output
/// (`[batch, tokens, hidden]`) is mean-pooled; rank-2 output is already pooled.
///
/// Padding positions are excluded from the mean, so a text embeds the same
/// alone or in a padded batch. A plain mean over every position (padding
/// included) gives different vectors for the shorter texts of a batch; this
/// deliberately does not reproduce that.
fn pool_hidden_states(array: ArrayD<f32>, mask_rows: &[Vec<i64>]) -> Result<Vec<Vec<f32>>> {
    match array.ndim() {
        2 => {
            let pooled = array
                .into_dimensionality::<Ix2>()
                .map_err(|e| EmbeddingError::Inference(format!("Bad output shape: {e}")))?;
            Ok(pooled.outer_iter().map(|row| row.to_vec()).collect())
        }
        3 => {
            let hidden = array
                .into_dimensionality::<Ix3>()
                .map_err(|e| EmbeddingError::Inference(format!("Bad output shape: {e}")))?;
            Ok(hidden
                .outer_iter()
                .enumerate()
                .map(|(idx, sample)| {
                    let all_tokens;
                    let mask = match mask_rows.get(idx) {
                        Some(mask) => mask.as_slice(),
                        None => {
                            all_tokens = vec![1; sample.len_of(Axis(0))];
                            all_tokens.as_slice()
                        }
                    };
                    mean_pool(sample, mask)
                })
                .collect())
        }
        _ => Err(EmbeddingError::Inference(format!(
            "Unexpected ONNX output dims: {:?}",
            array.shape()
        ))),
    }
}

fn mean_pool(sample: ArrayView2<'_, f32>, mask: &[i64]) -> Vec<f32> {
    let (sum, attended) = sample
        .outer_iter()
        .zip(mask)
        .filter(|(_, flag)| **flag != 0)
        .fold(
            (Array1::<f32>::zeros(sample.ncols()), 0usize),
            |(sum, attended), (token, _)| (sum + &token, attended + 1),
        );
    if attended == 0 {
        return sum.to_vec();
    }
    (sum / attended as f32).to_vec()
}

/// Row-major model inputs for one padded batch.
struct FlatBatch {
    ids: Vec<i64>,
    attention_mask: Vec<i64>,
    type_ids: Vec<i64>,
    mask_rows: Vec<Vec<i64>>,
}

impl FlatBatch {
    /// Every encoding must already be padded to the same length.
    fn from_encodings(encodings: &[Encoding]) -> Self {
        let mask_rows: Vec<Vec<i64>> = encodings
            .iter()
            .map(|e| widen(e.get_attention_mask()).collect())
            .collect();
        Self {
            ids: encodings.iter().flat_map(|e| widen(e.get_ids())).collect(),
            attention_mask: mask_rows.concat(),
            type_ids: encodings.iter().flat_map(|e| widen(e.get_type_ids())).collect(),
            mask_rows,
        }
    }
}

fn widen(values: &[u32]) -> impl Iterator<Item = i64> + '_ {
    values.iter().map(|&v| i64::from(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    #[test]
    fn mean_pool_ignores_padding_positions() {
        let sample = array![[1.0f32, 2.0], [3.0, 4.0], [100.0, 100.0]];
        assert_eq!(mean_pool(sample.view(), &[1, 1, 0]), vec![2.0, 3.0]);
    }

    #[test]
    fn mean_pool_without_attended_tokens_is_zero() {
        let sample = array![[5.0f32, 5.0]];
        assert_eq!(mean_pool(sample.view(), &[0]), vec![0.0, 0.0]);
    }

    #[test]
    fn rank_three_output_is_pooled_per_sample() {
        let hidden = array![
            [[1.0f32, 1.0], [3.0, 3.0]],
            [[2.0, 4.0], [9.0, 9.0]]
        ]
        .into_dyn();
        let pooled = pool_hidden_states(hidden, &[vec![1, 1], vec![1, 0]]).unwrap();
        assert_eq!(pooled, vec![vec![2.0, 2.0], vec![2.0, 4.0]]);
    }

    #[test]
    fn padding_does_not_change_a_texts_vector() {
        let alone = array![[[2.0f32, 6.0], [4.0, 2.0]]].into_dyn();
        let padded = array![[[2.0f32, 6.0], [4.0, 2.0], [0.1, -3.0], [7.0, 7.0]]].into_dyn();
        assert_eq!(
            pool_hidden_states(alone, &[vec![1, 1]]).unwrap(),
            pool_hidden_states(padded, &[vec![1, 1, 0, 0]]).unwrap()
        );
    }

    #[test]
    fn short_mask_treats_missing_positions_as_padding() {
        let sample = array![[1.0f32, 3.0], [9.0, 9.0]];
        assert_eq!(mean_pool(sample.view(), &[1]), vec![1.0, 3.0]);
    }

    #[test]
    fn rank_two_output_is_passed_through() {
        let pooled = pool_hidden_states(array![[0.5f32, 0.25]].into_dyn(), &[]).unwrap();
        assert_eq!(pooled, vec![vec![0.5, 0.25]]);
    }

    #[test]
    fn unexpected_rank_is_an_error() {
        let flat = array![1.0f32, 2.0].into_dyn();
        assert!(pool_hidden_states(flat, &[]).is_err());
    }

    #[test]
    fn missing_model_files_fail_to_load() {
        let dir = std::env::temp_dir().join("mentor-embeddings-missing-model");
        let err = OnnxEmbedder::load(&dir).err().expect("load must fail");
        assert!(err.to_string().contains(MODEL_FILE), "unexpected error: {err}");
    }
}
