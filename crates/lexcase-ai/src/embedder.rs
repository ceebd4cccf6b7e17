//! Sentence embeddings for precedent retrieval (all-MiniLM-L6-v2, 384 dimensions).
//!
//! Queries must be embedded with the same model the precedent collection was
//! indexed with, or nearest-neighbour search returns noise.

use std::path::Path;

use tracing::info;

use crate::onnx::{BatchInputs, OnnxError, OnnxModel, l2_normalize};

/// Mean-pooled, unit-length sentence embeddings via ONNX Runtime.
pub struct Embedder {
    model: OnnxModel,
    dim: usize,
}

impl Embedder {
    /// Load from a directory containing `model.onnx` and `tokenizer.json`.
    pub fn load(model_dir: &Path) -> Result<Self, OnnxError> {
        let model = OnnxModel::load(model_dir)?;
        let dim = infer_dim(model.session.outputs()[0].dtype()).unwrap_or(384);
        info!(dim, "embedding model ready");
        Ok(Self { model, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Embed a single query string.
    pub fn embed(&mut self, text: &str) -> Result<Vec<f32>, OnnxError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or(OnnxError::NoOutput)
    }

    /// Embed a batch of texts, returning one normalized vector per input.
    pub fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, OnnxError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self.model.encode(texts.to_vec())?;
        let inputs = BatchInputs::from_encodings(&encodings);
        let (dims, hidden) = inputs.run(&mut self.model.session)?;

        // Token embeddings: [batch_size, seq_len, dim].
        let expected = [inputs.batch_size, inputs.seq_len, self.dim].map(|d| d as i64);
        if inputs.seq_len == 0 || dims != expected {
            return Err(OnnxError::Shape {
                actual: dims,
                expected: format!("{expected:?}"),
            });
        }

        Ok(mean_pool(&hidden, &inputs.attention_mask, inputs.seq_len, self.dim))
    }
}

/// Average each sequence's unmasked token vectors, then scale to unit length.
///
/// `hidden` is `[batch, seq_len, dim]` and `mask` is `[batch, seq_len]`, both row-major.
fn mean_pool(hidden: &[f32], mask: &[i64], seq_len: usize, dim: usize) -> Vec<Vec<f32>> {
    hidden
        .chunks_exact(seq_len * dim)
        .zip(mask.chunks_exact(seq_len))
        .map(|(tokens, mask)| {
            let mut pooled = vec![0.0f32; dim];
            let mut count = 0.0f32;
            for (token, _) in tokens.chunks_exact(dim).zip(mask).filter(|(_, m)| **m > 0) {
                for (p, x) in pooled.iter_mut().zip(token) {
                    *p += x;
                }
                count += 1.0;
            }
            if count > 0.0 {
                pooled.iter_mut().for_each(|p| *p /= count);
            }
            l2_normalize(&mut pooled);
            pooled
        })
        .collect()
}

/// Last dimension of the model's output tensor, if static.
fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}
