//! Cross-encoder relevance scoring (ms-marco-MiniLM-L-6-v2).
//!
//! Scores `(query, passage)` pairs jointly; used to rerank the vector
//! retriever's candidates before they are handed to the language model.

use std::path::Path;

use crate::onnx::{BatchInputs, OnnxError, OnnxModel};

pub struct CrossEncoder {
    model: OnnxModel,
}

impl CrossEncoder {
    /// Load from a directory containing `model.onnx` and `tokenizer.json`.
    pub fn load(model_dir: &Path) -> Result<Self, OnnxError> {
        Ok(Self {
            model: OnnxModel::load(model_dir)?,
        })
    }

    /// Relevance logit for each passage against `query`, in passage order.
    pub fn score(&mut self, query: &str, passages: &[&str]) -> Result<Vec<f32>, OnnxError> {
        if passages.is_empty() {
            return Ok(vec![]);
        }

        let pairs: Vec<(&str, &str)> = passages.iter().map(|p| (query, *p)).collect();
        let encodings = self.model.encode(pairs)?;
        let inputs = BatchInputs::from_encodings(&encodings);
        let (dims, logits) = inputs.run(&mut self.model.session)?;

        // Logits: [batch_size, 1].
        let shape: Option<[i64; 2]> = dims.as_slice().try_into().ok();
        match shape {
            Some([rows, width]) if rows as usize == inputs.batch_size && width >= 1 => Ok(logits
                .chunks_exact(width as usize)
                .map(|row| row[0])
                .collect()),
            _ => Err(OnnxError::Shape {
                actual: dims,
                expected: format!("[{}, 1]", inputs.batch_size),
            }),
        }
    }
}
