//! Shared ONNX Runtime plumbing for BERT-style sentence-transformers models.
//!
//! A model directory must contain `model.onnx` and `tokenizer.json`.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use ort::session::Session;
use ort::value::Tensor;
use thiserror::Error;
use tokenizers::{Encoding, PaddingParams, Tokenizer, TruncationParams};
use tracing::info;

/// Maximum sequence length for the MiniLM family.
const MAX_SEQ_LEN: usize = 256;

#[derive(Error, Debug)]
pub enum OnnxError {
    #[error("{file} not found in {}", dir.display())]
    MissingFile { dir: PathBuf, file: &'static str },

    #[error("onnx runtime failed to {step}: {message}")]
    Runtime { step: &'static str, message: String },

    #[error("tokenizer failed to {step}: {message}")]
    Tokenizer { step: &'static str, message: String },

    #[error("unexpected output shape {actual:?}, expected {expected}")]
    Shape { actual: Vec<i64>, expected: String },

    #[error("model returned no output")]
    NoOutput,
}

impl OnnxError {
    pub(crate) fn runtime<E: Display>(step: &'static str) -> impl FnOnce(E) -> Self {
        move |e| Self::Runtime {
            step,
            message: e.to_string(),
        }
    }

    pub(crate) fn tokenizer<E: Display>(step: &'static str) -> impl FnOnce(E) -> Self {
        move |e| Self::Tokenizer {
            step,
            message: e.to_string(),
        }
    }
}

pub(crate) struct OnnxModel {
    pub(crate) session: Session,
    pub(crate) tokenizer: Tokenizer,
}

impl OnnxModel {
    pub(crate) fn load(model_dir: &Path) -> Result<Self, OnnxError> {
        let model_path = require_file(model_dir, "model.onnx")?;
        let tokenizer_path = require_file(model_dir, "tokenizer.json")?;

        let session = Session::builder()
            .map_err(OnnxError::runtime("create session"))?
            .commit_from_file(&model_path)
            .map_err(OnnxError::runtime("load model"))?;

        let mut tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(OnnxError::tokenizer("load"))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(OnnxError::tokenizer("set truncation"))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        info!(model = %model_path.display(), "loaded onnx model");
        Ok(Self { session, tokenizer })
    }

    /// Tokenize a batch of single texts or `(query, passage)` pairs.
    pub(crate) fn encode<'s, E>(&self, inputs: Vec<E>) -> Result<Vec<Encoding>, OnnxError>
    where
        E: Into<tokenizers::EncodeInput<'s>> + Send,
    {
        self.tokenizer
            .encode_batch(inputs, true)
            .map_err(OnnxError::tokenizer("encode"))
    }
}

fn require_file(dir: &Path, file: &'static str) -> Result<PathBuf, OnnxError> {
    let path = dir.join(file);
    if path.exists() {
        Ok(path)
    } else {
        Err(OnnxError::MissingFile {
            dir: dir.to_path_buf(),
            file,
        })
    }
}

/// Padded `[batch_size, seq_len]` inputs built from a batch of encodings.
pub(crate) struct BatchInputs {
    pub(crate) batch_size: usize,
    pub(crate) seq_len: usize,
    pub(crate) input_ids: Vec<i64>,
    pub(crate) attention_mask: Vec<i64>,
    pub(crate) token_type_ids: Vec<i64>,
}

impl BatchInputs {
    pub(crate) fn from_encodings(encodings: &[Encoding]) -> Self {
        let batch_size = encodings.len();
        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let offset = i * seq_len;
            for (j, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[offset + j] = id as i64;
            }
            for (j, &mask) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[offset + j] = mask as i64;
            }
            for (j, &tid) in encoding.get_type_ids().iter().enumerate() {
                token_type_ids[offset + j] = tid as i64;
            }
        }

        Self {
            batch_size,
            seq_len,
            input_ids,
            attention_mask,
            token_type_ids,
        }
    }

    fn shape(&self) -> [i64; 2] {
        [self.batch_size as i64, self.seq_len as i64]
    }

    /// Run the session and return `(output_shape, output_data)` of the first output.
    pub(crate) fn run(&self, session: &mut Session) -> Result<(Vec<i64>, Vec<f32>), OnnxError> {
        let shape = self.shape();
        let tensor = |data: &[i64]| {
            Tensor::from_array((shape, data.to_vec().into_boxed_slice()))
                .map_err(OnnxError::runtime("build input tensor"))
        };

        let outputs = session
            .run(ort::inputs![
                "input_ids" => tensor(&self.input_ids)?,
                "attention_mask" => tensor(&self.attention_mask)?,
                "token_type_ids" => tensor(&self.token_type_ids)?,
            ])
            .map_err(OnnxError::runtime("run session"))?;

        let (output_shape, output_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(OnnxError::runtime("extract output"))?;
        let dims: &[i64] = output_shape;
        Ok((dims.to_vec(), output_data.to_vec()))
    }
}

/// L2-normalize a vector in place.
pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
