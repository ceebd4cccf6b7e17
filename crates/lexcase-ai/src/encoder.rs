//! Label encoder artifact: class index ↔ label string.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactError, Code, LabelEncoder, PredictionError, Validate, load_json};

/// Ordered list of class labels; class `i` decodes to `classes[i]`.
///
/// Persisted as `{"classes": ["Civil", "Criminal", ...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEncoder {
    pub classes: Vec<String>,
}

impl ClassEncoder {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        load_json(path)
    }

    fn decode_one(&self, code: &Code) -> Result<String, PredictionError> {
        match code {
            Code::Index(i) => self.classes.get(*i).cloned(),
            Code::Label(label) => self.classes.iter().find(|c| *c == label).cloned(),
        }
        .ok_or_else(|| PredictionError::UnseenCode(code.clone()))
    }
}

impl LabelEncoder for ClassEncoder {
    fn decode(&self, codes: &[Code]) -> Result<Vec<String>, PredictionError> {
        codes.iter().map(|c| self.decode_one(c)).collect()
    }
}

impl Validate for ClassEncoder {
    fn validate(&self) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err("encoder has no classes".into());
        }
        let mut seen = HashSet::with_capacity(self.classes.len());
        for class in &self.classes {
            if !seen.insert(class.as_str()) {
                return Err(format!("duplicate class label {class:?}"));
            }
        }
        Ok(())
    }
}
