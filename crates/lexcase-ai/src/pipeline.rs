//! Exported text-classification pipelines: TF-IDF features into linear models.
//!
//! Pipelines are persisted as JSON tagged by `kind`:
//!
//! - `linear`: one TF-IDF vectorizer feeding one linear classifier
//! - `voting`: hard-voting ensemble of `linear` members
//! - `stacking`: `linear` members whose class probabilities feed a final
//!   linear estimator
//!
//! The vectorizer reproduces scikit-learn's `TfidfVectorizer` transform
//! (token filter, n-grams, optional sublinear tf, idf weighting, l1/l2 norm)
//! over already-normalised text.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactError, Code, PredictiveArtifact, PredictionError, Validate, load_json};

/// Sparse feature vector, sorted by column.
type Features = Vec<(usize, f32)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_norm() -> Option<Norm> {
    Some(Norm::L2)
}

fn default_min_token_len() -> usize {
    2
}

/// TF-IDF vectorizer over whitespace-separated tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Term (n-gram joined by single spaces) → feature column.
    pub vocabulary: HashMap<String, usize>,
    /// Inverse document frequency per column.
    pub idf: Vec<f32>,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default = "default_norm")]
    pub norm: Option<Norm>,
    /// Tokens shorter than this are ignored (scikit-learn's default token pattern keeps 2+).
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,
}

impl TfidfVectorizer {
    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    pub fn transform(&self, text: &str) -> Features {
        let tokens: Vec<&str> = text
            .split_whitespace()
            .filter(|t| t.chars().count() >= self.min_token_len)
            .collect();

        let (min_n, max_n) = self.ngram_range;
        let mut counts: BTreeMap<usize, f32> = BTreeMap::new();
        for n in min_n.max(1)..=max_n {
            for window in tokens.windows(n) {
                let term = window.join(" ");
                if let Some(&col) = self.vocabulary.get(&term) {
                    *counts.entry(col).or_insert(0.0) += 1.0;
                }
            }
        }

        let mut features: Features = counts
            .into_iter()
            .map(|(col, tf)| {
                let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
                (col, tf * self.idf[col])
            })
            .collect();

        match self.norm {
            Some(Norm::L2) => {
                let norm = features.iter().map(|(_, v)| v * v).sum::<f32>().sqrt();
                scale(&mut features, norm);
            }
            Some(Norm::L1) => {
                let norm = features.iter().map(|(_, v)| v.abs()).sum::<f32>();
                scale(&mut features, norm);
            }
            None => {}
        }

        features
    }
}

impl Validate for TfidfVectorizer {
    fn validate(&self) -> Result<(), String> {
        let n = self.n_features();
        if let Some((term, &col)) = self.vocabulary.iter().find(|&(_, &col)| col >= n) {
            return Err(format!("vocabulary term {term:?} maps to column {col}, but idf has {n} entries"));
        }
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(format!("invalid ngram_range ({min_n}, {max_n})"));
        }
        Ok(())
    }
}

fn scale(features: &mut Features, norm: f32) {
    if norm > 0.0 {
        for (_, v) in features.iter_mut() {
            *v /= norm;
        }
    }
}

/// Linear decision function over a fixed feature space.
///
/// Binary models carry a single coefficient row whose positive side is
/// `classes[1]`, as scikit-learn exports them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearClassifier {
    /// `[n_rows][n_features]`
    pub coef: Vec<Vec<f32>>,
    pub intercept: Vec<f32>,
    pub classes: Vec<Code>,
}

impl LinearClassifier {
    pub fn n_features(&self) -> usize {
        self.coef.first().map_or(0, Vec::len)
    }

    fn is_binary(&self) -> bool {
        self.coef.len() == 1 && self.classes.len() == 2
    }

    fn decision(&self, x: &[(usize, f32)]) -> Vec<f32> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, b)| b + x.iter().map(|&(col, v)| row[col] * v).sum::<f32>())
            .collect()
    }

    /// Class probabilities, one per entry of `classes`.
    pub fn probabilities(&self, x: &[(usize, f32)]) -> Vec<f32> {
        let scores = self.decision(x);
        if self.is_binary() {
            let p = sigmoid(scores[0]);
            vec![1.0 - p, p]
        } else {
            softmax(&scores)
        }
    }

    /// Best class and its probability.
    pub fn predict_one(&self, x: &[(usize, f32)]) -> (Code, f32) {
        let probs = self.probabilities(x);
        let best = argmax(&probs);
        (self.classes[best].clone(), probs[best])
    }

    fn check(&self, n_features: usize) -> Result<(), String> {
        if self.classes.len() < 2 {
            return Err(format!("classifier needs at least 2 classes, has {}", self.classes.len()));
        }
        let expected_rows = if self.classes.len() == 2 && self.coef.len() == 1 {
            1
        } else {
            self.classes.len()
        };
        if self.coef.len() != expected_rows {
            return Err(format!(
                "coef has {} rows for {} classes",
                self.coef.len(),
                self.classes.len()
            ));
        }
        if self.intercept.len() != self.coef.len() {
            return Err(format!(
                "intercept has {} entries for {} coef rows",
                self.intercept.len(),
                self.coef.len()
            ));
        }
        if let Some(i) = self.coef.iter().position(|row| row.len() != n_features) {
            return Err(format!(
                "coef row {i} has {} columns, expected {n_features}",
                self.coef[i].len()
            ));
        }
        Ok(())
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the first maximum.
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// A vectorizer and the classifier fitted on its output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearTextModel {
    pub vectorizer: TfidfVectorizer,
    pub classifier: LinearClassifier,
}

impl LinearTextModel {
    fn predict_one(&self, text: &str) -> (Code, f32) {
        self.classifier.predict_one(&self.vectorizer.transform(text))
    }

    fn probabilities(&self, text: &str) -> Vec<f32> {
        self.classifier.probabilities(&self.vectorizer.transform(text))
    }

    /// Width of this model's contribution to a stacked feature vector.
    fn stacked_width(&self) -> usize {
        if self.classifier.classes.len() == 2 { 1 } else { self.classifier.classes.len() }
    }
}

impl Validate for LinearTextModel {
    fn validate(&self) -> Result<(), String> {
        self.vectorizer.validate()?;
        self.classifier.check(self.vectorizer.n_features())
    }
}

/// Hard-voting ensemble. Ties go to the class listed first in `classes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingEnsemble {
    pub classes: Vec<Code>,
    pub members: Vec<LinearTextModel>,
}

impl VotingEnsemble {
    fn predict_one(&self, text: &str) -> Result<(Code, f32), PredictionError> {
        let mut votes = vec![0.0f32; self.classes.len()];
        for member in &self.members {
            let (code, _) = member.predict_one(text);
            let slot = self
                .classes
                .iter()
                .position(|c| *c == code)
                .ok_or_else(|| PredictionError::UnseenCode(code.clone()))?;
            votes[slot] += 1.0;
        }
        let best = argmax(&votes);
        Ok((self.classes[best].clone(), votes[best] / self.members.len() as f32))
    }
}

impl Validate for VotingEnsemble {
    fn validate(&self) -> Result<(), String> {
        if self.members.is_empty() {
            return Err("voting ensemble has no members".into());
        }
        for (i, member) in self.members.iter().enumerate() {
            member.validate().map_err(|e| format!("member {i}: {e}"))?;
            if let Some(code) = member
                .classifier
                .classes
                .iter()
                .find(|c| !self.classes.contains(c))
            {
                return Err(format!("member {i} predicts class {code} not in the ensemble"));
            }
        }
        Ok(())
    }
}

/// Stacking ensemble: member probabilities are concatenated and fed to a final estimator.
///
/// Binary members contribute only their positive-class probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackingEnsemble {
    pub members: Vec<LinearTextModel>,
    pub final_estimator: LinearClassifier,
}

impl StackingEnsemble {
    fn predict_one(&self, text: &str) -> (Code, f32) {
        let mut stacked: Features = Vec::new();
        for member in &self.members {
            let probs = member.probabilities(text);
            let probs = if probs.len() == 2 { &probs[1..] } else { &probs[..] };
            let offset = stacked.len();
            stacked.extend(probs.iter().enumerate().map(|(i, &p)| (offset + i, p)));
        }
        self.final_estimator.predict_one(&stacked)
    }
}

impl Validate for StackingEnsemble {
    fn validate(&self) -> Result<(), String> {
        if self.members.is_empty() {
            return Err("stacking ensemble has no members".into());
        }
        for (i, member) in self.members.iter().enumerate() {
            member.validate().map_err(|e| format!("member {i}: {e}"))?;
        }
        let width: usize = self.members.iter().map(LinearTextModel::stacked_width).sum();
        self.final_estimator
            .check(width)
            .map_err(|e| format!("final estimator: {e}"))
    }
}

/// A persisted classification pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextPipeline {
    Linear(LinearTextModel),
    Voting(VotingEnsemble),
    Stacking(StackingEnsemble),
}

impl TextPipeline {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        load_json(path)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Linear(_) => "linear",
            Self::Voting(_) => "voting",
            Self::Stacking(_) => "stacking",
        }
    }

    fn predict_one(&self, text: &str) -> Result<(Code, f32), PredictionError> {
        match self {
            Self::Linear(m) => Ok(m.predict_one(text)),
            Self::Voting(m) => m.predict_one(text),
            Self::Stacking(m) => Ok(m.predict_one(text)),
        }
    }
}

impl Validate for TextPipeline {
    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Linear(m) => m.validate(),
            Self::Voting(m) => m.validate(),
            Self::Stacking(m) => m.validate(),
        }
    }
}

impl PredictiveArtifact for TextPipeline {
    fn predict(&self, inputs: &[String]) -> Result<Vec<Code>, PredictionError> {
        inputs
            .iter()
            .map(|text| self.predict_one(text).map(|(code, _)| code))
            .collect()
    }

    fn predict_with_confidence(
        &self,
        inputs: &[String],
    ) -> Result<Vec<(Code, Option<f32>)>, PredictionError> {
        inputs
            .iter()
            .map(|text| self.predict_one(text).map(|(code, p)| (code, Some(p))))
            .collect()
    }
}
