//! Lookup-driven lemmatization.
//!
//! A [`Lemmatizer`] maps inflected forms to their dictionary base form
//! (`"contracts" → "contract"`). Tokens without an entry pass through
//! unchanged. Chains in the source table (`a → b`, `b → c`) are collapsed at
//! construction so every lookup lands on a fixed point and lemmatizing twice
//! is the same as lemmatizing once.
//!
//! Lemmas must be plain ASCII words so that a lemmatized token survives a
//! second normalisation pass unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LemmaError {
    #[error("lemma table not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read lemma table: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed lemma table line {line}: {content:?}")]
    Malformed { line: usize, content: String },

    #[error("lemma {lemma:?} for {form:?} is not a single ASCII word")]
    InvalidLemma { form: String, lemma: String },
}

fn is_plain_word(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphabetic())
}

#[derive(Debug, Clone, Default)]
pub struct Lemmatizer {
    table: HashMap<String, String>,
}

impl Lemmatizer {
    /// Build from `(form, lemma)` pairs. Later pairs override earlier ones.
    ///
    /// Every lemma must consist of ASCII letters only.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, LemmaError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut raw = HashMap::new();
        for (form, lemma) in pairs {
            let form = form.into().to_ascii_lowercase();
            let lemma = lemma.into().to_ascii_lowercase();
            if !is_plain_word(&lemma) {
                return Err(LemmaError::InvalidLemma { form, lemma });
            }
            raw.insert(form, lemma);
        }

        let table = raw
            .keys()
            .filter_map(|form| {
                let lemma = resolve(&raw, form);
                (lemma != *form).then(|| (form.clone(), lemma))
            })
            .collect();

        Ok(Self { table })
    }

    /// Parse a tab-separated `form<TAB>lemma` table.
    ///
    /// Blank lines and lines starting with `#` are ignored.
    pub fn from_tsv(contents: &str) -> Result<Self, LemmaError> {
        let mut pairs = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut fields = trimmed.split('\t').map(str::trim);
            match (fields.next(), fields.next(), fields.next()) {
                (Some(form), Some(lemma), None) if !form.is_empty() && !lemma.is_empty() => {
                    pairs.push((form.to_string(), lemma.to_string()));
                }
                _ => {
                    return Err(LemmaError::Malformed {
                        line: idx + 1,
                        content: line.to_string(),
                    });
                }
            }
        }
        Self::from_pairs(pairs)
    }

    /// Load a lemma table from disk.
    pub fn load(path: &Path) -> Result<Self, LemmaError> {
        if !path.exists() {
            return Err(LemmaError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let lemmatizer = Self::from_tsv(&contents)?;
        tracing::info!(path = %path.display(), entries = lemmatizer.len(), "loaded lemma table");
        Ok(lemmatizer)
    }

    /// Base form of `token`, or `token` itself when unknown.
    pub fn lemmatize<'a>(&'a self, token: &'a str) -> &'a str {
        self.table.get(token).map(String::as_str).unwrap_or(token)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Follow `form` through the table until it reaches a word with no entry.
///
/// A cycle resolves to its lexicographically smallest member, which is then
/// dropped from the final table.
fn resolve(raw: &HashMap<String, String>, form: &str) -> String {
    let mut path: Vec<&str> = vec![form];
    let mut current = form;

    while let Some(next) = raw.get(current) {
        let next = next.as_str();
        if let Some(pos) = path.iter().position(|p| *p == next) {
            return path[pos..].iter().min().copied().unwrap_or(next).to_string();
        }
        path.push(next);
        current = next;
    }

    current.to_string()
}
