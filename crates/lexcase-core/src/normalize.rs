//! Text normalisation for the case classifiers.
//!
//! The classifier artifacts were fitted on text produced by exactly this
//! transformation, so the character filter, casing rule and stopword set must
//! not drift:
//!
//! 1. Drop (or, in the alphanumeric variant, blank out) every character that is
//!    not an ASCII letter/digit or whitespace
//! 2. Lowercase
//! 3. Split on whitespace
//! 4. Remove English stopwords
//! 5. Optionally lemmatize through a [`Lemmatizer`] lookup table, dropping
//!    tokens whose lemma is a stopword
//! 6. Rejoin with single spaces
//!
//! Normalisation is total and idempotent: `normalize(normalize(s)) == normalize(s)`.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::lemma::Lemmatizer;

/// Common English stopwords removed before classification.
pub const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", //
    "has", "he", "in", "is", "it", "its", "of", "on", "or", "that", //
    "the", "to", "was", "will", "with", "would", "you", "your", //
    "i", "me", "my", "we", "us", "our", "they", "them", "this", "but", //
    "not", "no", "so", "do", "does", "did", "have", "had", "if", "how", //
    "what", "when", "where", "who", "which", "why", "all", "each", "every",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

// U+001C..U+001F count as whitespace for the classifier's training tokenizer,
// but are not in Unicode's White_Space set.
static NON_ALPHA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z\s\x1C-\x1F]").expect("static regex"));

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]").expect("static regex"));

/// Returns `true` if `token` is in the fixed stopword set.
pub fn is_stopword(token: &str) -> bool {
    STOPWORD_SET.contains(token)
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '\u{1c}'..='\u{1f}')
}

/// Which characters survive the first normalisation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CharFilter {
    /// Keep ASCII letters and whitespace; delete everything else.
    #[default]
    Alphabetic,
    /// Keep ASCII letters and digits; replace everything else with a space.
    Alphanumeric,
}

impl CharFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alphabetic => "alphabetic",
            Self::Alphanumeric => "alphanumeric",
        }
    }

    fn apply<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        match self {
            Self::Alphabetic => NON_ALPHA.replace_all(text, ""),
            Self::Alphanumeric => NON_ALNUM.replace_all(text, " "),
        }
    }
}

impl FromStr for CharFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alphabetic" | "alpha" => Ok(Self::Alphabetic),
            "alphanumeric" | "alnum" => Ok(Self::Alphanumeric),
            other => Err(format!(
                "unknown character filter '{other}' (expected 'alphabetic' or 'alphanumeric')"
            )),
        }
    }
}

/// Stateless text normaliser. Cheap to clone and safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    filter: CharFilter,
    lemmatizer: Option<Lemmatizer>,
}

impl TextNormalizer {
    pub fn new(filter: CharFilter) -> Self {
        Self {
            filter,
            lemmatizer: None,
        }
    }

    /// Enable the lemmatization step.
    pub fn with_lemmatizer(mut self, lemmatizer: Lemmatizer) -> Self {
        self.lemmatizer = Some(lemmatizer);
        self
    }

    pub fn char_filter(&self) -> CharFilter {
        self.filter
    }

    pub fn lemmatizes(&self) -> bool {
        self.lemmatizer.is_some()
    }

    /// Normalise raw case text into the classifier's token stream.
    ///
    /// Stopwords are checked both before and after lemmatization.
    pub fn normalize(&self, text: &str) -> String {
        let filtered = self.filter.apply(text).to_ascii_lowercase();

        let mut out = String::with_capacity(filtered.len());
        for token in filtered.split(is_separator) {
            if token.is_empty() || is_stopword(token) {
                continue;
            }
            let token = match &self.lemmatizer {
                Some(lemmatizer) => lemmatizer.lemmatize(token),
                None => token,
            };
            // A lemma may itself be a stopword ("having" -> "have").
            if is_stopword(token) {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(token);
        }
        out
    }

    /// Like [`normalize`](Self::normalize), treating a missing value as empty text.
    pub fn normalize_opt(&self, text: Option<&str>) -> String {
        text.map(|t| self.normalize(t)).unwrap_or_default()
    }
}

/// Normalise with the default settings (alphabetic filter, no lemmatization).
pub fn normalize(text: &str) -> String {
    TextNormalizer::default().normalize(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        "   ",
        "The defendant breached the contract terms repeatedly",
        "Breach, of Contract!!",
        "Section 3(1)(a) of the Act 1974 applies; see R v. Smith [2001] UKHL 12.",
        "Tab\tseparated\nand\r\nnew-lined text",
        "Café owner's lease — terminated ‘early’",
        "WHO IS THE LANDLORD AND WHAT DID THEY DO?",
        "unit\u{1f}separated\u{1c}file",
    ];

    #[test]
    fn removes_stopwords_and_punctuation() {
        assert_eq!(
            normalize("The defendant breached the contract terms repeatedly"),
            "defendant breached contract terms repeatedly"
        );
    }

    #[test]
    fn case_and_symbol_invariant() {
        assert_eq!(normalize("Breach, of Contract!!"), normalize("breach of contract"));
        assert_eq!(normalize("breach of contract"), "breach contract");
    }

    #[test]
    fn empty_and_missing_input() {
        let n = TextNormalizer::default();
        assert_eq!(n.normalize(""), "");
        assert_eq!(n.normalize_opt(None), "");
        assert_eq!(n.normalize("!!! ??? ..."), "");
        assert_eq!(n.normalize("the and of"), "");
    }

    #[test]
    fn every_stopword_is_removed() {
        for w in STOPWORDS {
            let out = normalize(&format!("The {w} case"));
            assert!(
                !out.split(' ').any(|t| t == *w),
                "stopword {w:?} survived in {out:?}"
            );
            assert_eq!(out, "case");
        }
    }

    #[test]
    fn stopword_set_has_no_duplicates() {
        assert_eq!(STOPWORD_SET.len(), STOPWORDS.len());
    }

    #[test]
    fn alphabetic_deletes_symbols_inside_words() {
        // Deletion joins the fragments; digits are dropped entirely.
        assert_eq!(normalize("e-mail sent 12 times"), "email sent times");
        assert_eq!(normalize("tenant's"), "tenants");
    }

    #[test]
    fn alphanumeric_blanks_symbols() {
        let n = TextNormalizer::new(CharFilter::Alphanumeric);
        assert_eq!(n.normalize("e-mail sent 12 times"), "e mail sent 12 times");
        assert_eq!(n.normalize("tenant's"), "tenant s");
        assert_eq!(n.normalize("Section 3(1)(a)"), "section 3 1");
    }

    #[test]
    fn non_ascii_letters_are_stripped() {
        assert_eq!(normalize("Café naïve"), "caf nave");
    }

    #[test]
    fn information_separators_split_tokens() {
        assert_eq!(normalize("unit\u{1f}separated\u{1c}file"), "unit separated file");
    }

    #[test]
    fn idempotent_for_both_filters() {
        for filter in [CharFilter::Alphabetic, CharFilter::Alphanumeric] {
            let n = TextNormalizer::new(filter);
            for s in SAMPLES {
                let once = n.normalize(s);
                assert_eq!(n.normalize(&once), once, "{filter:?} not idempotent for {s:?}");
            }
        }
    }

    #[test]
    fn idempotent_with_lemmatizer() {
        let lemmatizer = Lemmatizer::from_pairs([
            ("contracts", "contract"),
            ("terms", "term"),
            ("breached", "breach"),
        ])
        .unwrap();
        let n = TextNormalizer::default().with_lemmatizer(lemmatizer);
        let once = n.normalize("The contracts' terms were breached");
        assert_eq!(once, "contract term were breach");
        assert_eq!(n.normalize(&once), once);
    }

    #[test]
    fn lemma_that_is_a_stopword_is_dropped() {
        let lemmatizer = Lemmatizer::from_pairs([
            ("having", "have"),
            ("judgments", "judgment"),
            ("doing", "do"),
        ])
        .unwrap();
        let n = TextNormalizer::default().with_lemmatizer(lemmatizer);
        let once = n.normalize("Having judgments, doing appeals");
        assert_eq!(once, "judgment appeals");
        assert_eq!(n.normalize(&once), once);
    }

    #[test]
    fn char_filter_from_str() {
        assert_eq!("alphabetic".parse::<CharFilter>(), Ok(CharFilter::Alphabetic));
        assert_eq!("AlNum".parse::<CharFilter>(), Ok(CharFilter::Alphanumeric));
        assert!("unicode".parse::<CharFilter>().is_err());
    }
}
