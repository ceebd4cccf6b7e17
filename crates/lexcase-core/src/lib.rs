//! Core types and text processing shared by the LexCase crates.

pub mod chat;
pub mod lemma;
pub mod normalize;

pub use chat::{ChatMessage, ChatTurn, Document, History, SourcePassage};
pub use lemma::{LemmaError, Lemmatizer};
pub use normalize::{CharFilter, TextNormalizer, normalize};
