//! The feature-function catalog (C2) and its startup-time registry.
//!
//! Grounded on `examples/original_source/features.py`. Every function
//! conforms to one of two uniform signatures keyed by `FeatureKind`: a typed
//! registry replaces the reference's runtime `getattr`-style dispatch, and
//! unknown names are rejected at configuration load time rather than at
//! first use.

pub mod lexicon;
pub mod registry;
pub mod sentence_features;
pub mod token_features;

use std::collections::HashMap;

use crate::token::Token;

/// A feature function's free-form parameters (`n`, `rad`, `lang`, ...),
/// destructured by the function itself; absent keys fall back to documented
/// defaults.
pub type Options = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Token,
    Sentence,
    Lex,
}

/// `kind=token`: `(value, options) -> list<str>`, applied independently to
/// one column of each token.
pub type TokenFeatureFn = fn(&str, &Options) -> Vec<String>;

/// `kind=sentence`: `(sentence, field_indices, options) -> list<list<str>>`,
/// one list per position.
pub type SentenceFeatureFn = fn(&[Token], &[usize], &Options) -> Vec<Vec<String>>;

pub use registry::FeatureRegistry;
