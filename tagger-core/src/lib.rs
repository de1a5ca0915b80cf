//! # tagger-core — sequential token labeler
//!
//! A configuration-driven feature engine, a multinomial logistic-regression
//! classifier, and an n-gram transition model combine through Viterbi
//! decoding to assign one label per token of a tabular corpus.
//!
//! ```text
//! tabular stream -> feature engine -> classifier (+ transition model) -> Viterbi -> labeled stream
//! ```
//!
//! Every component is grounded on the HunTag3 reference implementation;
//! see `DESIGN.md` for the module-by-module grounding ledger.

pub mod bookkeeper;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod features;
pub mod tagger;
pub mod token;
pub mod transition;
pub mod viterbi;

pub use bookkeeper::BookKeeper;
pub use classifier::Classifier;
pub use config::FeatureConfig;
pub use engine::FeatureEngine;
pub use error::{Result, TaggerError};
pub use tagger::{TaggerModel, Trainer};
pub use token::{FieldNames, Sentence, SentenceIterator, Token};
pub use transition::{ModelOrder, TransitionModel};
