//! The Tagger Orchestrator (C8): wires the feature engine, book-keepers,
//! classifier, and transition model into the seven CLI tasks.
//!
//! Grounded on `huntag/tagger.py: Tagger` and `huntag/trainer.py: Trainer`.

use std::collections::HashSet;
use std::io::Write;

use crate::bookkeeper::BookKeeper;
use crate::classifier::{Classifier, TrainParams};
use crate::engine::FeatureEngine;
use crate::error::{Result, TaggerError};
use crate::events::EventBuilder;
use crate::token::Sentence;
use crate::transition::{ModelOrder, TransitionModel};
use crate::viterbi;

/// Everything persisted between a training run and a tagging run.
pub struct TaggerModel {
    pub feature_book: BookKeeper,
    pub label_book: BookKeeper,
    pub classifier: Classifier,
    pub transitions: TransitionModel,
}

/// Collects training events and the gold label sequence per sentence so the
/// transition model can be trained alongside the classifier.
pub struct Trainer<'a> {
    engine: &'a FeatureEngine,
    events: EventBuilder,
    label_sequences: Vec<Vec<String>>,
    used_feats: Option<HashSet<String>>,
}

impl<'a> Trainer<'a> {
    pub fn new(engine: &'a FeatureEngine) -> Self {
        Trainer { engine, events: EventBuilder::new(), label_sequences: Vec::new(), used_feats: None }
    }

    /// Restricts accepted feature strings to a whitelist loaded once, before
    /// any sentence is added.
    pub fn with_used_feats(engine: &'a FeatureEngine, used_feats: HashSet<String>) -> Self {
        Trainer { engine, events: EventBuilder::new(), label_sequences: Vec::new(), used_feats: Some(used_feats) }
    }

    pub fn add_sentence(&mut self, sentence: &Sentence, gold_field: usize) -> Result<()> {
        let features = self.engine.featurize_sentence(sentence)?;
        let gold: Vec<String> = sentence.iter().map(|tok| tok[gold_field].clone()).collect();
        self.events.add_sentence(&features, &gold, self.used_feats.as_ref());
        self.label_sequences.push(gold);
        Ok(())
    }

    /// Writes the featurized-file format for `train-featurize`.
    pub fn write_featurized<W: Write>(&self, sentence: &Sentence, gold_field: usize, writer: W) -> Result<()> {
        let features = self.engine.featurize_sentence(sentence)?;
        let gold: Vec<String> = sentence.iter().map(|tok| tok[gold_field].clone()).collect();
        self.events.write_featurized(writer, &features, &gold)
    }

    /// Finishes event collection, applies cutoff, trains the classifier and
    /// the transition model, and returns the assembled `TaggerModel`.
    pub fn finish(mut self, cutoff: u32, trans_order: ModelOrder, train_params: TrainParams) -> Result<TaggerModel> {
        self.events.cutoff(cutoff)?;
        let label_book = self.events.label_book().clone();
        let feature_book = self.events.feature_book().clone();
        let (num_rows, num_features, triples, labels) = self.events.into_parts();

        let mut classifier = Classifier::new(num_features, label_book.size() as u32);
        classifier.fit(num_rows, &triples, &labels, train_params);

        let boundary = label_book.size() as u32;
        let mut transitions = TransitionModel::new(trans_order, boundary);
        for labels in &self.label_sequences {
            let ids: Vec<u32> = labels.iter().filter_map(|l| label_book.lookup(l)).collect();
            if ids.len() == labels.len() {
                transitions.obs_sequence(&ids);
            }
        }
        transitions.compile();

        Ok(TaggerModel { feature_book, label_book, classifier, transitions })
    }

    pub fn most_informative_features(&self, k: usize) -> Vec<(String, f64, String, String)> {
        self.events.most_informative_features(k)
    }
}

/// Builds the active (present) feature-column ids for one token position,
/// silently dropping feature strings unseen at training time — `lookup`
/// mirrors the reference's tagging-time get-or-None behavior.
fn active_columns(feature_book: &BookKeeper, feats: &[String]) -> Vec<u32> {
    feats.iter().filter_map(|f| feature_book.lookup(f)).collect()
}

/// Tags one sentence: featurizes it, scores each position independently
/// with the classifier, and decodes the best label sequence with Viterbi.
/// Returns label *names*, one per token, in order.
pub fn tag_sentence(
    model: &TaggerModel,
    engine: &FeatureEngine,
    sentence: &Sentence,
    language_model_weight: f64,
) -> Result<Vec<String>> {
    let features = engine.featurize_sentence(sentence)?;
    let emissions: Vec<Vec<f64>> = features
        .iter()
        .map(|feats| {
            let cols = active_columns(&model.feature_book, feats);
            model.classifier.predict_proba_row(&cols)
        })
        .collect();

    let label_ids = viterbi::decode(&emissions, &model.transitions, language_model_weight);
    let names = model.label_book.names_by_id();
    label_ids
        .into_iter()
        .map(|id| names.get(&id).cloned().ok_or_else(|| TaggerError::format("decoded an unknown label id")))
        .collect()
}

/// Tags one sentence whose features were already computed and stored in a
/// featurized file (`tag-featurize` input mode): `featurized_rows[pos]` is
/// that position's list of feature strings, read back from the file rather
/// than recomputed by the feature engine.
pub fn tag_featurized_sentence(
    model: &TaggerModel,
    featurized_rows: &[Vec<String>],
    language_model_weight: f64,
) -> Result<Vec<String>> {
    let emissions: Vec<Vec<f64>> = featurized_rows
        .iter()
        .map(|feats| {
            let cols = active_columns(&model.feature_book, feats);
            model.classifier.predict_proba_row(&cols)
        })
        .collect();

    let label_ids = viterbi::decode(&emissions, &model.transitions, language_model_weight);
    let names = model.label_book.names_by_id();
    label_ids
        .into_iter()
        .map(|id| names.get(&id).cloned().ok_or_else(|| TaggerError::format("decoded an unknown label id")))
        .collect()
}

/// `print-weights`: formats the top/bottom-`k` coefficients of every label,
/// matching `tagger.py: print_weights`'s dump format
/// `{feature_name}\t{weight:.6}`.
pub fn format_top_weights(model: &TaggerModel, k: usize) -> String {
    let feature_names = model.feature_book.names_by_id();
    let label_names = model.label_book.names_by_id();
    let mut out = String::new();

    let mut label_ids: Vec<u32> = label_names.keys().copied().collect();
    label_ids.sort_unstable();
    for label in label_ids {
        let label_name = &label_names[&label];
        out.push_str(&format!("# label: {label_name}\n"));
        let (top, bottom) = model.classifier.top_weights(label, k);
        for (feat, weight) in top {
            let name = feature_names.get(&feat).cloned().unwrap_or_default();
            out.push_str(&format!("{name}\t{weight:.6}\n"));
        }
        out.push_str("...\n");
        for (feat, weight) in bottom.into_iter().rev() {
            let name = feature_names.get(&feat).cloned().unwrap_or_default();
            out.push_str(&format!("{name}\t{weight:.6}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureDecl;
    use crate::features::{FeatureKind, FeatureRegistry};
    use crate::token::FieldNames;
    use std::collections::HashMap;

    fn build_engine() -> FeatureEngine {
        let registry = FeatureRegistry::with_builtins();
        let field_names = FieldNames::from_header("form\tlabel");
        let decl = FeatureDecl {
            name: "form".to_string(),
            kind: FeatureKind::Token,
            action_name: "lowerCase".to_string(),
            fields: vec!["form".to_string()],
            radius: 1,
            cutoff: 1,
            options: HashMap::new(),
        };
        FeatureEngine::bind(vec![decl], &field_names, None, registry).unwrap()
    }

    /// Training and tagging the same small corpus twice yields an identical
    /// label sequence both times (deterministic round trip).
    #[test]
    fn test_train_and_tag_round_trip_is_deterministic() {
        let engine = build_engine();
        let sentences: Vec<Sentence> = vec![
            vec![
                vec!["the".to_string(), "O".to_string()],
                vec!["Cat".to_string(), "B".to_string()],
            ],
            vec![
                vec!["a".to_string(), "O".to_string()],
                vec!["Dog".to_string(), "B".to_string()],
            ],
        ];

        let mut train = |sentences: &[Sentence]| -> TaggerModel {
            let mut trainer = Trainer::new(&engine);
            for s in sentences {
                trainer.add_sentence(s, 1).unwrap();
            }
            trainer
                .finish(1, ModelOrder::Bigram, TrainParams { epochs: 50, learning_rate: 0.3, l2: 0.0, batch_size: 4 })
                .unwrap()
        };

        let model_a = train(&sentences);
        let model_b = train(&sentences);

        let tag_once = |model: &TaggerModel| -> Vec<String> { tag_sentence(model, &engine, &sentences[0], 1.0).unwrap() };

        assert_eq!(tag_once(&model_a), tag_once(&model_b));
    }
}
