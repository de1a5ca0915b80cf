//! The Classifier Wrapper (C5): multinomial logistic regression over the
//! sparse feature matrix built by C4.
//!
//! No registry crate in the dependency pack offers a logistic-regression
//! solver (see `DESIGN.md`), so this generalizes the teacher's own
//! hand-rolled `MaxEntModel` (mini-batch SGD, softmax output, L2
//! regularization) from its fixed small NER tag set and dense per-token
//! feature map to the sparse `(row, col)` triples and arbitrary label
//! count produced by the training event builder.

use serde::{Deserialize, Serialize};

use crate::events::Triple;

/// Dense `num_features x num_labels` weight matrix, row-major, plus a
/// per-label bias term (analogous to the teacher's `(feature, tag) -> f64`
/// map, but indexed by dense integer ids rather than hashed strings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classifier {
    num_features: u32,
    num_labels: u32,
    weights: Vec<f64>,
    bias: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct TrainParams {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
    pub batch_size: usize,
}

impl Default for TrainParams {
    fn default() -> Self {
        TrainParams { epochs: 20, learning_rate: 0.1, l2: 1e-4, batch_size: 32 }
    }
}

impl Classifier {
    pub fn new(num_features: u32, num_labels: u32) -> Self {
        Classifier {
            num_features,
            num_labels,
            weights: vec![0.0; num_features as usize * num_labels as usize],
            bias: vec![0.0; num_labels as usize],
        }
    }

    fn weight(&self, feature: u32, label: u32) -> f64 {
        self.weights[feature as usize * self.num_labels as usize + label as usize]
    }

    fn weight_mut(&mut self, feature: u32, label: u32) -> &mut f64 {
        &mut self.weights[feature as usize * self.num_labels as usize + label as usize]
    }

    /// Row-grouped view of the sparse triples: `rows[r]` lists the active
    /// feature columns of row `r`.
    fn group_rows(num_rows: u32, triples: &[Triple]) -> Vec<Vec<u32>> {
        let mut rows = vec![Vec::new(); num_rows as usize];
        for t in triples {
            rows[t.row as usize].push(t.col);
        }
        rows
    }

    fn scores(&self, active_features: &[u32]) -> Vec<f64> {
        let mut scores = self.bias.clone();
        for &feat in active_features {
            for (label, score) in scores.iter_mut().enumerate() {
                *score += self.weight(feat, label as u32);
            }
        }
        scores
    }

    fn softmax(scores: &[f64]) -> Vec<f64> {
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    }

    /// `predict_proba`: per-row label distribution, in row order.
    pub fn predict_proba(&self, num_rows: u32, triples: &[Triple]) -> Vec<Vec<f64>> {
        let rows = Self::group_rows(num_rows, triples);
        rows.iter().map(|active| Self::softmax(&self.scores(active))).collect()
    }

    /// `predict_proba` for a single row's active feature columns, used at
    /// tagging time where each position is scored independently before
    /// Viterbi decoding combines emissions with the transition model.
    pub fn predict_proba_row(&self, active_features: &[u32]) -> Vec<f64> {
        Self::softmax(&self.scores(active_features))
    }

    /// `fit`: mini-batch SGD with L2 regularization, per-example gradient
    /// `error = indicator(label==true) - prob`, mirroring the teacher's
    /// update rule `w += rate * (error * feature_val - l2 * w)` with
    /// `feature_val` fixed at 1 for every active binary feature.
    pub fn fit(&mut self, num_rows: u32, triples: &[Triple], labels: &[u32], params: TrainParams) {
        let rows = Self::group_rows(num_rows, triples);
        let mut order: Vec<usize> = (0..num_rows as usize).collect();

        for epoch in 0..params.epochs {
            shuffle_deterministically(&mut order, epoch as u64);
            for batch in order.chunks(params.batch_size.max(1)) {
                for &row_idx in batch {
                    let active = &rows[row_idx];
                    let true_label = labels[row_idx];
                    let probs = Self::softmax(&self.scores(active));

                    for label in 0..self.num_labels {
                        let indicator = if label == true_label { 1.0 } else { 0.0 };
                        let error = indicator - probs[label as usize];
                        if error.abs() < 1e-9 {
                            continue;
                        }
                        self.bias[label as usize] += params.learning_rate * error;
                        for &feat in active {
                            let w = self.weight(feat, label);
                            let grad = error - params.l2 * w;
                            *self.weight_mut(feat, label) += params.learning_rate * grad;
                        }
                    }
                }
            }
            tracing::debug!(epoch, "classifier training epoch complete");
        }
    }

    /// `print_weights`: the top-`k` and bottom-`k` coefficients for one
    /// label, formatted `{feature_name}\t{weight:.6}`, matching
    /// `tagger.py: print_weights`'s sorted-coefficient dump.
    pub fn top_weights(&self, label: u32, k: usize) -> (Vec<(u32, f64)>, Vec<(u32, f64)>) {
        let mut pairs: Vec<(u32, f64)> = (0..self.num_features)
            .map(|feat| (feat, self.weight(feat, label)))
            .collect();
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        let top = pairs.iter().take(k).cloned().collect();
        let bottom = pairs.iter().rev().take(k).cloned().collect();
        (top, bottom)
    }

    pub fn num_labels(&self) -> u32 {
        self.num_labels
    }

    pub fn num_features(&self) -> u32 {
        self.num_features
    }
}

/// A fixed, seedable permutation shuffle — deterministic so that training
/// runs (and therefore tests) are reproducible without pulling in a `rand`
/// dependency the teacher never carried.
fn shuffle_deterministically(order: &mut [usize], seed: u64) {
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
    for i in (1..order.len()).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let j = (state as usize) % (i + 1);
        order.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_proba_sums_to_one() {
        let classifier = Classifier::new(3, 2);
        let probs = classifier.predict_proba_row(&[0, 1]);
        assert_eq!(probs.len(), 2);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_separates_linearly_separable_labels() {
        let mut classifier = Classifier::new(2, 2);
        let triples = vec![
            Triple { row: 0, col: 0 },
            Triple { row: 1, col: 1 },
            Triple { row: 2, col: 0 },
            Triple { row: 3, col: 1 },
        ];
        let labels = vec![0, 1, 0, 1];
        classifier.fit(4, &triples, &labels, TrainParams { epochs: 200, learning_rate: 0.5, l2: 0.0, batch_size: 4 });

        let probs_for_feature_0 = classifier.predict_proba_row(&[0]);
        let probs_for_feature_1 = classifier.predict_proba_row(&[1]);
        assert!(probs_for_feature_0[0] > probs_for_feature_0[1]);
        assert!(probs_for_feature_1[1] > probs_for_feature_1[0]);
    }

    #[test]
    fn test_top_weights_shape() {
        let classifier = Classifier::new(5, 2);
        let (top, bottom) = classifier.top_weights(0, 3);
        assert_eq!(top.len(), 3);
        assert_eq!(bottom.len(), 3);
    }
}
