//! The Transition Model (C6): a 2nd/3rd-order n-gram label model with
//! Brants (2000) deleted-interpolation smoothing.
//!
//! Grounded on `huntag/transmodel.py: TransModel`. Labels are arbitrary
//! integer ids assigned by the label book-keeper; a dedicated boundary id
//! (one past the last real label) stands in for the reference's `"S"`
//! sentence-boundary symbol and is counted like any other label.
//!
//! The conditional log-probability tables are built by the exact telescoping
//! subtraction the reference uses (`bigram_joint - unigram_logprob[history]`,
//! `trigram_joint - bigram_joint[history]`) rather than the cleaner
//! `C(a,b)/C(a)` ratio one might reach for first; `log_prob` then combines
//! the three per-order tables as a lambda-weighted sum *of logs*, not a
//! weighted average of raw probabilities. Both choices reproduce
//! `_log_prob`/`compile` bit for bit — see `DESIGN.md`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelOrder {
    Bigram,
    Trigram,
}

#[derive(Debug, Clone)]
pub struct TransitionModel {
    order: OrderTag,
    boundary: u32,
    uni_count: HashMap<u32, u64>,
    bi_count: HashMap<(u32, u32), u64>,
    tri_count: HashMap<(u32, u32, u32), u64>,
    total: u64,
    sent_count: u64,
    lambda1: f64,
    lambda2: f64,
    lambda3: f64,
    log_smooth: f64,
    compiled: bool,
    unigram_logprob: HashMap<u32, f64>,
    bigram_logprob: HashMap<(u32, u32), f64>,
    trigram_logprob: HashMap<(u32, u32, u32), f64>,
    tags: HashSet<u32>,
}

/// Wire form for persistence: `HashMap`s keyed by tuples have no direct JSON
/// representation, so counts and logprob tables are flattened to vectors of
/// pairs (tuple keys serialize fine as JSON arrays) and rebuilt on load.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedModel {
    order: OrderTag,
    boundary: u32,
    uni_count: Vec<(u32, u64)>,
    bi_count: Vec<((u32, u32), u64)>,
    tri_count: Vec<((u32, u32, u32), u64)>,
    total: u64,
    sent_count: u64,
    lambda1: f64,
    lambda2: f64,
    lambda3: f64,
    log_smooth: f64,
    compiled: bool,
    unigram_logprob: Vec<(u32, f64)>,
    bigram_logprob: Vec<((u32, u32), f64)>,
    trigram_logprob: Vec<((u32, u32, u32), f64)>,
    tags: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderTag {
    Bigram,
    Trigram,
}

impl From<ModelOrder> for OrderTag {
    fn from(o: ModelOrder) -> Self {
        match o {
            ModelOrder::Bigram => OrderTag::Bigram,
            ModelOrder::Trigram => OrderTag::Trigram,
        }
    }
}

/// Reference's `safe_div`: `-1.0` whenever the denominator is zero, so that
/// branch of the lambda estimation can never win a `>` comparison.
fn safe_div(num: f64, denom: f64) -> f64 {
    if denom == 0.0 {
        -1.0
    } else {
        num / denom
    }
}

impl TransitionModel {
    /// `boundary` must be an id not used by any real label (conventionally
    /// `num_labels`, one past the book-keeper's assigned range).
    pub fn new(order: ModelOrder, boundary: u32) -> Self {
        TransitionModel {
            order: order.into(),
            boundary,
            uni_count: HashMap::new(),
            bi_count: HashMap::new(),
            tri_count: HashMap::new(),
            total: 0,
            sent_count: 0,
            lambda1: 0.0,
            lambda2: 0.0,
            lambda3: 0.0,
            log_smooth: 1e-15_f64.ln(),
            compiled: false,
            unigram_logprob: HashMap::new(),
            bigram_logprob: HashMap::new(),
            trigram_logprob: HashMap::new(),
            tags: HashSet::new(),
        }
    }

    pub fn reset(&mut self) {
        self.uni_count.clear();
        self.bi_count.clear();
        self.tri_count.clear();
        self.total = 0;
        self.sent_count = 0;
        self.lambda1 = 0.0;
        self.lambda2 = 0.0;
        self.lambda3 = 0.0;
        self.compiled = false;
        self.unigram_logprob.clear();
        self.bigram_logprob.clear();
        self.trigram_logprob.clear();
        self.tags.clear();
    }

    fn obs(&mut self, t1: u32, t2: u32, t3: u32) {
        *self.uni_count.entry(t3).or_insert(0) += 1;
        *self.bi_count.entry((t2, t3)).or_insert(0) += 1;
        *self.tri_count.entry((t1, t2, t3)).or_insert(0) += 1;
        self.total += 1;
    }

    /// Closes a sequence: counts the trailing `(penultimate, last, S)`
    /// trigram and `(last, S)` bigram without a third `unigram[S]` increment
    /// — the two leading boundary symbols already accounted for `S`'s
    /// unigram mass, and the trailing transition must not double it.
    fn obs_close(&mut self, t1: u32, t2: u32, t3: u32) {
        *self.bi_count.entry((t2, t3)).or_insert(0) += 1;
        *self.tri_count.entry((t1, t2, t3)).or_insert(0) += 1;
        self.total += 1;
    }

    /// Counts one gold label sequence. Mirrors `obs_sequence`: the two
    /// leading boundary symbols are counted directly (one `(S,S)` bigram,
    /// two `S` unigrams) before the sliding-window trigram counting begins,
    /// and the sequence is closed by one trailing call into `S` that
    /// contributes the closing bigram/trigram but no further unigram mass.
    pub fn obs_sequence(&mut self, labels: &[u32]) {
        *self.bi_count.entry((self.boundary, self.boundary)).or_insert(0) += 1;
        *self.uni_count.entry(self.boundary).or_insert(0) += 2;
        self.total += 2;
        self.sent_count += 1;

        let mut penultimate = self.boundary;
        let mut last = self.boundary;
        for &label in labels {
            self.obs(penultimate, last, label);
            penultimate = last;
            last = label;
        }
        self.obs_close(penultimate, last, self.boundary);
    }

    /// Brants (2000) deleted-interpolation lambda estimation: for every
    /// observed trigram whose final tag was seen more than once, compares
    /// the three leave-one-out relative frequencies (trigram-conditioned,
    /// bigram-conditioned, unconditioned) and attributes the trigram's count
    /// to whichever is strictly largest. A candidate whose denominator is
    /// zero is given the sentinel `-1.0`, which can never win. Following the
    /// reference exactly: only the `(c2==c3>c1)` and `(c1==c2>c3)` ties are
    /// resolved by splitting the mass; any other tie (including a three-way
    /// tie, or `c1==c3>c2`) contributes to no lambda.
    pub fn compile(&mut self) {
        if self.order == OrderTag::Bigram {
            self.bi_count.remove(&(self.boundary, self.boundary));
            let removed = self.uni_count.entry(self.boundary).or_insert(0);
            *removed = removed.saturating_sub(self.sent_count);
            self.total = self.total.saturating_sub(self.sent_count);
            self.sent_count = 0;
        }

        self.tags = self.uni_count.keys().copied().collect();

        self.unigram_logprob = self
            .uni_count
            .iter()
            .map(|(&tag, &count)| (tag, (count as f64).ln() - (self.total as f64).ln()))
            .collect();

        let mut bigram_joint: HashMap<(u32, u32), f64> = HashMap::new();
        for (&(a, b), &count) in &self.bi_count {
            let unigram_a = *self.uni_count.get(&a).unwrap_or(&0);
            bigram_joint.insert((a, b), (count as f64).ln() - (unigram_a as f64).ln());
        }
        self.bigram_logprob = bigram_joint
            .iter()
            .map(|(&(a, b), &joint)| {
                let uni_a = *self.unigram_logprob.get(&a).unwrap_or(&self.log_smooth);
                ((a, b), joint - uni_a)
            })
            .collect();

        if self.order == OrderTag::Trigram {
            self.trigram_logprob = self
                .tri_count
                .iter()
                .map(|(&(h1, h2, t), &count)| {
                    let bi_h1h2 = *self.bi_count.get(&(h1, h2)).unwrap_or(&0);
                    let tri_joint = (count as f64).ln() - (bi_h1h2 as f64).ln();
                    let bi_joint = *bigram_joint.get(&(h1, h2)).unwrap_or(&self.log_smooth);
                    ((h1, h2, t), tri_joint - bi_joint)
                })
                .collect();
        } else {
            self.trigram_logprob.clear();
        }

        self.compute_lambda();
        self.compiled = true;
        tracing::info!(
            lambda1 = self.lambda1,
            lambda2 = self.lambda2,
            lambda3 = self.lambda3,
            "transition model compiled"
        );
    }

    fn compute_lambda(&mut self) {
        let mut l1 = 0.0;
        let mut l2 = 0.0;
        let mut l3 = 0.0;

        for (&(h1, h2, tag), &count) in &self.tri_count {
            let uni_tag = *self.uni_count.get(&tag).unwrap_or(&0);
            if uni_tag <= 1 {
                continue;
            }
            let c3 = if self.order == OrderTag::Trigram {
                let bi_h1h2 = *self.bi_count.get(&(h1, h2)).unwrap_or(&0);
                safe_div(count as f64 - 1.0, bi_h1h2 as f64 - 1.0)
            } else {
                -2.0
            };
            let bi_h2tag = *self.bi_count.get(&(h2, tag)).unwrap_or(&0);
            let uni_h2 = *self.uni_count.get(&h2).unwrap_or(&0);
            let c2 = safe_div(bi_h2tag as f64 - 1.0, uni_h2 as f64 - 1.0);
            let c1 = safe_div(uni_tag as f64 - 1.0, self.total as f64 - 1.0);

            let n = count as f64;
            if c1 > c3 && c1 > c2 {
                l1 += n;
            } else if c2 > c3 && c2 > c1 {
                l2 += n;
            } else if c3 > c2 && c3 > c1 {
                l3 += n;
            } else if c3 == c2 && c3 > c1 {
                l2 += n / 2.0;
                l3 += n / 2.0;
            } else if c2 == c1 && c1 > c3 {
                l1 += n / 2.0;
                l2 += n / 2.0;
            }
        }

        let sum = l1 + l2 + l3;
        if sum > 0.0 {
            self.lambda1 = l1 / sum;
            self.lambda2 = l2 / sum;
            self.lambda3 = l3 / sum;
        } else {
            self.lambda1 = 1.0;
            self.lambda2 = 0.0;
            self.lambda3 = 0.0;
        }
    }

    /// `log P(t3 | t1, t2)`: a lambda-weighted sum of the unigram, bigram and
    /// trigram log-probability tables, each falling back to `log_smooth`
    /// when the specific n-gram was never observed. Matches `_log_prob`
    /// exactly, including combining in log space rather than probability
    /// space.
    pub fn log_prob(&self, t1: u32, t2: u32, t3: u32) -> f64 {
        let uni = *self.unigram_logprob.get(&t3).unwrap_or(&self.log_smooth);
        let bi = *self.bigram_logprob.get(&(t2, t3)).unwrap_or(&self.log_smooth);
        let tri = *self
            .trigram_logprob
            .get(&(t1, t2, t3))
            .unwrap_or(&self.log_smooth);
        self.lambda1 * uni + self.lambda2 * bi + self.lambda3 * tri
    }

    /// `log P(t3 | t2)` with no trigram history at all (the reference's
    /// `_log_prob(None, t2, t3)`): used directly by bigram-mode Viterbi
    /// (where `lambda3` is already zero) and, intentionally, by the trigram
    /// decoder's terminal back-off into the boundary symbol. The trigram
    /// term can never match a real key, so it always falls back to
    /// `log_smooth` rather than being dropped or renormalized away.
    pub fn log_prob_bigram(&self, t2: u32, t3: u32) -> f64 {
        let uni = *self.unigram_logprob.get(&t3).unwrap_or(&self.log_smooth);
        let bi = *self.bigram_logprob.get(&(t2, t3)).unwrap_or(&self.log_smooth);
        self.lambda1 * uni + self.lambda2 * bi + self.lambda3 * self.log_smooth
    }

    pub fn boundary(&self) -> u32 {
        self.boundary
    }

    pub fn order(&self) -> ModelOrder {
        match self.order {
            OrderTag::Bigram => ModelOrder::Bigram,
            OrderTag::Trigram => ModelOrder::Trigram,
        }
    }

    /// The set of labels observed in training, with the boundary symbol
    /// removed — only meaningful after `compile`.
    pub fn tags(&self) -> impl Iterator<Item = u32> + '_ {
        self.tags.iter().copied().filter(move |&t| t != self.boundary)
    }

    pub fn lambdas(&self) -> (f64, f64, f64) {
        (self.lambda1, self.lambda2, self.lambda3)
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Builds an already-"compiled" bigram model directly from fixed
    /// conditional log-probabilities `log P(t3 | t2)`, bypassing
    /// `obs_sequence`/`compile`'s count estimation entirely (`lambda2 = 1`
    /// routes `log_prob_bigram` straight through the given table). Exists
    /// only so tests can pin down an exact hand-computed worked example
    /// rather than reconstruct it indirectly through synthetic training
    /// counts.
    #[cfg(test)]
    pub(crate) fn from_fixed_bigram_logprobs(boundary: u32, conditional_logprob: HashMap<(u32, u32), f64>) -> Self {
        TransitionModel {
            order: OrderTag::Bigram,
            boundary,
            uni_count: HashMap::new(),
            bi_count: HashMap::new(),
            tri_count: HashMap::new(),
            total: 0,
            sent_count: 0,
            lambda1: 0.0,
            lambda2: 1.0,
            lambda3: 0.0,
            log_smooth: 1e-15_f64.ln(),
            compiled: true,
            unigram_logprob: HashMap::new(),
            bigram_logprob: conditional_logprob,
            trigram_logprob: HashMap::new(),
            tags: HashSet::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let persisted = PersistedModel {
            order: self.order,
            boundary: self.boundary,
            uni_count: self.uni_count.iter().map(|(&k, &v)| (k, v)).collect(),
            bi_count: self.bi_count.iter().map(|(&k, &v)| (k, v)).collect(),
            tri_count: self.tri_count.iter().map(|(&k, &v)| (k, v)).collect(),
            total: self.total,
            sent_count: self.sent_count,
            lambda1: self.lambda1,
            lambda2: self.lambda2,
            lambda3: self.lambda3,
            log_smooth: self.log_smooth,
            compiled: self.compiled,
            unigram_logprob: self.unigram_logprob.iter().map(|(&k, &v)| (k, v)).collect(),
            bigram_logprob: self.bigram_logprob.iter().map(|(&k, &v)| (k, v)).collect(),
            trigram_logprob: self.trigram_logprob.iter().map(|(&k, &v)| (k, v)).collect(),
            tags: self.tags.iter().copied().collect(),
        };
        Ok(serde_json::to_string(&persisted)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let persisted: PersistedModel = serde_json::from_str(s)?;
        Ok(TransitionModel {
            order: persisted.order,
            boundary: persisted.boundary,
            uni_count: persisted.uni_count.into_iter().collect(),
            bi_count: persisted.bi_count.into_iter().collect(),
            tri_count: persisted.tri_count.into_iter().collect(),
            total: persisted.total,
            sent_count: persisted.sent_count,
            lambda1: persisted.lambda1,
            lambda2: persisted.lambda2,
            lambda3: persisted.lambda3,
            log_smooth: persisted.log_smooth,
            compiled: persisted.compiled,
            unigram_logprob: persisted.unigram_logprob.into_iter().collect(),
            bigram_logprob: persisted.bigram_logprob.into_iter().collect(),
            trigram_logprob: persisted.trigram_logprob.into_iter().collect(),
            tags: persisted.tags.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One sentence of length 2, tags [A=0, B=1], boundary=2, trigram mode:
    /// the trailing close must not add a third `unigram[boundary]` beyond
    /// the two leading boundary symbols.
    #[test]
    fn test_obs_sequence_boundary_unigram_counted_twice_per_sentence() {
        let mut model = TransitionModel::new(ModelOrder::Trigram, 2);
        model.obs_sequence(&[0, 1]);

        assert_eq!(*model.tri_count.get(&(2, 2, 0)).unwrap(), 1); // (S,S,A)
        assert_eq!(*model.tri_count.get(&(2, 0, 1)).unwrap(), 1); // (S,A,B)
        assert_eq!(*model.tri_count.get(&(0, 1, 2)).unwrap(), 1); // (A,B,S)

        assert_eq!(*model.bi_count.get(&(2, 2)).unwrap(), 1); // (S,S)
        assert_eq!(*model.bi_count.get(&(2, 0)).unwrap(), 1); // (S,A)
        assert_eq!(*model.bi_count.get(&(0, 1)).unwrap(), 1); // (A,B)
        assert_eq!(*model.bi_count.get(&(1, 2)).unwrap(), 1); // (B,S)

        assert_eq!(*model.uni_count.get(&2).unwrap(), 2); // S
        assert_eq!(*model.uni_count.get(&0).unwrap(), 1); // A
        assert_eq!(*model.uni_count.get(&1).unwrap(), 1); // B
    }

    #[test]
    fn test_bigram_mode_drops_boundary_self_bigram_on_compile() {
        let mut model = TransitionModel::new(ModelOrder::Bigram, 2);
        model.obs_sequence(&[0, 1]);
        assert_eq!(*model.bi_count.get(&(2, 2)).unwrap(), 1);
        assert_eq!(*model.uni_count.get(&2).unwrap(), 2);

        model.compile();
        assert!(model.bi_count.get(&(2, 2)).is_none());
        assert_eq!(*model.uni_count.get(&2).unwrap(), 1);
        assert_eq!(model.lambda3, 0.0);
    }

    #[test]
    fn test_compile_produces_normalized_lambdas() {
        let mut model = TransitionModel::new(ModelOrder::Trigram, 2);
        for _ in 0..20 {
            model.obs_sequence(&[0, 1, 0, 1]);
        }
        model.compile();
        let (l1, l2, l3) = model.lambdas();
        assert!((l1 + l2 + l3 - 1.0).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&l1));
        assert!((0.0..=1.0).contains(&l2));
        assert!((0.0..=1.0).contains(&l3));
    }

    #[test]
    fn test_log_prob_prefers_frequent_transition_over_unseen() {
        let mut model = TransitionModel::new(ModelOrder::Trigram, 2);
        for _ in 0..50 {
            model.obs_sequence(&[0, 1, 0, 1]);
        }
        model.compile();
        let frequent = model.log_prob(2, 0, 1); // (S,A,B) seen every sentence
        let unseen = model.log_prob(1, 1, 1); // (B,B,B) never seen
        assert!(frequent > unseen);
    }

    #[test]
    fn test_tags_excludes_boundary() {
        let mut model = TransitionModel::new(ModelOrder::Trigram, 2);
        model.obs_sequence(&[0, 1]);
        model.compile();
        let tags: HashSet<u32> = model.tags().collect();
        assert_eq!(tags, [0u32, 1u32].into_iter().collect());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut model = TransitionModel::new(ModelOrder::Trigram, 2);
        model.obs_sequence(&[0, 1]);
        model.compile();
        let json = model.to_json().unwrap();
        let restored = TransitionModel::from_json(&json).unwrap();
        assert_eq!(restored.log_prob(2, 0, 1), model.log_prob(2, 0, 1));
        assert_eq!(restored.lambdas(), model.lambdas());
    }
}
