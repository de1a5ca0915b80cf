//! The Viterbi Decoder (C7): bigram and trigram lattice search over
//! per-position emission probabilities and the transition model, weighted
//! by a language-model weight (LMW).
//!
//! Grounded on `huntag/transmodel.py: _viterbi_bigram`/`_viterbi_trigram`.
//! The trigram decoder's terminal step intentionally uses the bigram-style
//! back-off `log P(S | y)` rather than the fully-conditioned
//! `log P(S | z, y)` — this reproduces a quirk of the reference
//! implementation rather than a design choice of this crate (see
//! `DESIGN.md`'s open-question notes), kept because tagging output must
//! match the reference's documented behavior bit for bit.

use crate::transition::TransitionModel;

/// `emissions[position][label]` is `P(label | position)` from the
/// classifier; `log` is taken internally.
pub fn decode(
    emissions: &[Vec<f64>],
    transitions: &TransitionModel,
    language_model_weight: f64,
) -> Vec<u32> {
    match transitions.order() {
        crate::transition::ModelOrder::Bigram => decode_bigram(emissions, transitions, language_model_weight),
        crate::transition::ModelOrder::Trigram => decode_trigram(emissions, transitions, language_model_weight),
    }
}

fn emission_log(emissions: &[Vec<f64>], pos: usize, label: u32) -> f64 {
    let p = emissions[pos][label as usize];
    if p <= 0.0 {
        f64::NEG_INFINITY
    } else {
        p.ln()
    }
}

/// Bigram Viterbi: state is the previous label; transitions weighted by
/// `log P(label | prev_label)`.
fn decode_bigram(emissions: &[Vec<f64>], transitions: &TransitionModel, lmw: f64) -> Vec<u32> {
    let len = emissions.len();
    if len == 0 {
        return Vec::new();
    }
    let num_labels = emissions[0].len() as u32;
    let boundary = transitions.boundary();

    // score[t][y] = best log-probability of a path ending in label y at time t
    let mut score: Vec<Vec<f64>> = vec![vec![f64::NEG_INFINITY; num_labels as usize]; len];
    let mut back: Vec<Vec<u32>> = vec![vec![0; num_labels as usize]; len];

    for y in 0..num_labels {
        score[0][y as usize] =
            emission_log(emissions, 0, y) + lmw * transitions.log_prob_bigram(boundary, y);
    }

    for t in 1..len {
        for y in 0..num_labels {
            let emit = emission_log(emissions, t, y);
            let mut best = f64::NEG_INFINITY;
            let mut best_prev = 0u32;
            for prev in 0..num_labels {
                let candidate = score[t - 1][prev as usize] + lmw * transitions.log_prob_bigram(prev, y);
                if candidate > best {
                    best = candidate;
                    best_prev = prev;
                }
            }
            score[t][y as usize] = emit + best;
            back[t][y as usize] = best_prev;
        }
    }

    let mut best_last = 0u32;
    let mut best_score = f64::NEG_INFINITY;
    for y in 0..num_labels {
        let total = score[len - 1][y as usize] + lmw * transitions.log_prob_bigram(y, boundary);
        if total > best_score {
            best_score = total;
            best_last = y;
        }
    }

    backtrack_bigram(&back, best_last, len)
}

fn backtrack_bigram(back: &[Vec<u32>], last: u32, len: usize) -> Vec<u32> {
    let mut path = vec![0u32; len];
    path[len - 1] = last;
    for t in (1..len).rev() {
        path[t - 1] = back[t][path[t] as usize];
    }
    path
}

/// Trigram Viterbi: state is the `(penultimate, last)` label pair. Position
/// `t=1` is a special case (only one real predecessor label exists, so the
/// state space collapses to the bigram shape), matching `_viterbi_trigram`.
fn decode_trigram(emissions: &[Vec<f64>], transitions: &TransitionModel, lmw: f64) -> Vec<u32> {
    let len = emissions.len();
    if len == 0 {
        return Vec::new();
    }
    let num_labels = emissions[0].len() as u32;
    let boundary = transitions.boundary();

    // score[t] maps (penultimate, last) -> best log-prob; stored densely.
    let idx = |a: u32, b: u32| (a as usize) * (num_labels as usize) + (b as usize);
    let mut score: Vec<Vec<f64>> = vec![vec![f64::NEG_INFINITY; (num_labels * num_labels) as usize]; len];
    let mut back: Vec<Vec<u32>> = vec![vec![0; (num_labels * num_labels) as usize]; len];

    // t = 0: state (boundary, y)
    for y in 0..num_labels {
        let s = emission_log(emissions, 0, y) + lmw * transitions.log_prob(boundary, boundary, y);
        score[0][idx(boundary, y)] = s;
    }

    if len == 1 {
        let mut best_state = (boundary, 0u32);
        let mut best_score = f64::NEG_INFINITY;
        for y in 0..num_labels {
            let total = score[0][idx(boundary, y)] + lmw * transitions.log_prob_bigram(y, boundary);
            if total > best_score {
                best_score = total;
                best_state = (boundary, y);
            }
        }
        return vec![best_state.1];
    }

    // t = 1: every (z, y) pair is a distinct state here — the trigram
    // transition feeding t = 2 (`log_prob(z, y, _)`) depends on z, so z
    // cannot be collapsed to a single greedy choice yet. Only one
    // predecessor (`boundary`) exists at this position.
    for z in 0..num_labels {
        for y in 0..num_labels {
            let score_t1 =
                score[0][idx(boundary, z)] + lmw * transitions.log_prob(boundary, z, y);
            score[1][idx(z, y)] = emission_log(emissions, 1, y) + score_t1;
            back[1][idx(z, y)] = boundary;
        }
    }

    for t in 2..len {
        for penult in 0..num_labels {
            for last in 0..num_labels {
                let emit = emission_log(emissions, t, last);
                let mut best = f64::NEG_INFINITY;
                let mut best_prev = 0u32;
                for prev in 0..num_labels {
                    let candidate =
                        score[t - 1][idx(prev, penult)] + lmw * transitions.log_prob(prev, penult, last);
                    if candidate > best {
                        best = candidate;
                        best_prev = prev;
                    }
                }
                score[t][idx(penult, last)] = emit + best;
                back[t][idx(penult, last)] = best_prev;
            }
        }
    }

    // Terminal step: reference back-off to `log P(S | y)`, not `log P(S | z, y)`.
    let mut best_state = (0u32, 0u32);
    let mut best_score = f64::NEG_INFINITY;
    for penult in 0..num_labels {
        for last in 0..num_labels {
            let total = score[len - 1][idx(penult, last)] + lmw * transitions.log_prob_bigram(last, boundary);
            if total > best_score {
                best_score = total;
                best_state = (penult, last);
            }
        }
    }

    backtrack_trigram(&back, best_state, len, idx)
}

fn backtrack_trigram(
    back: &[Vec<u32>],
    last_state: (u32, u32),
    len: usize,
    idx: impl Fn(u32, u32) -> usize,
) -> Vec<u32> {
    let mut path = vec![0u32; len];
    let (mut penult, mut last) = last_state;
    path[len - 1] = last;
    for t in (1..len).rev() {
        let prev = back[t][idx(penult, last)];
        path[t - 1] = prev;
        last = penult;
        penult = prev;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::ModelOrder;

    /// Two labels; emissions strongly favor label 0 everywhere, and the
    /// transition model has only ever seen label 0 following label 0. The
    /// decoded path must be all 0s.
    #[test]
    fn test_bigram_decode_follows_dominant_transition() {
        let mut transitions = TransitionModel::new(ModelOrder::Bigram, 2);
        for _ in 0..20 {
            transitions.obs_sequence(&[0, 0, 0]);
        }
        transitions.compile();

        let emissions = vec![vec![0.9, 0.1], vec![0.9, 0.1], vec![0.9, 0.1]];
        let path = decode(&emissions, &transitions, 1.0);
        assert_eq!(path, vec![0, 0, 0]);
    }

    #[test]
    fn test_trigram_decode_runs_and_has_expected_length() {
        let mut transitions = TransitionModel::new(ModelOrder::Trigram, 2);
        for _ in 0..20 {
            transitions.obs_sequence(&[0, 1, 0, 1]);
        }
        transitions.compile();

        let emissions = vec![vec![0.5, 0.5]; 4];
        let path = decode(&emissions, &transitions, 1.0);
        assert_eq!(path.len(), 4);
    }

    /// Hand-computed worked example: tag set `{A=0, B=1}`, boundary=2,
    /// fixed conditionals `logP(A|S)=log 0.6`, `logP(B|S)=log 0.4`,
    /// `logP(A|A)=log 0.7`, `logP(B|A)=log 0.3`, `logP(A|B)=log 0.5`,
    /// `logP(B|B)=log 0.5`, `logP(S|A)=log 0.5`, `logP(S|B)=log 0.5`,
    /// emissions `[{A:0.9,B:0.1},{A:0.2,B:0.8}]`, LMW=1. Expected best path
    /// `A,B` with score `log 0.6 + log 0.9 + log 0.3 + log 0.8 + log 0.5`.
    #[test]
    fn test_bigram_decode_matches_hand_computed_scores() {
        let (a, b, s) = (0u32, 1u32, 2u32);
        let mut conditional = std::collections::HashMap::new();
        conditional.insert((s, a), 0.6f64.ln());
        conditional.insert((s, b), 0.4f64.ln());
        conditional.insert((a, a), 0.7f64.ln());
        conditional.insert((a, b), 0.3f64.ln());
        conditional.insert((b, a), 0.5f64.ln());
        conditional.insert((b, b), 0.5f64.ln());
        conditional.insert((a, s), 0.5f64.ln());
        conditional.insert((b, s), 0.5f64.ln());
        let transitions = TransitionModel::from_fixed_bigram_logprobs(s, conditional);

        let emissions = vec![vec![0.9, 0.1], vec![0.2, 0.8]];
        let path = decode(&emissions, &transitions, 1.0);
        assert_eq!(path, vec![a, b]);

        let expected_score = 0.6f64.ln() + 0.9f64.ln() + 0.3f64.ln() + 0.8f64.ln() + 0.5f64.ln();
        let actual_score = transitions.log_prob_bigram(s, a)
            + emission_log(&emissions, 0, a)
            + transitions.log_prob_bigram(a, b)
            + emission_log(&emissions, 1, b)
            + transitions.log_prob_bigram(b, s);
        assert!((actual_score - expected_score).abs() < 1e-9);
    }

    /// A single-token sentence must decode without panicking on the
    /// `len == 1` special case.
    #[test]
    fn test_trigram_decode_handles_single_token_sentence() {
        let mut transitions = TransitionModel::new(ModelOrder::Trigram, 2);
        transitions.obs_sequence(&[0]);
        transitions.obs_sequence(&[1]);
        transitions.compile();

        let emissions = vec![vec![0.6, 0.4]];
        let path = decode(&emissions, &transitions, 1.0);
        assert_eq!(path.len(), 1);
    }
}
