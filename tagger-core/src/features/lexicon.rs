//! `kind=lex`: phrase-membership lookup against a loaded word list.
//!
//! Grounded on `huntag/feature.py: Lexicon`. A lexicon is a set of
//! (possibly multi-word) phrases; each token is tagged with its role inside
//! any phrase it participates in.

use std::collections::HashSet;
use std::io::BufRead;

use crate::error::Result;
use crate::token::Token;

use super::Options;

/// A loaded phrase list, split into single-word and multi-word membership
/// sets per position-in-phrase, mirroring the reference's `start_parts`/
/// `mid_parts`/`end_parts`/`phrase_list` (single-word phrases) split.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    /// Single-word phrases: a bare membership set, tagged `lone`.
    lone: HashSet<String>,
    /// First word of a multi-word phrase.
    start: HashSet<String>,
    /// Interior word of a multi-word phrase.
    mid: HashSet<String>,
    /// Last word of a multi-word phrase.
    end: HashSet<String>,
}

impl Lexicon {
    pub fn new() -> Self {
        Lexicon::default()
    }

    /// Loads one phrase per line, whitespace-separated words, lowercased.
    pub fn load<R: BufRead>(reader: R) -> Result<Self> {
        let mut lexicon = Lexicon::new();
        for line in reader.lines() {
            let line = line?;
            let words: Vec<String> = line.split_whitespace().map(|w| w.to_lowercase()).collect();
            lexicon.add_phrase(&words);
        }
        Ok(lexicon)
    }

    fn add_phrase(&mut self, words: &[String]) {
        match words.len() {
            0 => {}
            1 => {
                self.lone.insert(words[0].clone());
            }
            _ => {
                self.start.insert(words[0].clone());
                self.end.insert(words[words.len() - 1].clone());
                for w in &words[1..words.len() - 1] {
                    self.mid.insert(w.clone());
                }
            }
        }
    }

    /// Per-token membership tags: any subset of `lone`/`start`/`mid`/`end`
    /// that the lowercased form belongs to.
    fn tags_for(&self, word: &str) -> Vec<String> {
        let lowered = word.to_lowercase();
        let mut tags = Vec::new();
        if self.lone.contains(&lowered) {
            tags.push("lone".to_string());
        }
        if self.start.contains(&lowered) {
            tags.push("start".to_string());
        }
        if self.mid.contains(&lowered) {
            tags.push("mid".to_string());
        }
        if self.end.contains(&lowered) {
            tags.push("end".to_string());
        }
        tags
    }

    /// Evaluates the lexicon over a full sentence's chosen field, one tag
    /// list per position, matching the `kind=sentence` feature-engine
    /// contract so it slots into the same per-position-expansion pipeline.
    pub fn eval_sentence(&self, sentence: &[Token], field: usize) -> Vec<Vec<String>> {
        sentence.iter().map(|tok| self.tags_for(&tok[field])).collect()
    }
}
