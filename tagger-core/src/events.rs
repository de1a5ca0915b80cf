//! The Training Event Builder (C4): folds featurized sentences into a
//! sparse `(row, col, data)` triple plus a label vector, applies the cutoff
//! procedure, and produces the most-informative-features report and the
//! featurized-file emission format.
//!
//! Grounded on `huntag/trainer.py: Trainer`.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use crate::bookkeeper::BookKeeper;
use crate::error::Result;

/// One non-zero cell of the sparse design matrix.
#[derive(Debug, Clone, Copy)]
pub struct Triple {
    pub row: u32,
    pub col: u32,
}

/// Accumulates sparse training events sentence by sentence, tracking row
/// indices, feature columns, labels, and sentence-end row boundaries,
/// mirroring the reference's parallel `_rows`/`_cols`/`_data`/`_labels`/
/// `_sent_end` buffers (the reference's `_data` is always `1`, so this
/// builder omits storing it and treats every triple as a unit weight).
#[derive(Debug, Default)]
pub struct EventBuilder {
    triples: Vec<Triple>,
    labels: Vec<u32>,
    sent_end: Vec<u32>,
    feature_book: BookKeeper,
    label_book: BookKeeper,
    next_row: u32,
}

impl EventBuilder {
    pub fn new() -> Self {
        EventBuilder::default()
    }

    /// Folds one sentence's featurized rows and gold labels into the event
    /// buffers, registering each feature/label with the book-keepers.
    ///
    /// Per position, features are deduplicated (set semantics) and sorted
    /// lexicographically before being registered, so the resulting triple
    /// order is deterministic regardless of the order feature declarations
    /// happened to emit them in. When `used_feats` is given, only feature
    /// strings present in that whitelist are accepted — the rest are
    /// dropped before dedup/sort, mirroring the reference's one-time
    /// whitelist load.
    pub fn add_sentence(
        &mut self,
        features_per_token: &[Vec<String>],
        gold_labels: &[String],
        used_feats: Option<&HashSet<String>>,
    ) {
        for (feats, label) in features_per_token.iter().zip(gold_labels) {
            let row = self.next_row;
            let mut distinct: Vec<&String> = match used_feats {
                Some(whitelist) => feats.iter().filter(|f| whitelist.contains(*f)).collect(),
                None => feats.iter().collect(),
            };
            distinct.sort();
            distinct.dedup();
            for feat in distinct {
                let col = self.feature_book.get_or_assign(feat);
                self.triples.push(Triple { row, col });
            }
            let label_id = self.label_book.get_or_assign(label);
            self.labels.push(label_id);
            self.next_row += 1;
        }
        self.sent_end.push(self.next_row);
    }

    pub fn feature_book(&self) -> &BookKeeper {
        &self.feature_book
    }

    pub fn label_book(&self) -> &BookKeeper {
        &self.label_book
    }

    pub fn num_rows(&self) -> u32 {
        self.next_row
    }

    /// Cutoff procedure: below 2 this is a no-op over the matrix
    /// shape (the book-keeper itself still tracks counts); at or above 2, it
    /// deletes low-count feature columns, drops rows (and their label /
    /// sentence-end entries) that become empty, and compacts the surviving
    /// row ids and column ids to contiguous ranges, preserving order.
    pub fn cutoff(&mut self, k: u32) -> Result<()> {
        if k < 2 {
            return Ok(());
        }
        let deleted_cols = self.feature_book.cutoff(k);
        if self.feature_book.size() == 0 {
            return Err(crate::error::TaggerError::config(
                "cutoff removed every feature column; lower --cutoff or provide more training data",
            ));
        }

        let mut col_survivors: HashMap<u32, u32> = HashMap::new();
        {
            let mut ids: Vec<u32> = (0..self.feature_book.size() as u32 + deleted_cols.len() as u32)
                .filter(|id| !deleted_cols.contains(id))
                .collect();
            ids.sort_unstable();
            for (new_id, old_id) in ids.into_iter().enumerate() {
                col_survivors.insert(old_id, new_id as u32);
            }
        }

        let mut kept_triples: HashMap<u32, Vec<Triple>> = HashMap::new();
        for t in &self.triples {
            if let Some(&new_col) = col_survivors.get(&t.col) {
                kept_triples.entry(t.row).or_default().push(Triple { row: t.row, col: new_col });
            }
        }

        let mut new_triples = Vec::new();
        let mut new_labels = Vec::new();
        let mut new_sent_end = Vec::new();
        let mut row_survivors: HashMap<u32, u32> = HashMap::new();
        let mut next_new_row = 0u32;
        let mut sent_end_iter = self.sent_end.iter().peekable();

        for old_row in 0..self.next_row {
            if let Some(row_triples) = kept_triples.get(&old_row) {
                let new_row = next_new_row;
                next_new_row += 1;
                row_survivors.insert(old_row, new_row);
                for t in row_triples {
                    new_triples.push(Triple { row: new_row, col: t.col });
                }
                new_labels.push(self.labels[old_row as usize]);
            }
            if sent_end_iter.peek() == Some(&&(old_row + 1)) {
                sent_end_iter.next();
                new_sent_end.push(next_new_row);
            }
        }

        self.triples = new_triples;
        self.labels = new_labels;
        self.sent_end = new_sent_end;
        self.next_row = next_new_row;
        Ok(())
    }

    /// `(X shape, triples, labels)` view used to feed the classifier.
    pub fn into_parts(self) -> (u32, u32, Vec<Triple>, Vec<u32>) {
        let num_features = self.feature_book.size() as u32;
        (self.next_row, num_features, self.triples, self.labels)
    }

    /// `most_informative_features`: ranks each column by
    /// `max_label P / min_label P`, where `P(feature=v|label)` is
    /// `C(feature=v,label) / C(label)` — the feature's occurrence count for
    /// that label divided by the label's total occurrence count over the
    /// whole corpus, not the feature's own total. A feature not seen at all
    /// for some label gives that label a zero conditional probability, which
    /// forces the ratio to `INF` (seen for fewer than all labels). Returns
    /// the top `k` as `(feature_name, ratio, max_label, min_label)`.
    pub fn most_informative_features(&self, k: usize) -> Vec<(String, f64, String, String)> {
        let num_labels = self.label_book.size();
        if num_labels == 0 {
            return Vec::new();
        }
        let names = self.feature_book.names_by_id();
        let label_names = self.label_book.names_by_id();

        let mut label_totals = vec![0u32; num_labels];
        for &label in &self.labels {
            label_totals[label as usize] += 1;
        }

        let mut per_col_per_label: HashMap<u32, Vec<u32>> = HashMap::new();
        for t in &self.triples {
            let label = self.labels[t.row as usize];
            let counts = per_col_per_label.entry(t.col).or_insert_with(|| vec![0u32; num_labels]);
            counts[label as usize] += 1;
        }

        let mut ranked: Vec<(String, f64, String, String)> = per_col_per_label
            .into_iter()
            .map(|(col, counts)| {
                let probs: Vec<f64> = counts
                    .iter()
                    .zip(&label_totals)
                    .map(|(&c, &total)| if total > 0 { c as f64 / total as f64 } else { 0.0 })
                    .collect();
                let (max_idx, &max_p) =
                    probs.iter().enumerate().max_by(|a, b| a.1.partial_cmp(b.1).unwrap()).unwrap();
                let (min_idx, &min_p) =
                    probs.iter().enumerate().min_by(|a, b| a.1.partial_cmp(b.1).unwrap()).unwrap();
                let ratio = if min_p > 0.0 { max_p / min_p } else { f64::INFINITY };
                let name = names.get(&col).cloned().unwrap_or_default();
                let max_label = label_names.get(&(max_idx as u32)).cloned().unwrap_or_default();
                let min_label = label_names.get(&(min_idx as u32)).cloned().unwrap_or_default();
                (name, ratio, max_label, min_label)
            })
            .collect();

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        ranked.truncate(k);
        ranked
    }

    /// Writes the featurized-file format: one line per token,
    /// `label<TAB>feat1<TAB>feat2...`, blank line per sentence boundary,
    /// with `:` replaced by the literal `colon` inside feature strings
    /// (the reference's workaround for a downstream tool that treats `:` as
    /// a field separator).
    pub fn write_featurized<W: Write>(
        &self,
        mut writer: W,
        features_per_token: &[Vec<String>],
        gold_labels: &[String],
    ) -> Result<()> {
        for (feats, label) in features_per_token.iter().zip(gold_labels) {
            write!(writer, "{label}")?;
            for feat in feats {
                write!(writer, "\t{}", feat.replace(':', "colon"))?;
            }
            writeln!(writer)?;
        }
        writeln!(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sentence_and_shapes() {
        let mut builder = EventBuilder::new();
        builder.add_sentence(
            &[vec!["F[0]=x".to_string()], vec!["F[0]=y".to_string()]],
            &["B".to_string(), "O".to_string()],
            None,
        );
        assert_eq!(builder.num_rows(), 2);
        assert_eq!(builder.feature_book().size(), 2);
        assert_eq!(builder.label_book().size(), 2);
    }

    #[test]
    fn test_cutoff_drops_empty_rows() {
        let mut builder = EventBuilder::new();
        builder.add_sentence(
            &[vec!["common".to_string(), "rare".to_string()], vec!["rare2".to_string()]],
            &["B".to_string(), "O".to_string()],
            None,
        );
        builder.add_sentence(&[vec!["common".to_string()]], &["B".to_string()], None);
        builder.cutoff(2).unwrap();
        let (rows, cols, triples, labels) = builder.into_parts();
        assert_eq!(cols, 1);
        assert_eq!(rows, 2);
        assert_eq!(labels.len(), 2);
        assert!(triples.iter().all(|t| t.col == 0));
    }

    #[test]
    fn test_write_featurized_format() {
        let mut builder = EventBuilder::new();
        builder.add_sentence(&[vec!["F[0]=a:b".to_string()]], &["B".to_string()], None);
        let mut out = Vec::new();
        builder
            .write_featurized(&mut out, &[vec!["F[0]=a:b".to_string()]], &["B".to_string()])
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "B\tF[0]=acolonb\n\n");
    }

    #[test]
    fn test_most_informative_features_ranks_discriminative_column() {
        let mut builder = EventBuilder::new();
        for _ in 0..5 {
            builder.add_sentence(&[vec!["discriminative".to_string()]], &["B".to_string()], None);
        }
        for _ in 0..5 {
            builder.add_sentence(&[vec!["balanced".to_string()]], &["B".to_string()], None);
        }
        for _ in 0..5 {
            builder.add_sentence(&[vec!["balanced".to_string()]], &["O".to_string()], None);
        }
        let report = builder.most_informative_features(2);
        assert_eq!(report[0].0, "discriminative");
    }

    #[test]
    fn test_add_sentence_dedups_and_sorts_features() {
        let mut builder = EventBuilder::new();
        builder.add_sentence(
            &[vec!["zeta".to_string(), "alpha".to_string(), "alpha".to_string()]],
            &["B".to_string()],
            None,
        );
        assert_eq!(builder.feature_book().lookup("alpha"), Some(0));
        assert_eq!(builder.feature_book().lookup("zeta"), Some(1));
        let (_, _, triples, _) = builder.into_parts();
        assert_eq!(triples.len(), 2);
    }

    #[test]
    fn test_add_sentence_respects_used_feats_whitelist() {
        let mut builder = EventBuilder::new();
        let whitelist: HashSet<String> = ["kept".to_string()].into_iter().collect();
        builder.add_sentence(
            &[vec!["kept".to_string(), "dropped".to_string()]],
            &["B".to_string()],
            Some(&whitelist),
        );
        assert_eq!(builder.feature_book().size(), 1);
        assert_eq!(builder.feature_book().lookup("kept"), Some(0));
        assert_eq!(builder.feature_book().lookup("dropped"), None);
    }
}
