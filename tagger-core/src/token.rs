//! Tabular stream data model: tokens, sentences, header-derived field names,
//! and the sentence-boundary-aware line reader.
//!
//! Grounded on `huntag/tools.py`'s `sentence_iterator` and `process_header`.

use std::collections::HashMap;
use std::io::BufRead;

use crate::error::TaggerError;

/// One token: an ordered tuple of string fields, addressed by column index.
pub type Token = Vec<String>;

/// Ordered sequence of tokens making up one sentence.
pub type Sentence = Vec<Token>;

/// Bidirectional name<->index map for the columns of a tabular stream,
/// established from the header line and shared by training and tagging.
#[derive(Debug, Clone, Default)]
pub struct FieldNames {
    name_to_index: HashMap<String, usize>,
    index_to_name: Vec<String>,
}

impl FieldNames {
    pub fn from_header(header: &str) -> Self {
        let index_to_name: Vec<String> = header.split('\t').map(|s| s.to_string()).collect();
        let name_to_index = index_to_name
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        FieldNames {
            name_to_index,
            index_to_name,
        }
    }

    /// Appends a field name (e.g. a freshly-inserted target column) and
    /// returns its index.
    pub fn push(&mut self, name: &str) -> usize {
        let idx = self.index_to_name.len();
        self.index_to_name.push(name.to_string());
        self.name_to_index.insert(name.to_string(), idx);
        idx
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.index_to_name.get(index).map(|s| s.as_str())
    }

    pub fn header_line(&self) -> String {
        self.index_to_name.join("\t")
    }

    pub fn len(&self) -> usize {
        self.index_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_name.is_empty()
    }
}

/// Resolves a feature declaration's comma-separated field name list against
/// a header-derived `FieldNames` map. Returns a configuration error naming
/// the first unresolved field.
pub fn resolve_field_indices(fields: &[String], field_names: &FieldNames) -> crate::error::Result<Vec<usize>> {
    fields
        .iter()
        .map(|name| {
            field_names
                .index_of(name)
                .ok_or_else(|| TaggerError::config(format!("header has no column named \"{name}\"")))
        })
        .collect()
}

/// Streams `(sentence, comment)` pairs out of a `BufRead`, honoring blank-line
/// sentence boundaries and `#`/`"""`-prefixed leading comments.
///
/// A comment line appearing after tokens have already been read in the
/// current sentence is a fatal format error. A blank line with no pending
/// tokens produces a `tracing::warn!` (multiple consecutive blank lines) and
/// is otherwise skipped. Input that ends without a trailing blank line still
/// yields the final sentence, with a warning.
pub struct SentenceIterator<R: BufRead> {
    lines: std::io::Lines<R>,
    pending_sentence: Sentence,
    pending_comment: Option<String>,
    finished: bool,
}

impl<R: BufRead> SentenceIterator<R> {
    pub fn new(reader: R) -> Self {
        SentenceIterator {
            lines: reader.lines(),
            pending_sentence: Vec::new(),
            pending_comment: None,
            finished: false,
        }
    }

    fn is_comment(line: &str) -> bool {
        line.starts_with('#') || line.starts_with("\"\"\"")
    }
}

impl<R: BufRead> Iterator for SentenceIterator<R> {
    type Item = crate::error::Result<(Sentence, Option<String>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            match self.lines.next() {
                Some(Ok(raw_line)) => {
                    let line = raw_line.trim_end_matches(['\r', '\n']);
                    if Self::is_comment(line) {
                        if self.pending_sentence.is_empty() {
                            self.pending_comment = Some(line.to_string());
                        } else {
                            self.finished = true;
                            return Some(Err(TaggerError::format(
                                "comments are only allowed before a sentence",
                            )));
                        }
                    } else if line.is_empty() {
                        if !self.pending_sentence.is_empty() {
                            let sentence = std::mem::take(&mut self.pending_sentence);
                            let comment = self.pending_comment.take();
                            return Some(Ok((sentence, comment)));
                        } else {
                            tracing::warn!("wrongly formatted sentences, only one blank line allowed");
                        }
                    } else {
                        self.pending_sentence
                            .push(line.split('\t').map(|s| s.to_string()).collect());
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(TaggerError::Io(e)));
                }
                None => {
                    self.finished = true;
                    if !self.pending_sentence.is_empty() {
                        tracing::warn!("no blank line before EOF");
                        let sentence = std::mem::take(&mut self.pending_sentence);
                        let comment = self.pending_comment.take();
                        return Some(Ok((sentence, comment)));
                    }
                    return None;
                }
            }
        }
    }
}

/// Reads the header line (first non-blank line) and returns it alongside a
/// `SentenceIterator` positioned right after it.
pub fn read_header<R: BufRead>(mut reader: R) -> crate::error::Result<(FieldNames, R)> {
    let mut header_line = String::new();
    loop {
        let bytes = std::io::BufRead::read_line(&mut reader, &mut header_line)?;
        if bytes == 0 {
            return Err(TaggerError::format("stream has no header line"));
        }
        let trimmed = header_line.trim_end_matches(['\r', '\n']);
        if !trimmed.is_empty() {
            return Ok((FieldNames::from_header(trimmed), reader));
        }
        header_line.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_field_names_roundtrip() {
        let fields = FieldNames::from_header("form\tlemma\tgold");
        assert_eq!(fields.index_of("form"), Some(0));
        assert_eq!(fields.index_of("gold"), Some(2));
        assert_eq!(fields.name_of(1), Some("lemma"));
        assert_eq!(fields.index_of("missing"), None);
    }

    #[test]
    fn test_field_names_push() {
        let mut fields = FieldNames::from_header("form\tlemma");
        let idx = fields.push("label");
        assert_eq!(idx, 2);
        assert_eq!(fields.index_of("label"), Some(2));
        assert_eq!(fields.header_line(), "form\tlemma\tlabel");
    }

    #[test]
    fn test_sentence_iterator_basic() {
        let data = "a\tA\nb\tB\n\nc\tC\n\n";
        let iter = SentenceIterator::new(Cursor::new(data));
        let sentences: Vec<_> = iter.map(|r| r.unwrap()).collect();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].0, vec![vec!["a".to_string(), "A".to_string()], vec!["b".to_string(), "B".to_string()]]);
        assert_eq!(sentences[1].0, vec![vec!["c".to_string(), "C".to_string()]]);
    }

    #[test]
    fn test_sentence_iterator_no_trailing_blank() {
        let data = "a\tA\n";
        let iter = SentenceIterator::new(Cursor::new(data));
        let sentences: Vec<_> = iter.map(|r| r.unwrap()).collect();
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn test_sentence_iterator_comment() {
        let data = "# hello\na\tA\n\n";
        let iter = SentenceIterator::new(Cursor::new(data));
        let sentences: Vec<_> = iter.map(|r| r.unwrap()).collect();
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].1.as_deref(), Some("# hello"));
    }

    #[test]
    fn test_sentence_iterator_mid_sentence_comment_is_fatal() {
        let data = "a\tA\n# oops\nb\tB\n\n";
        let iter = SentenceIterator::new(Cursor::new(data));
        let results: Vec<_> = iter.collect();
        assert!(results[0].is_err());
    }

    #[test]
    fn test_read_header() {
        let data = "form\tlemma\na\tA\n\n";
        let (fields, reader) = read_header(Cursor::new(data)).unwrap();
        assert_eq!(fields.len(), 2);
        let sentences: Vec<_> = SentenceIterator::new(reader).map(|r| r.unwrap()).collect();
        assert_eq!(sentences.len(), 1);
    }
}
