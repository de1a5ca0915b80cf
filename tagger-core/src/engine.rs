//! The Feature Engine (C3): binds feature declarations to column indices,
//! invokes each declared function over a sentence, and expands the raw
//! per-position output by radius into the final `"{name}[{offset}]={value}"`
//! strings fed to the book-keeper / classifier.
//!
//! Grounded on `huntag/feature.py: Feature.eval_sentence` /
//! `_multiply_features`.

use crate::config::FeatureDecl;
use crate::error::Result;
use crate::features::lexicon::Lexicon;
use crate::features::{FeatureKind, FeatureRegistry};
use crate::token::{resolve_field_indices, FieldNames, Sentence};

/// One declaration bound to its resolved field indices and (for `kind=lex`)
/// its loaded lexicon.
pub struct BoundFeature {
    decl: FeatureDecl,
    field_indices: Vec<usize>,
    lexicon: Option<Lexicon>,
}

pub struct FeatureEngine {
    features: Vec<BoundFeature>,
    registry: FeatureRegistry,
}

impl FeatureEngine {
    /// Resolves every declaration's `fields` against the header and, for
    /// `kind=lex`, loads the lexicon file named by `action_name` relative to
    /// `lexicon_dir`.
    pub fn bind(
        declarations: Vec<FeatureDecl>,
        field_names: &FieldNames,
        lexicon_dir: Option<&std::path::Path>,
        registry: FeatureRegistry,
    ) -> Result<Self> {
        let mut features = Vec::with_capacity(declarations.len());
        for decl in declarations {
            let field_indices = resolve_field_indices(&decl.fields, field_names)?;
            let lexicon = if decl.kind == FeatureKind::Lex {
                let path = match lexicon_dir {
                    Some(dir) => dir.join(&decl.action_name),
                    None => std::path::PathBuf::from(&decl.action_name),
                };
                let file = std::fs::File::open(&path)?;
                Some(Lexicon::load(std::io::BufReader::new(file))?)
            } else {
                None
            };
            features.push(BoundFeature { decl, field_indices, lexicon });
        }
        Ok(FeatureEngine { features, registry })
    }

    /// Raw (pre-radius-expansion) per-position output of one bound feature.
    fn raw_output(&self, bound: &BoundFeature, sentence: &Sentence) -> Result<Vec<Vec<String>>> {
        match bound.decl.kind {
            FeatureKind::Token => {
                let f = self.registry.token_fn(&bound.decl.action_name)?;
                let field = bound.field_indices[0];
                Ok(sentence.iter().map(|tok| f(&tok[field], &bound.decl.options)).collect())
            }
            FeatureKind::Sentence => {
                let f = self.registry.sentence_fn(&bound.decl.action_name)?;
                Ok(f(sentence, &bound.field_indices, &bound.decl.options))
            }
            FeatureKind::Lex => {
                let lexicon = bound.lexicon.as_ref().expect("lex feature without a loaded lexicon");
                let field = bound.field_indices[0];
                Ok(lexicon.eval_sentence(sentence, field))
            }
        }
    }

    /// Radius expansion: for each position `c`, for each position `p` in
    /// `[max(0,c-r), min(len,c+r+1))`, for each non-`"0"` value `f` at `p`,
    /// emit `"{name}[{p-c}]={f}"` into position `c`'s output. A negative
    /// radius is treated as unbounded (the whole sentence).
    fn expand_radius(name: &str, radius: i64, raw: &[Vec<String>], out: &mut [Vec<String>]) {
        let len = raw.len() as i64;
        for c in 0..raw.len() {
            let (lo, hi) = if radius < 0 {
                (0, len)
            } else {
                (((c as i64) - radius).max(0), ((c as i64) + radius + 1).min(len))
            };
            for p in lo..hi {
                for value in &raw[p as usize] {
                    if value == "0" {
                        continue;
                    }
                    out[c].push(format!("{name}[{}]={value}", p - c as i64));
                }
            }
        }
    }

    /// Evaluates every declaration over `sentence` and concatenates their
    /// expanded outputs, declaration order preserved, into one feature-string
    /// list per position.
    ///
    /// For sentence `["x","y","z"]`, one token feature returning the token
    /// itself, radius 1, yields pos 0 -> `{F[0]=x, F[1]=y}`, pos 1 ->
    /// `{F[-1]=x, F[0]=y, F[1]=z}`, pos 2 -> `{F[-1]=y, F[0]=z}`.
    pub fn featurize_sentence(&self, sentence: &Sentence) -> Result<Vec<Vec<String>>> {
        let mut out = vec![Vec::new(); sentence.len()];
        for bound in &self.features {
            let raw = self.raw_output(bound, sentence)?;
            Self::expand_radius(&bound.decl.name, bound.decl.radius, &raw, &mut out);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_expand_radius_produces_offset_keyed_features() {
        let raw = vec![vec!["x".to_string()], vec!["y".to_string()], vec!["z".to_string()]];
        let mut out = vec![Vec::new(); 3];
        FeatureEngine::expand_radius("F", 1, &raw, &mut out);
        assert_eq!(out[0], vec!["F[0]=x".to_string(), "F[1]=y".to_string()]);
        assert_eq!(out[1], vec!["F[-1]=x".to_string(), "F[0]=y".to_string(), "F[1]=z".to_string()]);
        assert_eq!(out[2], vec!["F[-1]=y".to_string(), "F[0]=z".to_string()]);
    }

    #[test]
    fn test_zero_value_suppressed() {
        let raw = vec![vec!["0".to_string()], vec!["1".to_string()]];
        let mut out = vec![Vec::new(); 2];
        FeatureEngine::expand_radius("F", 0, &raw, &mut out);
        assert_eq!(out[0], Vec::<String>::new());
        assert_eq!(out[1], vec!["F[0]=1".to_string()]);
    }

    #[test]
    fn test_featurize_sentence_end_to_end() {
        let registry = FeatureRegistry::with_builtins();
        let field_names = FieldNames::from_header("form");
        let decl = FeatureDecl {
            name: "isCapFeat".to_string(),
            kind: FeatureKind::Token,
            action_name: "isCap".to_string(),
            fields: vec!["form".to_string()],
            radius: 0,
            cutoff: 1,
            options: HashMap::new(),
        };
        let engine = FeatureEngine::bind(vec![decl], &field_names, None, registry).unwrap();
        let sentence = vec![vec!["Lula".to_string()], vec!["foi".to_string()]];
        let out = engine.featurize_sentence(&sentence).unwrap();
        assert_eq!(out[0], vec!["isCapFeat[0]=1".to_string()]);
        assert_eq!(out[1], Vec::<String>::new());
    }
}
