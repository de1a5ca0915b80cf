//! Feature-configuration loading: a YAML document parsed into typed
//! `FeatureDecl` records and validated against the feature registry.
//!
//! Grounded on `huntag/tools.py: load_yaml`/`get_featureset_yaml`. The
//! reference locates a `%YAML 1.1` ... `...` delimited block inside a larger
//! file (so the same file can carry a shebang or comments around the
//! document); this crate preserves that marker search rather than requiring
//! the whole file to be a bare YAML document.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, TaggerError};
use crate::features::{FeatureKind, FeatureRegistry, Options};

#[derive(Debug, Deserialize)]
struct RawDefaults {
    #[serde(default)]
    cutoff: Option<u32>,
    #[serde(default)]
    radius: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawDecl {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    action_name: String,
    fields: String,
    #[serde(default)]
    radius: Option<i64>,
    #[serde(default)]
    cutoff: Option<u32>,
    #[serde(default)]
    options: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    default: RawDefaults,
    features: Vec<RawDecl>,
}

impl Default for RawDefaults {
    fn default() -> Self {
        RawDefaults { cutoff: None, radius: None }
    }
}

#[derive(Debug, Clone)]
pub struct FeatureDecl {
    pub name: String,
    pub kind: FeatureKind,
    pub action_name: String,
    pub fields: Vec<String>,
    pub radius: i64,
    pub cutoff: u32,
    pub options: Options,
}

#[derive(Debug, Clone)]
pub struct FeatureConfig {
    pub default_cutoff: u32,
    pub default_radius: i64,
    pub declarations: Vec<FeatureDecl>,
}

const YAML_START: &str = "%YAML 1.1";
const YAML_END: &str = "...";

/// Extracts the `%YAML 1.1` ... `...` delimited slice from a whole-file
/// string, per `get_featureset_yaml`.
fn extract_yaml_block(contents: &str) -> Result<&str> {
    let start = contents
        .find(YAML_START)
        .ok_or_else(|| TaggerError::config("feature config has no %YAML 1.1 start marker"))?;
    let after_start = start + YAML_START.len();
    let end_offset = contents[after_start..]
        .find(YAML_END)
        .ok_or_else(|| TaggerError::config("feature config has no ... end marker"))?;
    Ok(&contents[after_start..after_start + end_offset])
}

/// Parses a comma-separated (or bare) field-name list.
fn parse_fields(fields: &str) -> Vec<String> {
    fields.split(',').map(|s| s.trim().to_string()).collect()
}

fn parse_kind(raw: &str) -> Result<FeatureKind> {
    match raw {
        "token" => Ok(FeatureKind::Token),
        "sentence" => Ok(FeatureKind::Sentence),
        "lex" => Ok(FeatureKind::Lex),
        other => Err(TaggerError::config(format!("unknown feature type \"{other}\""))),
    }
}

impl FeatureConfig {
    pub fn load(path: impl AsRef<Path>, registry: &FeatureRegistry) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, registry)
    }

    pub fn parse(contents: &str, registry: &FeatureRegistry) -> Result<Self> {
        let block = extract_yaml_block(contents)?;
        let raw: RawDocument = serde_yaml::from_str(block)?;

        let default_cutoff = raw.default.cutoff.unwrap_or(1);
        let default_radius = raw.default.radius.unwrap_or(0);

        let mut declarations = Vec::with_capacity(raw.features.len());
        for decl in raw.features {
            let kind = parse_kind(&decl.kind)?;
            let fields = parse_fields(&decl.fields);

            match kind {
                FeatureKind::Token | FeatureKind::Lex if fields.len() != 1 => {
                    return Err(TaggerError::config(format!(
                        "feature \"{}\" of type {:?} must declare exactly one field",
                        decl.name, kind
                    )));
                }
                _ => {}
            }
            if kind == FeatureKind::Lex && !decl.options.is_empty() {
                return Err(TaggerError::config(format!(
                    "feature \"{}\" of type lex must not declare options",
                    decl.name
                )));
            }
            match kind {
                FeatureKind::Token => {
                    if !registry.has_token_fn(&decl.action_name) {
                        return Err(TaggerError::config(format!(
                            "unknown token feature action \"{}\"",
                            decl.action_name
                        )));
                    }
                }
                FeatureKind::Sentence => {
                    if !registry.has_sentence_fn(&decl.action_name) {
                        return Err(TaggerError::config(format!(
                            "unknown sentence feature action \"{}\"",
                            decl.action_name
                        )));
                    }
                }
                FeatureKind::Lex => {}
            }

            declarations.push(FeatureDecl {
                name: decl.name,
                kind,
                action_name: decl.action_name,
                fields,
                radius: decl.radius.unwrap_or(default_radius),
                cutoff: decl.cutoff.unwrap_or(default_cutoff),
                options: decl.options,
            });
        }

        Ok(FeatureConfig { default_cutoff, default_radius, declarations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
preamble, ignored by the marker search
%YAML 1.1
---
default: { cutoff: 2, radius: 1 }
features:
  - { name: isCapFeat, type: token, action_name: isCap, fields: form }
  - { name: krFeat, type: token, action_name: krPieces, fields: kr, radius: 0, options: { n: "3" } }
  - { name: lexFeat, type: lex, action_name: places.lex, fields: form }
...
trailer, also ignored
"#;

    #[test]
    fn test_parse_sample() {
        let registry = FeatureRegistry::with_builtins();
        let cfg = FeatureConfig::parse(SAMPLE, &registry).unwrap();
        assert_eq!(cfg.default_cutoff, 2);
        assert_eq!(cfg.default_radius, 1);
        assert_eq!(cfg.declarations.len(), 3);
        assert_eq!(cfg.declarations[0].radius, 1);
        assert_eq!(cfg.declarations[1].radius, 0);
        assert_eq!(cfg.declarations[2].kind, FeatureKind::Lex);
    }

    #[test]
    fn test_unknown_action_rejected() {
        let registry = FeatureRegistry::with_builtins();
        let bad = SAMPLE.replace("isCap", "notAThing");
        assert!(FeatureConfig::parse(&bad, &registry).is_err());
    }

    #[test]
    fn test_missing_markers_rejected() {
        let registry = FeatureRegistry::with_builtins();
        assert!(FeatureConfig::parse("default: {}\nfeatures: []", &registry).is_err());
    }

    #[test]
    fn test_lex_with_options_rejected() {
        let registry = FeatureRegistry::with_builtins();
        let bad = SAMPLE.replace(
            "{ name: lexFeat, type: lex, action_name: places.lex, fields: form }",
            "{ name: lexFeat, type: lex, action_name: places.lex, fields: form, options: { n: \"1\" } }",
        );
        assert!(FeatureConfig::parse(&bad, &registry).is_err());
    }
}
