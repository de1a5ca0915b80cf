//! Maps a feature declaration's `(kind, action_name)` pair to the concrete
//! function that implements it, populated once at startup.
//!
//! Configuration loading resolves every declared action name against this
//! registry and rejects unknown names immediately, rather than deferring to
//! a runtime `getattr`-style lookup failure at first use as the reference
//! does.

use std::collections::HashMap;

use crate::error::{Result, TaggerError};

use super::{sentence_features, token_features, SentenceFeatureFn, TokenFeatureFn};

#[derive(Debug, Clone, Default)]
pub struct FeatureRegistry {
    token_fns: HashMap<&'static str, TokenFeatureFn>,
    sentence_fns: HashMap<&'static str, SentenceFeatureFn>,
}

impl FeatureRegistry {
    /// Builds the registry with every built-in feature function bound to its
    /// reference name.
    pub fn with_builtins() -> Self {
        let mut registry = FeatureRegistry::default();

        macro_rules! token {
            ($name:expr, $f:path) => {
                registry.token_fns.insert($name, $f);
            };
        }
        token!("isCap", token_features::is_cap);
        token!("hasCap", token_features::has_cap);
        token!("notCapitalized", token_features::not_capitalized);
        token!("lowerCase", token_features::lower_case);
        token!("isAllCaps", token_features::is_all_caps);
        token!("isCamel", token_features::is_camel);
        token!("threeCaps", token_features::three_caps);
        token!("startsWithNumber", token_features::starts_with_number);
        token!("isNumber", token_features::is_number);
        token!("hasNumber", token_features::has_number);
        token!("hasDash", token_features::has_dash);
        token!("hasUnderscore", token_features::has_underscore);
        token!("hasPeriod", token_features::has_period);
        token!("capPeriod", token_features::cap_period);
        token!("isDigit", token_features::is_digit);
        token!("oneDigitNum", token_features::one_digit_num);
        token!("twoDigitNum", token_features::two_digit_num);
        token!("threeDigitNum", token_features::three_digit_num);
        token!("fourDigitNum", token_features::four_digit_num);
        token!("isPunctuation", token_features::is_punctuation);
        token!("containsDigitAndDash", token_features::contains_digit_and_dash);
        token!("containsDigitAndSlash", token_features::contains_digit_and_slash);
        token!("containsDigitAndComma", token_features::contains_digit_and_comma);
        token!("yearDecade", token_features::year_decade);
        token!("longPattern", token_features::long_pattern);
        token!("shortPattern", token_features::short_pattern);
        token!("prefix", token_features::prefix);
        token!("suffix", token_features::suffix);
        token!("ngrams", token_features::ngrams);
        token!("krPieces", token_features::kr_pieces);
        token!("fullKrPieces", token_features::full_kr_pieces);
        token!("krFeats", token_features::kr_feats);
        token!("krConjs", token_features::kr_conjs);
        token!("msdPos", token_features::msd_pos);
        token!("msdPosAndChar", token_features::msd_pos_and_char);
        token!("pennTags", token_features::penn_tags);
        token!("plural", token_features::plural);
        token!("getBNCtag", token_features::get_bnc_tag);
        token!("chunkTag", token_features::chunk_tag);
        token!("chunkType", token_features::chunk_type);
        token!("chunkPart", token_features::chunk_part);
        token!("getNpPart", token_features::get_np_part);

        macro_rules! sentence {
            ($name:expr, $f:path) => {
                registry.sentence_fns.insert($name, $f);
            };
        }
        sentence!("newSentenceStart", sentence_features::new_sentence_start);
        sentence!("newSentenceEnd", sentence_features::new_sentence_end);
        sentence!("isBetweenSameCases", sentence_features::is_between_same_cases);
        sentence!("capsPattern", sentence_features::caps_pattern);
        sentence!("krPatts", sentence_features::kr_patts);
        sentence!("lemmaLowered", sentence_features::lemma_lowered);

        registry
    }

    pub fn token_fn(&self, action_name: &str) -> Result<TokenFeatureFn> {
        self.token_fns
            .get(action_name)
            .copied()
            .ok_or_else(|| TaggerError::config(format!("unknown token feature action \"{action_name}\"")))
    }

    pub fn sentence_fn(&self, action_name: &str) -> Result<SentenceFeatureFn> {
        self.sentence_fns
            .get(action_name)
            .copied()
            .ok_or_else(|| TaggerError::config(format!("unknown sentence feature action \"{action_name}\"")))
    }

    pub fn has_token_fn(&self, action_name: &str) -> bool {
        self.token_fns.contains_key(action_name)
    }

    pub fn has_sentence_fn(&self, action_name: &str) -> bool {
        self.sentence_fns.contains_key(action_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_and_unknown() {
        let registry = FeatureRegistry::with_builtins();
        assert!(registry.token_fn("isCap").is_ok());
        assert!(registry.token_fn("nonexistentFeature").is_err());
        assert!(registry.sentence_fn("newSentenceStart").is_ok());
        assert!(registry.sentence_fn("nope").is_err());
    }

    #[test]
    fn test_has_fn() {
        let registry = FeatureRegistry::with_builtins();
        assert!(registry.has_token_fn("ngrams"));
        assert!(!registry.has_token_fn("newSentenceStart"));
        assert!(registry.has_sentence_fn("capsPattern"));
    }
}
