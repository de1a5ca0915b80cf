//! Sentence-kind feature functions: `(sentence, field_indices, options) ->
//! list<list<str>>`, one output list per token position.
//!
//! Grounded on `examples/original_source/features.py`'s sentence-level
//! functions, which need neighboring tokens or more than one field.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::token::Token;

use super::Options;

fn empty_per_position(sentence: &[Token]) -> Vec<Vec<String>> {
    vec![Vec::new(); sentence.len()]
}

/// `NewSentenceStart`: fires at position 0 only.
pub fn new_sentence_start(sentence: &[Token], _fields: &[usize], _opts: &Options) -> Vec<Vec<String>> {
    let mut out = empty_per_position(sentence);
    if let Some(first) = out.first_mut() {
        *first = vec!["1".to_string()];
    }
    out
}

/// `NewSentenceEnd`: fires at the last position only.
pub fn new_sentence_end(sentence: &[Token], _fields: &[usize], _opts: &Options) -> Vec<Vec<String>> {
    let mut out = empty_per_position(sentence);
    if let Some(last) = out.last_mut() {
        *last = vec!["1".to_string()];
    }
    out
}

static CAS_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"CAS<...>").unwrap());

/// Matches `krPatts`' `getPosTag`: strips everything up to and including the
/// last `/`, then takes the leading run of alphanumeric characters.
fn get_pos_tag(kr: &str) -> String {
    let tail = match kr.rfind('/') {
        Some(idx) => &kr[idx + 1..],
        None => kr,
    };
    tail.chars().take_while(|c| c.is_alphanumeric()).collect()
}

/// `isBetweenSameCases`: fires between two noun tokens carrying the same
/// `CAS<...>` grammatical case marker, provided no more than `maxDist`
/// positions separate them. Grounded on `isBetweenSameCases`.
pub fn is_between_same_cases(sentence: &[Token], fields: &[usize], opts: &Options) -> Vec<Vec<String>> {
    let field = fields[0];
    let max_dist: i64 = opts.get("maxDist").and_then(|s| s.parse().ok()).unwrap_or(6);
    let kr_vec: Vec<&str> = sentence.iter().map(|tok| tok[field].as_str()).collect();
    let len = kr_vec.len();

    let mut noun_cases: Vec<Option<String>> = vec![None; len];
    for (c, kr) in kr_vec.iter().enumerate() {
        if !kr.contains("CAS") {
            continue;
        }
        noun_cases[c] = match CAS_CODE.find(kr) {
            Some(m) => {
                let matched = m.as_str();
                Some(matched[matched.len() - 4..matched.len() - 1].to_string())
            }
            None => Some("NO_CASE".to_string()),
        };
    }

    let mut left_case: Vec<(Option<String>, Option<i64>)> = vec![(None, None); len];
    let mut curr_case: Option<String> = None;
    let mut case_pos: Option<i64> = None;
    for j in 0..len {
        if noun_cases[j].is_none() {
            left_case[j] = (curr_case.clone(), case_pos);
        } else {
            curr_case = noun_cases[j].clone();
            case_pos = Some(j as i64);
            left_case[j] = (None, None);
        }
    }

    let mut right_case: Vec<(Option<String>, Option<i64>)> = vec![(None, None); len];
    let mut curr_case: Option<String> = None;
    let mut case_pos: Option<i64> = None;
    for j in (0..len).rev() {
        if noun_cases[j].is_none() {
            right_case[j] = (curr_case.clone(), case_pos);
        } else {
            curr_case = noun_cases[j].clone();
            right_case[j] = (None, None);
            case_pos = Some(j as i64);
        }
    }

    (0..len)
        .map(|j| {
            if right_case[j].0.is_some() && right_case[j].0 == left_case[j].0 {
                if let (Some(rp), Some(lp)) = (right_case[j].1, left_case[j].1) {
                    if (rp - lp).abs() <= max_dist {
                        return vec!["1".to_string()];
                    }
                }
            }
            vec!["0".to_string()]
        })
        .collect()
}

/// `capsPattern`: for each maximal run of tokens that carry an uppercase
/// letter anywhere in their form, emits `p{offset}`, `l{run_length}`, and
/// `p{offset}l{run_length}` at every position inside the run. Grounded on
/// `capsPattern`.
pub fn caps_pattern(sentence: &[Token], fields: &[usize], _opts: &Options) -> Vec<Vec<String>> {
    let field = fields[0];
    let tokens: Vec<&str> = sentence.iter().map(|tok| tok[field].as_str()).collect();
    let upper_flags: Vec<bool> = tokens.iter().map(|t| t.to_lowercase() != *t).collect();
    let len = upper_flags.len();

    let mut run_size: HashMap<i64, i64> = HashMap::new();
    let mut start: i64 = -1;
    let mut extended: Vec<bool> = upper_flags.clone();
    extended.push(false);
    for (pos, &flag) in extended.iter().enumerate() {
        let pos = pos as i64;
        if !flag {
            if start != -1 {
                run_size.insert(start, pos - start);
            }
            start = -1;
            continue;
        }
        if start == -1 {
            start = pos;
        }
        run_size.insert(start, len as i64 - start);
    }

    let mut feat_vec: Vec<Vec<String>> = vec![Vec::new(); len];
    let mut start: i64 = -1;
    for (pos, &flag) in upper_flags.iter().enumerate() {
        let pos = pos as i64;
        if !flag {
            start = -1;
            continue;
        }
        if start == -1 {
            start = pos;
        }
        let p = (pos - start).to_string();
        let l = run_size[&start].to_string();
        let out = &mut feat_vec[pos as usize];
        out.push(format!("p{p}"));
        out.push(format!("l{l}"));
        out.push(format!("p{p}l{l}"));
    }
    feat_vec
}

/// `krPatts`: for every position `c` and every window `[c+k, c+j)` with
/// `k in [-rad, rad)` and `j in [-rad+1, rad+2)`, emits `"{k}_{j}_{joined}"`
/// where `joined` is the `+`-joined POS/tag values of that window, provided
/// the window lies in bounds and its length is within `[minLength,
/// maxLength]`. POS extraction uses `get_pos_tag` when `lang=hu` and not
/// `fullKr`, else the raw field; when `lang=en`, the first character of the
/// raw field. Grounded on `krPatts`.
pub fn kr_patts(sentence: &[Token], fields: &[usize], opts: &Options) -> Vec<Vec<String>> {
    let field = fields[0];
    let lang = opts.get("lang").map(|s| s.as_str()).unwrap_or("hu");
    let min_length: i64 = opts.get("minLength").and_then(|s| s.parse().ok()).unwrap_or(1);
    let max_length: i64 = opts.get("maxLength").and_then(|s| s.parse().ok()).unwrap_or(i64::MAX);
    let rad: i64 = opts.get("rad").and_then(|s| s.parse().ok()).unwrap_or(2);
    let full_kr = opts.get("fullKr").map(|s| s == "1" || s == "true").unwrap_or(false);

    let raw: Vec<&str> = sentence.iter().map(|tok| tok[field].as_str()).collect();
    let kr_vec: Vec<String> = if lang == "hu" {
        if full_kr {
            raw.iter().map(|s| s.to_string()).collect()
        } else {
            raw.iter().map(|s| get_pos_tag(s)).collect()
        }
    } else {
        raw.iter().map(|s| s.chars().next().map(|c| c.to_string()).unwrap_or_default()).collect()
    };

    let len = kr_vec.len() as i64;
    let mut feat_vec: Vec<Vec<String>> = vec![Vec::new(); len as usize];
    for c in 0..len {
        for k in -rad..rad {
            for j in (-rad + 1)..(rad + 2) {
                let a = c + k;
                let b = c + j;
                if a >= 0 && b <= len && min_length <= (b - a) && (b - a) <= max_length {
                    let joined = (a..b).map(|x| kr_vec[x as usize].as_str()).collect::<Vec<_>>().join("+");
                    feat_vec[c as usize].push(format!("{k}_{j}_{joined}"));
                }
            }
        }
    }
    feat_vec
}

/// `lemmaLowered`: classifies the case relationship between a token's form
/// and its lemma. Grounded on `lemmaLowered`, generalized from the
/// reference's Hungarian-specific `bigcase`/`big2small` tables to Unicode
/// case folding; see `DESIGN.md`'s open-question note on the historical
/// double-emit bug this reproduces.
pub fn lemma_lowered(sentence: &[Token], fields: &[usize], _opts: &Options) -> Vec<Vec<String>> {
    let token_field = fields[0];
    let lemma_field = fields[1];
    sentence
        .iter()
        .map(|tok| classify_lemma_lowered(&tok[token_field], &tok[lemma_field]))
        .collect()
}

fn classify_lemma_lowered(word: &str, lemma: &str) -> Vec<String> {
    let Some(w0) = word.chars().next() else {
        return vec!["N/A".to_string()];
    };
    let l0 = lemma.chars().next();

    if !w0.is_uppercase() {
        if let Some(l0) = l0 {
            if l0.is_uppercase() && l0.to_lowercase().next() == Some(w0) {
                return vec!["raised".to_string()];
            }
        }
        return vec!["N/A".to_string()];
    }

    match l0 {
        Some(l0) if l0 == w0 => vec!["0".to_string()],
        Some(l0) if w0.to_lowercase().next() == Some(l0) => vec!["1".to_string()],
        _ => vec!["N/A".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(forms: &[&str]) -> Vec<Token> {
        forms.iter().map(|f| vec![f.to_string()]).collect()
    }

    #[test]
    fn test_new_sentence_start_end() {
        let s = sent(&["a", "b", "c"]);
        let opts = Options::new();
        assert_eq!(new_sentence_start(&s, &[0], &opts), vec![vec!["1".to_string()], vec![], vec![]]);
        assert_eq!(new_sentence_end(&s, &[0], &opts), vec![vec![], vec![], vec!["1".to_string()]]);
    }

    #[test]
    fn test_caps_pattern() {
        let s = sent(&["Lula", "foi", "Presidente"]);
        let out = caps_pattern(&s, &[0], &Options::new());
        assert_eq!(out[0], vec!["p0".to_string(), "l1".to_string(), "p0l1".to_string()]);
        assert_eq!(out[1], Vec::<String>::new());
        assert_eq!(out[2], vec!["p0".to_string(), "l1".to_string(), "p0l1".to_string()]);
    }

    #[test]
    fn test_caps_pattern_run_of_two() {
        let s = sent(&["NEW", "YORK", "city"]);
        let out = caps_pattern(&s, &[0], &Options::new());
        assert_eq!(out[0], vec!["p0".to_string(), "l2".to_string(), "p0l2".to_string()]);
        assert_eq!(out[1], vec!["p1".to_string(), "l2".to_string(), "p1l2".to_string()]);
        assert_eq!(out[2], Vec::<String>::new());
    }

    #[test]
    fn test_is_between_same_cases() {
        let s = sent(&["NOUN<CAS<NOM>>", "x", "NOUN<CAS<NOM>>"]);
        let out = is_between_same_cases(&s, &[0], &Options::new());
        assert_eq!(out[0], vec!["0".to_string()]);
        assert_eq!(out[1], vec!["1".to_string()]);
        assert_eq!(out[2], vec!["0".to_string()]);
    }

    #[test]
    fn test_is_between_same_cases_respects_max_dist() {
        let s = sent(&["NOUN<CAS<NOM>>", "a", "b", "c", "d", "e", "f", "g", "NOUN<CAS<NOM>>"]);
        let mut opts = Options::new();
        opts.insert("maxDist".to_string(), "2".to_string());
        let out = is_between_same_cases(&s, &[0], &opts);
        assert_eq!(out[4], vec!["0".to_string()]);
    }

    #[test]
    fn test_kr_patts_emits_windows_within_bounds() {
        let s = sent(&["N/NOUN", "V/VERB"]);
        let mut opts = Options::new();
        opts.insert("lang".to_string(), "hu".to_string());
        opts.insert("minLength".to_string(), "1".to_string());
        opts.insert("maxLength".to_string(), "2".to_string());
        opts.insert("rad".to_string(), "1".to_string());
        let out = kr_patts(&s, &[0], &opts);
        assert!(out[0].contains(&"0_1_NOUN".to_string()));
        assert!(out[0].contains(&"0_2_NOUN+VERB".to_string()));
        assert!(!out[0].iter().any(|f| f.starts_with("-1_")));
    }

    #[test]
    fn test_lemma_lowered_truth_table() {
        let s = vec![
            vec!["dog".to_string(), "Dog".to_string()],
            vec!["Dog".to_string(), "Dog".to_string()],
            vec!["Dog".to_string(), "dog".to_string()],
            vec!["Dog".to_string(), "cat".to_string()],
            vec!["dog".to_string(), "dog".to_string()],
        ];
        let out = lemma_lowered(&s, &[0, 1], &Options::new());
        assert_eq!(out[0], vec!["raised".to_string()]);
        assert_eq!(out[1], vec!["0".to_string()]);
        assert_eq!(out[2], vec!["1".to_string()]);
        assert_eq!(out[3], vec!["N/A".to_string()]);
        assert_eq!(out[4], vec!["N/A".to_string()]);
    }
}
