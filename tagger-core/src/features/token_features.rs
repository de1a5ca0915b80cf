//! Token-kind feature functions: one value in, one list of feature strings
//! out. Grounded 1:1 on `examples/original_source/features.py`.
//!
//! All boolean-shaped features return a one-element list containing `"0"`
//! or `"1"` (the reference returns `[int(...)]`; the feature engine treats
//! `"0"` as "no feature at this position").

use std::sync::LazyLock;

use regex::Regex;

use super::Options;

fn bit(b: bool) -> Vec<String> {
    vec![if b { "1".to_string() } else { "0".to_string() }]
}

/// The portion of `form` before its last hyphen, or `form` itself if none.
/// Grounded on `stupidStem`.
pub fn stupid_stem(form: &str) -> &str {
    match form.rfind('-') {
        Some(idx) => &form[..idx],
        None => form,
    }
}

/// `hasCapOperator`/`isCapitalizedOperator`: any character differs in case
/// from its lowercase form.
pub fn has_cap(form: &str, _opts: &Options) -> Vec<String> {
    bit(form.to_lowercase() != form)
}

/// `lowerCaseOperator`: the whole token is already lowercase.
pub fn lower_case(form: &str, _opts: &Options) -> Vec<String> {
    bit(form.to_lowercase() == form)
}

/// `isCapOperator`: starts with an uppercase character.
pub fn is_cap(form: &str, _opts: &Options) -> Vec<String> {
    match form.chars().next() {
        Some(c) => bit(c.is_uppercase()),
        None => bit(false),
    }
}

/// `notCapitalizedOperator`: starts with a lowercase character.
pub fn not_capitalized(form: &str, _opts: &Options) -> Vec<String> {
    match form.chars().next() {
        Some(c) => bit(!c.is_uppercase()),
        None => bit(false),
    }
}

/// `isAllcapsOperator`: the stem (before the last hyphen) has no lowercase
/// letters and at least one cased letter.
pub fn is_all_caps(form: &str, _opts: &Options) -> Vec<String> {
    let stem = stupid_stem(form);
    let has_cased = stem.chars().any(|c| c.is_alphabetic());
    let all_upper = stem.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase());
    bit(has_cased && all_upper)
}

/// `isCamelOperator`: second character lowercase, and the remainder of the
/// token is neither all-uppercase nor all-lowercase.
pub fn is_camel(form: &str, _opts: &Options) -> Vec<String> {
    let chars: Vec<char> = form.chars().collect();
    if chars.len() < 2 {
        return bit(false);
    }
    let rest = &chars[1..];
    let rest_upper = rest.iter().all(|c| !c.is_alphabetic() || c.is_uppercase());
    let rest_lower = rest.iter().all(|c| !c.is_alphabetic() || c.is_lowercase());
    bit(chars[1].is_lowercase() && !rest_upper && !rest_lower)
}

/// `threeCaps`: exactly three characters, all uppercase.
pub fn three_caps(form: &str, _opts: &Options) -> Vec<String> {
    let stem = stupid_stem(form);
    bit(form.chars().count() == 3 && !stem.is_empty() && stem.chars().all(|c| !c.is_alphabetic() || c.is_uppercase()))
}

/// `startsWithNumberOperator`.
pub fn starts_with_number(form: &str, _opts: &Options) -> Vec<String> {
    match form.chars().next() {
        Some(c) => bit(c.is_ascii_digit()),
        None => bit(false),
    }
}

/// `isNumberOperator`: stem consists only of digits and `,.-%`.
pub fn is_number(form: &str, _opts: &Options) -> Vec<String> {
    let stem = stupid_stem(form);
    bit(!stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit() || ",.-%".contains(c)))
}

/// `hasNumberOperator`.
pub fn has_number(form: &str, _opts: &Options) -> Vec<String> {
    bit(form.chars().any(|c| c.is_ascii_digit()))
}

/// `hasDashOperator`.
pub fn has_dash(form: &str, _opts: &Options) -> Vec<String> {
    bit(form.contains('-'))
}

/// `hasUnderscoreOperator`.
pub fn has_underscore(form: &str, _opts: &Options) -> Vec<String> {
    bit(form.contains('_'))
}

/// `hasPeriodOperator`.
pub fn has_period(form: &str, _opts: &Options) -> Vec<String> {
    bit(form.contains('.'))
}

static CAP_PERIOD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]\.$").unwrap());

/// `CapPeriodOperator` (Bikel et al. 1999): a single uppercase letter
/// followed by a period.
pub fn cap_period(form: &str, _opts: &Options) -> Vec<String> {
    bit(CAP_PERIOD_RE.is_match(form))
}

/// `isDigitOperator`.
pub fn is_digit(form: &str, _opts: &Options) -> Vec<String> {
    bit(!form.is_empty() && form.chars().all(|c| c.is_ascii_digit()))
}

fn digit_count_exactly(form: &str, n: usize) -> bool {
    form.chars().count() == n && !form.is_empty() && form.chars().all(|c| c.is_ascii_digit())
}

/// `oneDigitNumOperator` (Zhou and Su 2002).
pub fn one_digit_num(form: &str, _opts: &Options) -> Vec<String> {
    bit(digit_count_exactly(form, 1))
}

/// `twoDigitNumOperator` (Bikel et al. 1999).
pub fn two_digit_num(form: &str, _opts: &Options) -> Vec<String> {
    bit(digit_count_exactly(form, 2))
}

/// `threeDigitNumOperator`.
pub fn three_digit_num(form: &str, _opts: &Options) -> Vec<String> {
    bit(digit_count_exactly(form, 3))
}

/// `fourDigitNumOperator`.
pub fn four_digit_num(form: &str, _opts: &Options) -> Vec<String> {
    bit(digit_count_exactly(form, 4))
}

/// `isPunctuationOperator`.
pub fn is_punctuation(form: &str, _opts: &Options) -> Vec<String> {
    bit(!form.is_empty() && form.chars().all(|c| ",.!\"'():?<>[];{}".contains(c)))
}

static DIGIT_DASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+-[0-9]+").unwrap());
static DIGIT_SLASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+/[0-9]+").unwrap());
static DIGIT_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+[,.][0-9]+").unwrap());
static YEAR_DECADE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{2}s|[0-9]{4}s)$").unwrap());

/// `containsDigitAndDashOperator` (Bikel et al. 1999).
pub fn contains_digit_and_dash(form: &str, _opts: &Options) -> Vec<String> {
    bit(DIGIT_DASH_RE.is_match(form))
}

/// `containsDigitAndSlashOperator` (Bikel et al. 1999).
pub fn contains_digit_and_slash(form: &str, _opts: &Options) -> Vec<String> {
    bit(DIGIT_SLASH_RE.is_match(form))
}

/// `containsDigitAndCommaOperator` (Bikel et al. 1999).
pub fn contains_digit_and_comma(form: &str, _opts: &Options) -> Vec<String> {
    bit(DIGIT_COMMA_RE.is_match(form))
}

/// `YearDecadeOperator` (Zhou and Su 2002): matches `NNs$` or `NNNNs$`.
pub fn year_decade(form: &str, _opts: &Options) -> Vec<String> {
    bit(YEAR_DECADE_RE.is_match(form))
}

/// `longPattern`: letter case folded to `A`/`a`, everything else to `_`.
pub fn long_pattern(form: &str, _opts: &Options) -> Vec<String> {
    let pattern: String = form
        .chars()
        .map(|c| {
            if c.is_uppercase() {
                'A'
            } else if c.is_lowercase() {
                'a'
            } else {
                '_'
            }
        })
        .collect();
    vec![pattern]
}

/// `shortPattern`: `longPattern` with consecutive identical symbols
/// collapsed to one.
pub fn short_pattern(form: &str, _opts: &Options) -> Vec<String> {
    let mut pattern = String::new();
    let mut prev: Option<char> = None;
    for c in form.chars() {
        let symbol = if c.is_uppercase() {
            'A'
        } else if c.is_lowercase() {
            'a'
        } else {
            '_'
        };
        if prev != Some(symbol) {
            pattern.push(symbol);
            prev = Some(symbol);
        }
    }
    vec![pattern]
}

/// `prefix`: the first `n` characters (option `n`).
pub fn prefix(form: &str, opts: &Options) -> Vec<String> {
    let n: usize = opts.get("n").and_then(|v| v.parse().ok()).unwrap_or(1);
    vec![form.chars().take(n).collect()]
}

/// `suffix`: the last `n` characters (option `n`).
pub fn suffix(form: &str, opts: &Options) -> Vec<String> {
    let n: usize = opts.get("n").and_then(|v| v.parse().ok()).unwrap_or(1);
    let chars: Vec<char> = form.chars().collect();
    let start = chars.len().saturating_sub(n);
    vec![chars[start..].iter().collect()]
}

/// `ngrams`: character n-grams (option `n`), with `@` markers at the token's
/// own start/end boundaries.
///
/// `ngrams("almafa", n=3) = ["@alm","lma","maf","afa@"]`.
pub fn ngrams(form: &str, opts: &Options) -> Vec<String> {
    let n: usize = opts.get("n").and_then(|v| v.parse().ok()).unwrap_or(3);
    let chars: Vec<char> = form.chars().collect();
    let len = chars.len();
    if len < n {
        return vec![];
    }
    let mut out = Vec::with_capacity(len - n + 1);
    for c in 0..=(len - n) {
        let gram: String = chars[c..c + n].iter().collect();
        if c == 0 {
            out.push(format!("@{gram}"));
        } else if c + n == len {
            out.push(format!("{gram}@"));
        } else {
            out.push(gram);
        }
    }
    out
}

static NONALF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());

/// `krPieces`: splits a morphological analysis string on non-alphanumeric
/// runs, folding `PLUR` into `{pos}_PLUR` and case-number markers into
/// `{prev}_{piece}`.
pub fn kr_pieces(kr: &str, _opts: &Options) -> Vec<String> {
    let after_slash = kr.rsplit('/').next().unwrap_or(kr);
    kr_pieces_raw(after_slash)
}

fn kr_pieces_raw(s: &str) -> Vec<String> {
    let pieces: Vec<&str> = NONALF_RE.split(s).collect();
    let pos = pieces.first().copied().unwrap_or("");
    let mut feats = Vec::new();
    let mut last = "";
    for piece in &pieces {
        let processed = if *piece == "PLUR" {
            format!("{pos}_PLUR")
        } else if *piece == "1" || *piece == "2" || last == "CAS" {
            format!("{last}_{piece}")
        } else {
            piece.to_string()
        };
        if processed != "CAS" && !processed.is_empty() {
            feats.push(processed);
        }
        last = piece;
    }
    feats
}

/// `fullKrPieces`: strips the leading POS segment before `krPieces`.
pub fn full_kr_pieces(kr: &str, opts: &Options) -> Vec<String> {
    let stripped: String = {
        let mut parts = kr.split('/');
        parts.next();
        parts.collect::<Vec<_>>().join("/")
    };
    kr_pieces(&stripped, opts)
}

/// `krFeats`: same fold as `krPieces` but without the leading-POS special
/// case (the first split segment is dropped entirely).
pub fn kr_feats(kr: &str, _opts: &Options) -> Vec<String> {
    let pieces: Vec<&str> = NONALF_RE.split(kr).collect();
    let pieces = if pieces.is_empty() { &pieces[..] } else { &pieces[1..] };
    let mut feats = Vec::new();
    let mut last = "";
    for piece in pieces {
        let processed = if *piece == "1" || *piece == "2" {
            format!("{last}_{piece}")
        } else {
            piece.to_string()
        };
        if !processed.is_empty() {
            feats.push(processed);
        }
        last = piece;
    }
    feats
}

/// `krConjs`: every ordered pairwise conjunction of the split pieces.
pub fn kr_conjs(kr: &str, _opts: &Options) -> Vec<String> {
    let pieces: Vec<&str> = NONALF_RE.split(kr).collect();
    let mut conjs = Vec::new();
    for (i, a) in pieces.iter().enumerate() {
        for b in &pieces[i + 1..] {
            if b.is_empty() {
                continue;
            }
            conjs.push(format!("{a}+{b}"));
        }
    }
    conjs
}

/// `msdPos`: the second character of an MSD tag string (the POS symbol).
pub fn msd_pos(msd: &str, _opts: &Options) -> Vec<String> {
    match msd.chars().nth(1) {
        Some(c) => vec![c.to_string()],
        None => vec![],
    }
}

/// `msdPosAndChar`: combines the POS symbol with each non-`-` character of
/// the remaining MSD positions.
pub fn msd_pos_and_char(msd: &str, _opts: &Options) -> Vec<String> {
    let chars: Vec<char> = msd.chars().collect();
    if chars.len() < 3 {
        return vec![];
    }
    let pos = chars[1];
    let mut out = Vec::new();
    for (c, &ch) in chars[2..chars.len().saturating_sub(1)].iter().enumerate() {
        if ch != '-' {
            out.push(format!("{pos}{c}{ch}"));
        }
    }
    out
}

/// `getPennTags`: coarse POS bucket for a Penn Treebank tag.
pub fn penn_tags(tag: &str, _opts: &Options) -> Vec<String> {
    let bucket = if tag.starts_with('N') || tag.starts_with("PRP") {
        "noun"
    } else if tag == "IN" || tag == "TO" || tag == "RP" {
        "prep"
    } else if tag.ends_with("DT") {
        "det"
    } else if tag.starts_with("VB") || tag == "MD" {
        "verb"
    } else {
        "0"
    };
    vec![bucket.to_string()]
}

/// `plural`: `NNS`/`NNPS` Penn tags.
pub fn plural(tag: &str, _opts: &Options) -> Vec<String> {
    bit(tag == "NNS" || tag == "NNPS")
}

/// `getBNCtag`: passthrough.
pub fn get_bnc_tag(tag: &str, _opts: &Options) -> Vec<String> {
    vec![tag.to_string()]
}

/// `chunkTag`: passthrough of a chunk tag (e.g. `B-NP`).
pub fn chunk_tag(tag: &str, _opts: &Options) -> Vec<String> {
    vec![tag.to_string()]
}

/// `chunkType`: the chunk type suffix (`NP` from `B-NP`).
pub fn chunk_type(tag: &str, _opts: &Options) -> Vec<String> {
    vec![tag.chars().skip(2).collect()]
}

/// `chunkPart`: the BIO part (`B`/`I`/`O`) of a chunk tag.
pub fn chunk_part(tag: &str, _opts: &Options) -> Vec<String> {
    match tag.chars().next() {
        Some(c) => vec![c.to_string()],
        None => vec![],
    }
}

/// `getNpPart`: the BIO part of a chunk tag, restricted to `NP` chunks.
pub fn get_np_part(tag: &str, _opts: &Options) -> Vec<String> {
    if tag == "O" || !tag.ends_with("NP") {
        vec!["O".to_string()]
    } else {
        match tag.chars().next() {
            Some(c) => vec![c.to_string()],
            None => vec!["O".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> Options {
        Options::new()
    }

    #[test]
    fn test_has_cap() {
        assert_eq!(has_cap("Lula", &opts()), vec!["1"]);
        assert_eq!(has_cap("lula", &opts()), vec!["0"]);
    }

    #[test]
    fn test_is_all_caps() {
        assert_eq!(is_all_caps("NASA", &opts()), vec!["1"]);
        assert_eq!(is_all_caps("Nasa", &opts()), vec!["0"]);
    }

    #[test]
    fn test_prefix_suffix() {
        let mut o = opts();
        o.insert("n".to_string(), "3".to_string());
        assert_eq!(prefix("almafa", &o), vec!["alm"]);
        assert_eq!(suffix("almafa", &o), vec!["afa"]);
    }

    #[test]
    fn test_ngrams_emits_boundary_marked_trigrams() {
        let mut o = opts();
        o.insert("n".to_string(), "3".to_string());
        assert_eq!(ngrams("almafa", &o), vec!["@alm", "lma", "maf", "afa@"]);
    }

    #[test]
    fn test_long_short_pattern() {
        assert_eq!(long_pattern("São-Paulo12", &opts()), vec!["Aaa_Aaaaa__"]);
        assert_eq!(short_pattern("aaBBcc--12", &opts()), vec!["a_A_a_"]);
    }

    #[test]
    fn test_digit_counts() {
        assert_eq!(one_digit_num("7", &opts()), vec!["1"]);
        assert_eq!(two_digit_num("07", &opts()), vec!["1"]);
        assert_eq!(four_digit_num("2024", &opts()), vec!["1"]);
        assert_eq!(four_digit_num("202", &opts()), vec!["0"]);
    }

    #[test]
    fn test_year_decade() {
        assert_eq!(year_decade("90s", &opts()), vec!["1"]);
        assert_eq!(year_decade("1990s", &opts()), vec!["1"]);
        assert_eq!(year_decade("199s", &opts()), vec!["0"]);
    }

    #[test]
    fn test_kr_pieces_plur() {
        let feats = kr_pieces("NOUN<PLUR><CAS<ACC>>", &opts());
        assert!(feats.contains(&"NOUN_PLUR".to_string()));
    }

    #[test]
    fn test_penn_tags() {
        assert_eq!(penn_tags("NNP", &opts()), vec!["noun"]);
        assert_eq!(penn_tags("VBD", &opts()), vec!["verb"]);
        assert_eq!(penn_tags("IN", &opts()), vec!["prep"]);
        assert_eq!(penn_tags("JJ", &opts()), vec!["0"]);
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural("NNS", &opts()), vec!["1"]);
        assert_eq!(plural("NN", &opts()), vec!["0"]);
    }
}
