// 🔤 Text Canonicalization - shared by every stage of the roster pipeline
// Two very different jobs live here:
//   - cleaning (for DISPLAY): keep accents, fix spacing/quotes/dashes
//   - match-normalization (for COMPARISON): fold everything that drifts

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static SPACE_TAB_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static SLASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*/\s*").unwrap());
static DASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*-\s*").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static MARKER_WORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:PHCIE|PHARMACIE|PHC)\b").unwrap());
static NOUVELLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:NOUVELLE|NVLLE|NLLE)\b").unwrap());
static SAINTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bSAINTE\b").unwrap());
static SAINT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bSAINT\b").unwrap());

static DISPLAY_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:PHCIE|PHARMACIE)\s+").unwrap());

/// Characters trimmed from both ends of a cleaned value
const EDGE_PUNCTUATION: &[char] = &[' ', '/', '-', '.', ','];

// ============================================================================
// CHARACTER FOLDING
// ============================================================================

/// Replace typographic apostrophes and primes with a straight `'`
pub fn normalize_apostrophes(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' | '\u{2032}' | '\u{0060}' | '\u{00b4}' => '\'',
            other => other,
        })
        .collect()
}

/// Strip diacritics, keeping the base letters ("Abobodoumé" → "Abobodoume")
pub fn fold_accents(value: &str) -> String {
    let mut expanded = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            'œ' => expanded.push_str("oe"),
            'Œ' => expanded.push_str("OE"),
            'æ' => expanded.push_str("ae"),
            'Æ' => expanded.push_str("AE"),
            'ß' => expanded.push_str("ss"),
            '–' | '—' => expanded.push('-'),
            other => expanded.push(other),
        }
    }

    expanded.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Uppercase ASCII rendering without accents
///
/// Used for every pattern test in the classifier and resolver, so the
/// regexes never need to care about "É" vs "E".
pub fn ascii_upper(value: &str) -> String {
    fold_accents(&normalize_apostrophes(value))
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii())
        .collect()
}

// ============================================================================
// DISPLAY CLEANING
// ============================================================================

/// Normalize spacing and the punctuation noise produced by text extraction
///
/// - NBSP, curly quotes, en/em dashes → ASCII equivalents
/// - one space around every `/` and `-`
/// - whitespace runs collapsed, ` /-.,` trimmed from both ends
pub fn clean_space(value: &str) -> String {
    let mut text = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\u{a0}' => text.push(' '),
            '\u{2019}' | '\u{2018}' => text.push('\''),
            '–' | '—' => text.push('-'),
            '\u{201c}' | '\u{201d}' => text.push('"'),
            'Ï' => text.push('I'),
            'Â' => text.push('A'),
            'Ê' => text.push('E'),
            other => text.push(other),
        }
    }

    let text = SPACE_TAB_RE.replace_all(&text, " ");
    let text = SLASH_RE.replace_all(&text, " / ");
    let text = DASH_RE.replace_all(&text, " - ");
    let text = WHITESPACE_RE.replace_all(&text, " ");

    text.trim_matches(EDGE_PUNCTUATION).to_string()
}

/// Collapse whitespace only (no punctuation rewriting)
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Display form of a unit name: cleaned, marker word removed, uppercased
///
/// Accents are preserved: "Phcie Sainte Thérèse" → "SAINTE THÉRÈSE"
pub fn normalize_name_display(name: &str) -> String {
    let text = clean_space(name);
    let text = DISPLAY_PREFIX_RE.replace(&text, "");
    collapse_whitespace(text.trim_matches(EDGE_PUNCTUATION)).to_uppercase()
}

/// "SAN PEDRO" → "San Pedro", "GRAND-BASSAM" → "Grand-Bassam"
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

// ============================================================================
// MATCH NORMALIZATION
// ============================================================================

/// Aggressive canonical form used ONLY for equality/similarity, never display
///
/// Folds accents and case, drops the unit marker words, folds synonyms
/// (NVLLE/NLLE → NOUVELLE, SAINTE → STE, SAINT → ST) and finally removes every
/// non-alphanumeric character, spaces included, so spacing drift between
/// editions disappears.
pub fn normalize_for_match(value: &str) -> String {
    let text = ascii_upper(value);
    let text = MARKER_WORDS_RE.replace_all(&text, " ");
    let text = NOUVELLE_RE.replace_all(&text, "NOUVELLE");
    let text = SAINTE_RE.replace_all(&text, "STE");
    let text = SAINT_RE.replace_all(&text, "ST");

    text.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Key used for gazetteer lookups: accent/case/punctuation-insensitive
pub fn locality_key(value: &str) -> String {
    ascii_upper(value)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
