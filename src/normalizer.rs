// 🧹 Entry Normalizer - raw entry block → structured record
// Name, phones and address are pulled out of the merged free text. An entry
// with no recoverable name is dropped (None), never guessed.

use crate::dates::WeekPeriod;
use crate::region::RegionConfig;
use crate::scanner::{DutyType, RawEntry};
use crate::text::{
    ascii_upper, clean_space, normalize_apostrophes, normalize_for_match, normalize_name_display,
};
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TEL_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bTEL\b\.?\s*:?\s*").unwrap());
static DIGIT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[ .]\d+)*").unwrap());
static GROUPED_PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{2}(?:[ .]\d{2}){3,4}\b").unwrap());
static COMPACT_PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{10}|\d{8})\b").unwrap());
static REPEATED_SLASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s*/\s*){2,}").unwrap());

/// Two-digit groups per phone number: 4 (old plan) or 5 (current plan)
const MIN_PHONE_GROUPS: usize = 4;
const MAX_PHONE_GROUPS: usize = 5;

const NAME_TRIM: &[char] = &[' ', '/', '-', '.', ','];
const ADDRESS_TRIM: &[char] = &[' ', '/', '-', '.', ',', ':'];

// ============================================================================
// NORMALIZED ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEntry {
    /// Cleaned, uppercased, accents kept
    pub display_name: String,
    /// Derived from display_name; comparison only
    pub match_name: String,
    pub section: String,
    pub locality: String,
    pub address: String,
    /// Ordered, no duplicates, "07 78 68 11 74" form
    pub phones: Vec<String>,
    pub week: WeekPeriod,
    pub duty_type: DutyType,
    pub raw_text: String,
}

// ============================================================================
// NORMALIZER
// ============================================================================

pub struct EntryNormalizer {
    /// Tried in order: stop at slash/TEL/civility, stop at slash, rest of line
    name_patterns: Vec<Regex>,
}

impl EntryNormalizer {
    pub fn new(region: &RegionConfig) -> Result<Self> {
        let marker = regex::escape(&ascii_upper(&region.unit_marker));
        let name_patterns = vec![
            Regex::new(&format!(
                r"(?i)\b{}\s+(.*?)(?:\s*/|\s+-?\s*TEL\b|\s+(?:MME|MLLE|MR|DR|PR|M)(?:\.|\s|$))",
                marker
            ))?,
            Regex::new(&format!(r"(?i)\b{}\s+(.+?)\s*/", marker))?,
            Regex::new(&format!(r"(?i)\b{}\s+(.+)$", marker))?,
        ];

        Ok(EntryNormalizer { name_patterns })
    }

    /// None when no name can be recovered
    pub fn normalize(&self, raw: &RawEntry) -> Option<NormalizedEntry> {
        let merged = raw.merged_text();
        let first_line = raw.lines.first().map(|l| clean_space(l)).unwrap_or_default();

        let name = self
            .extract_name(&first_line)
            .or_else(|| self.extract_name(&merged))?;

        let display_name = normalize_name_display(&name);
        let match_name = normalize_for_match(&display_name);
        if display_name.is_empty() || match_name.is_empty() {
            return None;
        }

        Some(NormalizedEntry {
            display_name,
            match_name,
            section: clean_space(&raw.section),
            locality: clean_space(&raw.locality),
            address: extract_address(&merged, &raw.lines),
            phones: extract_entry_phones(&merged),
            week: raw.week,
            duty_type: raw.duty_type,
            raw_text: merged,
        })
    }

    /// Text following the unit marker, up to the first slash/TEL/civility token
    pub fn extract_name(&self, text: &str) -> Option<String> {
        let text = normalize_apostrophes(text);
        for pattern in &self.name_patterns {
            let Some(caps) = pattern.captures(&text) else {
                continue;
            };
            let name = caps
                .get(1)
                .map(|m| m.as_str().trim_matches(NAME_TRIM))
                .unwrap_or_default();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
        None
    }
}

// ============================================================================
// PHONES
// ============================================================================

/// Phones after the TEL marker, or anywhere when there are none there
pub fn extract_entry_phones(merged: &str) -> Vec<String> {
    if let Some(m) = TEL_MARK_RE.find(merged) {
        let phones = extract_phones(&merged[m.start()..]);
        if !phones.is_empty() {
            return phones;
        }
    }
    extract_phones(merged)
}

/// Every phone number in `text`, in order, deduplicated
///
/// Digit runs are split into groups; consecutive two-digit groups are cut into
/// numbers of five groups (four for a short remainder). Compact runs of 8 or
/// 10 digits are accepted as-is.
pub fn extract_phones(text: &str) -> Vec<String> {
    let text = clean_space(text);
    let mut phones = Vec::new();

    for run in DIGIT_RUN_RE.find_iter(&text) {
        let mut segment: Vec<&str> = Vec::new();
        for group in run.as_str().split(|c: char| c == ' ' || c == '.') {
            if group.len() == 2 {
                segment.push(group);
                continue;
            }
            take_phones(&segment, &mut phones);
            segment.clear();
            if group.len() == 8 || group.len() == 10 {
                push_unique(&mut phones, pairs(group));
            }
        }
        take_phones(&segment, &mut phones);
    }

    phones
}

fn take_phones(segment: &[&str], phones: &mut Vec<String>) {
    let mut rest = segment;
    while rest.len() >= MIN_PHONE_GROUPS {
        let size = rest.len().min(MAX_PHONE_GROUPS);
        push_unique(phones, rest[..size].join(" "));
        rest = &rest[size..];
    }
}

fn pairs(digits: &str) -> String {
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_unique(phones: &mut Vec<String>, phone: String) {
    if !phones.contains(&phone) {
        phones.push(phone);
    }
}

/// Remove phone numbers and the TEL marker, tidy leftover separators
pub fn strip_phones(text: &str) -> String {
    let out = clean_space(text);
    let out = TEL_MARK_RE.replace_all(&out, " ");
    let out = GROUPED_PHONE_RE.replace_all(&out, " ");
    let out = COMPACT_PHONE_RE.replace_all(&out, " ");
    let out = out.replace(';', " / ");
    let out = REPEATED_SLASH_RE.replace_all(&out, " / ");

    clean_space(&out).trim_matches(ADDRESS_TRIM).to_string()
}

// ============================================================================
// ADDRESS
// ============================================================================

/// First non-empty of: text after TEL, segments after the second slash,
/// continuation lines. Phones and the TEL marker are stripped from each.
pub fn extract_address(merged: &str, lines: &[String]) -> String {
    if let Some(m) = TEL_MARK_RE.find(merged) {
        let address = strip_phones(&merged[m.end()..]);
        if !address.is_empty() {
            return address;
        }
    }

    let segments: Vec<&str> = merged.split('/').collect();
    if segments.len() > 2 {
        let address = strip_phones(&segments[2..].join(" / "));
        if !address.is_empty() {
            return address;
        }
    }

    if lines.len() > 1 {
        return strip_phones(&lines[1..].join(" "));
    }

    String::new()
}

// ============================================================================
// TESTS
// ============================================================================
