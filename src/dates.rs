// 📅 Date Resolution - French week headers → concrete duty periods
// Headers only carry a year on the END date; the start month and year are
// inferred, rolling back across month and year boundaries.

use crate::text::ascii_upper;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static WEEK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"SEMAINE\s+DU\s+SAMEDI\s+(\d{1,2})(?:ER)?(?:\s+([A-Z]+))?\s+AU\s+VENDREDI\s+(\d{1,2})(?:ER)?\s+([A-Z]+)\s+(\d{4})",
    )
    .unwrap()
});

static SUBSECTION_PERIOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:SAMEDI|LUNDI)\s+(\d{1,2})(?:ER)?\s*(?:([A-Z]+)\s+)?AU\s+(?:SAMEDI|DIMANCHE|VENDREDI)\s+(\d{1,2})(?:ER)?\s+([A-Z]+)(?:\s+(\d{4}))?",
    )
    .unwrap()
});

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"TOUR\s+DE\s+GARDE\s+DU\s+MOIS\s+D(?:E\s+|')([A-Z]+)\s+(\d{4})").unwrap()
});

static HINT_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:19|20)\d{2}").unwrap());
static HINT_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z]+").unwrap());

/// French month names (ASCII, uppercase) with their number and output slug
const MONTHS_FR: [(&str, u32, &str); 12] = [
    ("JANVIER", 1, "janvier"),
    ("FEVRIER", 2, "fevrier"),
    ("MARS", 3, "mars"),
    ("AVRIL", 4, "avril"),
    ("MAI", 5, "mai"),
    ("JUIN", 6, "juin"),
    ("JUILLET", 7, "juillet"),
    ("AOUT", 8, "aout"),
    ("SEPTEMBRE", 9, "septembre"),
    ("OCTOBRE", 10, "octobre"),
    ("NOVEMBRE", 11, "novembre"),
    ("DECEMBRE", 12, "decembre"),
];

/// Month number for a French month name, accents and case ignored
pub fn month_number(name: &str) -> Option<u32> {
    let key = ascii_upper(name);
    MONTHS_FR
        .iter()
        .find(|(month, _, _)| *month == key.trim())
        .map(|(_, number, _)| *number)
}

/// Lowercase ASCII slug used in output file names ("fevrier")
pub fn month_slug(number: u32) -> Option<&'static str> {
    MONTHS_FR
        .iter()
        .find(|(_, n, _)| *n == number)
        .map(|(_, _, slug)| *slug)
}

// ============================================================================
// WEEK PERIOD
// ============================================================================

/// Inclusive duty range. Invariant: start <= end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeekPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if start <= end {
            Some(WeekPeriod { start, end })
        } else {
            None
        }
    }

    /// Number of calendar days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl std::fmt::Display for WeekPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} → {}", self.start, self.end)
    }
}

/// Build a period from header parts
///
/// With an explicit start month later than the end month, the start falls in
/// the previous year (DECEMBRE → JANVIER). Without one, a start day greater
/// than the end day means the previous month, wrapping January back to
/// December of the previous year.
fn resolve_period(
    start_day: u32,
    start_month: Option<u32>,
    end_day: u32,
    end_month: u32,
    year: i32,
) -> Option<WeekPeriod> {
    let end = NaiveDate::from_ymd_opt(year, end_month, end_day)?;

    let (start_year, start_month) = match start_month {
        Some(month) if month > end_month => (year - 1, month),
        Some(month) => (year, month),
        None if start_day <= end_day => (year, end_month),
        None if end_month == 1 => (year - 1, 12),
        None => (year, end_month - 1),
    };

    let start = NaiveDate::from_ymd_opt(start_year, start_month, start_day)?;
    WeekPeriod::new(start, end)
}

fn capture_u32(caps: &regex::Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx)?.as_str().parse().ok()
}

/// "SEMAINE DU SAMEDI 28 FEVRIER AU VENDREDI 06 MARS 2026" → 2026-02-28..2026-03-06
///
/// None when the line does not follow the grammar or names an impossible date.
pub fn parse_week_header(line: &str) -> Option<WeekPeriod> {
    let upper = ascii_upper(line);
    let caps = WEEK_RE.captures(&upper)?;

    let start_day = capture_u32(&caps, 1)?;
    let start_month = caps.get(2).and_then(|m| month_number(m.as_str()));
    let end_day = capture_u32(&caps, 3)?;
    let end_month = month_number(caps.get(4)?.as_str())?;
    let year: i32 = caps.get(5)?.as_str().parse().ok()?;

    resolve_period(start_day, start_month, end_day, end_month, year)
}

/// "SAMEDI 28 AU SAMEDI 07 MARS" → period in `default_year` unless the line has one
pub fn parse_subsection_period(line: &str, default_year: i32) -> Option<WeekPeriod> {
    let upper = ascii_upper(line);
    let caps = SUBSECTION_PERIOD_RE.captures(upper.trim())?;

    let start_day = capture_u32(&caps, 1)?;
    let start_month = caps.get(2).and_then(|m| month_number(m.as_str()));
    let end_day = capture_u32(&caps, 3)?;
    let end_month = month_number(caps.get(4)?.as_str())?;
    let year = match caps.get(5) {
        Some(m) => m.as_str().parse().ok()?,
        None => default_year,
    };

    resolve_period(start_day, start_month, end_day, end_month, year)
}

/// Does the line look like a sub-section period, whether or not it resolves
pub fn looks_like_subsection_period(upper: &str) -> bool {
    static START_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(?:SAMEDI|LUNDI)\s+\d{1,2}(?:ER)?\b.*\bAU\b").unwrap());
    START_RE.is_match(upper)
}

// ============================================================================
// DOCUMENT PERIOD
// ============================================================================

/// Month and year a document covers, used for output naming and summaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPeriod {
    /// Lowercase ASCII month slug, or "inconnu" when unknown
    pub month: String,
    pub month_number: Option<u32>,
    pub year: i32,
}

impl DocumentPeriod {
    pub fn unknown(year: i32) -> Self {
        DocumentPeriod {
            month: "inconnu".to_string(),
            month_number: None,
            year,
        }
    }

    pub fn from_month(number: u32, year: i32) -> Self {
        DocumentPeriod {
            month: month_slug(number).unwrap_or("inconnu").to_string(),
            month_number: Some(number),
            year,
        }
    }

    pub fn is_known(&self) -> bool {
        self.month_number.is_some()
    }
}

/// "TOUR DE GARDE DU MOIS DE FEVRIER 2026"
pub fn parse_title(line: &str) -> Option<DocumentPeriod> {
    let upper = ascii_upper(line);
    let caps = TITLE_RE.captures(&upper)?;
    let month = month_number(caps.get(1)?.as_str())?;
    let year = caps.get(2)?.as_str().parse().ok()?;
    Some(DocumentPeriod::from_month(month, year))
}

/// Month and/or year guessed from a file name ("Garde_Fevrier-2026.pdf")
pub fn period_hint(file_name: &str) -> (Option<u32>, Option<i32>) {
    let upper = ascii_upper(file_name);
    let month = HINT_WORD_RE
        .find_iter(&upper)
        .find_map(|word| month_number(word.as_str()));
    let year = HINT_YEAR_RE
        .find(&upper)
        .and_then(|m| m.as_str().parse().ok());
    (month, year)
}

// ============================================================================
// TESTS
// ============================================================================
