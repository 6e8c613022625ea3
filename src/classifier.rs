// 🏷️ Line Classifier - one text line → one line kind
// Pure: no I/O, no scan state. Predicates overlap, so the order of the
// checks in `classify` IS the precedence.

use crate::dates::looks_like_subsection_period;
use crate::region::RegionConfig;
use crate::text::{ascii_upper, clean_space, title_case};
use anyhow::{Context as AnyhowContext, Result};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bTOUR\s+DE\s+GARDE\s+DU\s+MOIS\b").unwrap());
static WEEK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bSEMAINE\s+DU\s+SAMEDI\b").unwrap());
static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SECTION\s+(?:DE\b|D'|D\s|DU\b)").unwrap());
static SUB_SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SOUS[\s-]+SECTION\s+(?:(?:DE|DU)\s+|D')?(.+)$").unwrap());
static SECTOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SECTEUR\s+(\d+)\b").unwrap());
static TEL_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bTEL\b").unwrap());
static PHONE_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{2}[\s.]\d{2}").unwrap());

/// Longest line the fallback area heuristic will accept
const MAX_AREA_LEN: usize = 45;

// ============================================================================
// LINE KINDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineKind {
    /// "TOUR DE GARDE DU MOIS DE ..."
    Title,

    /// Permanence banners and general instructions
    InstructionalNoise { reduced_duty: bool },

    /// "SEMAINE DU SAMEDI ... AU VENDREDI ..."
    WeekHeader,

    /// "SAMEDI 28 AU SAMEDI 07 MARS [: PHCIE ...]"
    SubSectionPeriodHeader,

    /// "SECTION D'ABOBO"
    SectionHeader { section: String },

    /// "SOUS SECTION DE DALOA"
    SubSectionHeader { section: String, city: String },

    /// A zone/quarter/city line
    AreaHeader { area: String, section: Option<String> },

    /// "Secteur 2 PHCIE ..."
    SectorPrefixedEntry { sector: u32, rest: String },

    /// "DALOA PHCIE ..."
    CityPrefixedEntry { city: String, section: Option<String>, rest: String },

    /// "PHCIE ..."
    UnitEntry,

    Continuation,
}

impl LineKind {
    pub fn label(&self) -> &'static str {
        match self {
            LineKind::Title => "title",
            LineKind::InstructionalNoise { .. } => "noise",
            LineKind::WeekHeader => "week_header",
            LineKind::SubSectionPeriodHeader => "sub_section_period",
            LineKind::SectionHeader { .. } => "section_header",
            LineKind::SubSectionHeader { .. } => "sub_section_header",
            LineKind::AreaHeader { .. } => "area_header",
            LineKind::SectorPrefixedEntry { .. } => "sector_entry",
            LineKind::CityPrefixedEntry { .. } => "city_entry",
            LineKind::UnitEntry => "unit_entry",
            LineKind::Continuation => "continuation",
        }
    }

    /// Does this kind open a new raw entry
    pub fn opens_entry(&self) -> bool {
        matches!(
            self,
            LineKind::SectorPrefixedEntry { .. }
                | LineKind::CityPrefixedEntry { .. }
                | LineKind::UnitEntry
        )
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct LineClassifier<'a> {
    region: &'a RegionConfig,
    noise: Regex,
    reduced_duty: Option<Regex>,
    marker_at_start: Regex,
    marker_anywhere: Regex,
}

impl<'a> LineClassifier<'a> {
    /// Compile the region's patterns
    pub fn new(region: &'a RegionConfig) -> Result<Self> {
        let noise = Regex::new(&region.rules.noise_pattern)
            .with_context(|| format!("Invalid noise pattern: {}", region.rules.noise_pattern))?;

        let reduced_duty = match &region.rules.reduced_duty_pattern {
            Some(pattern) => Some(
                Regex::new(pattern)
                    .with_context(|| format!("Invalid reduced-duty pattern: {}", pattern))?,
            ),
            None => None,
        };

        let marker = regex::escape(&ascii_upper(&region.unit_marker));
        let marker_at_start = Regex::new(&format!(r"^{}\b", marker))?;
        let marker_anywhere = Regex::new(&format!(r"\b{}\b", marker))?;

        Ok(LineClassifier {
            region,
            noise,
            reduced_duty,
            marker_at_start,
            marker_anywhere,
        })
    }

    /// Classify one line. Highest precedence first:
    /// title, week/period headers, noise, section headers, entries, areas.
    pub fn classify(&self, line: &str) -> LineKind {
        let cleaned = clean_space(line);
        let upper = ascii_upper(&cleaned);
        let rules = &self.region.rules;

        if upper.is_empty() {
            return LineKind::Continuation;
        }

        if TITLE_RE.is_match(&upper) {
            return LineKind::Title;
        }

        if WEEK_RE.is_match(&upper) {
            return LineKind::WeekHeader;
        }

        if rules.sub_sections && looks_like_subsection_period(&upper) {
            return LineKind::SubSectionPeriodHeader;
        }

        // a line carrying the marker is always an entry, whatever it says
        if !self.marker_at_start.is_match(&upper) && self.noise.is_match(&upper) {
            let reduced_duty = self
                .reduced_duty
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(&upper));
            return LineKind::InstructionalNoise { reduced_duty };
        }

        if rules.sub_sections {
            if let Some(caps) = SUB_SECTION_RE.captures(&upper) {
                let raw_city = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let city = match self.region.gazetteer.lookup(raw_city) {
                    Some(entry) => entry.display(raw_city),
                    None => title_case(&clean_space(raw_city)),
                };
                return LineKind::SubSectionHeader {
                    section: cleaned.to_uppercase(),
                    city,
                };
            }
        }

        if rules.section_headers && SECTION_RE.is_match(&upper) {
            return LineKind::SectionHeader {
                section: cleaned.to_uppercase(),
            };
        }

        if rules.sector_entries {
            if let Some(caps) = SECTOR_RE.captures(&upper) {
                let sector = caps[1].parse().unwrap_or_default();
                let rest = strip_leading_words(&cleaned, 2);
                if self.marker_at_start.is_match(&ascii_upper(&rest)) {
                    return LineKind::SectorPrefixedEntry { sector, rest };
                }
                // a bare sector number carries nothing we keep
                return LineKind::InstructionalNoise { reduced_duty: false };
            }
        }

        if self.marker_at_start.is_match(&upper) {
            return LineKind::UnitEntry;
        }

        if rules.city_prefixed_entries {
            if let Some((entry, rest)) = self.region.gazetteer.match_prefix(&cleaned) {
                if rest.is_empty() {
                    return LineKind::AreaHeader {
                        area: entry.display(&cleaned),
                        section: entry.section.clone(),
                    };
                }
                if self.marker_at_start.is_match(&ascii_upper(&rest)) {
                    return LineKind::CityPrefixedEntry {
                        city: entry.display(&cleaned),
                        section: entry.section.clone(),
                        rest,
                    };
                }
            }
        }

        if let Some(kind) = self.classify_area(&cleaned, &upper) {
            return kind;
        }

        LineKind::Continuation
    }

    fn classify_area(&self, cleaned: &str, upper: &str) -> Option<LineKind> {
        if self.marker_anywhere.is_match(upper)
            || TEL_TOKEN_RE.is_match(upper)
            || PHONE_PAIR_RE.is_match(upper)
        {
            return None;
        }

        if let Some(entry) = self.region.gazetteer.lookup(cleaned) {
            return Some(LineKind::AreaHeader {
                area: entry.display(cleaned),
                section: entry.section.clone(),
            });
        }

        if self.region.rules.area_fallback_heuristic && looks_like_area(cleaned) {
            return Some(LineKind::AreaHeader {
                area: cleaned.to_uppercase(),
                section: None,
            });
        }

        None
    }
}

/// Short place-like line: letters, digits, space, `'`, `-`, `/` only
fn looks_like_area(cleaned: &str) -> bool {
    if cleaned.chars().count() > MAX_AREA_LEN || PHONE_PAIR_RE.is_match(cleaned) {
        return false;
    }
    if cleaned.contains(&['.', ',', ';', '(', ')'][..]) {
        return false;
    }

    cleaned.chars().any(char::is_alphabetic)
        && cleaned
            .chars()
            .all(|c| c.is_alphabetic() || c.is_ascii_digit() || matches!(c, ' ' | '\'' | '-' | '/'))
}

fn strip_leading_words(line: &str, count: usize) -> String {
    let rest: Vec<&str> = line.split_whitespace().skip(count).collect();
    rest.join(" ")
        .trim_start_matches(|c: char| matches!(c, '-' | ':' | '/' | ' '))
        .to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abidjan_precedence() {
        let region = RegionConfig::abidjan();
        let classifier = LineClassifier::new(&region).unwrap();

        assert_eq!(
            classifier.classify("TOUR DE GARDE DU MOIS DE FEVRIER 2026"),
            LineKind::Title
        );
        assert_eq!(
            classifier.classify("SEMAINE DU SAMEDI 07 AU VENDREDI 13 FEVRIER 2026"),
            LineKind::WeekHeader
        );
        assert_eq!(
            classifier.classify("SECTION D\u{2019}ABOBO"),
            LineKind::SectionHeader {
                section: "SECTION D'ABOBO".to_string()
            }
        );
        assert_eq!(
            classifier.classify("PHCIE DES ROSES / MME KOUASSI - TEL. 07 78 68 11 74"),
            LineKind::UnitEntry
        );
        assert_eq!(
            classifier.classify("PERMANENCE 24H/24"),
            LineKind::InstructionalNoise { reduced_duty: false }
        );
    }

    #[test]
    fn test_sector_prefixed_entry() {
        let region = RegionConfig::abidjan();
        let classifier = LineClassifier::new(&region).unwrap();

        assert_eq!(
            classifier.classify("Secteur 2 PHCIE SIDECI / DR KONE"),
            LineKind::SectorPrefixedEntry {
                sector: 2,
                rest: "PHCIE SIDECI / DR KONE".to_string()
            }
        );
        assert_eq!(
            classifier.classify("Secteur 3"),
            LineKind::InstructionalNoise { reduced_duty: false }
        );
    }

    #[test]
    fn test_gazetteer_area_carries_section() {
        let region = RegionConfig::abidjan();
        let classifier = LineClassifier::new(&region).unwrap();

        assert_eq!(
            classifier.classify("Abobo PK 18"),
            LineKind::AreaHeader {
                area: "ABOBO PK 18".to_string(),
                section: Some("SECTION D'ABOBO".to_string())
            }
        );
    }

    #[test]
    fn test_fallback_area_heuristic() {
        let region = RegionConfig::abidjan();
        let classifier = LineClassifier::new(&region).unwrap();

        assert_eq!(
            classifier.classify("NIANGON SUD"),
            LineKind::AreaHeader {
                area: "NIANGON SUD".to_string(),
                section: None
            }
        );
        // phone digits, punctuation, TEL or the marker rule it out
        assert_eq!(classifier.classify("07 78 68 11 74"), LineKind::Continuation);
        assert_eq!(
            classifier.classify("FACE AU MARCHE, PRES DE LA MAIRIE"),
            LineKind::Continuation
        );
        assert_eq!(classifier.classify("TEL 0778681174"), LineKind::Continuation);
        assert_eq!(
            classifier.classify("CARREFOUR DE LA VIE ET DE LA PAIX DU GRAND MARCHE"),
            LineKind::Continuation
        );
    }

    #[test]
    fn test_fallback_area_heuristic_rejections() {
        let region = RegionConfig::abidjan();
        let classifier = LineClassifier::new(&region).unwrap();

        // marker anywhere in the line
        assert_eq!(classifier.classify("CHEZ PHCIE X"), LineKind::Continuation);
        assert_eq!(classifier.classify("ANGRE / PHCIE DU LAC"), LineKind::Continuation);
        // grouped phone digits
        assert_eq!(classifier.classify("ANGRE 07 78"), LineKind::Continuation);
        assert_eq!(classifier.classify("RIVIERA 05.44"), LineKind::Continuation);
        // parenthesis, semicolon, period
        assert_eq!(classifier.classify("RIVIERA 3 (CITE)"), LineKind::Continuation);
        assert_eq!(classifier.classify("ANGRE; VALLON"), LineKind::Continuation);
        assert_eq!(classifier.classify("ST. JEAN"), LineKind::Continuation);
        // 46 characters, one over the limit
        let long = "A".repeat(46);
        assert_eq!(classifier.classify(&long), LineKind::Continuation);
        assert!(matches!(
            classifier.classify(&"A".repeat(45)),
            LineKind::AreaHeader { .. }
        ));
    }

    #[test]
    fn test_marker_lines_are_never_noise() {
        let region = RegionConfig::abidjan();
        let classifier = LineClassifier::new(&region).unwrap();

        assert_eq!(
            classifier.classify("PHCIE DES ROSES / MME KOUASSI - TEL 07 78 68 11 74 OUVERTE 24H/24"),
            LineKind::UnitEntry
        );
        assert_eq!(
            classifier.classify("PHCIE DE LA PERMANENCE / TEL 07 78 68 11 74"),
            LineKind::UnitEntry
        );
        // H/24 only as a stand-alone banner
        assert_eq!(
            classifier.classify("FACE MAIRIE, SERVICE 24H/24"),
            LineKind::Continuation
        );
        assert_eq!(
            classifier.classify("24H/24"),
            LineKind::InstructionalNoise { reduced_duty: false }
        );
        assert_eq!(
            classifier.classify("H / 24"),
            LineKind::InstructionalNoise { reduced_duty: false }
        );
    }

    #[test]
    fn test_interieur_has_no_section_headers() {
        let region = RegionConfig::interieur();
        let classifier = LineClassifier::new(&region).unwrap();

        assert!(!matches!(
            classifier.classify("SECTION DE BOUAKE"),
            LineKind::SectionHeader { .. }
        ));
        assert_eq!(classifier.classify("SECTION DE BOUAKE"), LineKind::Continuation);
        // sub-section headers are still recognised
        assert!(matches!(
            classifier.classify("SOUS SECTION DE BOUAKE"),
            LineKind::SubSectionHeader { .. }
        ));
    }

    #[test]
    fn test_interieur_city_lines() {
        let region = RegionConfig::interieur();
        let classifier = LineClassifier::new(&region).unwrap();

        assert_eq!(
            classifier.classify("DALOA PHCIE DU LOBIA / DR YAO - TEL 07 07 07 07 07"),
            LineKind::CityPrefixedEntry {
                city: "Daloa".to_string(),
                section: None,
                rest: "PHCIE DU LOBIA / DR YAO - TEL 07 07 07 07 07".to_string()
            }
        );
        assert_eq!(
            classifier.classify("GRAND BASSAM"),
            LineKind::AreaHeader {
                area: "Grand-Bassam".to_string(),
                section: None
            }
        );
        // no fallback heuristic here
        assert_eq!(classifier.classify("QUARTIER LOBIA"), LineKind::Continuation);
    }

    #[test]
    fn test_interieur_sub_sections_and_noise() {
        let region = RegionConfig::interieur();
        let classifier = LineClassifier::new(&region).unwrap();

        assert_eq!(
            classifier.classify("SOUS SECTION DE SAN PEDRO"),
            LineKind::SubSectionHeader {
                section: "SOUS SECTION DE SAN PEDRO".to_string(),
                city: "San Pedro".to_string()
            }
        );
        assert_eq!(
            classifier.classify("SAMEDI 28 AU SAMEDI 07 MARS : PHCIE DU PORT"),
            LineKind::SubSectionPeriodHeader
        );
        assert_eq!(
            classifier.classify("PERMANENCE DU SAMEDI APRES-MIDI"),
            LineKind::InstructionalNoise { reduced_duty: true }
        );
        assert_eq!(
            classifier.classify("PERMANENCE DE NUIT"),
            LineKind::InstructionalNoise { reduced_duty: false }
        );
    }

    #[test]
    fn test_invalid_noise_pattern_is_an_error() {
        let mut region = RegionConfig::abidjan();
        region.rules.noise_pattern = "(".to_string();
        assert!(LineClassifier::new(&region).is_err());
    }
}
