// 🗺️ Region Configuration - one document family per config, rules as data
// Abidjan and intérieur editions share one pipeline; everything that differs
// between them (gazetteers, header grammars, output labels) lives here.

use crate::identity::ScoringWeights;
use crate::text::{clean_space, collapse_whitespace, locality_key};
use anyhow::{bail, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ============================================================================
// GAZETTEER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GazetteerEntry {
    /// Spelling as it appears in the documents
    pub name: String,

    /// Display form used in outputs (falls back to the cleaned line)
    #[serde(default)]
    pub canonical: Option<String>,

    /// Section implied by this locality, when known
    #[serde(default)]
    pub section: Option<String>,
}

impl GazetteerEntry {
    pub fn new(name: &str) -> Self {
        GazetteerEntry {
            name: name.to_string(),
            canonical: None,
            section: None,
        }
    }

    pub fn in_section(name: &str, section: &str) -> Self {
        GazetteerEntry {
            section: Some(section.to_string()),
            ..GazetteerEntry::new(name)
        }
    }

    pub fn with_canonical(name: &str, canonical: &str) -> Self {
        GazetteerEntry {
            canonical: Some(canonical.to_string()),
            ..GazetteerEntry::new(name)
        }
    }

    /// Output form of this locality for a given source line
    pub fn display(&self, line: &str) -> String {
        match &self.canonical {
            Some(canonical) => canonical.clone(),
            None => clean_space(line).to_uppercase(),
        }
    }
}

/// Known localities, looked up accent/case/punctuation-insensitively
///
/// Two spellings collapsing to the same key keep the first entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<GazetteerEntry>", into = "Vec<GazetteerEntry>")]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
    index: HashMap<String, usize>,
    max_words: usize,
}

impl From<Vec<GazetteerEntry>> for Gazetteer {
    fn from(entries: Vec<GazetteerEntry>) -> Self {
        let mut gazetteer = Gazetteer::default();
        for entry in entries {
            gazetteer.insert(entry);
        }
        gazetteer
    }
}

impl From<Gazetteer> for Vec<GazetteerEntry> {
    fn from(gazetteer: Gazetteer) -> Self {
        gazetteer.entries
    }
}

impl Gazetteer {
    pub fn insert(&mut self, entry: GazetteerEntry) {
        let key = locality_key(&entry.name);
        if key.is_empty() || self.index.contains_key(&key) {
            return;
        }
        self.max_words = self.max_words.max(entry.name.split_whitespace().count());
        self.index.insert(key, self.entries.len());
        self.entries.push(entry);
    }

    /// Whole-line lookup
    pub fn lookup(&self, line: &str) -> Option<&GazetteerEntry> {
        let key = locality_key(line);
        self.index.get(&key).map(|&idx| &self.entries[idx])
    }

    /// Longest known locality at the start of `line`, plus the remaining text
    ///
    /// Matching is word-based so "MAN" never matches the start of "MANKONO".
    /// The remainder is empty when the whole line is a locality.
    pub fn match_prefix(&self, line: &str) -> Option<(&GazetteerEntry, String)> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let longest = self.max_words.min(words.len());

        for n in (1..=longest).rev() {
            let key = locality_key(&words[..n].join(" "));
            if let Some(&idx) = self.index.get(&key) {
                let rest = collapse_whitespace(&words[n..].join(" "));
                let rest = rest.trim_start_matches(|c: char| matches!(c, '/' | '-' | ':' | ' '));
                return Some((&self.entries[idx], rest.to_string()));
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// RULE TOGGLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalityLabel {
    Area,
    City,
}

impl LocalityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocalityLabel::Area => "area",
            LocalityLabel::City => "city",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionRules {
    /// Lines matching this (on ASCII-uppercased text) are instructional noise
    pub noise_pattern: String,

    /// Noise lines matching this switch following entries to reduced duty
    #[serde(default)]
    pub reduced_duty_pattern: Option<String>,

    /// "SECTION DE ..." headers
    pub section_headers: bool,

    /// "SOUS SECTION DE <city>" headers and their "SAMEDI d AU SAMEDI d MOIS" periods
    pub sub_sections: bool,

    /// "Secteur N PHCIE ..." lines
    pub sector_entries: bool,

    /// "<CITY> PHCIE ..." lines
    pub city_prefixed_entries: bool,

    /// Accept unknown short place-like lines as area headers
    pub area_fallback_heuristic: bool,

    /// Entries with no locality are dropped instead of kept
    pub require_locality: bool,

    /// Reference candidates must share the entry's locality exactly
    pub locality_must_match: bool,

    /// Identities are minted from "section area" instead of the locality alone
    pub mint_with_section: bool,
}

// ============================================================================
// REGION CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Preset name ("abidjan", "interieur") or a custom label
    pub name: String,

    /// Prefix of every output file ("unppci" → unppci_pharmacies_fevrier_2026.csv)
    pub file_prefix: String,

    /// Column name for the locality in outputs
    pub locality_label: LocalityLabel,

    /// Token that opens a unit entry
    pub unit_marker: String,

    /// Prefix of minted identities
    pub identity_prefix: String,

    /// Constant tags carried on every duty record
    pub source: String,
    pub timezone: String,

    pub gazetteer: Gazetteer,
    pub rules: RegionRules,

    #[serde(default)]
    pub scoring: ScoringWeights,
}

const SECTION_ABOBO: &str = "SECTION D'ABOBO";
const SECTION_ADJAME: &str = "SECTION D'ADJAME";
const SECTION_COCODY: &str = "SECTION DE COCODY";
const SECTION_MARCORY: &str = "SECTION DE MARCORY";
const SECTION_PORT_BOUET: &str = "SECTION DE PORT BOUET";
const SECTION_YOPOUGON: &str = "SECTION DE YOPOUGON";

impl RegionConfig {
    /// Abidjan edition: sections, area sub-headers, "Secteur N" lines
    pub fn abidjan() -> Self {
        let areas = [
            ("ABOBO", Some(SECTION_ABOBO)),
            ("ABOBO PK 18", Some(SECTION_ABOBO)),
            ("ANYAMA", Some(SECTION_ABOBO)),
            ("ALEPE / MONTEZO / BROFODOUME", Some(SECTION_ABOBO)),
            ("ALEPE", Some(SECTION_ABOBO)),
            ("MONTEZO", Some(SECTION_ABOBO)),
            ("BROFODOUME", Some(SECTION_ABOBO)),
            ("ADJAME CENTRE", Some(SECTION_ADJAME)),
            ("ATTECOUBE", Some(SECTION_ADJAME)),
            ("WILLIAMSVILLE", Some(SECTION_ADJAME)),
            ("BINGERVILLE", Some(SECTION_COCODY)),
            ("RIVIERA", Some(SECTION_COCODY)),
            ("COCODY", Some(SECTION_COCODY)),
            ("II PLATEAUX", Some(SECTION_COCODY)),
            ("ZONE AKOUEDO - PALMERAIE EXTENSION - ABATTA", None),
            ("MARCORY NORD", Some(SECTION_MARCORY)),
            ("MARCORY SUD", Some(SECTION_MARCORY)),
            ("ANOUMABO", Some(SECTION_MARCORY)),
            ("CENTRE", Some(SECTION_PORT_BOUET)),
            ("VRIDI", Some(SECTION_PORT_BOUET)),
            ("ADJOUFFOU / GONZAQ / ANANI", Some(SECTION_PORT_BOUET)),
            ("ADJOUFFOU", Some(SECTION_PORT_BOUET)),
            ("GONZAQ", None),
            ("ANANI", None),
            ("ABOBODOUME / LOCODJORO", Some(SECTION_YOPOUGON)),
            ("ALLOKOI PK 23", Some(SECTION_YOPOUGON)),
            ("ABOBODOUME", Some(SECTION_YOPOUGON)),
            ("LOCODJORO", Some(SECTION_YOPOUGON)),
            ("YOPOUGON", Some(SECTION_YOPOUGON)),
        ];

        let gazetteer = areas
            .iter()
            .map(|(name, section)| match section {
                Some(section) => GazetteerEntry::in_section(name, section),
                None => GazetteerEntry::new(name),
            })
            .collect::<Vec<_>>()
            .into();

        RegionConfig {
            name: "abidjan".to_string(),
            file_prefix: "unppci".to_string(),
            locality_label: LocalityLabel::Area,
            unit_marker: "PHCIE".to_string(),
            identity_prefix: "ph_".to_string(),
            source: "UNPPCI".to_string(),
            timezone: "Africa/Abidjan".to_string(),
            gazetteer,
            rules: RegionRules {
                noise_pattern: r"\bPERMANENCE\b|^(?:\d{1,2}\s*)?H\s*/\s*24$".to_string(),
                reduced_duty_pattern: None,
                section_headers: true,
                sub_sections: false,
                sector_entries: true,
                city_prefixed_entries: false,
                area_fallback_heuristic: true,
                require_locality: false,
                locality_must_match: false,
                mint_with_section: true,
            },
            scoring: ScoringWeights::default(),
        }
    }

    /// Intérieur edition: city-prefixed lines, "SOUS SECTION" blocks
    pub fn interieur() -> Self {
        let cities = [
            ("ABENGOUROU", "Abengourou"),
            ("ABOISSO", "Aboisso"),
            ("ADIAKE", "Adiake"),
            ("ADZOPE", "Adzope"),
            ("AGBOVILLE", "Agboville"),
            ("AGNIBILEKRO", "Agnibilekro"),
            ("AZAGUIE", "Azaguie"),
            ("BAYOTA", "Bayota"),
            ("BONDOUKOU", "Bondoukou"),
            ("BONOUA", "Bonoua"),
            ("BOUAFLE", "Bouafle"),
            ("BOUAKE", "Bouake"),
            ("DABOU", "Dabou"),
            ("DANANE", "Danane"),
            ("DALOA", "Daloa"),
            ("DIEGONEFLA", "Diegonefla"),
            ("DIVO", "Divo"),
            ("DUEKOUE", "Duekoue"),
            ("GAGNOA", "Gagnoa"),
            ("GRAND-BASSAM", "Grand-Bassam"),
            ("GUIGLO", "Guiglo"),
            ("ISSIA", "Issia"),
            ("KORHOGO", "Korhogo"),
            ("MAN", "Man"),
            ("ODIENNE", "Odienne"),
            ("OUME", "Oume"),
            ("SAN PEDRO", "San Pedro"),
            ("SINFRA", "Sinfra"),
            ("SONGON / KM 17", "Songon / Km 17"),
            ("KM 17 / SONGON", "Songon / Km 17"),
            ("SONGON", "Songon / Km 17"),
            ("KM 17", "Songon / Km 17"),
            ("SOUBRE", "Soubre"),
            ("TIASSALE", "Tiassale"),
            ("YAMOUSSOUKRO", "Yamoussoukro"),
        ];

        let gazetteer = cities
            .iter()
            .map(|(name, canonical)| GazetteerEntry::with_canonical(name, canonical))
            .collect::<Vec<_>>()
            .into();

        RegionConfig {
            name: "interieur".to_string(),
            file_prefix: "unppci_interieur".to_string(),
            locality_label: LocalityLabel::City,
            unit_marker: "PHCIE".to_string(),
            identity_prefix: "ph_".to_string(),
            source: "UNPPCI".to_string(),
            timezone: "Africa/Abidjan".to_string(),
            gazetteer,
            rules: RegionRules {
                noise_pattern: r"^PERMANENCE\b".to_string(),
                reduced_duty_pattern: Some(r"^PERMANENCE\s+DU\s+SAMEDI\b".to_string()),
                section_headers: false,
                sub_sections: true,
                sector_entries: false,
                city_prefixed_entries: true,
                area_fallback_heuristic: false,
                require_locality: true,
                locality_must_match: true,
                mint_with_section: false,
            },
            scoring: ScoringWeights::default(),
        }
    }

    /// Preset by name
    pub fn preset(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "abidjan" => Ok(Self::abidjan()),
            "interieur" | "intérieur" => Ok(Self::interieur()),
            other => bail!("Unknown region preset: {} (expected abidjan or interieur)", other),
        }
    }

    /// Load a region config from JSON
    ///
    /// The file names a `base` preset (default "abidjan"); every key it sets
    /// overrides the preset, nested objects merged key by key.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read region config: {:?}", path.as_ref()))?;

        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let mut overlay: Value =
            serde_json::from_str(content).context("Failed to parse region config JSON")?;

        let base_name = overlay
            .get("base")
            .and_then(Value::as_str)
            .unwrap_or("abidjan")
            .to_string();
        if let Value::Object(map) = &mut overlay {
            map.remove("base");
        }

        let mut merged = serde_json::to_value(Self::preset(&base_name)?)
            .context("Failed to serialize base preset")?;
        merge_json(&mut merged, overlay);

        serde_json::from_value(merged).context("Invalid region config")
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self::abidjan()
    }
}

/// Recursive object merge; arrays and scalars in `overlay` replace `base`
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

// ============================================================================
// TESTS
// ============================================================================
