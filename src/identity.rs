// 🔑 Identity Resolver - one stable key per pharmacy across monthly editions
// Either reuse the key of a prior-period reference record (scored fuzzy
// match), or mint one deterministically from the match-normalized fields.

use crate::normalizer::NormalizedEntry;
use crate::region::RegionConfig;
use crate::similarity::{SequenceRatio, SimilarityMeasure};
use crate::text::normalize_for_match;
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Hex digits of the digest kept in a minted identity
const IDENTITY_HEX_LEN: usize = 12;

// ============================================================================
// SCORING WEIGHTS
// ============================================================================

/// Reconciliation score weights and acceptance thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Locality matches exactly
    pub exact_area: i64,
    /// One locality contains the other
    pub partial_area: i64,
    /// Multiplied by the address similarity ratio, then truncated
    pub address_similarity: i64,
    /// Addresses match exactly (on top of the similarity part)
    pub exact_address: i64,
    /// Only one candidate shares the name
    pub sole_candidate: i64,
    /// Minimum score when several candidates share the name
    pub threshold_many: i64,
    /// Minimum score for a sole candidate
    pub threshold_single: i64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            exact_area: 50,
            partial_area: 30,
            address_similarity: 60,
            exact_address: 20,
            sole_candidate: 10,
            threshold_many: 45,
            threshold_single: 10,
        }
    }
}

impl ScoringWeights {
    pub fn threshold(&self, pool_size: usize) -> i64 {
        if pool_size > 1 {
            self.threshold_many
        } else {
            self.threshold_single
        }
    }
}

// ============================================================================
// MINTING
// ============================================================================

/// Deterministic identity: prefix + first hex digits of
/// sha256("match(name)|match(locality)|match(address)")
pub fn mint_identity(prefix: &str, name: &str, locality: &str, address: &str) -> String {
    let base = format!(
        "{}|{}|{}",
        normalize_for_match(name),
        normalize_for_match(locality),
        normalize_for_match(address)
    );
    let digest = Sha256::digest(base.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}{}", prefix, &hex[..IDENTITY_HEX_LEN])
}

// ============================================================================
// REFERENCE TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub identity: String,
    pub name: String,
    pub section: String,
    pub locality: String,
    pub address: String,
    pub phones: Vec<String>,

    pub match_name: String,
    pub match_locality: String,
    pub match_address: String,
}

impl ReferenceRecord {
    pub fn new(
        identity: &str,
        name: &str,
        section: &str,
        locality: &str,
        address: &str,
        phones: Vec<String>,
    ) -> Self {
        ReferenceRecord {
            identity: identity.trim().to_string(),
            name: name.trim().to_string(),
            section: section.trim().to_string(),
            locality: locality.trim().to_string(),
            address: address.trim().to_string(),
            phones,
            match_name: normalize_for_match(name),
            match_locality: normalize_for_match(locality),
            match_address: normalize_for_match(address),
        }
    }
}

/// Row of a previously exported units CSV (Abidjan "area" or intérieur "city")
#[derive(Debug, Deserialize)]
struct ReferenceRow {
    pharmacy_key: String,
    #[serde(default)]
    pharmacy_name: String,
    #[serde(default)]
    section: String,
    #[serde(default, alias = "city")]
    area: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    phones_json: String,
    #[serde(default)]
    phones_str: String,
}

impl ReferenceRow {
    fn phones(&self) -> Vec<String> {
        if !self.phones_json.trim().is_empty() {
            if let Ok(phones) = serde_json::from_str::<Vec<String>>(&self.phones_json) {
                return phones;
            }
        }
        self.phones_str
            .split(|c: char| c == ';' || c == '/')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Prior-period records, indexed by match name
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    records: Vec<ReferenceRecord>,
    by_name: HashMap<String, Vec<usize>>,
}

impl ReferenceTable {
    pub fn from_records(records: Vec<ReferenceRecord>) -> Self {
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            by_name.entry(record.match_name.clone()).or_default().push(idx);
        }
        ReferenceTable { records, by_name }
    }

    /// Parse a units CSV; rows without a key are skipped
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for row in csv_reader.deserialize() {
            let row: ReferenceRow = row.context("Malformed reference row")?;
            if row.pharmacy_key.trim().is_empty() {
                continue;
            }
            records.push(ReferenceRecord::new(
                &row.pharmacy_key,
                &row.pharmacy_name,
                &row.section,
                &row.area,
                &row.address,
                row.phones(),
            ));
        }

        Ok(Self::from_records(records))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open reference: {:?}", path.as_ref()))?;
        Self::from_reader(file)
    }

    /// Load a reference, degrading to mint-only mode (None) on any failure
    pub fn load_or_degrade<P: AsRef<Path>>(path: P) -> Option<Self> {
        match Self::from_path(path.as_ref()) {
            Ok(table) if table.is_empty() => {
                warn!(path = ?path.as_ref(), "reference is empty, minting identities only");
                None
            }
            Ok(table) => {
                info!(path = ?path.as_ref(), records = table.len(), "reference loaded");
                Some(table)
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "reference unusable, minting identities only");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&ReferenceRecord> {
        self.records.get(idx)
    }

    pub fn records(&self) -> &[ReferenceRecord] {
        &self.records
    }

    /// Indices of records sharing a match name, in table order
    pub fn candidates(&self, match_name: &str) -> &[usize] {
        self.by_name
            .get(match_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub identity: String,
    /// Index into the reference table when a candidate was accepted
    pub matched: Option<usize>,
    /// Best candidate score, when there were candidates
    pub score: Option<i64>,
}

impl Resolution {
    pub fn is_reused(&self) -> bool {
        self.matched.is_some()
    }
}

pub struct IdentityResolver<'a, S: SimilarityMeasure = SequenceRatio> {
    reference: Option<&'a ReferenceTable>,
    weights: ScoringWeights,
    similarity: S,
    identity_prefix: String,
    locality_must_match: bool,
    mint_with_section: bool,
}

impl<'a> IdentityResolver<'a, SequenceRatio> {
    pub fn new(region: &RegionConfig, reference: Option<&'a ReferenceTable>) -> Self {
        Self::with_similarity(region, reference, SequenceRatio)
    }
}

impl<'a, S: SimilarityMeasure> IdentityResolver<'a, S> {
    pub fn with_similarity(
        region: &RegionConfig,
        reference: Option<&'a ReferenceTable>,
        similarity: S,
    ) -> Self {
        IdentityResolver {
            reference,
            weights: region.scoring,
            similarity,
            identity_prefix: region.identity_prefix.clone(),
            locality_must_match: region.rules.locality_must_match,
            mint_with_section: region.rules.mint_with_section,
        }
    }

    /// Reuse a reference identity when a candidate clears the threshold,
    /// otherwise mint one
    pub fn resolve(&self, entry: &NormalizedEntry) -> Resolution {
        let Some(reference) = self.reference else {
            return self.minted(entry, None);
        };

        let norm_locality = normalize_for_match(&entry.locality);
        let norm_address = normalize_for_match(&entry.address);

        let pool: Vec<usize> = reference
            .candidates(&entry.match_name)
            .iter()
            .copied()
            .filter(|&idx| {
                !self.locality_must_match || reference.records[idx].match_locality == norm_locality
            })
            .collect();

        if pool.is_empty() {
            return self.minted(entry, None);
        }

        // strict '>' keeps the first candidate on ties
        let mut best: Option<(usize, i64)> = None;
        for &idx in &pool {
            let score = self.score(&reference.records[idx], &norm_locality, &norm_address, pool.len());
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((idx, score));
            }
        }

        match best {
            Some((idx, score)) if score >= self.weights.threshold(pool.len()) => Resolution {
                identity: reference.records[idx].identity.clone(),
                matched: Some(idx),
                score: Some(score),
            },
            Some((_, score)) => self.minted(entry, Some(score)),
            None => self.minted(entry, None),
        }
    }

    /// Score one candidate against the entry's normalized locality/address
    pub fn score(
        &self,
        candidate: &ReferenceRecord,
        norm_locality: &str,
        norm_address: &str,
        pool_size: usize,
    ) -> i64 {
        let w = &self.weights;
        let mut score = 0;

        if !norm_locality.is_empty() && candidate.match_locality == norm_locality {
            score += w.exact_area;
        } else if !candidate.match_locality.is_empty()
            && (norm_locality.contains(candidate.match_locality.as_str())
                || candidate.match_locality.contains(norm_locality))
        {
            score += w.partial_area;
        }

        if !candidate.match_address.is_empty() && !norm_address.is_empty() {
            let ratio = self.similarity.ratio(&candidate.match_address, norm_address);
            score += (ratio * w.address_similarity as f64) as i64;
            if candidate.match_address == norm_address {
                score += w.exact_address;
            }
        }

        if pool_size == 1 {
            score += w.sole_candidate;
        }

        score
    }

    fn minted(&self, entry: &NormalizedEntry, score: Option<i64>) -> Resolution {
        Resolution {
            identity: self.mint(entry),
            matched: None,
            score,
        }
    }

    /// Identity minted from the entry alone
    pub fn mint(&self, entry: &NormalizedEntry) -> String {
        let locality = if self.mint_with_section {
            format!("{} {}", entry.section, entry.locality)
        } else {
            entry.locality.clone()
        };
        mint_identity(&self.identity_prefix, &entry.display_name, &locality, &entry.address)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::WeekPeriod;
    use crate::scanner::DutyType;
    use crate::similarity::LcsRatio;
    use chrono::NaiveDate;

    fn entry(name: &str, locality: &str, address: &str) -> NormalizedEntry {
        let day = |d| NaiveDate::from_ymd_opt(2026, 2, d).unwrap();
        NormalizedEntry {
            display_name: name.to_string(),
            match_name: normalize_for_match(name),
            section: "SECTION DE COCODY".to_string(),
            locality: locality.to_string(),
            address: address.to_string(),
            phones: vec![],
            week: WeekPeriod::new(day(7), day(13)).unwrap(),
            duty_type: DutyType::FullDay,
            raw_text: String::new(),
        }
    }

    fn record(identity: &str, name: &str, locality: &str, address: &str) -> ReferenceRecord {
        ReferenceRecord::new(identity, name, "SECTION DE COCODY", locality, address, vec![])
    }

    #[test]
    fn test_minting_is_deterministic() {
        let a = mint_identity("ph_", "DES ROSES", "SECTION DE COCODY RIVIERA", "ANGRE 8E TRANCHE");
        let b = mint_identity("ph_", "des  roses", "Section de Cocody Riviera", "ANGRE 8E-TRANCHE");
        assert_eq!(a, b);
        assert!(a.starts_with("ph_"));
        assert_eq!(a.len(), 3 + IDENTITY_HEX_LEN);
        assert!(a[3..].chars().all(|c| c.is_ascii_hexdigit()));

        let c = mint_identity("ph_", "DES ROSES", "SECTION DE COCODY RIVIERA", "VALLON");
        assert_ne!(a, c);
    }

    #[test]
    fn test_without_reference_mints() {
        let region = RegionConfig::abidjan();
        let resolver = IdentityResolver::new(&region, None);
        let e = entry("DES ROSES", "RIVIERA", "ANGRE 8E TRANCHE");

        let resolution = resolver.resolve(&e);
        assert!(!resolution.is_reused());
        assert_eq!(
            resolution.identity,
            mint_identity("ph_", "DES ROSES", "SECTION DE COCODY RIVIERA", "ANGRE 8E TRANCHE")
        );
        assert_eq!(resolver.resolve(&e), resolution);
    }

    #[test]
    fn test_single_candidate_accepted() {
        let region = RegionConfig::abidjan();
        let reference = ReferenceTable::from_records(vec![record(
            "ph_000000000001",
            "DES ROSES",
            "RIVIERA",
            "ANGRE 8EME TRANCHE",
        )]);
        let resolver = IdentityResolver::new(&region, Some(&reference));

        let resolution = resolver.resolve(&entry("Des Roses", "RIVIERA", "ANGRE 8E TRANCHE"));
        assert_eq!(resolution.identity, "ph_000000000001");
        assert_eq!(resolution.matched, Some(0));
        assert!(resolution.score.unwrap() >= 45);
    }

    #[test]
    fn test_same_name_disjoint_areas_rejected() {
        let region = RegionConfig::abidjan();
        let reference = ReferenceTable::from_records(vec![
            record("ph_aaaaaaaaaaaa", "DU MARCHE", "ABOBO", "GARE ROUTIERE"),
            record("ph_bbbbbbbbbbbb", "DU MARCHE", "YOPOUGON", "SIDECI"),
        ]);
        let resolver = IdentityResolver::new(&region, Some(&reference));

        let e = entry("DU MARCHE", "MARCORY NORD", "BOULEVARD VGE");
        let resolution = resolver.resolve(&e);
        assert!(!resolution.is_reused());
        assert!(resolution.score.unwrap() < 45);
        assert_ne!(resolution.identity, "ph_aaaaaaaaaaaa");
        assert_ne!(resolution.identity, "ph_bbbbbbbbbbbb");
        assert_eq!(resolution.identity, resolver.mint(&e));
    }

    #[test]
    fn test_same_name_picks_matching_branch() {
        let region = RegionConfig::abidjan();
        let reference = ReferenceTable::from_records(vec![
            record("ph_aaaaaaaaaaaa", "DU MARCHE", "ABOBO", "GARE ROUTIERE"),
            record("ph_bbbbbbbbbbbb", "DU MARCHE", "YOPOUGON", "SIDECI"),
        ]);
        let resolver = IdentityResolver::new(&region, Some(&reference));

        let resolution = resolver.resolve(&entry("DU MARCHE", "YOPOUGON", "SIDECI"));
        assert_eq!(resolution.identity, "ph_bbbbbbbbbbbb");
    }

    #[test]
    fn test_score_components() {
        let region = RegionConfig::abidjan();
        let resolver = IdentityResolver::new(&region, None);
        let cand = record("ph_x", "A", "COCODY", "RIVIERA 2");

        // exact area + exact address (60 + 20) + sole candidate
        assert_eq!(resolver.score(&cand, "COCODY", "RIVIERA2", 1), 50 + 60 + 20 + 10);
        // partial area only
        assert_eq!(resolver.score(&cand, "COCODYANGRE", "", 2), 30);
        // empty entry locality counts as contained in the candidate's
        assert_eq!(resolver.score(&cand, "", "", 2), 30);
    }

    #[test]
    fn test_city_must_match_for_interieur() {
        let region = RegionConfig::interieur();
        let reference = ReferenceTable::from_records(vec![record(
            "ph_daloa0000000",
            "DU LOBIA",
            "Daloa",
            "QUARTIER LOBIA",
        )]);
        let resolver = IdentityResolver::new(&region, Some(&reference));

        let resolution = resolver.resolve(&entry("DU LOBIA", "Gagnoa", "QUARTIER LOBIA"));
        assert!(!resolution.is_reused());
        assert_eq!(resolution.score, None);

        let resolution = resolver.resolve(&entry("DU LOBIA", "DALOA", "QUARTIER LOBIA"));
        assert_eq!(resolution.identity, "ph_daloa0000000");
    }

    #[test]
    fn test_alternative_similarity_measure() {
        let region = RegionConfig::abidjan();
        let reference = ReferenceTable::from_records(vec![record(
            "ph_000000000001",
            "DES ROSES",
            "RIVIERA",
            "ANGRE 8EME TRANCHE",
        )]);
        let resolver = IdentityResolver::with_similarity(&region, Some(&reference), LcsRatio);
        let resolution = resolver.resolve(&entry("DES ROSES", "RIVIERA", "ANGRE 8E TRANCHE"));
        assert!(resolution.is_reused());
    }

    #[test]
    fn test_reference_csv_accepts_city_column() {
        let data = "\
pharmacy_key,pharmacy_name,section,city,address,phones_str,phones_json
ph_111111111111,DU LOBIA,,Daloa,QUARTIER LOBIA,07 07 07 07 07 ; 05 05 05 05 05,
,SANS CLE,,Daloa,,,
ph_222222222222,CENTRALE,,Gagnoa,,,\"[\"\"01 02 03 04 05\"\"]\"
";
        let table = ReferenceTable::from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);

        let lobia = table.get(0).unwrap();
        assert_eq!(lobia.locality, "Daloa");
        assert_eq!(lobia.phones, vec!["07 07 07 07 07", "05 05 05 05 05"]);
        assert_eq!(table.candidates("DULOBIA"), &[0]);

        let centrale = table.get(1).unwrap();
        assert_eq!(centrale.phones, vec!["01 02 03 04 05"]);
    }

    #[test]
    fn test_malformed_reference_degrades() {
        assert!(ReferenceTable::load_or_degrade("/nonexistent/reference.csv").is_none());

        let result = ReferenceTable::from_reader("no_key_column\nvalue\n".as_bytes());
        assert!(result.is_err());
    }
}
