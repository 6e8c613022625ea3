// 🔄 Roster Pipeline - lines → units + duty periods + summary
// Scanner → Normalizer → Identity Resolver → Aggregator, strictly in order.
// Same lines + same reference ⇒ byte-identical output.

use crate::aggregator::{aggregate, CanonicalUnit, DutyPeriodRecord, ResolvedEntry};
use crate::dates::{period_hint, DocumentPeriod};
use crate::identity::{IdentityResolver, ReferenceTable};
use crate::normalizer::EntryNormalizer;
use crate::region::RegionConfig;
use crate::scanner::{DocumentScanner, ScanStats};
use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekCoverage {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub duty_periods: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub unique_units: usize,
    pub duty_periods: usize,
    pub weeks_covered: usize,
    pub weeks: Vec<WeekCoverage>,
    /// Unique units per locality
    pub locality_distribution: BTreeMap<String, usize>,
    pub raw_entries: usize,
    pub normalized_entries: usize,
    pub dropped_entries: usize,
    pub reference_used: bool,
    pub matched_entries: usize,
    /// matched_entries / normalized_entries, 4 decimals
    pub key_match_ratio: f64,
    pub scan: ScanStats,
}

#[derive(Debug, Clone)]
pub struct RosterRun {
    pub document: DocumentPeriod,
    pub units: Vec<CanonicalUnit>,
    pub duty_periods: Vec<DutyPeriodRecord>,
    pub summary: RunSummary,
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct RosterPipeline<'a> {
    region: &'a RegionConfig,
    reference: Option<&'a ReferenceTable>,
    file_hint: Option<String>,
    default_year: i32,
}

impl<'a> RosterPipeline<'a> {
    pub fn new(region: &'a RegionConfig) -> Self {
        RosterPipeline {
            region,
            reference: None,
            file_hint: None,
            default_year: Utc::now().year(),
        }
    }

    pub fn with_reference(mut self, reference: Option<&'a ReferenceTable>) -> Self {
        self.reference = reference;
        self
    }

    /// Source file name, used when the document has no title line
    pub fn with_file_hint(mut self, file_name: &str) -> Self {
        self.file_hint = Some(file_name.to_string());
        self
    }

    pub fn with_default_year(mut self, year: i32) -> Self {
        self.default_year = year;
        self
    }

    pub fn run<S: AsRef<str>>(&self, lines: &[S]) -> Result<RosterRun> {
        // 1. Segment
        let document_year = self.hinted_year().unwrap_or(self.default_year);
        let scanner = DocumentScanner::new(self.region, document_year)?;
        let scan = scanner.scan(lines);

        if scan.entries.is_empty() {
            bail!(
                "No duty entries could be extracted ({} lines scanned, {} entries before any week)",
                scan.stats.lines,
                scan.stats.entries_without_week
            );
        }
        info!(raw_entries = scan.entries.len(), region = %self.region.name, "document scanned");

        // 2. Normalize
        let normalizer = EntryNormalizer::new(self.region)?;
        let normalized: Vec<_> = scan
            .entries
            .iter()
            .filter_map(|raw| normalizer.normalize(raw))
            .collect();

        let dropped = scan.entries.len() - normalized.len();
        if dropped > 0 {
            debug!(dropped, "entries without a recoverable name");
        }
        if normalized.is_empty() {
            bail!("None of the {} extracted entries had a recoverable name", scan.entries.len());
        }

        // 3. Resolve identities
        let resolver = IdentityResolver::new(self.region, self.reference);
        let resolved: Vec<ResolvedEntry> = normalized
            .into_iter()
            .map(|entry| {
                let resolution = resolver.resolve(&entry);
                ResolvedEntry { entry, resolution }
            })
            .collect();
        let matched = resolved.iter().filter(|r| r.resolution.is_reused()).count();

        // 4. Aggregate
        let aggregation = aggregate(&resolved, self.reference, self.region);
        let document = self.document_period(scan.document);
        if !document.is_known() {
            warn!(year = document.year, "document month unknown, outputs named \"inconnu\"");
        }

        let weeks = week_coverage(&aggregation.duty_periods);
        let summary = RunSummary {
            unique_units: aggregation.units.len(),
            duty_periods: aggregation.duty_periods.len(),
            weeks_covered: weeks.len(),
            weeks,
            locality_distribution: locality_distribution(&aggregation.units),
            raw_entries: scan.entries.len(),
            normalized_entries: resolved.len(),
            dropped_entries: dropped,
            reference_used: self.reference.is_some(),
            matched_entries: matched,
            key_match_ratio: round4(matched as f64 / resolved.len() as f64),
            scan: scan.stats,
        };
        info!(
            units = summary.unique_units,
            duty_periods = summary.duty_periods,
            weeks = summary.weeks_covered,
            key_match_ratio = summary.key_match_ratio,
            "roster built"
        );

        Ok(RosterRun {
            document,
            units: aggregation.units,
            duty_periods: aggregation.duty_periods,
            summary,
        })
    }

    /// Title line, else file-name hint, else "inconnu" + default year
    fn document_period(&self, from_title: Option<DocumentPeriod>) -> DocumentPeriod {
        if let Some(period) = from_title {
            return period;
        }

        let (month, year) = self
            .file_hint
            .as_deref()
            .map(period_hint)
            .unwrap_or((None, None));
        let year = year.unwrap_or(self.default_year);

        match month {
            Some(month) => DocumentPeriod::from_month(month, year),
            None => DocumentPeriod::unknown(year),
        }
    }

    fn hinted_year(&self) -> Option<i32> {
        self.file_hint.as_deref().and_then(|hint| period_hint(hint).1)
    }
}

fn week_coverage(duty_periods: &[DutyPeriodRecord]) -> Vec<WeekCoverage> {
    let mut weeks: BTreeMap<(NaiveDate, NaiveDate), usize> = BTreeMap::new();
    for record in duty_periods {
        *weeks.entry((record.week.start, record.week.end)).or_insert(0) += 1;
    }
    weeks
        .into_iter()
        .map(|((start, end), duty_periods)| WeekCoverage { start, end, duty_periods })
        .collect()
}

fn locality_distribution(units: &[CanonicalUnit]) -> BTreeMap<String, usize> {
    let mut distribution = BTreeMap::new();
    for unit in units {
        *distribution.entry(unit.locality.clone()).or_insert(0) += 1;
    }
    distribution
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ReferenceRecord;
    use crate::scanner::DutyType;

    const ABIDJAN: &[&str] = &[
        "UNION NATIONALE DES PHARMACIENS PRIVES DE COTE D'IVOIRE",
        "TOUR DE GARDE DU MOIS DE FEVRIER 2026",
        "PERMANENCE 24H/24",
        "SEMAINE DU SAMEDI 07 AU VENDREDI 13 FEVRIER 2026",
        "SECTION D'ABOBO",
        "ABOBO",
        "PHCIE DES ROSES / MME KOUASSI",
        "TEL. 07 78 68 11 74 / 05 00 00 00 00 ABOBO GARE, FACE A LA MAIRIE",
        "ANYAMA",
        "PHCIE ST JEAN / DR YAO - TEL 05 44 33 22 11 ANYAMA GARE",
        "SECTION DE COCODY",
        "RIVIERA",
        "PHCIE NVLLE PIERRE / DR ADOU - TEL 07 11 22 33 44 RIVIERA 2, CARREFOUR",
        "SEMAINE DU SAMEDI 14 AU VENDREDI 20 FEVRIER 2026",
        "SECTION D'ABOBO",
        "ABOBO",
        "PHCIE DES ROSES / MME KOUASSI",
        "TEL. 07 78 68 11 74 ABOBO GARE, FACE A LA MAIRIE",
        "PHCIE DES ROSES / MME KOUASSI",
        "TEL. 07 78 68 11 74 ABOBO GARE, FACE A LA MAIRIE",
    ];

    #[test]
    fn test_abidjan_end_to_end() {
        let region = RegionConfig::abidjan();
        let run = RosterPipeline::new(&region).run(ABIDJAN).unwrap();

        assert_eq!(run.document.month, "fevrier");
        assert_eq!(run.document.year, 2026);
        assert_eq!(run.summary.raw_entries, 5);
        assert_eq!(run.units.len(), 3);
        // repeated same-week observation collapses
        assert_eq!(run.duty_periods.len(), 4);
        assert_eq!(run.summary.weeks_covered, 2);
        assert!(!run.summary.reference_used);
        assert_eq!(run.summary.key_match_ratio, 0.0);

        let roses = run.units.iter().find(|u| u.name == "DES ROSES").unwrap();
        assert_eq!(roses.section, "SECTION D'ABOBO");
        assert_eq!(roses.locality, "ABOBO");
        assert_eq!(roses.address, "ABOBO GARE, FACE A LA MAIRIE");
        assert_eq!(roses.phones, vec!["07 78 68 11 74", "05 00 00 00 00"]);
        assert!(roses.identity.starts_with("ph_"));

        assert!(run.duty_periods.iter().all(|d| d.duty_type == DutyType::FullDay));
        assert_eq!(run.summary.locality_distribution["ABOBO"], 1);
    }

    #[test]
    fn test_runs_are_idempotent() {
        let region = RegionConfig::abidjan();
        let pipeline = RosterPipeline::new(&region);

        let first = pipeline.run(ABIDJAN).unwrap();
        let second = pipeline.run(ABIDJAN).unwrap();
        assert_eq!(first.units, second.units);
        assert_eq!(first.duty_periods, second.duty_periods);
        assert_eq!(first.summary, second.summary);
    }

    #[test]
    fn test_reference_identities_are_reused() {
        let region = RegionConfig::abidjan();
        let reference = ReferenceTable::from_records(vec![ReferenceRecord::new(
            "ph_previous001",
            "DES ROSES",
            "SECTION D'ABOBO",
            "ABOBO",
            "ABOBO GARE FACE A LA MAIRIE",
            vec!["01 02 03 04 05".to_string()],
        )]);

        let run = RosterPipeline::new(&region)
            .with_reference(Some(&reference))
            .run(ABIDJAN)
            .unwrap();

        let roses = run.units.iter().find(|u| u.name == "DES ROSES").unwrap();
        assert_eq!(roses.identity, "ph_previous001");
        assert!(roses.phones.contains(&"01 02 03 04 05".to_string()));
        assert!(run.summary.reference_used);
        // 3 of the 5 observations are DES ROSES
        assert_eq!(run.summary.matched_entries, 3);
        assert_eq!(run.summary.key_match_ratio, 0.6);
    }

    #[test]
    fn test_interieur_end_to_end() {
        let region = RegionConfig::interieur();
        let lines = [
            "TOUR DE GARDE DU MOIS DE FEVRIER 2026",
            "SEMAINE DU SAMEDI 07 AU VENDREDI 13 FEVRIER 2026",
            "DALOA PHCIE DU LOBIA / DR YAO - TEL 07 07 07 07 07 QUARTIER LOBIA",
            "GAGNOA PHCIE CENTRALE / TEL 05 05 05 05 05 CENTRE VILLE",
            "PERMANENCE DU SAMEDI APRES-MIDI",
            "GAGNOA PHCIE DU MARCHE / TEL 05 05 05 05 06 GRAND MARCHE",
        ];

        let run = RosterPipeline::new(&region).run(&lines).unwrap();
        assert_eq!(run.units.len(), 3);
        assert_eq!(run.summary.raw_entries, 3);

        let marche = run.duty_periods.iter().find(|d| d.name == "DU MARCHE").unwrap();
        assert_eq!(marche.duty_type, DutyType::Partial);
        assert_eq!(marche.locality, "Gagnoa");

        let lobia = run.units.iter().find(|u| u.name == "DU LOBIA").unwrap();
        assert_eq!(lobia.address, "QUARTIER LOBIA");
        assert_eq!(lobia.section, "");
    }

    #[test]
    fn test_empty_document_is_fatal() {
        let region = RegionConfig::abidjan();
        let lines = ["TOUR DE GARDE DU MOIS DE FEVRIER 2026", "PERMANENCE 24H/24"];
        assert!(RosterPipeline::new(&region).run(&lines).is_err());
    }

    #[test]
    fn test_document_period_fallbacks() {
        let region = RegionConfig::abidjan();
        let lines = [
            "SEMAINE DU SAMEDI 07 AU VENDREDI 13 MARS 2026",
            "PHCIE DU PORT / TEL 07 01 02 03 04",
        ];

        let run = RosterPipeline::new(&region)
            .with_file_hint("Tour_de_garde_mars_2026.pdf")
            .run(&lines)
            .unwrap();
        assert_eq!(run.document.month, "mars");
        assert_eq!(run.document.year, 2026);
        assert!(run.document.is_known());

        let run = RosterPipeline::new(&region)
            .with_default_year(2031)
            .run(&lines)
            .unwrap();
        assert_eq!(run.document.month, "inconnu");
        assert_eq!(run.document.year, 2031);
        assert!(!run.document.is_known());
    }
}
