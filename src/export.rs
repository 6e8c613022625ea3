// 📤 Export - units CSV, duty-periods CSV, seed JSON
// The locality column is labelled per region ("area" or "city"), so rows are
// written with explicit records rather than derived headers.

use crate::aggregator::{CanonicalUnit, DutyPeriodRecord};
use crate::dates::DocumentPeriod;
use crate::pipeline::{RosterRun, RunSummary};
use crate::region::RegionConfig;
use anyhow::{Context as AnyhowContext, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const PHONE_JOIN: &str = " ; ";

// ============================================================================
// CSV WRITERS
// ============================================================================

pub fn unit_headers(region: &RegionConfig) -> Vec<&'static str> {
    vec![
        "pharmacy_key",
        "pharmacy_name",
        "section",
        region.locality_label.as_str(),
        "address",
        "phones_str",
        "phones_json",
    ]
}

pub fn duty_headers(region: &RegionConfig) -> Vec<&'static str> {
    vec![
        "pharmacy_key",
        "pharmacy_name",
        "section",
        region.locality_label.as_str(),
        "start_date",
        "end_date",
        "duty_type",
        "source",
        "timezone",
    ]
}

pub fn write_units<W: Write>(writer: W, region: &RegionConfig, units: &[CanonicalUnit]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(unit_headers(region))?;

    for unit in units {
        let phones_json = serde_json::to_string(&unit.phones)?;
        wtr.write_record([
            unit.identity.as_str(),
            unit.name.as_str(),
            unit.section.as_str(),
            unit.locality.as_str(),
            unit.address.as_str(),
            unit.phones.join(PHONE_JOIN).as_str(),
            phones_json.as_str(),
        ])?;
    }

    wtr.flush().context("Failed to flush units CSV")?;
    Ok(())
}

pub fn write_duty_periods<W: Write>(
    writer: W,
    region: &RegionConfig,
    duty_periods: &[DutyPeriodRecord],
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(duty_headers(region))?;

    for record in duty_periods {
        let start = record.week.start.format("%Y-%m-%d").to_string();
        let end = record.week.end.format("%Y-%m-%d").to_string();
        wtr.write_record([
            record.identity.as_str(),
            record.name.as_str(),
            record.section.as_str(),
            record.locality.as_str(),
            start.as_str(),
            end.as_str(),
            record.duty_type.as_str(),
            record.source.as_str(),
            record.timezone.as_str(),
        ])?;
    }

    wtr.flush().context("Failed to flush duty periods CSV")?;
    Ok(())
}

// ============================================================================
// SEED JSON
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SeedSource {
    pub name: String,
    pub title: String,
    pub input_file: Option<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Seed<'a> {
    pub source: SeedSource,
    pub period: &'a DocumentPeriod,
    pub stats: &'a RunSummary,
}

impl<'a> Seed<'a> {
    pub fn new(region: &RegionConfig, run: &'a RosterRun, input_file: Option<&str>) -> Self {
        let title = match run.document.month_number {
            Some(_) => format!("Tour de garde {} {} {}", region.name, run.document.month, run.document.year),
            None => format!("Tour de garde {} {}", region.name, run.document.year),
        };

        Seed {
            source: SeedSource {
                name: region.source.clone(),
                title,
                input_file: input_file.map(str::to_string),
                generated_at: Utc::now(),
            },
            period: &run.document,
            stats: &run.summary,
        }
    }
}

pub fn write_seed<W: Write>(writer: W, seed: &Seed) -> Result<()> {
    serde_json::to_writer_pretty(writer, seed).context("Failed to write seed JSON")?;
    Ok(())
}

// ============================================================================
// OUTPUT FILES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub units: PathBuf,
    pub duty_periods: PathBuf,
    pub seed: PathBuf,
}

impl OutputPaths {
    /// `<prefix>_pharmacies_<month>_<year>.csv` and siblings
    pub fn new(dir: &Path, region: &RegionConfig, document: &DocumentPeriod) -> Self {
        let suffix = format!("{}_{}", document.month, document.year);
        let prefix = &region.file_prefix;
        OutputPaths {
            units: dir.join(format!("{}_pharmacies_{}.csv", prefix, suffix)),
            duty_periods: dir.join(format!("{}_duty_periods_{}.csv", prefix, suffix)),
            seed: dir.join(format!("{}_seed_{}.json", prefix, suffix)),
        }
    }
}

/// Write all three outputs into `dir`, creating it when missing
pub fn write_outputs(
    dir: &Path,
    region: &RegionConfig,
    run: &RosterRun,
    input_file: Option<&str>,
) -> Result<OutputPaths> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let paths = OutputPaths::new(dir, region, &run.document);

    let file = create(&paths.units)?;
    write_units(file, region, &run.units)?;

    let file = create(&paths.duty_periods)?;
    write_duty_periods(file, region, &run.duty_periods)?;

    let file = create(&paths.seed)?;
    write_seed(file, &Seed::new(region, run, input_file))?;

    info!(dir = %dir.display(), "outputs written");
    Ok(paths)
}

fn create(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::WeekPeriod;
    use crate::identity::ReferenceTable;
    use crate::scanner::DutyType;
    use chrono::NaiveDate;

    fn unit() -> CanonicalUnit {
        CanonicalUnit {
            identity: "ph_0123456789ab".to_string(),
            name: "DES ROSES".to_string(),
            section: "SECTION D'ABOBO".to_string(),
            locality: "ABOBO".to_string(),
            address: "ABOBO GARE, FACE A LA MAIRIE".to_string(),
            phones: vec!["07 78 68 11 74".to_string(), "05 00 00 00 00".to_string()],
        }
    }

    #[test]
    fn test_units_csv_layout() {
        let region = RegionConfig::abidjan();
        let mut out = Vec::new();
        write_units(&mut out, &region, &[unit()]).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("pharmacy_key,pharmacy_name,section,area,address,phones_str,phones_json")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("ph_0123456789ab,DES ROSES,SECTION D'ABOBO,ABOBO,"));
        assert!(row.contains("07 78 68 11 74 ; 05 00 00 00 00"));
        assert!(row.contains(r#""[""07 78 68 11 74"",""05 00 00 00 00""]""#));
    }

    #[test]
    fn test_units_csv_reads_back_as_reference() {
        let region = RegionConfig::interieur();
        let mut out = Vec::new();
        write_units(&mut out, &region, &[unit()]).unwrap();

        let table = ReferenceTable::from_reader(out.as_slice()).unwrap();
        assert_eq!(table.len(), 1);
        let record = &table.records()[0];
        assert_eq!(record.identity, "ph_0123456789ab");
        assert_eq!(record.locality, "ABOBO");
        assert_eq!(record.phones.len(), 2);
    }

    #[test]
    fn test_duty_csv_layout() {
        let region = RegionConfig::interieur();
        let day = |d| NaiveDate::from_ymd_opt(2026, 2, d).unwrap();
        let record = DutyPeriodRecord {
            identity: "ph_0123456789ab".to_string(),
            name: "DU MARCHE".to_string(),
            section: String::new(),
            locality: "Gagnoa".to_string(),
            week: WeekPeriod::new(day(7), day(13)).unwrap(),
            duty_type: DutyType::Partial,
            source: region.source.clone(),
            timezone: region.timezone.clone(),
        };

        let mut out = Vec::new();
        write_duty_periods(&mut out, &region, &[record]).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "pharmacy_key,pharmacy_name,section,city,start_date,end_date,duty_type,source,timezone\n\
             ph_0123456789ab,DU MARCHE,,Gagnoa,2026-02-07,2026-02-13,PARTIELLE,UNPPCI,Africa/Abidjan\n"
        );
    }

    #[test]
    fn test_output_file_names() {
        let region = RegionConfig::interieur();
        let paths = OutputPaths::new(Path::new("out"), &region, &DocumentPeriod::from_month(2, 2026));

        assert_eq!(paths.units, Path::new("out/unppci_interieur_pharmacies_fevrier_2026.csv"));
        assert_eq!(
            paths.duty_periods,
            Path::new("out/unppci_interieur_duty_periods_fevrier_2026.csv")
        );
        assert_eq!(paths.seed, Path::new("out/unppci_interieur_seed_fevrier_2026.json"));

        let unknown = OutputPaths::new(Path::new("out"), &RegionConfig::abidjan(), &DocumentPeriod::unknown(2026));
        assert_eq!(unknown.units, Path::new("out/unppci_pharmacies_inconnu_2026.csv"));
    }
}
