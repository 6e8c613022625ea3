use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use duty_roster::dates::period_hint;
use duty_roster::text::normalize_apostrophes;
use duty_roster::{db, write_outputs, DocumentScanner, ReferenceTable, RegionConfig, RosterPipeline};

#[derive(Parser)]
#[command(name = "duty-roster", version, about = "UNPPCI duty roster → pharmacies + duty periods")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an extracted roster and write the CSV/JSON outputs
    Run {
        /// Plain-text roster, one extracted line per line
        #[arg(short, long)]
        input: PathBuf,
        /// Built-in region preset (abidjan, interieur)
        #[arg(short, long, default_value = "abidjan")]
        region: String,
        /// JSON region override file (replaces --region)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Previous units CSV to reuse identities from
        #[arg(long)]
        reference: Option<PathBuf>,
        #[arg(short, long, default_value = "out")]
        output_dir: PathBuf,
        /// Also import into this SQLite database
        #[arg(long)]
        sqlite: Option<PathBuf>,
        /// Year used when neither the title nor the file name carries one
        #[arg(long)]
        year: Option<i32>,
    },
    /// Print the kind of every line (debugging the classifier)
    Classify {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, default_value = "abidjan")]
        region: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Year for week headers that omit it (else file name, else current year)
        #[arg(long)]
        year: Option<i32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            region,
            config,
            reference,
            output_dir,
            sqlite,
            year,
        } => {
            let region = load_region(&region, config.as_deref())?;
            run(&input, &region, reference.as_deref(), &output_dir, sqlite.as_deref(), year)
        }
        Commands::Classify {
            input,
            region,
            config,
            year,
        } => {
            let region = load_region(&region, config.as_deref())?;
            classify(&input, &region, year)
        }
    }
}

fn load_region(name: &str, config: Option<&Path>) -> Result<RegionConfig> {
    match config {
        Some(path) => RegionConfig::from_file(path),
        None => RegionConfig::preset(name),
    }
}

fn read_lines(input: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    Ok(content.lines().map(str::to_string).collect())
}

fn file_name(input: &Path) -> String {
    input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn run(
    input: &Path,
    region: &RegionConfig,
    reference_path: Option<&Path>,
    output_dir: &Path,
    sqlite: Option<&Path>,
    year: Option<i32>,
) -> Result<()> {
    println!("📋 Duty Roster - {} edition", region.name);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let lines = read_lines(input)?;
    println!("\n📂 Loaded {} lines from {}", lines.len(), input.display());
    if region.gazetteer.is_empty() {
        warn!(region = %region.name, "empty gazetteer, localities come from headers only");
    } else {
        println!("📍 {} known localities", region.gazetteer.len());
    }

    // Reference: explicit CSV first, else whatever the database already holds
    let mut conn = sqlite.map(db::open).transpose()?;
    let reference = match (reference_path, conn.as_ref()) {
        (Some(path), _) => ReferenceTable::load_or_degrade(path),
        (None, Some(conn)) => match db::load_reference(conn) {
            Ok(table) if table.is_empty() => None,
            Ok(table) => {
                info!(records = table.len(), "using database pharmacies as reference");
                Some(table)
            }
            Err(e) => {
                warn!(error = %e, "could not read database pharmacies, ignoring reference");
                None
            }
        },
        (None, None) => None,
    };
    if reference.is_none() {
        warn!("no reference table, every identity will be minted");
    }

    let file_name = file_name(input);

    let mut pipeline = RosterPipeline::new(region)
        .with_reference(reference.as_ref())
        .with_file_hint(&file_name);
    if let Some(year) = year {
        pipeline = pipeline.with_default_year(year);
    }

    let roster = pipeline.run(&lines)?;
    let summary = &roster.summary;

    println!("\n🧭 Period: {} {}", roster.document.month, roster.document.year);
    println!("✓ Raw entries: {}", summary.raw_entries);
    println!("✓ Normalized entries: {} ({} dropped)", summary.normalized_entries, summary.dropped_entries);
    println!("✓ Unique pharmacies: {}", summary.unique_units);
    println!("✓ Duty periods: {} over {} weeks", summary.duty_periods, summary.weeks_covered);
    if summary.reference_used {
        println!("✓ Reference keys reused: {} (ratio {:.4})", summary.matched_entries, summary.key_match_ratio);
    }
    if summary.scan.orphan_continuations > 0 || summary.scan.unresolved_headers > 0 {
        println!(
            "⚠️  {} orphan lines, {} unresolved headers",
            summary.scan.orphan_continuations, summary.scan.unresolved_headers
        );
    }

    let paths = write_outputs(output_dir, region, &roster, Some(&file_name))?;
    println!("\n💾 Outputs:");
    println!("   {}", paths.units.display());
    println!("   {}", paths.duty_periods.display());
    println!("   {}", paths.seed.display());

    if let Some(conn) = conn.as_mut() {
        let stats = db::import_run(conn, region, &roster.units, &roster.duty_periods)?;
        println!("\n🗄️  SQLite import:");
        println!("✓ Pharmacies upserted: {}", stats.units_upserted);
        println!("✓ Duty periods inserted: {}", stats.duty_inserted);
        println!("✓ Skipped duplicates: {}", stats.duty_duplicates);
        println!("✓ Database contains {} duty periods", db::count_duty_periods(conn)?);
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🎉 Done");
    Ok(())
}

/// `--year`, else the file-name hint, else the current year
fn classify_year(input: &Path, year: Option<i32>) -> i32 {
    year.or_else(|| period_hint(&file_name(input)).1)
        .unwrap_or_else(|| Utc::now().year())
}

fn classify(input: &Path, region: &RegionConfig, year: Option<i32>) -> Result<()> {
    let lines = read_lines(input)?;
    let scanner = DocumentScanner::new(region, classify_year(input, year))?;

    for (number, line) in lines.iter().enumerate() {
        let line = normalize_apostrophes(line.trim());
        if line.is_empty() {
            continue;
        }
        let kind = scanner.classifier().classify(&line);
        println!("{:>5}  {:<28} {}", number + 1, kind.label(), line);
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
