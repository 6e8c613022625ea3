// 🗄️ SQLite Sink - pharmacies + duty_periods
// Units are upserted on pharmacy_key; duty periods are append-only and unique
// on (pharmacy_key, start_date, end_date), so re-importing a month is a no-op.

use crate::aggregator::{CanonicalUnit, DutyPeriodRecord};
use crate::identity::{ReferenceRecord, ReferenceTable};
use crate::region::RegionConfig;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub units_upserted: usize,
    pub duty_inserted: usize,
    pub duty_duplicates: usize,
}

pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases stay "memory"
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!(journal_mode = %mode, "database opened");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS pharmacies (
            pharmacy_key TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            section TEXT NOT NULL,
            locality TEXT NOT NULL,
            zone_type TEXT NOT NULL,
            address TEXT NOT NULL,
            phones TEXT NOT NULL,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS duty_periods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pharmacy_key TEXT NOT NULL REFERENCES pharmacies(pharmacy_key),
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            duty_type TEXT NOT NULL,
            source TEXT NOT NULL,
            timezone TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (pharmacy_key, start_date, end_date)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_duty_start ON duty_periods(start_date)",
        [],
    )?;

    Ok(())
}

/// Insert or refresh one row per unit; returns rows written
pub fn upsert_units(conn: &Connection, region: &RegionConfig, units: &[CanonicalUnit]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO pharmacies (pharmacy_key, name, section, locality, zone_type, address, phones)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(pharmacy_key) DO UPDATE SET
            name = excluded.name,
            section = excluded.section,
            locality = excluded.locality,
            zone_type = excluded.zone_type,
            address = excluded.address,
            phones = excluded.phones,
            updated_at = CURRENT_TIMESTAMP",
    )?;

    let mut written = 0;
    for unit in units {
        let phones = serde_json::to_string(&unit.phones)?;
        written += stmt.execute(params![
            unit.identity,
            unit.name,
            unit.section,
            unit.locality,
            region.locality_label.as_str(),
            unit.address,
            phones,
        ])?;
    }

    Ok(written)
}

/// Insert duty periods, skipping ones already present
///
/// Returns (inserted, duplicates).
pub fn insert_duty_periods(conn: &Connection, duty_periods: &[DutyPeriodRecord]) -> Result<(usize, usize)> {
    let mut inserted = 0;
    let mut duplicates = 0;

    for record in duty_periods {
        let result = conn.execute(
            "INSERT INTO duty_periods (pharmacy_key, start_date, end_date, duty_type, source, timezone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.identity,
                record.week.start.format("%Y-%m-%d").to_string(),
                record.week.end.format("%Y-%m-%d").to_string(),
                record.duty_type.as_str(),
                record.source,
                record.timezone,
            ],
        );

        match result {
            Ok(_) => inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok((inserted, duplicates))
}

/// Units then duty periods, in one transaction
pub fn import_run(
    conn: &mut Connection,
    region: &RegionConfig,
    units: &[CanonicalUnit],
    duty_periods: &[DutyPeriodRecord],
) -> Result<ImportStats> {
    let tx = conn.transaction()?;
    let units_upserted = upsert_units(&tx, region, units)?;
    let (duty_inserted, duty_duplicates) = insert_duty_periods(&tx, duty_periods)?;
    tx.commit().context("Failed to commit import")?;

    info!(units_upserted, duty_inserted, duty_duplicates, "database import complete");
    Ok(ImportStats {
        units_upserted,
        duty_inserted,
        duty_duplicates,
    })
}

pub fn count_pharmacies(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM pharmacies", [], |row| row.get(0))?;
    Ok(count)
}

pub fn count_duty_periods(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM duty_periods", [], |row| row.get(0))?;
    Ok(count)
}

/// Stored pharmacies as a reference table for the next month
///
/// A row whose phones column is not a JSON list keeps its identity with no phones.
pub fn load_reference(conn: &Connection) -> Result<ReferenceTable> {
    let mut stmt = conn.prepare(
        "SELECT pharmacy_key, name, section, locality, address, phones
         FROM pharmacies ORDER BY pharmacy_key",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (key, name, section, locality, address, phones) = row?;
        let phones: Vec<String> = match serde_json::from_str(&phones) {
            Ok(phones) => phones,
            Err(e) => {
                warn!(pharmacy_key = %key, error = %e, "invalid phones JSON, loading without phones");
                Vec::new()
            }
        };
        records.push(ReferenceRecord::new(&key, &name, &section, &locality, &address, phones));
    }

    Ok(ReferenceTable::from_records(records))
}

// ============================================================================
// TESTS
// ============================================================================
