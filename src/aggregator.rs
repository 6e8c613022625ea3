// 🧮 Aggregator - observations grouped by identity
// One canonical unit per identity, one duty record per (identity, week).

use crate::dates::WeekPeriod;
use crate::identity::{ReferenceTable, Resolution};
use crate::normalizer::NormalizedEntry;
use crate::region::RegionConfig;
use crate::scanner::DutyType;
use crate::text::clean_space;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ============================================================================
// OUTPUT RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalUnit {
    pub identity: String,
    pub name: String,
    pub section: String,
    pub locality: String,
    pub address: String,
    pub phones: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyPeriodRecord {
    pub identity: String,
    pub name: String,
    pub section: String,
    pub locality: String,
    pub week: WeekPeriod,
    pub duty_type: DutyType,
    pub source: String,
    pub timezone: String,
}

/// A normalized entry and the identity it resolved to
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub entry: NormalizedEntry,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    pub units: Vec<CanonicalUnit>,
    pub duty_periods: Vec<DutyPeriodRecord>,
}

// ============================================================================
// VALUE SELECTION
// ============================================================================

/// Most frequent non-empty value; ties go to the longest, then the first seen
pub fn choose_value<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for value in values {
        let value = clean_space(value.as_ref());
        if value.is_empty() {
            continue;
        }
        let count = counts.entry(value.clone()).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }

    let mut best: Option<(&String, usize)> = None;
    for value in &order {
        let count = counts[value];
        let better = match best {
            None => true,
            Some((current, current_count)) => {
                count > current_count
                    || (count == current_count && value.chars().count() > current.chars().count())
            }
        };
        if better {
            best = Some((value, count));
        }
    }

    best.map(|(value, _)| value.clone()).unwrap_or_default()
}

/// Order-preserving dedup, empty values dropped
pub fn dedup_preserve<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        let value = value.as_ref().trim();
        if !value.is_empty() && seen.insert(value.to_string()) {
            out.push(value.to_string());
        }
    }
    out
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Fold resolved entries into canonical units and duty records
///
/// Units are sorted by (section, locality, name); duty records by
/// (start, section, locality, name). Identity breaks remaining ties.
pub fn aggregate(
    entries: &[ResolvedEntry],
    reference: Option<&ReferenceTable>,
    region: &RegionConfig,
) -> Aggregation {
    // group in first-appearance order
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&ResolvedEntry>> = HashMap::new();
    for resolved in entries {
        let identity = resolved.resolution.identity.as_str();
        groups
            .entry(identity)
            .or_insert_with(|| {
                order.push(identity);
                Vec::new()
            })
            .push(resolved);
    }

    let mut units: Vec<CanonicalUnit> = order
        .iter()
        .map(|identity| build_unit(identity, &groups[identity], reference))
        .collect();

    let unit_index: HashMap<&str, &CanonicalUnit> =
        units.iter().map(|u| (u.identity.as_str(), u)).collect();

    let mut seen = HashSet::new();
    let mut duty_periods = Vec::new();
    for resolved in entries {
        let identity = resolved.resolution.identity.as_str();
        let week = resolved.entry.week;
        if !seen.insert((identity, week)) {
            continue;
        }
        let unit = unit_index[identity];
        duty_periods.push(DutyPeriodRecord {
            identity: identity.to_string(),
            name: unit.name.clone(),
            section: unit.section.clone(),
            locality: unit.locality.clone(),
            week,
            duty_type: resolved.entry.duty_type,
            source: region.source.clone(),
            timezone: region.timezone.clone(),
        });
    }

    units.sort_by(|a, b| {
        (&a.section, &a.locality, &a.name, &a.identity)
            .cmp(&(&b.section, &b.locality, &b.name, &b.identity))
    });
    duty_periods.sort_by(|a, b| {
        (a.week.start, &a.section, &a.locality, &a.name, &a.identity)
            .cmp(&(b.week.start, &b.section, &b.locality, &b.name, &b.identity))
    });

    Aggregation { units, duty_periods }
}

fn build_unit(
    identity: &str,
    group: &[&ResolvedEntry],
    reference: Option<&ReferenceTable>,
) -> CanonicalUnit {
    // matched reference records, once each
    let mut matched = Vec::new();
    if let Some(reference) = reference {
        let mut seen = HashSet::new();
        for resolved in group {
            if let Some(idx) = resolved.resolution.matched {
                if seen.insert(idx) {
                    matched.extend(reference.get(idx));
                }
            }
        }
    }

    let name = choose_value(
        group
            .iter()
            .map(|r| r.entry.display_name.as_str())
            .chain(matched.iter().map(|rec| rec.name.as_str())),
    );
    let section = choose_value(
        group
            .iter()
            .map(|r| r.entry.section.as_str())
            .chain(matched.iter().map(|rec| rec.section.as_str())),
    );
    let locality = choose_value(
        group
            .iter()
            .map(|r| r.entry.locality.as_str())
            .chain(matched.iter().map(|rec| rec.locality.as_str())),
    );
    let address = choose_value(
        group
            .iter()
            .map(|r| r.entry.address.as_str())
            .chain(matched.iter().map(|rec| rec.address.as_str())),
    );

    let phones = dedup_preserve(
        group
            .iter()
            .flat_map(|r| r.entry.phones.iter())
            .chain(matched.iter().flat_map(|rec| rec.phones.iter())),
    );

    CanonicalUnit {
        identity: identity.to_string(),
        name,
        section,
        locality,
        address,
        phones,
    }
}

// ============================================================================
// TESTS
// ============================================================================
