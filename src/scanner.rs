// 🧭 Document Scanner - single pass over the line stream
// The scan context is a plain value threaded through `transition`; every
// header-type line flushes the open entry BEFORE the context changes, so an
// entry never straddles a section, area or week boundary.

use crate::classifier::{LineClassifier, LineKind};
use crate::dates::{parse_subsection_period, parse_title, parse_week_header, DocumentPeriod, WeekPeriod};
use crate::region::RegionConfig;
use crate::text::{clean_space, normalize_apostrophes};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

// ============================================================================
// DATA MODEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DutyType {
    #[serde(rename = "24H")]
    FullDay,
    #[serde(rename = "PARTIELLE")]
    Partial,
}

impl DutyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DutyType::FullDay => "24H",
            DutyType::Partial => "PARTIELLE",
        }
    }
}

impl fmt::Display for DutyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One buffered entry block; context fields are fixed when it is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub section: String,
    pub locality: String,
    pub week: WeekPeriod,
    pub duty_type: DutyType,
    pub lines: Vec<String>,
}

impl RawEntry {
    /// All lines joined with single spaces, whitespace-normalized
    pub fn merged_text(&self) -> String {
        clean_space(&self.lines.join(" "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanContext {
    pub section: String,
    pub locality: String,
    /// None until the first week header resolves
    pub week: Option<WeekPeriod>,
    /// Entries opened while set are reduced-duty
    pub reduced_duty: bool,
    /// First title line wins
    pub document: Option<DocumentPeriod>,
    pub open: Option<RawEntry>,
}

/// Non-fatal things the scan ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    OrphanContinuation,
    UnresolvedHeader,
    EntryWithoutWeek,
    DroppedWithoutLocality,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub lines: usize,
    /// Count per line-kind label
    pub kinds: BTreeMap<String, usize>,
    pub orphan_continuations: usize,
    pub unresolved_headers: usize,
    pub entries_without_week: usize,
    pub dropped_without_locality: usize,
}

impl ScanStats {
    fn record(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::OrphanContinuation => self.orphan_continuations += 1,
            ScanEvent::UnresolvedHeader => self.unresolved_headers += 1,
            ScanEvent::EntryWithoutWeek => self.entries_without_week += 1,
            ScanEvent::DroppedWithoutLocality => self.dropped_without_locality += 1,
        }
    }
}

/// Result of one transition
#[derive(Debug, Clone)]
pub struct Transition {
    pub context: ScanContext,
    pub flushed: Option<RawEntry>,
    pub events: Vec<ScanEvent>,
}

#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub entries: Vec<RawEntry>,
    pub document: Option<DocumentPeriod>,
    pub stats: ScanStats,
}

// ============================================================================
// SCANNER
// ============================================================================

pub struct DocumentScanner<'a> {
    region: &'a RegionConfig,
    classifier: LineClassifier<'a>,
    /// Year for sub-section periods when the document has no title
    default_year: i32,
}

impl<'a> DocumentScanner<'a> {
    pub fn new(region: &'a RegionConfig, default_year: i32) -> Result<Self> {
        Ok(DocumentScanner {
            region,
            classifier: LineClassifier::new(region)?,
            default_year,
        })
    }

    pub fn classifier(&self) -> &LineClassifier<'a> {
        &self.classifier
    }

    /// Segment the whole document into raw entries
    pub fn scan<S: AsRef<str>>(&self, lines: &[S]) -> ScanOutput {
        let mut context = ScanContext::default();
        let mut entries = Vec::new();
        let mut stats = ScanStats::default();

        for raw in lines {
            let line = normalize_apostrophes(raw.as_ref().trim());
            if line.is_empty() {
                continue;
            }

            let kind = self.classifier.classify(&line);
            stats.lines += 1;
            *stats.kinds.entry(kind.label().to_string()).or_insert(0) += 1;

            let step = self.transition(context, &line, kind);
            context = step.context;
            entries.extend(step.flushed);
            for event in step.events {
                stats.record(event);
            }
        }

        let (context, flushed, event) = self.flush(context);
        entries.extend(flushed);
        if let Some(event) = event {
            stats.record(event);
        }

        debug!(
            entries = entries.len(),
            lines = stats.lines,
            orphans = stats.orphan_continuations,
            "scan complete"
        );

        ScanOutput {
            entries,
            document: context.document,
            stats,
        }
    }

    /// Apply one classified line to the context
    pub fn transition(&self, context: ScanContext, line: &str, kind: LineKind) -> Transition {
        let mut events = Vec::new();

        // Lines that never touch the open entry
        match &kind {
            LineKind::Title => {
                let mut context = context;
                if context.document.is_none() {
                    context.document = parse_title(line);
                }
                return Transition { context, flushed: None, events };
            }
            LineKind::Continuation => {
                let mut context = context;
                match context.open.as_mut() {
                    Some(entry) => entry.lines.push(line.to_string()),
                    None => events.push(ScanEvent::OrphanContinuation),
                }
                return Transition { context, flushed: None, events };
            }
            _ => {}
        }

        let (mut context, flushed, event) = self.flush(context);
        events.extend(event);

        match kind {
            LineKind::Title | LineKind::Continuation => {}

            LineKind::WeekHeader => {
                match parse_week_header(line) {
                    Some(week) => context.week = Some(week),
                    None => {
                        warn!(line, "unresolved week header, keeping previous week");
                        events.push(ScanEvent::UnresolvedHeader);
                    }
                }
                context.reduced_duty = false;
            }

            LineKind::SubSectionPeriodHeader => {
                let year = context
                    .document
                    .as_ref()
                    .map(|doc| doc.year)
                    .unwrap_or(self.default_year);
                match parse_subsection_period(line, year) {
                    Some(week) => context.week = Some(week),
                    None => {
                        warn!(line, "unresolved sub-section period, keeping previous week");
                        events.push(ScanEvent::UnresolvedHeader);
                    }
                }
                if let Some(inline) = inline_entry(line) {
                    if self.is_entry_text(&inline) {
                        context = self.open_entry(context, inline, &mut events);
                    }
                }
            }

            LineKind::InstructionalNoise { reduced_duty } => {
                context.reduced_duty = reduced_duty;
            }

            LineKind::SectionHeader { section } => {
                context.section = section;
            }

            LineKind::SubSectionHeader { section, city } => {
                context.section = section;
                context.locality = city;
                context.week = None;
                context.reduced_duty = false;
            }

            LineKind::AreaHeader { area, section } => {
                context = self.enter_locality(context, area, section);
            }

            LineKind::SectorPrefixedEntry { rest, .. } => {
                context = self.open_entry(context, rest, &mut events);
            }

            LineKind::CityPrefixedEntry { city, section, rest } => {
                context = self.enter_locality(context, city, section);
                context = self.open_entry(context, rest, &mut events);
            }

            LineKind::UnitEntry => {
                context = self.open_entry(context, line.to_string(), &mut events);
            }
        }

        Transition { context, flushed, events }
    }

    /// Close the open entry, if any
    fn flush(&self, mut context: ScanContext) -> (ScanContext, Option<RawEntry>, Option<ScanEvent>) {
        let entry = match context.open.take() {
            Some(entry) if !entry.lines.is_empty() => entry,
            _ => return (context, None, None),
        };

        if self.region.rules.require_locality && entry.locality.trim().is_empty() {
            debug!(line = %entry.lines[0], "dropping entry without locality");
            return (context, None, Some(ScanEvent::DroppedWithoutLocality));
        }

        (context, Some(entry), None)
    }

    fn enter_locality(&self, mut context: ScanContext, locality: String, implied: Option<String>) -> ScanContext {
        if context.locality != locality {
            context.reduced_duty = false;
        }
        context.locality = locality;
        if context.section.is_empty() {
            if let Some(section) = implied {
                context.section = section;
            }
        }
        context
    }

    fn open_entry(&self, mut context: ScanContext, seed: String, events: &mut Vec<ScanEvent>) -> ScanContext {
        let week = match context.week {
            Some(week) => week,
            None => {
                debug!(line = %seed, "entry before any resolved week");
                events.push(ScanEvent::EntryWithoutWeek);
                return context;
            }
        };

        let section = if context.section.is_empty() {
            self.region
                .gazetteer
                .lookup(&context.locality)
                .and_then(|entry| entry.section.clone())
                .unwrap_or_default()
        } else {
            context.section.clone()
        };

        let duty_type = if context.reduced_duty {
            DutyType::Partial
        } else {
            DutyType::FullDay
        };

        context.open = Some(RawEntry {
            section,
            locality: context.locality.clone(),
            week,
            duty_type,
            lines: vec![seed],
        });
        context
    }

    fn is_entry_text(&self, text: &str) -> bool {
        self.classifier.classify(text).opens_entry()
    }
}

/// Text after the ':' separator of a sub-section period line
fn inline_entry(line: &str) -> Option<String> {
    let (_, rest) = line.split_once(':')?;
    let rest = rest.trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
