// Duty Roster - Core Library
// UNPPCI duty-roster text → canonical pharmacies + weekly duty periods.
// Used by the CLI, the benches and the tests.

pub mod text;
pub mod region;       // Region presets: Abidjan / intérieur
pub mod similarity;
pub mod dates;        // Week headers, sub-section periods, title month
pub mod classifier;
pub mod scanner;      // Line stream → raw entries
pub mod normalizer;
pub mod identity;     // Reference table + stable keys
pub mod aggregator;
pub mod pipeline;
pub mod export;
pub mod db;

// Re-export commonly used types
pub use region::{Gazetteer, GazetteerEntry, LocalityLabel, RegionConfig, RegionRules};
pub use similarity::{LcsRatio, SequenceRatio, SimilarityMeasure};
pub use dates::{DocumentPeriod, WeekPeriod};
pub use classifier::{LineClassifier, LineKind};
pub use scanner::{DocumentScanner, DutyType, RawEntry, ScanStats};
pub use normalizer::{EntryNormalizer, NormalizedEntry};
pub use identity::{
    IdentityResolver, ReferenceRecord, ReferenceTable, Resolution, ScoringWeights,
};
pub use aggregator::{Aggregation, CanonicalUnit, DutyPeriodRecord};
pub use pipeline::{RosterPipeline, RosterRun, RunSummary};
pub use export::{write_outputs, OutputPaths};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
