//! Requirements-to-test traceability tracking.
//!
//! Scans test documentation for requirement identifiers, validates them
//! against a canonical requirements document, aggregates per-test outcomes
//! into a coverage model across a possibly-distributed test run, and detects
//! semantic changes to requirements between runs via content hashing.

pub mod domain;
pub use domain::{
    ChangeDetector, ChangeReport, Collector, Config, CoverageSnapshot, ExecutionContext,
    MatrixStats, Outcome, PatternError, PatternSet, Phase, Registry, RequirementHashSnapshot,
    RequirementId, TestId, TestRecord, UnknownRequirementError,
};

/// JSON persistence for cached run data.
pub mod storage;
pub use storage::{PersistenceError, Store};
