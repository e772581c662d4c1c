//! # registrar-core
//!
//! The enrollment and academic-standing engine for Registrar - THE LOGIC.
//!
//! This crate owns the rules that govern students, courses and the
//! enrollments between them: credit caps, duplicate-enrollment prevention,
//! active/inactive gating, grade recording and GPA derivation.
//!
//! ## Architectural Constraints
//!
//! - Pure Rust: no async, no network, no logging
//! - Deterministic: `BTreeMap`/`BTreeSet` collections only
//! - Integer arithmetic only: grades and GPA are fixed-point hundredths
//! - Every mutating operation validates before it writes, and writes once

// =============================================================================
// MODULES
// =============================================================================

pub mod admin;
pub mod csv;
pub mod engine;
pub mod export;
pub mod formats;
pub mod grading;
pub mod merge;
pub mod primitives;
pub mod registrar;
pub mod search;
pub mod standing;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Course, CourseId, Enrollment, EnrollmentId, EnrollmentStatus, RegistrarError, Student,
    StudentId,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use admin::{CourseAdmin, CourseUpdate, NewCourse, NewStudent, StudentAdmin, StudentUpdate};
pub use engine::{EnrollmentEngine, Transcript, TranscriptRow};
pub use export::{
    CanonicalHeader, CanonicalRecords, canonical_checksum, export_canonical, import_canonical,
    verify_canonical,
};
pub use grading::{GRADE_TABLE, Gpa, GradeBand, LetterGrade, Score};
pub use merge::{MergeSummary, merge_snapshot};
pub use registrar::{ImportSummary, Registrar, RegistrarStatus, StorageBackend};
pub use search::{Criteria, SearchOperator, Searchable};
pub use standing::{Standing, StandingAssessor, StandingMetrics, StandingReport};
pub use storage::RedbStore;
pub use store::{MemoryStore, RecordStore, RecordWrite, StoreSnapshot};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, snapshot_from_bytes, snapshot_to_bytes};
