//! # Registrar Primitives
//!
//! Hardcoded runtime constants for the Registrar CORE.
//!
//! These values are compiled into the binary. The only one a deployment may
//! override is the per-semester credit cap, which is passed to the store at
//! construction time and stays fixed for the lifetime of that store.

/// Default maximum credit-hours a student may carry in ACTIVE enrollments.
pub const DEFAULT_MAX_CREDITS_PER_SEMESTER: u32 = 18;

/// Largest credit-hour value a single course may carry.
pub const MAX_COURSE_CREDITS: u32 = 12;

/// Lowest valid numeric grade, in hundredths.
pub const MIN_SCORE_HUNDREDTHS: i64 = 0;

/// Highest valid numeric grade, in hundredths (100.00).
pub const MAX_SCORE_HUNDREDTHS: i64 = 10_000;

/// Magic bytes for the Registrar binary snapshot header.
///
/// - File Header = Magic Bytes ("REGS") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"REGS";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of a student registration number or course code.
pub const MAX_ID_LENGTH: usize = 64;

/// Maximum length of a person's name or a course title.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum length of an email address (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length of department, semester and instructor fields.
pub const MAX_LABEL_LENGTH: usize = 128;

/// Maximum number of rows accepted from a single CSV document.
pub const MAX_CSV_ROWS: usize = 100_000;
