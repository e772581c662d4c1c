//! # Core Type Definitions
//!
//! This module contains all core record types for the Registrar CORE:
//! - Identifiers (`StudentId`, `CourseId`, `EnrollmentId`)
//! - Records (`Student`, `Course`, `Enrollment`)
//! - Enrollment lifecycle (`EnrollmentStatus`)
//! - Error types (`RegistrarError`)
//!
//! ## Ordering Guarantees
//!
//! Every identifier implements `Ord`, so collections keyed by them
//! (`BTreeMap`/`BTreeSet`) iterate in a stable, reproducible order.

use crate::grading::{Gpa, LetterGrade, Score};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// A student's registration number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StudentId(pub String);

impl StudentId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// A course code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CourseId(pub String);

impl CourseId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Identifier of an enrollment record.
///
/// Allocated by the record store from a monotonic counter; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnrollmentId(pub u64);

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// =============================================================================
// STUDENT
// =============================================================================

/// A student record.
///
/// `current_gpa` and `enrolled_courses` are derived state owned by the
/// enrollment engine; administration only touches name, email and the
/// active flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub full_name: String,
    pub email: String,
    pub active: bool,
    /// Cached GPA, recomputed whenever a grade is recorded.
    pub current_gpa: Gpa,
    /// Courses with an ACTIVE enrollment for this student.
    pub enrolled_courses: BTreeSet<CourseId>,
    pub enrolled_on: DateTime<Utc>,
}

impl Student {
    /// Create an active student with no enrollments.
    #[must_use]
    pub fn new(
        id: StudentId,
        full_name: impl Into<String>,
        email: impl Into<String>,
        enrolled_on: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            email: email.into(),
            active: true,
            current_gpa: Gpa::ZERO,
            enrolled_courses: BTreeSet::new(),
            enrolled_on,
        }
    }

    /// Check whether the student currently holds an active seat in a course.
    #[must_use]
    pub fn is_enrolled_in(&self, course: &CourseId) -> bool {
        self.enrolled_courses.contains(course)
    }
}

// =============================================================================
// COURSE
// =============================================================================

/// A course record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    /// Credit-hours; always at least 1.
    pub credits: u32,
    pub department: String,
    pub semester: String,
    pub instructor_id: String,
    pub active: bool,
}

// =============================================================================
// ENROLLMENT
// =============================================================================

/// Lifecycle state of an enrollment.
///
/// ```text
/// ACTIVE ──unenroll──▶ WITHDRAWN
///    │
///    └──record grade──▶ COMPLETED
/// ```
///
/// WITHDRAWN and COMPLETED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    Active,
    Withdrawn,
    Completed,
}

impl EnrollmentStatus {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "ACTIVE",
            EnrollmentStatus::Withdrawn => "WITHDRAWN",
            EnrollmentStatus::Completed => "COMPLETED",
        }
    }

    /// Terminal states accept no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EnrollmentStatus::Active)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = RegistrarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(EnrollmentStatus::Active),
            "withdrawn" => Ok(EnrollmentStatus::Withdrawn),
            "completed" => Ok(EnrollmentStatus::Completed),
            other => Err(RegistrarError::InvalidInput(format!(
                "Unknown enrollment status: {}. Use: active, withdrawn, completed",
                other
            ))),
        }
    }
}

/// An enrollment of one student in one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student: StudentId,
    pub course: CourseId,
    pub status: EnrollmentStatus,
    pub score: Option<Score>,
    pub letter: Option<LetterGrade>,
    pub created_at: DateTime<Utc>,
}

impl Enrollment {
    /// Create a fresh ACTIVE enrollment.
    #[must_use]
    pub fn new(
        id: EnrollmentId,
        student: StudentId,
        course: CourseId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            student,
            course,
            status: EnrollmentStatus::Active,
            score: None,
            letter: None,
            created_at,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == EnrollmentStatus::Active
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == EnrollmentStatus::Completed
    }

    /// Transition ACTIVE → WITHDRAWN.
    pub fn withdraw(&mut self) -> Result<(), RegistrarError> {
        self.ensure_active()?;
        self.status = EnrollmentStatus::Withdrawn;
        Ok(())
    }

    /// Transition ACTIVE → COMPLETED, deriving the letter grade.
    ///
    /// The score must already be range-checked.
    pub fn complete(&mut self, score: Score) -> Result<(), RegistrarError> {
        self.ensure_active()?;
        self.score = Some(score);
        self.letter = Some(score.letter());
        self.status = EnrollmentStatus::Completed;
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), RegistrarError> {
        if self.status.is_terminal() {
            return Err(RegistrarError::InvalidState(format!(
                "Enrollment {} is {} and cannot change state",
                self.id, self.status
            )));
        }
        Ok(())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Registrar system.
///
/// - No silent failures
/// - Use `Result<T, RegistrarError>` for fallible operations
/// - The CORE never panics; every error is returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrarError {
    /// No student with this id exists.
    #[error("Student not found: {0}")]
    StudentNotFound(StudentId),

    /// No course with this id exists.
    #[error("Course not found: {0}")]
    CourseNotFound(CourseId),

    /// No ACTIVE enrollment exists for the pair.
    #[error("No active enrollment found for student {student} in course {course}")]
    EnrollmentNotFound { student: StudentId, course: CourseId },

    /// The operation conflicts with the current state of a record
    /// (inactive student or course, duplicate enrollment, terminal status).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Enrolling would push the student's active credit load over the cap.
    #[error("Credit limit exceeded: attempted {attempted} credits, but maximum allowed is {max}")]
    CreditLimitExceeded { attempted: u32, max: u32 },

    /// A numeric grade outside 0..=100 (or not a number at all).
    #[error("Invalid grade: {0}. Grade must be between 0 and 100")]
    InvalidGrade(String),

    /// A record field failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment() -> Enrollment {
        Enrollment::new(
            EnrollmentId(1),
            StudentId::new("S1"),
            CourseId::new("CS101"),
            DateTime::<Utc>::UNIX_EPOCH,
        )
    }

    #[test]
    fn new_enrollment_is_active() {
        let e = enrollment();
        assert!(e.is_active());
        assert_eq!(e.score, None);
        assert_eq!(e.letter, None);
    }

    #[test]
    fn complete_derives_letter() {
        let mut e = enrollment();
        e.complete(Score::whole(85)).expect("complete");
        assert!(e.is_completed());
        assert_eq!(e.letter, Some(LetterGrade::B));
    }

    #[test]
    fn terminal_states_reject_transitions() {
        let mut e = enrollment();
        e.withdraw().expect("withdraw");
        assert!(matches!(e.withdraw(), Err(RegistrarError::InvalidState(_))));
        assert!(matches!(
            e.complete(Score::whole(90)),
            Err(RegistrarError::InvalidState(_))
        ));
        assert_eq!(e.status, EnrollmentStatus::Withdrawn);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            "Active".parse::<EnrollmentStatus>().expect("parse"),
            EnrollmentStatus::Active
        );
        assert_eq!(
            "COMPLETED".parse::<EnrollmentStatus>().expect("parse"),
            EnrollmentStatus::Completed
        );
        assert!("dropped".parse::<EnrollmentStatus>().is_err());
    }

    #[test]
    fn credit_error_message_names_both_values() {
        let err = RegistrarError::CreditLimitExceeded {
            attempted: 19,
            max: 18,
        };
        assert_eq!(
            err.to_string(),
            "Credit limit exceeded: attempted 19 credits, but maximum allowed is 18"
        );
    }

    #[test]
    fn new_student_starts_clean() {
        let s = Student::new(
            StudentId::new("S1"),
            "Ada Lovelace",
            "ada@example.edu",
            DateTime::<Utc>::UNIX_EPOCH,
        );
        assert!(s.active);
        assert_eq!(s.current_gpa, Gpa::ZERO);
        assert!(!s.is_enrolled_in(&CourseId::new("CS101")));
    }
}
