//! # Academic Standing
//!
//! Classifies a student from GPA and completed credit-hours.
//!
//! | Standing | Condition |
//! |----------|-----------|
//! | Dean's List | GPA >= 3.50 and >= 12 completed credits |
//! | Good | GPA >= 2.00 |
//! | Probation | GPA < 2.00 |
//! | Not Assessed | no completed courses |
//!
//! Standing is informational. It never gates enrollment.

use crate::engine::EnrollmentEngine;
use crate::grading::Gpa;
use crate::store::RecordStore;
use crate::{EnrollmentStatus, RegistrarError, StudentId};
use serde::{Deserialize, Serialize};

// =============================================================================
// THRESHOLDS
// =============================================================================

/// Minimum GPA for the Dean's List, in hundredths.
pub const DEANS_LIST_GPA: u32 = 350;

/// Minimum completed credit-hours for the Dean's List.
pub const DEANS_LIST_MIN_CREDITS: u32 = 12;

/// Minimum GPA for good standing, in hundredths.
pub const GOOD_STANDING_GPA: u32 = 200;

// =============================================================================
// STANDING ENUM
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Standing {
    NotAssessed,
    Probation,
    Good,
    DeansList,
}

impl Standing {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Standing::NotAssessed => "Not Assessed",
            Standing::Probation => "Academic Probation",
            Standing::Good => "Good Standing",
            Standing::DeansList => "Dean's List",
        }
    }
}

impl std::fmt::Display for Standing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// STANDING METRICS
// =============================================================================

/// Figures a standing is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingMetrics {
    pub gpa: Gpa,
    pub completed_courses: usize,
    pub completed_credits: u32,
    pub active_credits: u32,
}

impl StandingMetrics {
    /// Collect metrics for one student.
    pub fn from_store<S: RecordStore + ?Sized>(
        store: &S,
        student: &StudentId,
    ) -> Result<Self, RegistrarError> {
        let gpa = EnrollmentEngine::gpa(store, student)?;
        let completed_courses = EnrollmentEngine::student_enrollments(
            store,
            student,
            Some(EnrollmentStatus::Completed),
        )?
        .len();
        Ok(Self {
            gpa,
            completed_courses,
            completed_credits: EnrollmentEngine::completed_credits(store, student)?,
            active_credits: EnrollmentEngine::credit_load(store, student)?,
        })
    }
}

/// A student's standing together with the metrics behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingReport {
    pub student: StudentId,
    pub standing: Standing,
    pub metrics: StandingMetrics,
}

// =============================================================================
// STANDING ASSESSOR
// =============================================================================

pub struct StandingAssessor {
    deans_list_gpa: u32,
    deans_list_min_credits: u32,
    good_standing_gpa: u32,
}

impl Default for StandingAssessor {
    fn default() -> Self {
        Self::new()
    }
}

impl StandingAssessor {
    /// Create an assessor with the default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deans_list_gpa: DEANS_LIST_GPA,
            deans_list_min_credits: DEANS_LIST_MIN_CREDITS,
            good_standing_gpa: GOOD_STANDING_GPA,
        }
    }

    /// Create an assessor with custom thresholds (GPA in hundredths).
    #[must_use]
    pub fn with_thresholds(
        deans_list_gpa: u32,
        deans_list_min_credits: u32,
        good_gpa: u32,
    ) -> Self {
        Self {
            deans_list_gpa,
            deans_list_min_credits,
            good_standing_gpa: good_gpa,
        }
    }

    /// Assess a stored student.
    pub fn assess<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        student: &StudentId,
    ) -> Result<StandingReport, RegistrarError> {
        let metrics = StandingMetrics::from_store(store, student)?;
        Ok(StandingReport {
            student: student.clone(),
            standing: self.assess_from_metrics(&metrics),
            metrics,
        })
    }

    /// Assess from pre-computed metrics.
    #[must_use]
    pub fn assess_from_metrics(&self, metrics: &StandingMetrics) -> Standing {
        let gpa = metrics.gpa.hundredths();
        if metrics.completed_courses == 0 {
            Standing::NotAssessed
        } else if gpa >= self.deans_list_gpa
            && metrics.completed_credits >= self.deans_list_min_credits
        {
            Standing::DeansList
        } else if gpa >= self.good_standing_gpa {
            Standing::Good
        } else {
            Standing::Probation
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
