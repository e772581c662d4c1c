//! # Registrar
//!
//! The entry point for callers: one record store plus every operation on it.
//!
//! ## Storage Backends
//!
//! - `InMemory`: a [`MemoryStore`] (fast, volatile unless saved as a snapshot)
//! - `Persistent`: a [`RedbStore`] (disk-backed, one transaction per write)
//!
//! The registrar holds no locks. Callers that share one across threads wrap
//! it in a lock and hold the write side for each mutating call.

use crate::admin::{CourseAdmin, CourseUpdate, NewCourse, NewStudent, StudentAdmin, StudentUpdate};
use crate::engine::{EnrollmentEngine, Transcript};
use crate::grading::{Gpa, Score};
use crate::merge::{MergeSummary, merge_snapshot};
use crate::search::{self, Criteria};
use crate::standing::{StandingAssessor, StandingReport};
use crate::storage::RedbStore;
use crate::store::{MemoryStore, RecordStore, StoreSnapshot};
use crate::{Course, CourseId, Enrollment, EnrollmentStatus, RegistrarError, Student, StudentId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Storage backend for a Registrar.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory record store.
    InMemory(MemoryStore),
    /// Disk-backed store using redb.
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

/// Record counts and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarStatus {
    pub students: usize,
    pub active_students: usize,
    pub courses: usize,
    pub active_courses: usize,
    pub enrollments: usize,
    pub active_enrollments: usize,
    pub max_credits_per_semester: u32,
    pub persistent: bool,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    /// One message per skipped record.
    pub errors: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Registrar {
    backend: StorageBackend,
}

impl Registrar {
    /// Create an empty in-memory registrar with the default credit cap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty in-memory registrar with a custom credit cap.
    #[must_use]
    pub fn with_max_credits(max_credits: u32) -> Self {
        Self::with_store(MemoryStore::with_max_credits(max_credits))
    }

    #[must_use]
    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            backend: StorageBackend::InMemory(store),
        }
    }

    /// Open or create a redb-backed registrar.
    pub fn with_redb(path: impl AsRef<Path>, max_credits: u32) -> Result<Self, RegistrarError> {
        Ok(Self::with_redb_store(RedbStore::open(path, max_credits)?))
    }

    #[must_use]
    pub fn with_redb_store(store: RedbStore) -> Self {
        Self {
            backend: StorageBackend::Persistent(store),
        }
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// The active record store.
    #[must_use]
    pub fn store(&self) -> &dyn RecordStore {
        match &self.backend {
            StorageBackend::InMemory(s) => s,
            StorageBackend::Persistent(s) => s,
        }
    }

    pub fn store_mut(&mut self) -> &mut dyn RecordStore {
        match &mut self.backend {
            StorageBackend::InMemory(s) => s,
            StorageBackend::Persistent(s) => s,
        }
    }

    #[must_use]
    pub fn max_credits_per_semester(&self) -> u32 {
        self.store().max_credits_per_semester()
    }

    pub fn set_max_credits(&mut self, max_credits: u32) {
        match &mut self.backend {
            StorageBackend::InMemory(s) => s.set_max_credits(max_credits),
            StorageBackend::Persistent(s) => s.set_max_credits(max_credits),
        }
    }

    /// Reclaim free space in the database file.
    ///
    /// Returns `Ok(false)` for the in-memory backend, which has no file.
    pub fn compact(&mut self) -> Result<bool, RegistrarError> {
        match &mut self.backend {
            StorageBackend::InMemory(_) => Ok(false),
            StorageBackend::Persistent(s) => s.compact(),
        }
    }

    pub fn status(&self) -> Result<RegistrarStatus, RegistrarError> {
        let store = self.store();
        Ok(RegistrarStatus {
            students: store.student_count()?,
            active_students: store.active_students()?.len(),
            courses: store.course_count()?,
            active_courses: store.active_courses()?.len(),
            enrollments: store.enrollment_count()?,
            active_enrollments: store.active_enrollments()?.len(),
            max_credits_per_semester: store.max_credits_per_semester(),
            persistent: self.is_persistent(),
        })
    }

    // =========================================================================
    // ENROLLMENT
    // =========================================================================

    pub fn enroll_student(
        &mut self,
        student: &StudentId,
        course: &CourseId,
    ) -> Result<Enrollment, RegistrarError> {
        EnrollmentEngine::enroll_student(self.store_mut(), student, course)
    }

    pub fn unenroll_student(
        &mut self,
        student: &StudentId,
        course: &CourseId,
    ) -> Result<Enrollment, RegistrarError> {
        EnrollmentEngine::unenroll_student(self.store_mut(), student, course)
    }

    pub fn record_grade(
        &mut self,
        student: &StudentId,
        course: &CourseId,
        score: Score,
    ) -> Result<Enrollment, RegistrarError> {
        EnrollmentEngine::record_grade(self.store_mut(), student, course, score)
    }

    pub fn gpa(&self, student: &StudentId) -> Result<Gpa, RegistrarError> {
        EnrollmentEngine::gpa(self.store(), student)
    }

    pub fn weighted_average_score(
        &self,
        student: &StudentId,
    ) -> Result<Option<Score>, RegistrarError> {
        EnrollmentEngine::weighted_average_score(self.store(), student)
    }

    pub fn credit_load(&self, student: &StudentId) -> Result<u32, RegistrarError> {
        EnrollmentEngine::credit_load(self.store(), student)
    }

    pub fn can_enroll_additional_credits(
        &self,
        student: &StudentId,
        extra: u32,
    ) -> Result<bool, RegistrarError> {
        EnrollmentEngine::can_enroll_additional_credits(self.store(), student, extra)
    }

    pub fn student_enrollments(
        &self,
        student: &StudentId,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, RegistrarError> {
        EnrollmentEngine::student_enrollments(self.store(), student, status)
    }

    pub fn course_enrollments(
        &self,
        course: &CourseId,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, RegistrarError> {
        EnrollmentEngine::course_enrollments(self.store(), course, status)
    }

    pub fn active_enrollment_count(&self, course: &CourseId) -> Result<usize, RegistrarError> {
        EnrollmentEngine::active_enrollment_count(self.store(), course)
    }

    pub fn has_available_seats(
        &self,
        course: &CourseId,
        capacity: usize,
    ) -> Result<bool, RegistrarError> {
        EnrollmentEngine::has_available_seats(self.store(), course, capacity)
    }

    pub fn transcript(&self, student: &StudentId) -> Result<Transcript, RegistrarError> {
        EnrollmentEngine::transcript(self.store(), student)
    }

    pub fn standing(&self, student: &StudentId) -> Result<StandingReport, RegistrarError> {
        StandingAssessor::new().assess(self.store(), student)
    }

    // =========================================================================
    // STUDENTS
    // =========================================================================

    pub fn create_student(&mut self, input: NewStudent) -> Result<Student, RegistrarError> {
        StudentAdmin::create(self.store_mut(), input)
    }

    pub fn update_student(
        &mut self,
        id: &StudentId,
        update: StudentUpdate,
    ) -> Result<Student, RegistrarError> {
        StudentAdmin::update(self.store_mut(), id, update)
    }

    pub fn deactivate_student(&mut self, id: &StudentId) -> Result<Student, RegistrarError> {
        StudentAdmin::deactivate(self.store_mut(), id)
    }

    pub fn activate_student(&mut self, id: &StudentId) -> Result<Student, RegistrarError> {
        StudentAdmin::activate(self.store_mut(), id)
    }

    pub fn get_student(&self, id: &StudentId) -> Result<Student, RegistrarError> {
        StudentAdmin::get(self.store(), id)
    }

    pub fn list_students(&self) -> Result<Vec<Student>, RegistrarError> {
        StudentAdmin::list(self.store())
    }

    pub fn list_active_students(&self) -> Result<Vec<Student>, RegistrarError> {
        StudentAdmin::list_active(self.store())
    }

    // =========================================================================
    // COURSES
    // =========================================================================

    pub fn create_course(&mut self, input: NewCourse) -> Result<Course, RegistrarError> {
        CourseAdmin::create(self.store_mut(), input)
    }

    pub fn update_course(
        &mut self,
        id: &CourseId,
        update: CourseUpdate,
    ) -> Result<Course, RegistrarError> {
        CourseAdmin::update(self.store_mut(), id, update)
    }

    pub fn deactivate_course(&mut self, id: &CourseId) -> Result<Course, RegistrarError> {
        CourseAdmin::deactivate(self.store_mut(), id)
    }

    pub fn activate_course(&mut self, id: &CourseId) -> Result<Course, RegistrarError> {
        CourseAdmin::activate(self.store_mut(), id)
    }

    pub fn get_course(&self, id: &CourseId) -> Result<Course, RegistrarError> {
        CourseAdmin::get(self.store(), id)
    }

    pub fn list_courses(&self) -> Result<Vec<Course>, RegistrarError> {
        CourseAdmin::list(self.store())
    }

    pub fn list_active_courses(&self) -> Result<Vec<Course>, RegistrarError> {
        CourseAdmin::list_active(self.store())
    }

    pub fn courses_by_department(&self, department: &str) -> Result<Vec<Course>, RegistrarError> {
        self.store().courses_by_department(department)
    }

    pub fn courses_by_semester(&self, semester: &str) -> Result<Vec<Course>, RegistrarError> {
        self.store().courses_by_semester(semester)
    }

    pub fn courses_by_instructor(&self, instructor: &str) -> Result<Vec<Course>, RegistrarError> {
        self.store().courses_by_instructor(instructor)
    }

    pub fn course_enrollment_count(&self, id: &CourseId) -> Result<usize, RegistrarError> {
        CourseAdmin::enrollment_count(self.store(), id)
    }

    // =========================================================================
    // SEARCH
    // =========================================================================

    pub fn search_students(&self, criteria: &Criteria) -> Result<Vec<Student>, RegistrarError> {
        Ok(search::search_by_criteria(&self.store().students()?, criteria))
    }

    pub fn search_courses(&self, criteria: &Criteria) -> Result<Vec<Course>, RegistrarError> {
        Ok(search::search_by_criteria(&self.store().courses()?, criteria))
    }

    pub fn search_enrollments(
        &self,
        criteria: &Criteria,
    ) -> Result<Vec<Enrollment>, RegistrarError> {
        Ok(search::search_by_criteria(&self.store().enrollments()?, criteria))
    }

    pub fn find_students(&self, field: &str, value: &str) -> Result<Vec<Student>, RegistrarError> {
        Ok(search::search_by_field(&self.store().students()?, field, value))
    }

    pub fn find_courses(&self, field: &str, value: &str) -> Result<Vec<Course>, RegistrarError> {
        Ok(search::search_by_field(&self.store().courses()?, field, value))
    }

    pub fn find_enrollments(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Vec<Enrollment>, RegistrarError> {
        Ok(search::search_by_field(&self.store().enrollments()?, field, value))
    }

    pub fn filter_students(
        &self,
        predicate: impl Fn(&Student) -> bool,
    ) -> Result<Vec<Student>, RegistrarError> {
        Ok(search::filter(&self.store().students()?, predicate))
    }

    pub fn filter_courses(
        &self,
        predicate: impl Fn(&Course) -> bool,
    ) -> Result<Vec<Course>, RegistrarError> {
        Ok(search::filter(&self.store().courses()?, predicate))
    }

    pub fn filter_enrollments(
        &self,
        predicate: impl Fn(&Enrollment) -> bool,
    ) -> Result<Vec<Enrollment>, RegistrarError> {
        Ok(search::filter(&self.store().enrollments()?, predicate))
    }

    // =========================================================================
    // SNAPSHOTS AND BULK IMPORT
    // =========================================================================

    /// Capture every record in the active store.
    pub fn snapshot(&self) -> Result<StoreSnapshot, RegistrarError> {
        StoreSnapshot::capture(self.store())
    }

    /// Merge a snapshot into the active store.
    ///
    /// Enrollment id clashes are renumbered, and the merged records are
    /// checked against this registrar's credit cap before anything is
    /// written. The snapshot's own cap is ignored.
    pub fn restore(&mut self, snapshot: StoreSnapshot) -> Result<MergeSummary, RegistrarError> {
        merge_snapshot(self.store_mut(), snapshot)
    }

    /// Create students one by one; failures are counted, not fatal.
    pub fn import_students(&mut self, rows: Vec<NewStudent>) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for row in rows {
            let id = row.id.clone();
            match self.create_student(row) {
                Ok(_) => summary.imported += 1,
                Err(e) => {
                    summary.skipped += 1;
                    summary.errors.push(format!("{}: {}", id, e));
                }
            }
        }
        summary
    }

    /// Create courses one by one; failures are counted, not fatal.
    pub fn import_courses(&mut self, rows: Vec<NewCourse>) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for row in rows {
            let id = row.id.clone();
            match self.create_course(row) {
                Ok(_) => summary.imported += 1,
                Err(e) => {
                    summary.skipped += 1;
                    summary.errors.push(format!("{}: {}", id, e));
                }
            }
        }
        summary
    }
}

// =============================================================================
// TESTS
// =============================================================================
