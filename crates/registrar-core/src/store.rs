//! # Record Store
//!
//! Keyed storage for students, courses and enrollments.
//!
//! This module defines the `RecordStore` trait and its in-memory
//! implementation. The store owns no business rules: it performs CRUD and
//! index lookups only. All data structures use `BTreeMap` for deterministic
//! ordering.

use crate::primitives::DEFAULT_MAX_CREDITS_PER_SEMESTER;
use crate::{Course, CourseId, Enrollment, EnrollmentId, RegistrarError, Student, StudentId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// RECORD WRITES
// =============================================================================

/// A single insert-or-replace of one record.
///
/// Engine operations collect their writes and hand them to
/// [`RecordStore::commit`] together, so a backend can apply them atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordWrite {
    Student(Student),
    Course(Course),
    Enrollment(Enrollment),
}

// =============================================================================
// RECORDSTORE TRAIT
// =============================================================================

/// The RecordStore trait defines the storage contract the engine relies on.
///
/// All fallible operations return `Result<T, RegistrarError>` so in-memory
/// and persistent backends are used uniformly. Lookups return owned records.
pub trait RecordStore {
    /// Apply a batch of insert-or-replace writes as one unit.
    fn commit(&mut self, writes: Vec<RecordWrite>) -> Result<(), RegistrarError>;

    /// Lookup a student by id.
    fn student(&self, id: &StudentId) -> Result<Option<Student>, RegistrarError>;

    /// Lookup a course by id.
    fn course(&self, id: &CourseId) -> Result<Option<Course>, RegistrarError>;

    /// Lookup an enrollment by id.
    fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RegistrarError>;

    /// All students ordered by id.
    fn students(&self) -> Result<Vec<Student>, RegistrarError>;

    /// All courses ordered by id.
    fn courses(&self) -> Result<Vec<Course>, RegistrarError>;

    /// All enrollments ordered by id.
    fn enrollments(&self) -> Result<Vec<Enrollment>, RegistrarError>;

    /// Enrollments of one student, via the student index.
    fn enrollments_by_student(&self, id: &StudentId) -> Result<Vec<Enrollment>, RegistrarError>;

    /// Enrollments in one course, via the course index.
    fn enrollments_by_course(&self, id: &CourseId) -> Result<Vec<Enrollment>, RegistrarError>;

    /// The id the next created enrollment will receive.
    fn next_enrollment_id(&self) -> EnrollmentId;

    /// The configured per-semester credit cap.
    fn max_credits_per_semester(&self) -> u32;

    /// Number of stored students.
    fn student_count(&self) -> Result<usize, RegistrarError>;

    /// Number of stored courses.
    fn course_count(&self) -> Result<usize, RegistrarError>;

    /// Number of stored enrollments.
    fn enrollment_count(&self) -> Result<usize, RegistrarError>;

    // -------------------------------------------------------------------------
    // Provided methods
    // -------------------------------------------------------------------------

    /// Insert or replace one student.
    fn insert_student(&mut self, student: Student) -> Result<(), RegistrarError> {
        self.commit(vec![RecordWrite::Student(student)])
    }

    /// Insert or replace one course.
    fn insert_course(&mut self, course: Course) -> Result<(), RegistrarError> {
        self.commit(vec![RecordWrite::Course(course)])
    }

    /// Insert or replace one enrollment.
    fn insert_enrollment(&mut self, enrollment: Enrollment) -> Result<(), RegistrarError> {
        self.commit(vec![RecordWrite::Enrollment(enrollment)])
    }

    /// Students whose active flag is set.
    fn active_students(&self) -> Result<Vec<Student>, RegistrarError> {
        Ok(self.students()?.into_iter().filter(|s| s.active).collect())
    }

    /// Courses whose active flag is set.
    fn active_courses(&self) -> Result<Vec<Course>, RegistrarError> {
        Ok(self.courses()?.into_iter().filter(|c| c.active).collect())
    }

    /// Enrollments in ACTIVE status.
    fn active_enrollments(&self) -> Result<Vec<Enrollment>, RegistrarError> {
        Ok(self
            .enrollments()?
            .into_iter()
            .filter(Enrollment::is_active)
            .collect())
    }

    /// Courses offered by a department (case-insensitive).
    fn courses_by_department(&self, department: &str) -> Result<Vec<Course>, RegistrarError> {
        Ok(self
            .courses()?
            .into_iter()
            .filter(|c| c.department.eq_ignore_ascii_case(department))
            .collect())
    }

    /// Courses scheduled in a semester (case-insensitive).
    fn courses_by_semester(&self, semester: &str) -> Result<Vec<Course>, RegistrarError> {
        Ok(self
            .courses()?
            .into_iter()
            .filter(|c| c.semester.eq_ignore_ascii_case(semester))
            .collect())
    }

    /// Courses taught by an instructor.
    fn courses_by_instructor(&self, instructor_id: &str) -> Result<Vec<Course>, RegistrarError> {
        Ok(self
            .courses()?
            .into_iter()
            .filter(|c| c.instructor_id == instructor_id)
            .collect())
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// The in-memory record store.
///
/// Enrollments are indexed by student and by course so that engine lookups
/// cost time proportional to the matched subset, not the whole collection.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    students: BTreeMap<StudentId, Student>,
    courses: BTreeMap<CourseId, Course>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,

    /// Index: student -> enrollment ids
    by_student: BTreeMap<StudentId, BTreeSet<EnrollmentId>>,

    /// Index: course -> enrollment ids
    by_course: BTreeMap<CourseId, BTreeSet<EnrollmentId>>,

    next_enrollment_id: u64,
    max_credits: u32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_max_credits(DEFAULT_MAX_CREDITS_PER_SEMESTER)
    }
}

impl MemoryStore {
    /// Create an empty store with the default credit cap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with a custom credit cap.
    #[must_use]
    pub fn with_max_credits(max_credits: u32) -> Self {
        Self {
            students: BTreeMap::new(),
            courses: BTreeMap::new(),
            enrollments: BTreeMap::new(),
            by_student: BTreeMap::new(),
            by_course: BTreeMap::new(),
            next_enrollment_id: 1,
            max_credits,
        }
    }

    /// Change the credit cap applied to future enrollments.
    pub fn set_max_credits(&mut self, max_credits: u32) {
        self.max_credits = max_credits;
    }

    fn apply(&mut self, write: RecordWrite) {
        match write {
            RecordWrite::Student(student) => {
                self.students.insert(student.id.clone(), student);
            }
            RecordWrite::Course(course) => {
                self.courses.insert(course.id.clone(), course);
            }
            RecordWrite::Enrollment(enrollment) => self.apply_enrollment(enrollment),
        }
    }

    fn apply_enrollment(&mut self, enrollment: Enrollment) {
        let id = enrollment.id;

        // A replacement may move the record to a different student or course.
        if let Some(previous) = self.enrollments.get(&id) {
            if previous.student != enrollment.student {
                if let Some(ids) = self.by_student.get_mut(&previous.student) {
                    ids.remove(&id);
                }
            }
            if previous.course != enrollment.course {
                if let Some(ids) = self.by_course.get_mut(&previous.course) {
                    ids.remove(&id);
                }
            }
        }

        self.by_student
            .entry(enrollment.student.clone())
            .or_default()
            .insert(id);
        self.by_course
            .entry(enrollment.course.clone())
            .or_default()
            .insert(id);
        self.next_enrollment_id = self.next_enrollment_id.max(id.0.saturating_add(1));
        self.enrollments.insert(id, enrollment);
    }

    fn collect_indexed(&self, ids: Option<&BTreeSet<EnrollmentId>>) -> Vec<Enrollment> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| self.enrollments.get(id))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
    }
}

impl RecordStore for MemoryStore {
    fn commit(&mut self, writes: Vec<RecordWrite>) -> Result<(), RegistrarError> {
        for write in writes {
            self.apply(write);
        }
        Ok(())
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, RegistrarError> {
        Ok(self.students.get(id).cloned())
    }

    fn course(&self, id: &CourseId) -> Result<Option<Course>, RegistrarError> {
        Ok(self.courses.get(id).cloned())
    }

    fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RegistrarError> {
        Ok(self.enrollments.get(&id).cloned())
    }

    fn students(&self) -> Result<Vec<Student>, RegistrarError> {
        Ok(self.students.values().cloned().collect())
    }

    fn courses(&self) -> Result<Vec<Course>, RegistrarError> {
        Ok(self.courses.values().cloned().collect())
    }

    fn enrollments(&self) -> Result<Vec<Enrollment>, RegistrarError> {
        Ok(self.enrollments.values().cloned().collect())
    }

    fn enrollments_by_student(&self, id: &StudentId) -> Result<Vec<Enrollment>, RegistrarError> {
        Ok(self.collect_indexed(self.by_student.get(id)))
    }

    fn enrollments_by_course(&self, id: &CourseId) -> Result<Vec<Enrollment>, RegistrarError> {
        Ok(self.collect_indexed(self.by_course.get(id)))
    }

    fn next_enrollment_id(&self) -> EnrollmentId {
        EnrollmentId(self.next_enrollment_id)
    }

    fn max_credits_per_semester(&self) -> u32 {
        self.max_credits
    }

    fn student_count(&self) -> Result<usize, RegistrarError> {
        Ok(self.students.len())
    }

    fn course_count(&self) -> Result<usize, RegistrarError> {
        Ok(self.courses.len())
    }

    fn enrollment_count(&self) -> Result<usize, RegistrarError> {
        Ok(self.enrollments.len())
    }
}

// =============================================================================
// SERIALIZABLE SNAPSHOT
// =============================================================================

/// A serializable copy of an entire record set.
///
/// Indexes are not serialized; they are rebuilt when the snapshot is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StoreSnapshot {
    pub students: Vec<Student>,
    pub courses: Vec<Course>,
    pub enrollments: Vec<Enrollment>,
    pub next_enrollment_id: u64,
    pub max_credits: u32,
}

impl StoreSnapshot {
    /// Capture the contents of any record store.
    pub fn capture<S: RecordStore + ?Sized>(store: &S) -> Result<Self, RegistrarError> {
        Ok(Self {
            students: store.students()?,
            courses: store.courses()?,
            enrollments: store.enrollments()?,
            next_enrollment_id: store.next_enrollment_id().0,
            max_credits: store.max_credits_per_semester(),
        })
    }

    /// All records as one write batch, in student, course, enrollment order.
    #[must_use]
    pub fn into_writes(self) -> Vec<RecordWrite> {
        let mut writes =
            Vec::with_capacity(self.students.len() + self.courses.len() + self.enrollments.len());
        writes.extend(self.students.into_iter().map(RecordWrite::Student));
        writes.extend(self.courses.into_iter().map(RecordWrite::Course));
        writes.extend(self.enrollments.into_iter().map(RecordWrite::Enrollment));
        writes
    }
}

impl From<&MemoryStore> for StoreSnapshot {
    fn from(store: &MemoryStore) -> Self {
        Self {
            students: store.students.values().cloned().collect(),
            courses: store.courses.values().cloned().collect(),
            enrollments: store.enrollments.values().cloned().collect(),
            next_enrollment_id: store.next_enrollment_id,
            max_credits: store.max_credits,
        }
    }
}

impl From<StoreSnapshot> for MemoryStore {
    fn from(snapshot: StoreSnapshot) -> Self {
        let mut store = MemoryStore::with_max_credits(snapshot.max_credits);
        let next = snapshot.next_enrollment_id;
        for write in snapshot.into_writes() {
            store.apply(write);
        }
        store.next_enrollment_id = store.next_enrollment_id.max(next);
        store
    }
}

// =============================================================================
// TESTS
// =============================================================================
