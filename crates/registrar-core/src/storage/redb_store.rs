//! # redb-backed Record Storage
//!
//! A disk-backed record store using the redb embedded database.
//!
//! Every [`RecordStore::commit`] runs inside one redb write transaction, so
//! a compound engine operation (for example recording a grade, which touches
//! an enrollment and a student) is either fully durable or not applied at
//! all. Records are encoded with postcard.
//!
//! The student and course enrollment indexes live in memory and are rebuilt
//! from the ENROLLMENTS table on open.

use crate::store::{RecordStore, RecordWrite};
use crate::{Course, CourseId, Enrollment, EnrollmentId, RegistrarError, Student, StudentId};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Table for students: registration number -> serialized Student
const STUDENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("students");

/// Table for courses: course code -> serialized Course
const COURSES: TableDefinition<&str, &[u8]> = TableDefinition::new("courses");

/// Table for enrollments: EnrollmentId(u64) -> serialized Enrollment
const ENROLLMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("enrollments");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_ENROLLMENT_KEY: &str = "next_enrollment_id";

fn io_err(e: impl std::fmt::Display) -> RegistrarError {
    RegistrarError::IoError(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, RegistrarError> {
    postcard::to_allocvec(value).map_err(|e| RegistrarError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RegistrarError> {
    postcard::from_bytes(bytes).map_err(|e| RegistrarError::SerializationError(e.to_string()))
}

/// A disk-backed record store using redb.
pub struct RedbStore {
    db: Database,
    by_student: BTreeMap<StudentId, BTreeSet<EnrollmentId>>,
    by_course: BTreeMap<CourseId, BTreeSet<EnrollmentId>>,
    next_enrollment_id: u64,
    max_credits: u32,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("indexed_students", &self.by_student.len())
            .field("indexed_courses", &self.by_course.len())
            .field("next_enrollment_id", &self.next_enrollment_id)
            .field("max_credits", &self.max_credits)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a record database at the given path.
    ///
    /// The credit cap is a runtime setting and is not stored in the file.
    pub fn open(path: impl AsRef<Path>, max_credits: u32) -> Result<Self, RegistrarError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(STUDENTS).map_err(io_err)?;
            let _ = write_txn.open_table(COURSES).map_err(io_err)?;
            let _ = write_txn.open_table(ENROLLMENTS).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        let read_txn = db.begin_read().map_err(io_err)?;

        let stored_next = {
            let table = read_txn.open_table(METADATA).map_err(io_err)?;
            table
                .get(NEXT_ENROLLMENT_KEY)
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(1)
        };

        let mut by_student: BTreeMap<StudentId, BTreeSet<EnrollmentId>> = BTreeMap::new();
        let mut by_course: BTreeMap<CourseId, BTreeSet<EnrollmentId>> = BTreeMap::new();
        let mut next_enrollment_id = stored_next.max(1);
        {
            let table = read_txn.open_table(ENROLLMENTS).map_err(io_err)?;
            for entry in table.iter().map_err(io_err)? {
                let (_, value) = entry.map_err(io_err)?;
                let enrollment: Enrollment = decode(value.value())?;
                next_enrollment_id = next_enrollment_id.max(enrollment.id.0.saturating_add(1));
                by_student
                    .entry(enrollment.student)
                    .or_default()
                    .insert(enrollment.id);
                by_course
                    .entry(enrollment.course)
                    .or_default()
                    .insert(enrollment.id);
            }
        }

        Ok(Self {
            db,
            by_student,
            by_course,
            next_enrollment_id,
            max_credits,
        })
    }

    /// Compact the database file. Returns whether any space was reclaimed.
    pub fn compact(&mut self) -> Result<bool, RegistrarError> {
        self.db.compact().map_err(io_err)
    }

    /// Change the credit cap applied to future enrollments.
    pub fn set_max_credits(&mut self, max_credits: u32) {
        self.max_credits = max_credits;
    }

    fn read_all<K, T>(
        &self,
        definition: TableDefinition<'_, K, &'static [u8]>,
    ) -> Result<Vec<T>, RegistrarError>
    where
        K: redb::Key + 'static,
        T: DeserializeOwned,
    {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(definition).map_err(io_err)?;
        let mut records = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            records.push(decode(value.value())?);
        }
        Ok(records)
    }

    fn count<K>(
        &self,
        definition: TableDefinition<'_, K, &'static [u8]>,
    ) -> Result<usize, RegistrarError>
    where
        K: redb::Key + 'static,
    {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(definition).map_err(io_err)?;
        Ok(table.len().map_err(io_err)? as usize)
    }

    fn enrollments_for(
        &self,
        ids: Option<&BTreeSet<EnrollmentId>>,
    ) -> Result<Vec<Enrollment>, RegistrarError> {
        let Some(ids) = ids else {
            return Ok(Vec::new());
        };
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(ENROLLMENTS).map_err(io_err)?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(data) = table.get(id.0).map_err(io_err)? {
                records.push(decode(data.value())?);
            }
        }
        Ok(records)
    }
}

// =============================================================================
// RECORDSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl RecordStore for RedbStore {
    fn commit(&mut self, writes: Vec<RecordWrite>) -> Result<(), RegistrarError> {
        if writes.is_empty() {
            return Ok(());
        }

        // Encode everything before the transaction opens.
        let mut students = Vec::new();
        let mut courses = Vec::new();
        let mut enrollments = Vec::new();
        for write in &writes {
            match write {
                RecordWrite::Student(s) => students.push((s.id.as_str(), encode(s)?)),
                RecordWrite::Course(c) => courses.push((c.id.as_str(), encode(c)?)),
                RecordWrite::Enrollment(e) => enrollments.push((e, encode(e)?)),
            }
        }

        // Index changes are staged and applied only after a successful commit.
        let mut moved: Vec<(Enrollment, Option<Enrollment>)> = Vec::new();
        let mut next = self.next_enrollment_id;

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(STUDENTS).map_err(io_err)?;
            for (key, bytes) in &students {
                table.insert(*key, bytes.as_slice()).map_err(io_err)?;
            }
        }
        {
            let mut table = write_txn.open_table(COURSES).map_err(io_err)?;
            for (key, bytes) in &courses {
                table.insert(*key, bytes.as_slice()).map_err(io_err)?;
            }
        }
        {
            let mut table = write_txn.open_table(ENROLLMENTS).map_err(io_err)?;
            for (enrollment, bytes) in &enrollments {
                let previous = table
                    .insert(enrollment.id.0, bytes.as_slice())
                    .map_err(io_err)?
                    .map(|old| decode::<Enrollment>(old.value()))
                    .transpose()?;
                next = next.max(enrollment.id.0.saturating_add(1));
                moved.push((Enrollment::clone(enrollment), previous));
            }
        }
        {
            let mut table = write_txn.open_table(METADATA).map_err(io_err)?;
            table.insert(NEXT_ENROLLMENT_KEY, next).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        for (enrollment, previous) in moved {
            if let Some(previous) = previous {
                if previous.student != enrollment.student {
                    if let Some(ids) = self.by_student.get_mut(&previous.student) {
                        ids.remove(&previous.id);
                    }
                }
                if previous.course != enrollment.course {
                    if let Some(ids) = self.by_course.get_mut(&previous.course) {
                        ids.remove(&previous.id);
                    }
                }
            }
            self.by_student
                .entry(enrollment.student)
                .or_default()
                .insert(enrollment.id);
            self.by_course
                .entry(enrollment.course)
                .or_default()
                .insert(enrollment.id);
        }
        self.next_enrollment_id = next;
        Ok(())
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, RegistrarError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(STUDENTS).map_err(io_err)?;
        table
            .get(id.as_str())
            .map_err(io_err)?
            .map(|data| decode(data.value()))
            .transpose()
    }

    fn course(&self, id: &CourseId) -> Result<Option<Course>, RegistrarError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(COURSES).map_err(io_err)?;
        table
            .get(id.as_str())
            .map_err(io_err)?
            .map(|data| decode(data.value()))
            .transpose()
    }

    fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RegistrarError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(ENROLLMENTS).map_err(io_err)?;
        table
            .get(id.0)
            .map_err(io_err)?
            .map(|data| decode(data.value()))
            .transpose()
    }

    fn students(&self) -> Result<Vec<Student>, RegistrarError> {
        self.read_all(STUDENTS)
    }

    fn courses(&self) -> Result<Vec<Course>, RegistrarError> {
        self.read_all(COURSES)
    }

    fn enrollments(&self) -> Result<Vec<Enrollment>, RegistrarError> {
        self.read_all(ENROLLMENTS)
    }

    fn enrollments_by_student(&self, id: &StudentId) -> Result<Vec<Enrollment>, RegistrarError> {
        self.enrollments_for(self.by_student.get(id))
    }

    fn enrollments_by_course(&self, id: &CourseId) -> Result<Vec<Enrollment>, RegistrarError> {
        self.enrollments_for(self.by_course.get(id))
    }

    fn next_enrollment_id(&self) -> EnrollmentId {
        EnrollmentId(self.next_enrollment_id)
    }

    fn max_credits_per_semester(&self) -> u32 {
        self.max_credits
    }

    fn student_count(&self) -> Result<usize, RegistrarError> {
        self.count(STUDENTS)
    }

    fn course_count(&self) -> Result<usize, RegistrarError> {
        self.count(COURSES)
    }

    fn enrollment_count(&self) -> Result<usize, RegistrarError> {
        self.count(ENROLLMENTS)
    }
}

// =============================================================================
// TESTS
// =============================================================================
