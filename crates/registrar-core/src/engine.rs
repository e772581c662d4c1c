//! # Enrollment Engine
//!
//! The rules that move students in and out of courses.
//!
//! Every mutating operation follows the same shape: read what it needs from
//! the store, validate all preconditions, then hand the complete set of
//! changed records to [`RecordStore::commit`] in one call. Nothing is written
//! until every check has passed, so a failed operation leaves the store
//! exactly as it was.

use crate::grading::{Gpa, LetterGrade, Score, weighted_average_score, weighted_gpa};
use crate::store::{RecordStore, RecordWrite};
use crate::{
    Course, CourseId, Enrollment, EnrollmentStatus, RegistrarError, Student, StudentId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of a student's transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRow {
    pub course: CourseId,
    pub title: String,
    pub credits: u32,
    pub status: EnrollmentStatus,
    pub score: Option<Score>,
    pub letter: Option<LetterGrade>,
}

/// A student's full enrollment history with the derived GPA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub student: StudentId,
    pub full_name: String,
    pub rows: Vec<TranscriptRow>,
    pub gpa: Gpa,
    pub completed_credits: u32,
    pub active_credits: u32,
}

/// Stateless enrollment rules over any [`RecordStore`].
pub struct EnrollmentEngine;

impl EnrollmentEngine {
    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Enroll a student in a course, stamped with the current time.
    pub fn enroll_student<S: RecordStore + ?Sized>(
        store: &mut S,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Enrollment, RegistrarError> {
        Self::enroll_student_at(store, student_id, course_id, Utc::now())
    }

    /// Enroll a student in a course with an explicit creation time.
    ///
    /// # Errors
    ///
    /// - `StudentNotFound` / `CourseNotFound` if either record is missing
    /// - `InvalidState` if either is inactive or an ACTIVE enrollment for
    ///   the pair already exists
    /// - `CreditLimitExceeded` if the new load would pass the store's cap
    pub fn enroll_student_at<S: RecordStore + ?Sized>(
        store: &mut S,
        student_id: &StudentId,
        course_id: &CourseId,
        at: DateTime<Utc>,
    ) -> Result<Enrollment, RegistrarError> {
        let mut student = Self::require_student(store, student_id)?;
        let course = Self::require_course(store, course_id)?;

        if !student.active {
            return Err(RegistrarError::InvalidState(format!(
                "Student {} is not active",
                student_id
            )));
        }
        if !course.active {
            return Err(RegistrarError::InvalidState(format!(
                "Course {} is not active",
                course_id
            )));
        }

        let enrollments = store.enrollments_by_student(student_id)?;
        if enrollments
            .iter()
            .any(|e| e.is_active() && &e.course == course_id)
        {
            return Err(RegistrarError::InvalidState(format!(
                "Student {} is already enrolled in course {}",
                student_id, course_id
            )));
        }

        let current = Self::sum_active_credits(store, &enrollments)?;
        let attempted = current.saturating_add(course.credits);
        let max = store.max_credits_per_semester();
        if attempted > max {
            return Err(RegistrarError::CreditLimitExceeded { attempted, max });
        }

        let enrollment = Enrollment::new(
            store.next_enrollment_id(),
            student_id.clone(),
            course_id.clone(),
            at,
        );
        student.enrolled_courses.insert(course_id.clone());

        store.commit(vec![
            RecordWrite::Enrollment(enrollment.clone()),
            RecordWrite::Student(student),
        ])?;
        Ok(enrollment)
    }

    /// Withdraw a student's ACTIVE enrollment in a course.
    pub fn unenroll_student<S: RecordStore + ?Sized>(
        store: &mut S,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Enrollment, RegistrarError> {
        let mut student = Self::require_student(store, student_id)?;
        Self::require_course(store, course_id)?;
        let mut enrollment = Self::require_active_enrollment(store, student_id, course_id)?;

        enrollment.withdraw()?;
        student.enrolled_courses.remove(course_id);

        store.commit(vec![
            RecordWrite::Enrollment(enrollment.clone()),
            RecordWrite::Student(student),
        ])?;
        Ok(enrollment)
    }

    /// Record a final score, completing the enrollment.
    ///
    /// The score is range-checked after the records are located, so a bad
    /// score against a missing enrollment reports the missing enrollment.
    /// The student's cached GPA is recomputed in the same commit.
    pub fn record_grade<S: RecordStore + ?Sized>(
        store: &mut S,
        student_id: &StudentId,
        course_id: &CourseId,
        score: Score,
    ) -> Result<Enrollment, RegistrarError> {
        let mut student = Self::require_student(store, student_id)?;
        Self::require_course(store, course_id)?;
        let mut enrollment = Self::require_active_enrollment(store, student_id, course_id)?;
        let score = score.validate()?;

        enrollment.complete(score)?;
        student.enrolled_courses.remove(course_id);

        // GPA over the stored completions plus the one being recorded now.
        let mut completed: Vec<Enrollment> = store
            .enrollments_by_student(student_id)?
            .into_iter()
            .filter(|e| e.is_completed() && e.id != enrollment.id)
            .collect();
        completed.push(enrollment.clone());
        student.current_gpa = Self::gpa_of(store, &completed)?;

        store.commit(vec![
            RecordWrite::Enrollment(enrollment.clone()),
            RecordWrite::Student(student),
        ])?;
        Ok(enrollment)
    }

    // =========================================================================
    // DERIVED QUERIES
    // =========================================================================

    /// Credit-weighted GPA over COMPLETED enrollments; 0.00 when none.
    pub fn gpa<S: RecordStore + ?Sized>(
        store: &S,
        student_id: &StudentId,
    ) -> Result<Gpa, RegistrarError> {
        Self::require_student(store, student_id)?;
        let completed = Self::student_enrollments(
            store,
            student_id,
            Some(EnrollmentStatus::Completed),
        )?;
        Self::gpa_of(store, &completed)
    }

    /// Credit-weighted mean of numeric scores; `None` when nothing is graded.
    pub fn weighted_average_score<S: RecordStore + ?Sized>(
        store: &S,
        student_id: &StudentId,
    ) -> Result<Option<Score>, RegistrarError> {
        Self::require_student(store, student_id)?;
        let mut items = Vec::new();
        for e in Self::student_enrollments(store, student_id, Some(EnrollmentStatus::Completed))? {
            if let (Some(score), Some(course)) = (e.score, store.course(&e.course)?) {
                items.push((course.credits, score));
            }
        }
        Ok(weighted_average_score(items))
    }

    /// Sum of credit-hours over the student's ACTIVE enrollments.
    pub fn credit_load<S: RecordStore + ?Sized>(
        store: &S,
        student_id: &StudentId,
    ) -> Result<u32, RegistrarError> {
        Self::require_student(store, student_id)?;
        let enrollments = store.enrollments_by_student(student_id)?;
        Self::sum_active_credits(store, &enrollments)
    }

    /// Sum of credit-hours over the student's COMPLETED enrollments.
    pub fn completed_credits<S: RecordStore + ?Sized>(
        store: &S,
        student_id: &StudentId,
    ) -> Result<u32, RegistrarError> {
        Self::require_student(store, student_id)?;
        let mut total = 0u32;
        for e in Self::student_enrollments(store, student_id, Some(EnrollmentStatus::Completed))? {
            if let Some(course) = store.course(&e.course)? {
                total = total.saturating_add(course.credits);
            }
        }
        Ok(total)
    }

    /// Whether `extra` more credit-hours would fit under the cap.
    pub fn can_enroll_additional_credits<S: RecordStore + ?Sized>(
        store: &S,
        student_id: &StudentId,
        extra: u32,
    ) -> Result<bool, RegistrarError> {
        let load = Self::credit_load(store, student_id)?;
        Ok(load.saturating_add(extra) <= store.max_credits_per_semester())
    }

    /// A student's enrollments, optionally restricted to one status.
    pub fn student_enrollments<S: RecordStore + ?Sized>(
        store: &S,
        student_id: &StudentId,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, RegistrarError> {
        Self::require_student(store, student_id)?;
        Ok(store
            .enrollments_by_student(student_id)?
            .into_iter()
            .filter(|e| status.is_none_or(|s| e.status == s))
            .collect())
    }

    /// A course's enrollments, optionally restricted to one status.
    pub fn course_enrollments<S: RecordStore + ?Sized>(
        store: &S,
        course_id: &CourseId,
        status: Option<EnrollmentStatus>,
    ) -> Result<Vec<Enrollment>, RegistrarError> {
        Self::require_course(store, course_id)?;
        Ok(store
            .enrollments_by_course(course_id)?
            .into_iter()
            .filter(|e| status.is_none_or(|s| e.status == s))
            .collect())
    }

    /// Number of ACTIVE enrollments in a course. Fails for an unknown course.
    pub fn active_enrollment_count<S: RecordStore + ?Sized>(
        store: &S,
        course_id: &CourseId,
    ) -> Result<usize, RegistrarError> {
        Ok(Self::course_enrollments(store, course_id, Some(EnrollmentStatus::Active))?.len())
    }

    /// Whether the course has fewer ACTIVE enrollments than `capacity`.
    ///
    /// Capacity is supplied by the caller; courses carry no seat limit.
    pub fn has_available_seats<S: RecordStore + ?Sized>(
        store: &S,
        course_id: &CourseId,
        capacity: usize,
    ) -> Result<bool, RegistrarError> {
        Self::require_course(store, course_id)?;
        Ok(Self::active_enrollment_count(store, course_id)? < capacity)
    }

    /// Every enrollment of a student in id order, with course details.
    pub fn transcript<S: RecordStore + ?Sized>(
        store: &S,
        student_id: &StudentId,
    ) -> Result<Transcript, RegistrarError> {
        let student = Self::require_student(store, student_id)?;
        let mut rows = Vec::new();
        let mut completed = Vec::new();
        let mut completed_credits = 0u32;
        let mut active_credits = 0u32;

        for e in store.enrollments_by_student(student_id)? {
            let course = Self::require_course(store, &e.course)?;
            match e.status {
                EnrollmentStatus::Completed => {
                    completed_credits = completed_credits.saturating_add(course.credits);
                    if let Some(letter) = e.letter {
                        completed.push((course.credits, letter));
                    }
                }
                EnrollmentStatus::Active => {
                    active_credits = active_credits.saturating_add(course.credits);
                }
                EnrollmentStatus::Withdrawn => {}
            }
            rows.push(TranscriptRow {
                course: course.id,
                title: course.title,
                credits: course.credits,
                status: e.status,
                score: e.score,
                letter: e.letter,
            });
        }

        Ok(Transcript {
            student: student.id,
            full_name: student.full_name,
            rows,
            gpa: weighted_gpa(completed),
            completed_credits,
            active_credits,
        })
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn require_student<S: RecordStore + ?Sized>(
        store: &S,
        id: &StudentId,
    ) -> Result<Student, RegistrarError> {
        store
            .student(id)?
            .ok_or_else(|| RegistrarError::StudentNotFound(id.clone()))
    }

    fn require_course<S: RecordStore + ?Sized>(
        store: &S,
        id: &CourseId,
    ) -> Result<Course, RegistrarError> {
        store
            .course(id)?
            .ok_or_else(|| RegistrarError::CourseNotFound(id.clone()))
    }

    fn require_active_enrollment<S: RecordStore + ?Sized>(
        store: &S,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Enrollment, RegistrarError> {
        store
            .enrollments_by_student(student_id)?
            .into_iter()
            .find(|e| e.is_active() && &e.course == course_id)
            .ok_or_else(|| RegistrarError::EnrollmentNotFound {
                student: student_id.clone(),
                course: course_id.clone(),
            })
    }

    fn sum_active_credits<S: RecordStore + ?Sized>(
        store: &S,
        enrollments: &[Enrollment],
    ) -> Result<u32, RegistrarError> {
        let mut total = 0u32;
        for e in enrollments.iter().filter(|e| e.is_active()) {
            if let Some(course) = store.course(&e.course)? {
                total = total.saturating_add(course.credits);
            }
        }
        Ok(total)
    }

    fn gpa_of<S: RecordStore + ?Sized>(
        store: &S,
        completed: &[Enrollment],
    ) -> Result<Gpa, RegistrarError> {
        let mut items = Vec::with_capacity(completed.len());
        for e in completed {
            if let (Some(letter), Some(course)) = (e.letter, store.course(&e.course)?) {
                items.push((course.credits, letter));
            }
        }
        Ok(weighted_gpa(items))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store_with(courses: &[(&str, u32)]) -> MemoryStore {
        let mut store = MemoryStore::with_max_credits(18);
        store
            .insert_student(Student::new(
                StudentId::new("S1"),
                "Alan Turing",
                "alan@example.edu",
                DateTime::<Utc>::UNIX_EPOCH,
            ))
            .expect("student");
        for (id, credits) in courses {
            store
                .insert_course(Course {
                    id: CourseId::new(*id),
                    title: format!("Course {}", id),
                    credits: *credits,
                    department: "CS".to_string(),
                    semester: "FALL".to_string(),
                    instructor_id: "I1".to_string(),
                    active: true,
                })
                .expect("course");
        }
        store
    }

    fn s1() -> StudentId {
        StudentId::new("S1")
    }

    fn c(id: &str) -> CourseId {
        CourseId::new(id)
    }

    #[test]
    fn enroll_adds_active_enrollment() {
        let mut store = store_with(&[("A", 3)]);
        let e = EnrollmentEngine::enroll_student(&mut store, &s1(), &c("A")).expect("enroll");

        assert!(e.is_active());
        assert_eq!(EnrollmentEngine::credit_load(&store, &s1()).expect("load"), 3);
        let student = store.student(&s1()).expect("get").expect("exists");
        assert!(student.is_enrolled_in(&c("A")));
    }

    #[test]
    fn enroll_twice_is_invalid_state() {
        let mut store = store_with(&[("A", 3)]);
        EnrollmentEngine::enroll_student(&mut store, &s1(), &c("A")).expect("enroll");
        let err = EnrollmentEngine::enroll_student(&mut store, &s1(), &c("A"));
        assert!(matches!(err, Err(RegistrarError::InvalidState(_))));
        assert_eq!(store.enrollment_count().expect("count"), 1);
    }

    #[test]
    fn credit_cap_reports_attempted_and_max() {
        let mut store = store_with(&[("A", 3), ("B", 12), ("C", 4)]);
        EnrollmentEngine::enroll_student(&mut store, &s1(), &c("A")).expect("A");
        EnrollmentEngine::enroll_student(&mut store, &s1(), &c("B")).expect("B");

        let err = EnrollmentEngine::enroll_student(&mut store, &s1(), &c("C"));
        assert_eq!(
            err,
            Err(RegistrarError::CreditLimitExceeded {
                attempted: 19,
                max: 18
            })
        );
        assert_eq!(EnrollmentEngine::credit_load(&store, &s1()).expect("load"), 15);
    }

    #[test]
    fn unknown_records_are_reported() {
        let mut store = store_with(&[("A", 3)]);
        assert_eq!(
            EnrollmentEngine::enroll_student(&mut store, &StudentId::new("X"), &c("A")),
            Err(RegistrarError::StudentNotFound(StudentId::new("X")))
        );
        assert_eq!(
            EnrollmentEngine::enroll_student(&mut store, &s1(), &c("Z")),
            Err(RegistrarError::CourseNotFound(c("Z")))
        );
    }

    #[test]
    fn enrollment_queries_reject_unknown_ids() {
        let store = store_with(&[("A", 3)]);
        assert_eq!(
            EnrollmentEngine::student_enrollments(&store, &StudentId::new("X"), None),
            Err(RegistrarError::StudentNotFound(StudentId::new("X")))
        );
        assert_eq!(
            EnrollmentEngine::course_enrollments(&store, &c("Z"), None),
            Err(RegistrarError::CourseNotFound(c("Z")))
        );
        assert_eq!(
            EnrollmentEngine::active_enrollment_count(&store, &c("Z")),
            Err(RegistrarError::CourseNotFound(c("Z")))
        );
        assert_eq!(
            EnrollmentEngine::active_enrollment_count(&store, &c("A")),
            Ok(0)
        );
    }

    #[test]
    fn inactive_course_rejects_enrollment() {
        let mut store = store_with(&[("A", 3)]);
        let mut course = store.course(&c("A")).expect("get").expect("exists");
        course.active = false;
        store.insert_course(course).expect("update");

        assert!(matches!(
            EnrollmentEngine::enroll_student(&mut store, &s1(), &c("A")),
            Err(RegistrarError::InvalidState(_))
        ));
    }

    #[test]
    fn unenroll_withdraws_and_frees_credits() {
        let mut store = store_with(&[("A", 3)]);
        EnrollmentEngine::enroll_student(&mut store, &s1(), &c("A")).expect("enroll");
        let e = EnrollmentEngine::unenroll_student(&mut store, &s1(), &c("A")).expect("drop");

        assert_eq!(e.status, EnrollmentStatus::Withdrawn);
        assert_eq!(EnrollmentEngine::credit_load(&store, &s1()).expect("load"), 0);
        assert_eq!(
            EnrollmentEngine::unenroll_student(&mut store, &s1(), &c("A")),
            Err(RegistrarError::EnrollmentNotFound {
                student: s1(),
                course: c("A")
            })
        );
    }

    #[test]
    fn re_enrollment_creates_new_record() {
        let mut store = store_with(&[("A", 3)]);
        let first = EnrollmentEngine::enroll_student(&mut store, &s1(), &c("A")).expect("first");
        EnrollmentEngine::unenroll_student(&mut store, &s1(), &c("A")).expect("drop");
        let second = EnrollmentEngine::enroll_student(&mut store, &s1(), &c("A")).expect("again");

        assert_ne!(first.id, second.id);
        assert_eq!(
            EnrollmentEngine::student_enrollments(&store, &s1(), None)
                .expect("all")
                .len(),
            2
        );
    }

    #[test]
    fn grade_completes_and_updates_gpa() {
        let mut store = store_with(&[("A", 3)]);
        EnrollmentEngine::enroll_student(&mut store, &s1(), &c("A")).expect("enroll");
        let e = EnrollmentEngine::record_grade(&mut store, &s1(), &c("A"), Score::whole(85))
            .expect("grade");

        assert_eq!(e.status, EnrollmentStatus::Completed);
        assert_eq!(e.letter, Some(LetterGrade::B));
        assert_eq!(
            EnrollmentEngine::gpa(&store, &s1()).expect("gpa"),
            Gpa::from_hundredths(300)
        );
        let student = store.student(&s1()).expect("get").expect("exists");
        assert_eq!(student.current_gpa, Gpa::from_hundredths(300));
        assert!(!student.is_enrolled_in(&c("A")));
    }

    #[test]
    fn gpa_is_credit_weighted() {
        let mut store = store_with(&[("A", 4), ("B", 2)]);
        EnrollmentEngine::enroll_student(&mut store, &s1(), &c("A")).expect("A");
        EnrollmentEngine::enroll_student(&mut store, &s1(), &c("B")).expect("B");
        EnrollmentEngine::record_grade(&mut store, &s1(), &c("A"), Score::whole(95)).expect("A");
        EnrollmentEngine::record_grade(&mut store, &s1(), &c("B"), Score::whole(72)).expect("B");

        // (4 * 4.00 + 2 * 2.00) / 6 = 3.33
        assert_eq!(
            EnrollmentEngine::gpa(&store, &s1()).expect("gpa"),
            Gpa::from_hundredths(333)
        );
        // (4 * 95 + 2 * 72) / 6 = 87.33
        assert_eq!(
            EnrollmentEngine::weighted_average_score(&store, &s1()).expect("avg"),
            Some(Score::from_hundredths(8733))
        );
        assert_eq!(EnrollmentEngine::completed_credits(&store, &s1()).expect("credits"), 6);
    }

    #[test]
    fn out_of_range_grade_leaves_enrollment_active() {
        let mut store = store_with(&[("A", 3)]);
        EnrollmentEngine::enroll_student(&mut store, &s1(), &c("A")).expect("enroll");
        let err = EnrollmentEngine::record_grade(&mut store, &s1(), &c("A"), Score::whole(150));

        assert_eq!(err, Err(RegistrarError::InvalidGrade("150".to_string())));
        let active =
            EnrollmentEngine::student_enrollments(&store, &s1(), Some(EnrollmentStatus::Active))
                .expect("active");
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn grade_without_enrollment_reports_enrollment_first() {
        let mut store = store_with(&[("A", 3)]);
        let err = EnrollmentEngine::record_grade(&mut store, &s1(), &c("A"), Score::whole(150));
        assert!(matches!(err, Err(RegistrarError::EnrollmentNotFound { .. })));
    }

    #[test]
    fn gpa_is_zero_without_completions() {
        let store = store_with(&[]);
        assert_eq!(EnrollmentEngine::gpa(&store, &s1()).expect("gpa"), Gpa::ZERO);
        assert_eq!(
            EnrollmentEngine::weighted_average_score(&store, &s1()).expect("avg"),
            None
        );
    }

    #[test]
    fn seats_and_additional_credits() {
        let mut store = store_with(&[("A", 3)]);
        EnrollmentEngine::enroll_student(&mut store, &s1(), &c("A")).expect("enroll");

        assert!(EnrollmentEngine::has_available_seats(&store, &c("A"), 2).expect("seats"));
        assert!(!EnrollmentEngine::has_available_seats(&store, &c("A"), 1).expect("seats"));
        assert!(EnrollmentEngine::can_enroll_additional_credits(&store, &s1(), 15).expect("ok"));
        assert!(!EnrollmentEngine::can_enroll_additional_credits(&store, &s1(), 16).expect("ok"));
    }

    #[test]
    fn transcript_lists_every_enrollment() {
        let mut store = store_with(&[("A", 3), ("B", 4), ("C", 2)]);
        EnrollmentEngine::enroll_student(&mut store, &s1(), &c("A")).expect("A");
        EnrollmentEngine::enroll_student(&mut store, &s1(), &c("B")).expect("B");
        EnrollmentEngine::enroll_student(&mut store, &s1(), &c("C")).expect("C");
        EnrollmentEngine::record_grade(&mut store, &s1(), &c("A"), Score::whole(91)).expect("A");
        EnrollmentEngine::unenroll_student(&mut store, &s1(), &c("B")).expect("B");

        let t = EnrollmentEngine::transcript(&store, &s1()).expect("transcript");
        assert_eq!(t.rows.len(), 3);
        assert_eq!(t.rows[0].letter, Some(LetterGrade::A));
        assert_eq!(t.rows[1].status, EnrollmentStatus::Withdrawn);
        assert_eq!(t.gpa, Gpa::from_hundredths(400));
        assert_eq!(t.completed_credits, 3);
        assert_eq!(t.active_credits, 2);
    }
}
