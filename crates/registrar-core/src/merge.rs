//! # Snapshot Merge
//!
//! Bring the records of an export into a live store without breaking the
//! enrollment rules.
//!
//! The merge is planned against a combined view of the store and the
//! snapshot, checked as a whole, and only then committed in one call.
//! A rejected merge writes nothing.
//!
//! Enrollments are matched by identity (student, course, creation time):
//!
//! - same identity, same content: already present, skipped
//! - same identity, stored record still ACTIVE: replaced (the incoming
//!   record carries a later state of the same enrollment)
//! - same identity, stored record terminal and content differs: rejected
//! - new identity whose id is taken: renumbered from the next free id
//! - new identity, free id: inserted as is
//!
//! Students and courses are insert-or-replace. Each student's derived
//! fields (`enrolled_courses`, `current_gpa`) are rebuilt from the merged
//! enrollments.

use crate::admin::{CourseAdmin, NewCourse, NewStudent, StudentAdmin};
use crate::grading::{LetterGrade, weighted_gpa};
use crate::store::{RecordStore, RecordWrite, StoreSnapshot};
use crate::{
    Course, CourseId, Enrollment, EnrollmentId, EnrollmentStatus, RegistrarError, Student,
    StudentId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    /// Students written, including those whose derived fields changed.
    pub students: usize,
    pub courses: usize,
    pub enrollments_added: usize,
    pub enrollments_updated: usize,
    /// Incoming enrollments that received a new id.
    pub enrollments_renumbered: usize,
    pub enrollments_unchanged: usize,
}

type Identity = (StudentId, CourseId, DateTime<Utc>);

fn identity(e: &Enrollment) -> Identity {
    (e.student.clone(), e.course.clone(), e.created_at)
}

fn same_state(a: &Enrollment, b: &Enrollment) -> bool {
    a.status == b.status && a.score == b.score && a.letter == b.letter
}

/// Check that an enrollment's grade fields agree with its status.
fn check_grade_fields(e: &Enrollment) -> Result<(), RegistrarError> {
    match e.status {
        EnrollmentStatus::Completed => {
            let Some(score) = e.score else {
                return Err(RegistrarError::InvalidState(format!(
                    "Enrollment {} is COMPLETED without a score",
                    e.id
                )));
            };
            let score = score.validate()?;
            if e.letter != Some(score.letter()) {
                return Err(RegistrarError::InvalidState(format!(
                    "Enrollment {} letter grade does not match score {}",
                    e.id, score
                )));
            }
        }
        EnrollmentStatus::Active | EnrollmentStatus::Withdrawn => {
            if e.score.is_some() || e.letter.is_some() {
                return Err(RegistrarError::InvalidState(format!(
                    "Enrollment {} is {} but carries a grade",
                    e.id, e.status
                )));
            }
        }
    }
    Ok(())
}

/// Active credit load of every student with at least one ACTIVE enrollment.
fn active_loads<'a>(
    enrollments: impl Iterator<Item = &'a Enrollment>,
    courses: &BTreeMap<CourseId, Course>,
) -> BTreeMap<StudentId, u32> {
    let mut loads: BTreeMap<StudentId, u32> = BTreeMap::new();
    for e in enrollments.filter(|e| e.is_active()) {
        let credits = courses.get(&e.course).map_or(0, |c| c.credits);
        let load = loads.entry(e.student.clone()).or_default();
        *load = load.saturating_add(credits);
    }
    loads
}

/// Merge a snapshot into a store. See the module docs for the rules.
///
/// # Errors
///
/// - `InvalidInput` if a student or course record fails field validation
/// - `StudentNotFound` / `CourseNotFound` if an enrollment references a
///   record present in neither the store nor the snapshot
/// - `InvalidState` for a second ACTIVE enrollment of a pair, grade fields
///   that disagree with the status, or a change to a terminal enrollment
/// - `InvalidGrade` for a stored score outside 0..=100
/// - `CreditLimitExceeded` if a student's active load changes and ends up
///   over the store's cap
pub fn merge_snapshot<S: RecordStore + ?Sized>(
    store: &mut S,
    snapshot: StoreSnapshot,
) -> Result<MergeSummary, RegistrarError> {
    let original_students: BTreeMap<StudentId, Student> = store
        .students()?
        .into_iter()
        .map(|s| (s.id.clone(), s))
        .collect();
    let original_courses: BTreeMap<CourseId, Course> = store
        .courses()?
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect();
    let original_enrollments: BTreeMap<EnrollmentId, Enrollment> = store
        .enrollments()?
        .into_iter()
        .map(|e| (e.id, e))
        .collect();

    let mut students = original_students.clone();
    for student in snapshot.students {
        StudentAdmin::validate(&NewStudent {
            id: student.id.as_str().to_string(),
            full_name: student.full_name.clone(),
            email: student.email.clone(),
        })?;
        students.insert(student.id.clone(), student);
    }

    let mut courses = original_courses.clone();
    for course in snapshot.courses {
        CourseAdmin::validate(&NewCourse {
            id: course.id.as_str().to_string(),
            title: course.title.clone(),
            credits: course.credits,
            department: course.department.clone(),
            semester: course.semester.clone(),
            instructor_id: course.instructor_id.clone(),
        })?;
        courses.insert(course.id.clone(), course);
    }

    let mut summary = MergeSummary::default();
    let mut enrollments = original_enrollments.clone();
    let mut by_identity: BTreeMap<Identity, EnrollmentId> =
        enrollments.values().map(|e| (identity(e), e.id)).collect();
    let mut next = snapshot
        .enrollments
        .iter()
        .map(|e| e.id.0.saturating_add(1))
        .fold(store.next_enrollment_id().0, u64::max);

    let mut incoming = snapshot.enrollments;
    incoming.sort_by_key(|e| e.id);
    for mut enrollment in incoming {
        check_grade_fields(&enrollment)?;

        if let Some(&known_id) = by_identity.get(&identity(&enrollment)) {
            let Some(known) = enrollments.get(&known_id) else {
                continue;
            };
            if same_state(known, &enrollment) {
                summary.enrollments_unchanged += 1;
                continue;
            }
            if known.status.is_terminal() {
                return Err(RegistrarError::InvalidState(format!(
                    "Enrollment {} is {} and cannot change state",
                    known_id, known.status
                )));
            }
            enrollment.id = known_id;
            summary.enrollments_updated += 1;
        } else if enrollments.contains_key(&enrollment.id) {
            enrollment.id = EnrollmentId(next);
            next = next.saturating_add(1);
            summary.enrollments_renumbered += 1;
        } else {
            summary.enrollments_added += 1;
        }

        by_identity.insert(identity(&enrollment), enrollment.id);
        enrollments.insert(enrollment.id, enrollment);
    }

    let mut active_pairs: BTreeSet<(&StudentId, &CourseId)> = BTreeSet::new();
    for e in enrollments.values() {
        if !students.contains_key(&e.student) {
            return Err(RegistrarError::StudentNotFound(e.student.clone()));
        }
        if !courses.contains_key(&e.course) {
            return Err(RegistrarError::CourseNotFound(e.course.clone()));
        }
        if e.is_active() && !active_pairs.insert((&e.student, &e.course)) {
            return Err(RegistrarError::InvalidState(format!(
                "Student {} has more than one active enrollment in course {}",
                e.student, e.course
            )));
        }
    }

    // Loads already over the cap before the merge (cap lowered since) are
    // left alone; only loads the merge changes are checked.
    let max = store.max_credits_per_semester();
    let before = active_loads(original_enrollments.values(), &original_courses);
    let after = active_loads(enrollments.values(), &courses);
    for (student, &load) in &after {
        if load > max && before.get(student) != Some(&load) {
            return Err(RegistrarError::CreditLimitExceeded {
                attempted: load,
                max,
            });
        }
    }

    let mut enrolled: BTreeMap<StudentId, BTreeSet<CourseId>> = BTreeMap::new();
    let mut graded: BTreeMap<StudentId, Vec<(u32, LetterGrade)>> = BTreeMap::new();
    for e in enrollments.values() {
        if e.is_active() {
            enrolled
                .entry(e.student.clone())
                .or_default()
                .insert(e.course.clone());
        }
        if let (true, Some(letter), Some(course)) =
            (e.is_completed(), e.letter, courses.get(&e.course))
        {
            graded
                .entry(e.student.clone())
                .or_default()
                .push((course.credits, letter));
        }
    }
    for student in students.values_mut() {
        student.enrolled_courses = enrolled.remove(&student.id).unwrap_or_default();
        student.current_gpa = weighted_gpa(graded.remove(&student.id).unwrap_or_default());
    }

    let mut writes = Vec::new();
    for student in students.into_values() {
        if original_students.get(&student.id) != Some(&student) {
            summary.students += 1;
            writes.push(RecordWrite::Student(student));
        }
    }
    for course in courses.into_values() {
        if original_courses.get(&course.id) != Some(&course) {
            summary.courses += 1;
            writes.push(RecordWrite::Course(course));
        }
    }
    for enrollment in enrollments.into_values() {
        if original_enrollments.get(&enrollment.id) != Some(&enrollment) {
            writes.push(RecordWrite::Enrollment(enrollment));
        }
    }

    if !writes.is_empty() {
        store.commit(writes)?;
    }
    Ok(summary)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::Score;
    use crate::store::MemoryStore;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(secs)
    }

    fn student(id: &str) -> Student {
        Student::new(StudentId::new(id), "Barbara Liskov", "bl@example.edu", at(0))
    }

    fn course(id: &str, credits: u32) -> Course {
        Course {
            id: CourseId::new(id),
            title: "Abstraction".to_string(),
            credits,
            department: "CS".to_string(),
            semester: "FALL".to_string(),
            instructor_id: "I1".to_string(),
            active: true,
        }
    }

    fn enrollment(id: u64, s: &str, c: &str, created: i64) -> Enrollment {
        Enrollment::new(EnrollmentId(id), StudentId::new(s), CourseId::new(c), at(created))
    }

    fn snapshot(
        students: Vec<Student>,
        courses: Vec<Course>,
        enrollments: Vec<Enrollment>,
    ) -> StoreSnapshot {
        StoreSnapshot {
            students,
            courses,
            enrollments,
            next_enrollment_id: 1,
            max_credits: 18,
        }
    }

    #[test]
    fn grade_fields_must_match_status() {
        let mut e = enrollment(1, "S1", "A", 0);
        assert!(check_grade_fields(&e).is_ok());

        e.score = Some(Score::whole(85));
        assert!(matches!(
            check_grade_fields(&e),
            Err(RegistrarError::InvalidState(_))
        ));

        e.status = EnrollmentStatus::Completed;
        e.letter = Some(LetterGrade::A);
        assert!(matches!(
            check_grade_fields(&e),
            Err(RegistrarError::InvalidState(_))
        ));

        e.letter = Some(LetterGrade::B);
        assert!(check_grade_fields(&e).is_ok());

        e.score = Some(Score::whole(150));
        assert_eq!(
            check_grade_fields(&e),
            Err(RegistrarError::InvalidGrade("150".to_string()))
        );
    }

    #[test]
    fn merging_own_snapshot_is_a_no_op() {
        let mut store = MemoryStore::with_max_credits(18);
        let seeded = merge_snapshot(
            &mut store,
            snapshot(
                vec![student("S1")],
                vec![course("A", 3)],
                vec![enrollment(1, "S1", "A", 10)],
            ),
        )
        .expect("seed");
        assert_eq!(seeded.enrollments_added, 1);
        let own = StoreSnapshot::capture(&store).expect("capture");

        let summary = merge_snapshot(&mut store, own).expect("merge");
        assert_eq!(
            summary,
            MergeSummary {
                enrollments_unchanged: 1,
                ..MergeSummary::default()
            }
        );
        assert_eq!(store.enrollment_count().expect("count"), 1);
    }

    #[test]
    fn later_state_of_active_enrollment_replaces_it() {
        let mut store = MemoryStore::with_max_credits(18);
        merge_snapshot(
            &mut store,
            snapshot(
                vec![student("S1")],
                vec![course("A", 3)],
                vec![enrollment(1, "S1", "A", 10)],
            ),
        )
        .expect("seed");

        let mut done = enrollment(1, "S1", "A", 10);
        done.complete(Score::whole(92)).expect("complete");
        let summary =
            merge_snapshot(&mut store, snapshot(vec![], vec![], vec![done])).expect("merge");

        assert_eq!(summary.enrollments_updated, 1);
        let s1 = store.student(&StudentId::new("S1")).expect("get").expect("exists");
        assert!(s1.enrolled_courses.is_empty());
        assert_eq!(s1.current_gpa.hundredths(), 400);

        // Completed is terminal: a different final state is refused.
        let mut other = enrollment(1, "S1", "A", 10);
        other.withdraw().expect("withdraw");
        assert!(matches!(
            merge_snapshot(&mut store, snapshot(vec![], vec![], vec![other])),
            Err(RegistrarError::InvalidState(_))
        ));
    }

    #[test]
    fn missing_references_write_nothing() {
        let mut store = MemoryStore::with_max_credits(18);
        let err = merge_snapshot(
            &mut store,
            snapshot(
                vec![student("S1")],
                vec![],
                vec![enrollment(1, "S1", "GHOST", 0)],
            ),
        );
        assert_eq!(err, Err(RegistrarError::CourseNotFound(CourseId::new("GHOST"))));
        assert_eq!(store.student_count().expect("count"), 0);
    }

    #[test]
    fn duplicate_active_pair_is_rejected() {
        let mut store = MemoryStore::with_max_credits(18);
        let err = merge_snapshot(
            &mut store,
            snapshot(
                vec![student("S1")],
                vec![course("A", 3)],
                vec![enrollment(1, "S1", "A", 0), enrollment(2, "S1", "A", 5)],
            ),
        );
        assert!(matches!(err, Err(RegistrarError::InvalidState(_))));
        assert_eq!(store.enrollment_count().expect("count"), 0);
    }
}
