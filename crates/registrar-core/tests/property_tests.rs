//! # Property-Based Tests
//!
//! Invariants of the enrollment engine under random operation sequences.

use chrono::{DateTime, Utc};
use proptest::collection::vec;
use proptest::prelude::*;
use registrar_core::grading::{parse_hundredths, weighted_gpa};
use registrar_core::{
    Course, CourseId, EnrollmentEngine, EnrollmentStatus, Gpa, MemoryStore, RecordStore, RedbStore,
    Score, Student, StudentId, StoreSnapshot, export_canonical, import_canonical,
};
use std::collections::{BTreeMap, BTreeSet};
use tempfile::tempdir;

const MAX_CREDITS: u32 = 18;

#[derive(Debug, Clone)]
enum Op {
    Enroll(usize, usize),
    Unenroll(usize, usize),
    Grade(usize, usize, i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..3, 0usize..6).prop_map(|(s, c)| Op::Enroll(s, c)),
        1 => (0usize..3, 0usize..6).prop_map(|(s, c)| Op::Unenroll(s, c)),
        2 => (0usize..3, 0usize..6, -500i64..11_000).prop_map(|(s, c, g)| Op::Grade(s, c, g)),
    ]
}

fn sid(i: usize) -> StudentId {
    StudentId::new(format!("S{}", i))
}

fn cid(i: usize) -> CourseId {
    CourseId::new(format!("C{}", i))
}

fn build_store(credits: &[u32]) -> MemoryStore {
    let mut store = MemoryStore::with_max_credits(MAX_CREDITS);
    seed(&mut store, credits);
    store
}

fn seed<S: RecordStore + ?Sized>(store: &mut S, credits: &[u32]) {
    for i in 0..3 {
        store
            .insert_student(Student::new(
                sid(i),
                format!("Student {}", i),
                format!("s{}@example.edu", i),
                DateTime::<Utc>::UNIX_EPOCH,
            ))
            .expect("student");
    }
    for (i, credits) in credits.iter().enumerate() {
        store
            .insert_course(Course {
                id: cid(i),
                title: format!("Course {}", i),
                credits: *credits,
                department: "GEN".to_string(),
                semester: "FALL".to_string(),
                instructor_id: "I1".to_string(),
                active: true,
            })
            .expect("course");
    }
}

fn apply<S: RecordStore + ?Sized>(store: &mut S, op: &Op) -> bool {
    let result = match op {
        Op::Enroll(s, c) => EnrollmentEngine::enroll_student_at(
            store,
            &sid(*s),
            &cid(*c),
            DateTime::<Utc>::UNIX_EPOCH,
        )
        .map(|_| ()),
        Op::Unenroll(s, c) => {
            EnrollmentEngine::unenroll_student(store, &sid(*s), &cid(*c)).map(|_| ())
        }
        Op::Grade(s, c, g) => {
            EnrollmentEngine::record_grade(store, &sid(*s), &cid(*c), Score::from_hundredths(*g))
                .map(|_| ())
        }
    };
    result.is_ok()
}

fn check_invariants<S: RecordStore + ?Sized>(store: &S) -> Result<(), TestCaseError> {
    let credits: BTreeMap<CourseId, u32> = store
        .courses()
        .expect("courses")
        .into_iter()
        .map(|c| (c.id, c.credits))
        .collect();

    for student in store.students().expect("students") {
        let enrollments = store
            .enrollments_by_student(&student.id)
            .expect("enrollments");

        // At most one ACTIVE enrollment per pair.
        let mut active_courses = BTreeSet::new();
        for e in enrollments.iter().filter(|e| e.is_active()) {
            prop_assert!(active_courses.insert(e.course.clone()));
        }

        // Enrolled-course set mirrors ACTIVE enrollments.
        prop_assert_eq!(&student.enrolled_courses, &active_courses);

        // Credit load stays under the cap.
        let load = EnrollmentEngine::credit_load(store, &student.id).expect("load");
        prop_assert!(load <= MAX_CREDITS);

        // GPA matches an independent recomputation and the cached value.
        let expected = weighted_gpa(
            enrollments
                .iter()
                .filter(|e| e.status == EnrollmentStatus::Completed)
                .filter_map(|e| Some((*credits.get(&e.course)?, e.letter?))),
        );
        let gpa = EnrollmentEngine::gpa(store, &student.id).expect("gpa");
        prop_assert_eq!(gpa, expected);
        prop_assert_eq!(student.current_gpa, gpa);
        prop_assert!(gpa <= Gpa::from_hundredths(400));

        // Completed enrollments always carry an in-range score.
        for e in enrollments.iter().filter(|e| e.is_completed()) {
            let score = e.score.expect("completed enrollment has score");
            prop_assert!(score.is_in_range());
        }
    }
    Ok(())
}

proptest! {
    /// Every invariant holds after every step of a random sequence.
    #[test]
    fn invariants_hold_after_any_sequence(
        credits in vec(1u32..=12, 6),
        ops in vec(op_strategy(), 1..60)
    ) {
        let mut store = build_store(&credits);
        for op in &ops {
            apply(&mut store, op);
            check_invariants(&store)?;
        }
    }
}

proptest! {
    // Each case opens a fresh database file.
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Same invariants over the disk-backed store and its staged indexes.
    #[test]
    fn invariants_hold_on_redb_store(
        credits in vec(1u32..=12, 6),
        ops in vec(op_strategy(), 1..30)
    ) {
        let dir = tempdir().expect("temp dir");
        let mut store = RedbStore::open(dir.path().join("prop.redb"), MAX_CREDITS).expect("open");
        seed(&mut store, &credits);
        let mut mirror = build_store(&credits);
        for op in &ops {
            prop_assert_eq!(apply(&mut store, op), apply(&mut mirror, op));
            check_invariants(&store)?;
        }
        prop_assert_eq!(
            StoreSnapshot::capture(&store).expect("capture"),
            StoreSnapshot::capture(&mirror).expect("capture")
        );
    }
}

proptest! {
    /// A rejected operation leaves the store byte-for-byte unchanged.
    #[test]
    fn failed_operations_do_not_mutate(
        credits in vec(1u32..=12, 6),
        ops in vec(op_strategy(), 1..40)
    ) {
        let mut store = build_store(&credits);
        for op in &ops {
            let before = StoreSnapshot::from(&store);
            if !apply(&mut store, op) {
                prop_assert_eq!(StoreSnapshot::from(&store), before);
            }
        }
    }

    /// Identical operation sequences produce identical canonical exports.
    #[test]
    fn determinism_identical_input_produces_identical_export(
        credits in vec(1u32..=12, 6),
        ops in vec(op_strategy(), 1..40)
    ) {
        let mut a = build_store(&credits);
        let mut b = build_store(&credits);
        for op in &ops {
            apply(&mut a, op);
            apply(&mut b, op);
        }
        let bytes_a = export_canonical(&a).expect("export");
        prop_assert_eq!(&bytes_a, &export_canonical(&b).expect("export"));

        let restored = MemoryStore::from(import_canonical(&bytes_a).expect("import"));
        prop_assert_eq!(StoreSnapshot::from(&restored), StoreSnapshot::from(&a));
    }

    /// Letter grades are monotone in the score.
    #[test]
    fn letter_grade_monotone(a in 0i64..=10_000, b in 0i64..=10_000) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let lo_points = Score::from_hundredths(lo).letter().points_hundredths();
        let hi_points = Score::from_hundredths(hi).letter().points_hundredths();
        prop_assert!(lo_points <= hi_points);
    }

    /// Score rendering parses back to the same value.
    #[test]
    fn score_text_is_exact(h in 0i64..=10_000) {
        let score = Score::from_hundredths(h);
        prop_assert_eq!(parse_hundredths(&score.to_string()), Some(h));
    }

    /// GPA never leaves the 0.00..=4.00 range.
    #[test]
    fn gpa_bounded(items in vec((1u32..=12, 0i64..=10_000), 0..20)) {
        let gpa = weighted_gpa(
            items
                .iter()
                .map(|(credits, h)| (*credits, Score::from_hundredths(*h).letter())),
        );
        prop_assert!(gpa.hundredths() <= 400);
    }
}
