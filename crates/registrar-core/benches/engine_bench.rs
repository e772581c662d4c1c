//! # Engine Benchmarks
//!
//! Throughput of enrollment, grading and search.
//!
//! Run with: `cargo bench -p registrar-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use registrar_core::search::search_by_criteria;
use registrar_core::{
    Criteria, EnrollmentEngine, MemoryStore, NewCourse, NewStudent, RecordStore, Score,
    SearchOperator, StudentAdmin, CourseAdmin, CourseId, StudentId, export_canonical,
};
use std::hint::black_box;

/// A store with `students` students and 6 three-credit courses.
fn populated(students: usize) -> MemoryStore {
    let mut store = MemoryStore::new();
    for c in 0..6 {
        CourseAdmin::create(
            &mut store,
            NewCourse {
                id: format!("C{}", c),
                title: format!("Course {}", c),
                credits: 3,
                department: "GEN".to_string(),
                semester: "FALL".to_string(),
                instructor_id: "I1".to_string(),
            },
        )
        .expect("course");
    }
    for s in 0..students {
        StudentAdmin::create(
            &mut store,
            NewStudent {
                id: format!("S{}", s),
                full_name: format!("Student {}", s),
                email: format!("s{}@example.edu", s),
            },
        )
        .expect("student");
    }
    store
}

fn enroll_all(store: &mut MemoryStore, students: usize) {
    for s in 0..students {
        for c in 0..6 {
            let _ = EnrollmentEngine::enroll_student(
                store,
                &StudentId::new(format!("S{}", s)),
                &CourseId::new(format!("C{}", c)),
            );
        }
    }
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_enrollment(c: &mut Criterion) {
    let mut group = c.benchmark_group("enroll_six_courses");

    for size in [10usize, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_batched(
                || populated(size),
                |mut store| {
                    enroll_all(&mut store, size);
                    black_box(store)
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_grading(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_grade");

    for size in [10usize, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_batched(
                || {
                    let mut store = populated(size);
                    enroll_all(&mut store, size);
                    store
                },
                |mut store| {
                    for s in 0..size {
                        let _ = EnrollmentEngine::record_grade(
                            &mut store,
                            &StudentId::new(format!("S{}", s)),
                            &CourseId::new("C0"),
                            Score::whole(88),
                        );
                    }
                    black_box(store)
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let store = populated(5000);
    let students = store.students().expect("students");
    let criteria = Criteria::new("name", "99", SearchOperator::Contains);

    c.bench_function("search_students_5000", |b| {
        b.iter(|| black_box(search_by_criteria(&students, &criteria)))
    });
}

fn bench_export(c: &mut Criterion) {
    let mut store = populated(1000);
    enroll_all(&mut store, 1000);

    c.bench_function("export_canonical_1000", |b| {
        b.iter(|| black_box(export_canonical(&store).expect("export")))
    });
}

criterion_group!(benches, bench_enrollment, bench_grading, bench_search, bench_export);
criterion_main!(benches);
