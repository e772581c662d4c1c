//! # API Endpoint Handlers
//!
//! Reads take the registrar's read lock; every mutating handler holds the
//! write lock for its whole validate-then-write sequence.

use super::{
    AppState,
    types::{
        ApiError, CourseDetail, CourseListQuery, EnrollmentListQuery, EnrollmentRequest,
        ExportResponse, GpaResponse, GradeRequest, HashResponse, HealthResponse, SearchEntity,
        SearchRequest, SearchResponse, SeatsQuery, SeatsResponse, StatusResponse,
        StudentListQuery,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use registrar_core::{
    Course, CourseId, CourseUpdate, Criteria, Enrollment, EnrollmentStatus, NewCourse,
    NewStudent, Registrar, RegistrarError, StandingReport, Student, StudentId, StudentUpdate,
    Transcript,
    export::{canonical_checksum, canonical_crypto_hash, export_canonical},
};

type ApiResult<T> = Result<Json<T>, ApiError>;

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

pub async fn status_handler(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let registrar = state.registrar.read().await;
    Ok(Json(registrar.status()?.into()))
}

// =============================================================================
// STUDENTS
// =============================================================================

pub async fn create_student_handler(
    State(state): State<AppState>,
    Json(request): Json<NewStudent>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    let mut registrar = state.registrar.write().await;
    let student = registrar.create_student(request)?;
    tracing::info!(student = %student.id, "Student created");
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn list_students_handler(
    State(state): State<AppState>,
    Query(query): Query<StudentListQuery>,
) -> ApiResult<Vec<Student>> {
    let registrar = state.registrar.read().await;
    let students = if query.active {
        registrar.list_active_students()?
    } else {
        registrar.list_students()?
    };
    Ok(Json(students))
}

pub async fn get_student_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Student> {
    let registrar = state.registrar.read().await;
    Ok(Json(registrar.get_student(&StudentId::new(id))?))
}

pub async fn update_student_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StudentUpdate>,
) -> ApiResult<Student> {
    let mut registrar = state.registrar.write().await;
    Ok(Json(registrar.update_student(&StudentId::new(id), update)?))
}

pub async fn deactivate_student_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Student> {
    let mut registrar = state.registrar.write().await;
    let student = registrar.deactivate_student(&StudentId::new(id))?;
    tracing::info!(student = %student.id, "Student deactivated");
    Ok(Json(student))
}

pub async fn activate_student_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Student> {
    let mut registrar = state.registrar.write().await;
    Ok(Json(registrar.activate_student(&StudentId::new(id))?))
}

pub async fn transcript_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Transcript> {
    let registrar = state.registrar.read().await;
    Ok(Json(registrar.transcript(&StudentId::new(id))?))
}

pub async fn standing_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StandingReport> {
    let registrar = state.registrar.read().await;
    Ok(Json(registrar.standing(&StudentId::new(id))?))
}

pub async fn gpa_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<GpaResponse> {
    let registrar = state.registrar.read().await;
    let student = StudentId::new(id);
    let gpa = registrar.gpa(&student)?;
    let average = registrar.weighted_average_score(&student)?;
    let load = registrar.credit_load(&student)?;
    Ok(Json(GpaResponse::new(
        student,
        gpa,
        average,
        load,
        registrar.max_credits_per_semester(),
    )))
}

pub async fn student_enrollments_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EnrollmentListQuery>,
) -> ApiResult<Vec<Enrollment>> {
    let status = parse_status(query.status.as_deref())?;
    let registrar = state.registrar.read().await;
    Ok(Json(
        registrar.student_enrollments(&StudentId::new(id), status)?,
    ))
}

// =============================================================================
// COURSES
// =============================================================================

pub async fn create_course_handler(
    State(state): State<AppState>,
    Json(request): Json<NewCourse>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    let mut registrar = state.registrar.write().await;
    let course = registrar.create_course(request)?;
    tracing::info!(course = %course.id, credits = course.credits, "Course created");
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn list_courses_handler(
    State(state): State<AppState>,
    Query(query): Query<CourseListQuery>,
) -> ApiResult<Vec<Course>> {
    let registrar = state.registrar.read().await;
    let courses = registrar.filter_courses(|c| {
        (!query.active || c.active)
            && query
                .department
                .as_deref()
                .is_none_or(|d| c.department.eq_ignore_ascii_case(d))
            && query
                .semester
                .as_deref()
                .is_none_or(|s| c.semester.eq_ignore_ascii_case(s))
            && query
                .instructor
                .as_deref()
                .is_none_or(|i| c.instructor_id == i)
    })?;
    Ok(Json(courses))
}

pub async fn get_course_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<CourseDetail> {
    let registrar = state.registrar.read().await;
    let course = registrar.get_course(&CourseId::new(id))?;
    let active_enrollments = registrar.course_enrollment_count(&course.id)?;
    Ok(Json(CourseDetail {
        course,
        active_enrollments,
    }))
}

pub async fn update_course_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<CourseUpdate>,
) -> ApiResult<Course> {
    let mut registrar = state.registrar.write().await;
    Ok(Json(registrar.update_course(&CourseId::new(id), update)?))
}

pub async fn deactivate_course_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Course> {
    let mut registrar = state.registrar.write().await;
    let course = registrar.deactivate_course(&CourseId::new(id))?;
    tracing::info!(course = %course.id, "Course deactivated");
    Ok(Json(course))
}

pub async fn activate_course_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Course> {
    let mut registrar = state.registrar.write().await;
    Ok(Json(registrar.activate_course(&CourseId::new(id))?))
}

pub async fn course_enrollments_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EnrollmentListQuery>,
) -> ApiResult<Vec<Enrollment>> {
    let status = parse_status(query.status.as_deref())?;
    let registrar = state.registrar.read().await;
    Ok(Json(registrar.course_enrollments(&CourseId::new(id), status)?))
}

pub async fn seats_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SeatsQuery>,
) -> ApiResult<SeatsResponse> {
    let registrar = state.registrar.read().await;
    let course = CourseId::new(id);
    let available = registrar.has_available_seats(&course, query.capacity)?;
    Ok(Json(SeatsResponse {
        capacity: query.capacity,
        active_enrollments: registrar.active_enrollment_count(&course)?,
        available,
    }))
}

fn parse_status(raw: Option<&str>) -> Result<Option<EnrollmentStatus>, RegistrarError> {
    raw.map(str::parse).transpose()
}

// =============================================================================
// ENROLLMENT LIFECYCLE
// =============================================================================

pub async fn enroll_handler(
    State(state): State<AppState>,
    Json(request): Json<EnrollmentRequest>,
) -> Result<(StatusCode, Json<Enrollment>), ApiError> {
    let mut registrar = state.registrar.write().await;
    let enrollment = registrar.enroll_student(
        &StudentId::new(request.student),
        &CourseId::new(request.course),
    )?;
    tracing::info!(
        enrollment = %enrollment.id,
        student = %enrollment.student,
        course = %enrollment.course,
        "Enrollment created"
    );
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn withdraw_handler(
    State(state): State<AppState>,
    Json(request): Json<EnrollmentRequest>,
) -> ApiResult<Enrollment> {
    let mut registrar = state.registrar.write().await;
    let enrollment = registrar.unenroll_student(
        &StudentId::new(request.student),
        &CourseId::new(request.course),
    )?;
    tracing::info!(enrollment = %enrollment.id, "Enrollment withdrawn");
    Ok(Json(enrollment))
}

pub async fn grade_handler(
    State(state): State<AppState>,
    Json(request): Json<GradeRequest>,
) -> ApiResult<Enrollment> {
    let score = request.score.to_score()?;
    let mut registrar = state.registrar.write().await;
    let enrollment = registrar.record_grade(
        &StudentId::new(request.student),
        &CourseId::new(request.course),
        score,
    )?;
    tracing::info!(enrollment = %enrollment.id, score = %score, "Grade recorded");
    Ok(Json(enrollment))
}

// =============================================================================
// SEARCH
// =============================================================================

pub async fn search_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<SearchResponse> {
    let registrar = state.registrar.read().await;
    Ok(Json(run_search(&registrar, &request)?))
}

fn run_search(
    registrar: &Registrar,
    request: &SearchRequest,
) -> Result<SearchResponse, RegistrarError> {
    let criteria = request
        .operator
        .map(|op| Criteria::new(&request.field, &request.value, op));
    let (field, value) = (request.field.as_str(), request.value.as_str());

    Ok(match (request.entity, &criteria) {
        (SearchEntity::Students, Some(c)) => SearchResponse::Students(registrar.search_students(c)?),
        (SearchEntity::Students, None) => {
            SearchResponse::Students(registrar.find_students(field, value)?)
        }
        (SearchEntity::Courses, Some(c)) => SearchResponse::Courses(registrar.search_courses(c)?),
        (SearchEntity::Courses, None) => SearchResponse::Courses(registrar.find_courses(field, value)?),
        (SearchEntity::Enrollments, Some(c)) => {
            SearchResponse::Enrollments(registrar.search_enrollments(c)?)
        }
        (SearchEntity::Enrollments, None) => {
            SearchResponse::Enrollments(registrar.find_enrollments(field, value)?)
        }
    })
}

// =============================================================================
// EXPORT / HASH
// =============================================================================

/// Export every record in canonical format.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registrar = state.registrar.read().await;
    let result = export_canonical(registrar.store())
        .and_then(|data| canonical_checksum(registrar.store()).map(|checksum| (data, checksum)));

    match result {
        Ok((data, checksum)) => (StatusCode::OK, Json(ExportResponse::success(data, checksum))),
        Err(e) => {
            tracing::error!(error = %e, "Export failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ExportResponse::error(format!("Export failed: {}", e))),
            )
        }
    }
}

/// BLAKE3 hash of the canonical export.
pub async fn hash_handler(State(state): State<AppState>) -> ApiResult<HashResponse> {
    let registrar = state.registrar.read().await;
    Ok(Json(HashResponse {
        algorithm: "blake3".to_string(),
        hash: canonical_crypto_hash(registrar.store())?,
        checksum: canonical_checksum(registrar.store())?,
    }))
}
