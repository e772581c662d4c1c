//! # API Request/Response Types
//!
//! JSON structures for the HTTP API, plus the mapping from
//! `RegistrarError` to HTTP status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use registrar_core::{
    Course, Enrollment, Gpa, RegistrarError, RegistrarStatus, Score, SearchOperator, Student,
    StudentId,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Record counts response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub students: usize,
    pub active_students: usize,
    pub courses: usize,
    pub active_courses: usize,
    pub enrollments: usize,
    pub active_enrollments: usize,
    pub max_credits_per_semester: u32,
    pub persistent: bool,
}

impl From<RegistrarStatus> for StatusResponse {
    fn from(status: RegistrarStatus) -> Self {
        Self {
            students: status.students,
            active_students: status.active_students,
            courses: status.courses,
            active_courses: status.active_courses,
            enrollments: status.enrollments,
            active_enrollments: status.active_enrollments,
            max_credits_per_semester: status.max_credits_per_semester,
            persistent: status.persistent,
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Stable machine-readable error class.
    pub kind: String,
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(kind: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: kind.to_string(),
            error: error.into(),
        }
    }

    /// Rejection outside the engine (auth, throttling).
    pub fn reject(status: StatusCode, kind: &str, error: impl Into<String>) -> Response {
        (status, Json(Self::new(kind, error))).into_response()
    }
}

/// A core error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub RegistrarError);

impl From<RegistrarError> for ApiError {
    fn from(err: RegistrarError) -> Self {
        Self(err)
    }
}

/// HTTP status for a core error.
#[must_use]
pub fn status_for(err: &RegistrarError) -> StatusCode {
    match err {
        RegistrarError::StudentNotFound(_)
        | RegistrarError::CourseNotFound(_)
        | RegistrarError::EnrollmentNotFound { .. } => StatusCode::NOT_FOUND,
        RegistrarError::InvalidState(_) => StatusCode::CONFLICT,
        RegistrarError::CreditLimitExceeded { .. } | RegistrarError::InvalidGrade(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        RegistrarError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RegistrarError::SerializationError(_) | RegistrarError::IoError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Stable name of an error class.
#[must_use]
pub fn kind_of(err: &RegistrarError) -> &'static str {
    match err {
        RegistrarError::StudentNotFound(_) => "student_not_found",
        RegistrarError::CourseNotFound(_) => "course_not_found",
        RegistrarError::EnrollmentNotFound { .. } => "enrollment_not_found",
        RegistrarError::InvalidState(_) => "invalid_state",
        RegistrarError::CreditLimitExceeded { .. } => "credit_limit_exceeded",
        RegistrarError::InvalidGrade(_) => "invalid_grade",
        RegistrarError::InvalidInput(_) => "invalid_input",
        RegistrarError::SerializationError(_) => "serialization_error",
        RegistrarError::IoError(_) => "io_error",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }
        let body = ErrorResponse::new(kind_of(&self.0), self.0.to_string());
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// QUERY PARAMETERS
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentListQuery {
    #[serde(default)]
    pub active: bool,
}

/// Filters for `GET /courses`. Department and semester match ignoring case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseListQuery {
    #[serde(default)]
    pub active: bool,
    pub department: Option<String>,
    pub semester: Option<String>,
    pub instructor: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrollmentListQuery {
    /// `active`, `withdrawn` or `completed`.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatsQuery {
    pub capacity: usize,
}

// =============================================================================
// ENROLLMENT / GRADES
// =============================================================================

/// Body of `POST /enrollments` and `POST /enrollments/withdraw`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub student: String,
    pub course: String,
}

/// A score sent either as a JSON number or as text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreInput {
    Number(serde_json::Number),
    Text(String),
}

impl ScoreInput {
    /// Parse into a fixed-point score. Range is checked by the engine.
    pub fn to_score(&self) -> Result<Score, RegistrarError> {
        match self {
            ScoreInput::Number(n) => n.to_string().parse(),
            ScoreInput::Text(s) => s.parse(),
        }
    }
}

/// Body of `POST /grades`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRequest {
    pub student: String,
    pub course: String,
    pub score: ScoreInput,
}

/// `GET /students/{id}/gpa`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpaResponse {
    pub student: StudentId,
    pub gpa: String,
    pub gpa_hundredths: u32,
    pub weighted_average_score: Option<String>,
    pub credit_load: u32,
    pub max_credits_per_semester: u32,
}

impl GpaResponse {
    #[must_use]
    pub fn new(
        student: StudentId,
        gpa: Gpa,
        average: Option<Score>,
        credit_load: u32,
        max_credits_per_semester: u32,
    ) -> Self {
        Self {
            student,
            gpa: gpa.to_string(),
            gpa_hundredths: gpa.hundredths(),
            weighted_average_score: average.map(|s| s.to_string()),
            credit_load,
            max_credits_per_semester,
        }
    }
}

/// `GET /courses/{id}`: the course plus its live enrollment count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub active_enrollments: usize,
}

/// `GET /courses/{id}/seats?capacity=N`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatsResponse {
    pub capacity: usize,
    pub active_enrollments: usize,
    pub available: bool,
}

// =============================================================================
// SEARCH
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchEntity {
    Students,
    Courses,
    Enrollments,
}

/// Body of `POST /search`. Without an operator the loose field lookup is
/// used: substring on text and numbers, exact on flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub entity: SearchEntity,
    pub field: String,
    pub value: String,
    #[serde(default)]
    pub operator: Option<SearchOperator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "entity", content = "results", rename_all = "snake_case")]
pub enum SearchResponse {
    Students(Vec<Student>),
    Courses(Vec<Course>),
    Enrollments(Vec<Enrollment>),
}

impl SearchResponse {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            SearchResponse::Students(v) => v.len(),
            SearchResponse::Courses(v) => v.len(),
            SearchResponse::Enrollments(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// EXPORT / HASH
// =============================================================================

/// Export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded
    pub checksum: Option<u64>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: Vec<u8>, checksum: u64) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                &data,
            )),
            checksum: Some(checksum),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            checksum: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashResponse {
    pub algorithm: String,
    pub hash: String,
    pub checksum: u64,
}
