//! Unit tests for API types serialization/deserialization.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use registrar::api::{
    ExportResponse, GpaResponse, GradeRequest, HealthResponse, ScoreInput, SearchEntity,
    SearchRequest, SearchResponse, kind_of, status_for,
};
use registrar_core::{CourseId, Gpa, RegistrarError, Score, SearchOperator, StudentId};

// =============================================================================
// HEALTH
// =============================================================================

#[test]
fn health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

#[test]
fn error_classes_map_to_statuses() {
    let cases = [
        (
            RegistrarError::StudentNotFound(StudentId::new("S1")),
            StatusCode::NOT_FOUND,
        ),
        (
            RegistrarError::CourseNotFound(CourseId::new("C1")),
            StatusCode::NOT_FOUND,
        ),
        (
            RegistrarError::EnrollmentNotFound {
                student: StudentId::new("S1"),
                course: CourseId::new("C1"),
            },
            StatusCode::NOT_FOUND,
        ),
        (
            RegistrarError::InvalidState("inactive".to_string()),
            StatusCode::CONFLICT,
        ),
        (
            RegistrarError::CreditLimitExceeded {
                attempted: 19,
                max: 18,
            },
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        (
            RegistrarError::InvalidGrade("150".to_string()),
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        (
            RegistrarError::InvalidInput("bad".to_string()),
            StatusCode::BAD_REQUEST,
        ),
        (
            RegistrarError::IoError("disk".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (
            RegistrarError::SerializationError("codec".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, status) in cases {
        assert_eq!(status_for(&err), status, "{}", err);
    }
}

#[test]
fn error_kinds_are_snake_case() {
    let kind = kind_of(&RegistrarError::CreditLimitExceeded {
        attempted: 19,
        max: 18,
    });
    assert_eq!(kind, "credit_limit_exceeded");
}

// =============================================================================
// GRADES
// =============================================================================

#[test]
fn score_accepts_number_or_text() {
    let numeric: GradeRequest =
        serde_json::from_str(r#"{"student":"S1","course":"A","score":85.5}"#).unwrap();
    assert!(matches!(numeric.score, ScoreInput::Number(_)));
    assert_eq!(numeric.score.to_score().unwrap(), Score::from_hundredths(8550));

    let text: GradeRequest =
        serde_json::from_str(r#"{"student":"S1","course":"A","score":"72"}"#).unwrap();
    assert_eq!(text.score.to_score().unwrap(), Score::whole(72));
}

#[test]
fn unparsable_score_reports_raw_text() {
    let input = ScoreInput::Text("abc".to_string());
    assert_eq!(
        input.to_score(),
        Err(RegistrarError::InvalidGrade("abc".to_string()))
    );
}

#[test]
fn gpa_response_renders_two_decimals() {
    let response = GpaResponse::new(
        StudentId::new("S1"),
        Gpa::from_hundredths(325),
        Some(Score::from_hundredths(8125)),
        9,
        18,
    );
    assert_eq!(response.gpa, "3.25");
    assert_eq!(response.weighted_average_score.as_deref(), Some("81.25"));

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"student\":\"S1\""));
    assert!(json.contains("\"gpa_hundredths\":325"));
}

// =============================================================================
// SEARCH
// =============================================================================

#[test]
fn search_request_operator_is_optional() {
    let loose: SearchRequest =
        serde_json::from_str(r#"{"entity":"students","field":"name","value":"ada"}"#).unwrap();
    assert_eq!(loose.entity, SearchEntity::Students);
    assert!(loose.operator.is_none());

    let strict: SearchRequest = serde_json::from_str(
        r#"{"entity":"courses","field":"credits","value":"3","operator":"less_than"}"#,
    )
    .unwrap();
    assert_eq!(strict.operator, Some(SearchOperator::LessThan));
}

#[test]
fn search_response_is_tagged_by_entity() {
    let response = SearchResponse::Courses(Vec::new());
    let json = serde_json::to_string(&response).unwrap();
    assert_eq!(json, r#"{"entity":"courses","results":[]}"#);
    assert!(response.is_empty());
}

// =============================================================================
// EXPORT
// =============================================================================

#[test]
fn export_response_data_is_base64() {
    let response = ExportResponse::success(vec![1, 2, 3, 4], 42);
    assert!(response.success);
    assert_eq!(response.checksum, Some(42));

    let decoded = base64::Engine::decode(
        &base64::engine::general_purpose::STANDARD,
        response.data.unwrap(),
    )
    .unwrap();
    assert_eq!(decoded, vec![1, 2, 3, 4]);
}

#[test]
fn export_error_has_no_data() {
    let response = ExportResponse::error("boom");
    assert!(!response.success);
    assert!(response.data.is_none());
    assert_eq!(response.error.as_deref(), Some("boom"));
}
