//! # Registrar HTTP API
//!
//! ## Endpoints
//!
//! - `GET /health`, `GET /status`
//! - `GET|POST /students`, `GET|PUT /students/{id}`
//! - `POST /students/{id}/deactivate`, `POST /students/{id}/activate`
//! - `GET /students/{id}/transcript|standing|gpa|enrollments`
//! - `GET|POST /courses`, `GET|PUT /courses/{id}`
//! - `POST /courses/{id}/deactivate`, `POST /courses/{id}/activate`
//! - `GET /courses/{id}/enrollments`, `GET /courses/{id}/seats?capacity=N`
//! - `POST /enrollments`, `POST /enrollments/withdraw`, `POST /grades`
//! - `POST /search`, `POST /export`, `GET /hash`
//!
//! Errors come back as JSON with a status derived from the error class:
//! not found 404, invalid state 409, credit limit or bad grade 422,
//! invalid input 400, storage failures 500.
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `REGISTRAR_CORS_ORIGINS`: Comma-separated allowed origins, or "*" (default: localhost only)
//! - `REGISTRAR_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `REGISTRAR_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{API_KEY_ENV, get_api_key_from_env};
pub use middleware::{RATE_LIMIT_ENV, create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    ApiError, CourseDetail, CourseListQuery, EnrollmentListQuery, EnrollmentRequest,
    ErrorResponse, ExportResponse, GpaResponse, GradeRequest, HashResponse, HealthResponse,
    ScoreInput, SearchEntity, SearchRequest, SearchResponse, SeatsQuery, SeatsResponse,
    StatusResponse, StudentListQuery, kind_of, status_for,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use registrar_core::{Registrar, RegistrarError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const CORS_ORIGINS_ENV: &str = "REGISTRAR_CORS_ORIGINS";

/// Largest accepted request body (2 MB).
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: one registrar behind one lock.
#[derive(Clone)]
pub struct AppState {
    pub registrar: Arc<RwLock<Registrar>>,
}

impl AppState {
    #[must_use]
    pub fn new(registrar: Registrar) -> Self {
        Self {
            registrar: Arc::new(RwLock::new(registrar)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from `REGISTRAR_CORS_ORIGINS`.
///
/// `*` allows everything; unset or unparsable values fall back to
/// localhost origins only.
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var(CORS_ORIGINS_ENV).ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins ({}=*). This is insecure for production!",
                CORS_ORIGINS_ENV
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in {}, defaulting to localhost only",
                    CORS_ORIGINS_ENV
                );
                build_localhost_cors()
            } else {
                restricted_cors(allowed_origins)
            }
        }
        None => {
            tracing::info!(
                "CORS: No {} set, defaulting to localhost only",
                CORS_ORIGINS_ENV
            );
            build_localhost_cors()
        }
    }
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    restricted_cors(origins)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit, rate
/// limiting (if enabled), authentication (if configured).
pub fn create_router(state: AppState) -> Router {
    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible. \
             Set {} to enable authentication.",
            API_KEY_ENV
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route(
            "/students",
            get(handlers::list_students_handler).post(handlers::create_student_handler),
        )
        .route(
            "/students/{id}",
            get(handlers::get_student_handler).put(handlers::update_student_handler),
        )
        .route(
            "/students/{id}/deactivate",
            post(handlers::deactivate_student_handler),
        )
        .route(
            "/students/{id}/activate",
            post(handlers::activate_student_handler),
        )
        .route(
            "/students/{id}/transcript",
            get(handlers::transcript_handler),
        )
        .route("/students/{id}/standing", get(handlers::standing_handler))
        .route("/students/{id}/gpa", get(handlers::gpa_handler))
        .route(
            "/students/{id}/enrollments",
            get(handlers::student_enrollments_handler),
        )
        .route(
            "/courses",
            get(handlers::list_courses_handler).post(handlers::create_course_handler),
        )
        .route(
            "/courses/{id}",
            get(handlers::get_course_handler).put(handlers::update_course_handler),
        )
        .route(
            "/courses/{id}/deactivate",
            post(handlers::deactivate_course_handler),
        )
        .route(
            "/courses/{id}/activate",
            post(handlers::activate_course_handler),
        )
        .route(
            "/courses/{id}/enrollments",
            get(handlers::course_enrollments_handler),
        )
        .route("/courses/{id}/seats", get(handlers::seats_handler))
        .route("/enrollments", post(handlers::enroll_handler))
        .route("/enrollments/withdraw", post(handlers::withdraw_handler))
        .route("/grades", post(handlers::grade_handler))
        .route("/search", post(handlers::search_handler))
        .route("/export", post(handlers::export_handler))
        .route("/hash", get(handlers::hash_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_SIZE)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve until Ctrl+C (or SIGTERM on unix), then return so the caller can
/// persist state.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), RegistrarError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RegistrarError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Registrar HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RegistrarError::IoError(format!("Server error: {}", e)))?;

    tracing::info!("Registrar HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
