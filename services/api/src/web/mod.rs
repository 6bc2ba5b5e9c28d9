pub mod fees;
pub mod grades;
pub mod reports;
pub mod rest;
pub mod state;
pub mod students;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use state::AppState;

/// Builds the REST router. CORS and the Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    let body_limit = app_state.config.max_body_bytes;

    // Static segments win over `{key}` when both match.
    let student_routes = Router::new()
        .route(
            "/api/students",
            get(students::list_students_handler).post(students::create_student_handler),
        )
        .route("/api/students/import", post(students::import_students_handler))
        .route(
            "/api/students/import/csv",
            post(students::import_students_csv_handler),
        )
        .route(
            "/api/students/import/skipped",
            post(students::skipped_rows_csv_handler),
        )
        .route("/api/students/export", get(students::export_students_handler))
        .route("/api/students/template", get(students::student_template_handler))
        .route(
            "/api/students/{key}",
            put(students::update_student_handler).delete(students::delete_student_handler),
        )
        .route("/api/students/{key}/balance", get(fees::fee_balance_handler));

    let grade_routes = Router::new()
        .route(
            "/api/grades",
            get(grades::list_grades_handler).post(grades::save_grades_handler),
        )
        .route("/api/grades/import/csv", post(grades::import_marks_csv_handler))
        .route("/api/grades/template", get(grades::marks_template_handler));

    let fee_and_report_routes = Router::new()
        .route(
            "/api/fees",
            get(fees::list_fees_handler).post(fees::record_fee_handler),
        )
        .route("/api/reports/{student_id}", get(reports::report_card_handler))
        .route("/api/dashboard", get(reports::dashboard_handler));

    Router::new()
        .route("/health", get(rest::health_handler))
        .merge(student_routes)
        .merge(grade_routes)
        .merge(fee_and_report_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state)
}
