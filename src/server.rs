use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::db;
use crate::error::ApiError;
use crate::extract;
use crate::matching;
use crate::models::{AttendanceRecord, AttendanceRow, MatchType, Student};
use crate::ocr::OcrClient;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub ocr: OcrClient,
}

impl AppState {
    pub fn new(db: PgPool, ocr: OcrClient) -> Self {
        Self { db, ocr }
    }
}

pub fn build_router(state: AppState, allowed_origin: &str) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin.parse::<HeaderValue>()?)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/health", get(health_check))
        .route("/api/students", get(list_students).post(register_student))
        .route("/api/attendance", get(list_attendance))
        .route("/api/attendance/checkin", post(checkin))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "attendance-tracker".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct RegisterStudent {
    #[serde(rename = "studentId")]
    student_code: String,
    name: String,
    class: String,
}

async fn register_student(
    State(state): State<AppState>,
    Json(body): Json<RegisterStudent>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    let code = body.student_code.trim().to_uppercase();
    if !extract::is_card_code(&code) {
        return Err(ApiError::InvalidStudent(format!(
            "student code {code} does not match the card format"
        )));
    }

    let name = body.name.trim();
    let class_name = body.class.trim();
    if name.is_empty() || class_name.is_empty() {
        return Err(ApiError::InvalidStudent(
            "name and class must not be empty".to_string(),
        ));
    }

    match db::insert_student(&state.db, &code, name, class_name).await {
        Ok(student) => {
            tracing::info!(student = %student.student_code, "student registered");
            Ok((StatusCode::CREATED, Json(student)))
        }
        Err(e) if is_unique_violation(&e) => Err(ApiError::DuplicateStudent(code)),
        Err(e) => Err(e.into()),
    }
}

async fn list_students(State(state): State<AppState>) -> Result<Json<Vec<Student>>, ApiError> {
    let roster = db::list_students(&state.db).await?;
    Ok(Json(roster))
}

#[derive(Debug, Deserialize)]
struct AttendanceQuery {
    days: Option<i64>,
    class: Option<String>,
    #[serde(rename = "studentId")]
    student_code: Option<String>,
}

async fn list_attendance(
    State(state): State<AppState>,
    Query(query): Query<AttendanceQuery>,
) -> Result<Json<Vec<AttendanceRow>>, ApiError> {
    let since = Utc::now() - Duration::days(query.days.unwrap_or(7).max(1));
    let rows = db::fetch_attendance(
        &state.db,
        since,
        query.class.as_deref(),
        query.student_code.as_deref(),
    )
    .await?;
    Ok(Json(rows))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckinResponse {
    success: bool,
    attendance: AttendanceRecord,
    match_type: MatchType,
    student: Student,
    ocr_result: OcrEcho,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OcrEcho {
    student_id: Option<String>,
    student_name: Option<String>,
    confidence: f64,
    ocr_text: String,
}

async fn checkin(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CheckinResponse>, ApiError> {
    let request_id = Uuid::new_v4();

    let (file_name, image) = read_image_part(multipart).await?;
    tracing::info!(%request_id, file = %file_name, bytes = image.len(), "check-in upload received");

    let ocr = state.ocr.recognize(&file_name, image).await?;
    tracing::debug!(
        %request_id,
        confidence = ocr.confidence,
        student_id = ocr.student_id.as_deref().unwrap_or(""),
        "OCR response received"
    );

    // Gate before any roster access.
    if !matching::accepts_confidence(ocr.confidence) {
        tracing::info!(%request_id, confidence = ocr.confidence, "rejected below confidence gate");
        return Err(ApiError::LowConfidence {
            confidence: ocr.confidence,
            ocr_text: ocr.ocr_text,
        });
    }

    let read = extract::merge_card_fields(&ocr);
    let roster = db::list_students(&state.db).await?;

    let Some((student, match_type)) = matching::resolve(&read, &roster) else {
        tracing::info!(%request_id, confidence = read.confidence, "no student resolved");
        return Err(ApiError::StudentNotFound {
            student_code: read.student_code,
            student_name: read.student_name,
            confidence: read.confidence,
            ocr_text: ocr.ocr_text,
        });
    };
    let student = student.clone();

    let attendance = db::insert_attendance(&state.db, student.id, match_type).await?;
    tracing::info!(
        %request_id,
        student = %student.student_code,
        match_type = match_type.as_str(),
        "attendance recorded"
    );

    Ok(Json(CheckinResponse {
        success: true,
        attendance,
        match_type,
        student,
        ocr_result: OcrEcho {
            student_id: read.student_code,
            student_name: read.student_name,
            confidence: ocr.confidence,
            ocr_text: ocr.ocr_text,
        },
    }))
}

async fn read_image_part(mut multipart: Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidUpload(e.to_string()))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("upload.jpg").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::InvalidUpload(e.to_string()))?;
            if bytes.is_empty() {
                return Err(ApiError::InvalidUpload("uploaded file is empty".to_string()));
            }
            return Ok((file_name, bytes.to_vec()));
        }
    }

    Err(ApiError::InvalidUpload("missing 'file' part".to_string()))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn checkin_response_uses_wire_field_names() {
        let recorded_at = Utc.with_ymd_and_hms(2026, 3, 2, 8, 30, 0).unwrap();
        let response = CheckinResponse {
            success: true,
            attendance: AttendanceRecord {
                id: 7,
                student_id: 1,
                status: MatchType::NameMatch,
                recorded_at,
            },
            match_type: MatchType::NameMatch,
            student: Student {
                id: 1,
                student_code: "B21DCVT020".to_string(),
                name: "Nguyễn Văn An".to_string(),
                class_name: "D21CQVT01-B".to_string(),
            },
            ocr_result: OcrEcho {
                student_id: None,
                student_name: Some("An Văn Nguyễn".to_string()),
                confidence: 88.0,
                ocr_text: "THẺ SINH VIÊN".to_string(),
            },
        };

        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["success"], true);
        assert_eq!(value["matchType"], "Name_Match");
        assert_eq!(value["attendance"]["status"], "Name_Match");
        assert_eq!(value["attendance"]["studentId"], 1);
        assert!(value["attendance"]["date"].is_string());
        assert_eq!(value["student"]["studentId"], "B21DCVT020");
        assert_eq!(value["student"]["class"], "D21CQVT01-B");
        assert_eq!(value["ocrResult"]["studentName"], "An Văn Nguyễn");
        assert_eq!(value["ocrResult"]["ocrText"], "THẺ SINH VIÊN");
    }

    #[test]
    fn health_response_names_the_module() {
        let response = HealthResponse {
            status: "ok".to_string(),
            module: "attendance-tracker".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["status"], "ok");
        assert_eq!(value["module"], "attendance-tracker");
    }
}
