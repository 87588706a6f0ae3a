use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use super::multipart::{next_field, read_file, read_text};
use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::timed_test::{
    ClockView, CreatedTestResponse, SessionView, SubmissionResponse, TestResponse,
};
use crate::services::link_store::LinkStoreError;
use crate::services::test_creation::{create_timed_test, DEFAULT_DURATION_MINUTES};
use crate::services::test_session::{SessionFailure, SessionState, TestSession};

pub(super) async fn create_test(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreatedTestResponse>), ApiError> {
    let max_bytes = state.links().policy().max_file_bytes();
    let mut document = None;
    let mut duration_minutes = None;
    let mut created_by = None;

    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" if document.is_some() => {
                return Err(ApiError::BadRequest(
                    "Only one test document can be uploaded".to_string(),
                ));
            }
            "file" => document = Some(read_file(field, max_bytes).await?),
            "duration_minutes" => {
                if let Some(text) = read_text(field, "duration_minutes").await? {
                    let minutes = text.parse::<u32>().map_err(|_| {
                        ApiError::BadRequest(
                            "duration_minutes must be a valid integer".to_string(),
                        )
                    })?;
                    duration_minutes = Some(minutes);
                }
            }
            "creator" => created_by = read_text(field, "creator").await?,
            _ => {}
        }
    }

    let created = create_timed_test(
        state.links(),
        &state.settings().links().public_origin,
        document,
        duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
        created_by,
    )
    .await?;

    let file_url = state.links().resolve_document(&created.test).await?;
    let response = CreatedTestResponse {
        test: TestResponse::from_record(created.test, file_url),
        link: created.link,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

pub(super) async fn get_test(
    Path(test_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TestResponse>, ApiError> {
    let test = state.links().get_test(&test_id).await?.ok_or(LinkStoreError::NotFoundOrExpired)?;
    let file_url = state.links().resolve_document(&test).await?;
    Ok(Json(TestResponse::from_record(test, file_url)))
}

/// Accepts answers for any test id the client presents; timing is not enforced here.
pub(super) async fn submit_answers(
    Path(test_id): Path<String>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmissionResponse>), ApiError> {
    let max_bytes = state.links().policy().max_file_bytes();
    let mut files = Vec::new();
    let mut submitted_by = None;

    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "files" | "file" => files.push(read_file(field, max_bytes).await?),
            "submitter" => submitted_by = read_text(field, "submitter").await?,
            _ => {}
        }
    }

    let receipt = state.links().record_submission(&test_id, files, submitted_by).await?;
    Ok((StatusCode::CREATED, Json(SubmissionResponse::from(receipt))))
}

pub(super) async fn get_submission(
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let receipt = state
        .links()
        .get_submission(&submission_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;
    Ok(Json(SubmissionResponse::from(receipt)))
}

/// What a student's browser needs to render the session page.
pub(super) async fn session_view(
    Path(test_id): Path<String>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let mut session = TestSession::new(Some(test_id));
    session
        .load(state.links())
        .await
        .map_err(|err| ApiError::internal(err, "Failed to load test session"))?;

    let clock = session.countdown();
    match session.state().clone() {
        SessionState::Ready { test } => {
            let file_url = state.links().resolve_document(&test).await?;
            let view = SessionView {
                state: session.phase(),
                test: Some(TestResponse::from_record(test, file_url)),
                clock: clock.as_ref().map(ClockView::from),
                error: None,
            };
            Ok((StatusCode::OK, Json(view)))
        }
        SessionState::Error { reason } => {
            let view = SessionView {
                state: session.phase(),
                test: None,
                clock: None,
                error: Some(reason.to_string()),
            };
            Ok((failure_status(reason), Json(view)))
        }
        _ => Err(ApiError::internal(
            session.phase().as_str(),
            "Test session finished loading in an unexpected state",
        )),
    }
}

pub(super) fn failure_status(failure: SessionFailure) -> StatusCode {
    match failure {
        SessionFailure::InvalidTestId => StatusCode::BAD_REQUEST,
        SessionFailure::NotFoundOrExpired => StatusCode::NOT_FOUND,
        SessionFailure::LookupFailed => StatusCode::SERVICE_UNAVAILABLE,
    }
}
