use axum::http::StatusCode;
use time::Duration;
use tower::ServiceExt;

use super::handlers::failure_status;
use crate::services::test_session::SessionFailure;
use crate::services::uploads::FileUpload;
use crate::test_support::{self, get_request, multipart_request, pdf, png, read_json, Part};

async fn create_test(app: &axum::Router, duration: &str) -> serde_json::Value {
    let document = pdf("chemistry.pdf");
    let response = app
        .clone()
        .oneshot(multipart_request(
            "/api/v1/tests",
            &[
                Part::file("file", &document),
                Part::text("duration_minutes", duration),
                Part::text("creator", "instructor@example.org"),
            ],
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}

#[tokio::test]
async fn instructor_creates_a_test_and_gets_a_link() {
    let ctx = test_support::setup_test_context().await;

    let created = create_test(&ctx.app, "45").await;
    let id = created["test"]["id"].as_str().expect("id");

    assert_eq!(created["link"], format!("https://exams.example.org/test/{id}"));
    assert_eq!(created["test"]["duration_minutes"], 45);
    assert_eq!(created["test"]["file_name"], "chemistry.pdf");
    assert_eq!(created["test"]["created_by"], "instructor@example.org");
    assert_eq!(created["test"]["created_at"], "2025-03-01T09:00:00Z");
    assert_eq!(created["test"]["expires_at"], "2025-03-02T09:00:00Z");
    assert!(created["test"]["file_url"]
        .as_str()
        .expect("file url")
        .starts_with("data:application/pdf;base64,"));
}

#[tokio::test]
async fn duration_defaults_to_an_hour() {
    let ctx = test_support::setup_test_context().await;
    let document = pdf("quiz.pdf");

    let response = ctx
        .app
        .oneshot(multipart_request("/api/v1/tests", &[Part::file("file", &document)]))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = read_json(response).await;
    assert_eq!(json["test"]["duration_minutes"], 60);
    assert!(json["test"]["created_by"].is_null());
}

#[tokio::test]
async fn creation_rejects_bad_input() {
    let ctx = test_support::setup_test_context().await;
    let document = pdf("quiz.pdf");
    let image = png("scan.png");

    let cases: Vec<(Vec<Part<'_>>, &str)> = vec![
        (
            vec![Part::file("file", &document), Part::text("duration_minutes", "4")],
            "Test duration must be between 5 and 180 minutes",
        ),
        (
            vec![Part::file("file", &document), Part::text("duration_minutes", "181")],
            "Test duration must be between 5 and 180 minutes",
        ),
        (
            vec![Part::file("file", &document), Part::text("duration_minutes", "ten")],
            "duration_minutes must be a valid integer",
        ),
        (vec![Part::text("duration_minutes", "30")], "Please select a PDF file to upload"),
        (
            vec![Part::file("file", &image), Part::text("duration_minutes", "30")],
            "scan.png is not a PDF file",
        ),
        (
            vec![
                Part::file("file", &document),
                Part::file("file", &document),
                Part::text("duration_minutes", "30"),
            ],
            "Only one test document can be uploaded",
        ),
    ];

    for (parts, detail) in cases {
        let response = ctx
            .app
            .clone()
            .oneshot(multipart_request("/api/v1/tests", &parts))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = read_json(response).await;
        assert_eq!(json["status"], 400);
        assert_eq!(json["detail"], detail);
    }
}

#[tokio::test]
async fn oversized_document_is_rejected_while_streaming() {
    let ctx = test_support::setup_test_context().await;
    let huge = FileUpload::new(
        "huge.pdf",
        "application/pdf",
        vec![b'x'; (test_support::TEST_MAX_UPLOAD_BYTES + 1) as usize],
    );

    let response = ctx
        .app
        .oneshot(multipart_request("/api/v1/tests", &[Part::file("file", &huge)]))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = read_json(response).await;
    assert_eq!(json["detail"], "huge.pdf exceeds the 10MB limit");
}

#[tokio::test]
async fn test_lookup_expires_after_a_day() {
    let ctx = test_support::setup_test_context().await;
    let created = create_test(&ctx.app, "60").await;
    let id = created["test"]["id"].as_str().expect("id").to_string();

    let response =
        ctx.app.clone().oneshot(get_request(&format!("/api/v1/tests/{id}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["duration_minutes"], 60);

    ctx.clock.advance(Duration::hours(24) + Duration::seconds(1));

    let response =
        ctx.app.clone().oneshot(get_request(&format!("/api/v1/tests/{id}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["detail"], "Test not found or has expired");
}

#[tokio::test]
async fn unknown_test_is_not_found() {
    let ctx = test_support::setup_test_context().await;

    let response = ctx.app.oneshot(get_request("/api/v1/tests/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["detail"], "Test not found or has expired");
}

#[tokio::test]
async fn student_submits_answers_and_they_can_be_read_back() {
    let ctx = test_support::setup_test_context().await;
    let created = create_test(&ctx.app, "30").await;
    let id = created["test"]["id"].as_str().expect("id").to_string();

    let page1 = png("page1.png");
    let page2 = png("page2.png");
    let notes = pdf("notes.pdf");
    let response = ctx
        .app
        .clone()
        .oneshot(multipart_request(
            &format!("/api/v1/tests/{id}/submissions"),
            &[
                Part::file("files", &page1),
                Part::file("files", &page2),
                Part::file("files", &notes),
                Part::text("submitter", "student-17"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let submission = read_json(response).await;
    assert_eq!(submission["test_id"], id);
    assert_eq!(submission["submitted_by"], "student-17");
    let answers = submission["answers"].as_array().expect("answers");
    assert_eq!(answers.len(), 3);
    assert_eq!(answers[0]["file_name"], "page1.png");
    assert!(answers[2]["file_url"].as_str().unwrap().starts_with("data:application/pdf;base64,"));

    let submission_id = submission["id"].as_str().expect("submission id");
    let response = ctx
        .app
        .oneshot(get_request(&format!("/api/v1/submissions/{submission_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stored = read_json(response).await;
    assert_eq!(stored["answers"].as_array().map(Vec::len), Some(3));
    assert_eq!(stored["answers"][1]["file_name"], "page2.png");

    let receipt = ctx.state.links().get_submission(submission_id).await.unwrap().expect("stored");
    assert_eq!(receipt.submission.submitted_by.as_deref(), Some("student-17"));
}

#[tokio::test]
async fn empty_or_unsupported_submissions_are_rejected() {
    let ctx = test_support::setup_test_context().await;
    let created = create_test(&ctx.app, "30").await;
    let id = created["test"]["id"].as_str().expect("id").to_string();
    let uri = format!("/api/v1/tests/{id}/submissions");

    let response = ctx
        .app
        .clone()
        .oneshot(multipart_request(&uri, &[Part::text("submitter", "student-17")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await["detail"],
        "Please upload at least one answer file before submitting"
    );

    let archive = FileUpload::new("answers.zip", "application/zip", vec![1, 2, 3]);
    let response =
        ctx.app.oneshot(multipart_request(&uri, &[Part::file("files", &archive)])).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await["detail"],
        "answers.zip is not a supported file type. Please upload only images or PDFs"
    );
}

#[tokio::test]
async fn unknown_submission_is_not_found() {
    let ctx = test_support::setup_test_context().await;

    let response = ctx.app.oneshot(get_request("/api/v1/submissions/missing")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["detail"], "Submission not found");
}

#[tokio::test]
async fn session_view_is_ready_with_a_clock() {
    let ctx = test_support::setup_test_context().await;
    let created = create_test(&ctx.app, "90").await;
    let id = created["test"]["id"].as_str().expect("id").to_string();

    let response = ctx.app.oneshot(get_request(&format!("/test/{id}"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let view = read_json(response).await;
    assert_eq!(view["state"], "ready");
    assert_eq!(view["test"]["id"], id);
    assert_eq!(view["clock"]["total_seconds"], 5400);
    assert_eq!(view["clock"]["display"], "01:30:00");
    assert_eq!(view["clock"]["warning_at_seconds"], 300);
    assert!(view.get("error").is_none());
}

#[tokio::test]
async fn session_view_reports_missing_tests() {
    let ctx = test_support::setup_test_context().await;
    let created = create_test(&ctx.app, "5").await;
    let id = created["test"]["id"].as_str().expect("id").to_string();
    ctx.clock.advance(Duration::hours(25));

    for uri in [format!("/test/{id}"), "/test/never-created".to_string()] {
        let response = ctx.app.clone().oneshot(get_request(&uri)).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let view = read_json(response).await;
        assert_eq!(view["state"], "error");
        assert_eq!(view["error"], "Test not found or has expired");
        assert!(view.get("test").is_none());
    }
}

#[test]
fn session_failures_map_to_distinct_statuses() {
    assert_eq!(failure_status(SessionFailure::InvalidTestId), StatusCode::BAD_REQUEST);
    assert_eq!(failure_status(SessionFailure::NotFoundOrExpired), StatusCode::NOT_FOUND);
    assert_eq!(failure_status(SessionFailure::LookupFailed), StatusCode::SERVICE_UNAVAILABLE);
}
