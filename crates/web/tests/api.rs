mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use clio_generator::GenerationError;
use common::{FakeModel, SECRET, TestApp, authorized, body_json, get};
use serde_json::json;

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(Some(SECRET));
    let response = app.send(get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cron_requires_secret() {
    let app = TestApp::new(Some(SECRET));
    let response = app.send(get("/api/cron/process-jobs")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::get("/api/cron/process-jobs")
        .header("Authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cron_rejects_when_no_secret_configured() {
    let app = TestApp::new(None);
    let job = app.enqueue(1, "user-1").await;
    let response = app.send(authorized("POST", "/api/cron/process-jobs", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(app.send(get(&format!("/api/jobs/{}", job.id))).await).await;
    assert_eq!(body["job"]["status"], "PENDING");
}

#[tokio::test]
async fn test_cron_with_no_jobs() {
    let app = TestApp::new(Some(SECRET));
    let response = app.send(authorized("GET", "/api/cron/process-jobs", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "processed": 0,
            "failed": 0,
            "requeued": 0,
            "skipped": 0,
            "errored": 0,
            "results": [],
        })
    );
}

#[tokio::test]
async fn test_cron_processes_pending_job() {
    let app = TestApp::new(Some(SECRET));
    let job = app.enqueue(1, "user-1").await;

    let response = app.send(authorized("POST", "/api/cron/process-jobs", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let summary = body_json(response).await;
    assert_eq!(summary["processed"], 1);
    assert_eq!(summary["results"][0]["jobId"], job.id.0);
    assert_eq!(summary["results"][0]["outcome"], "completed");

    let response = app.send(get(&format!("/api/jobs/{}", job.id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["job"]["status"], "COMPLETED");
    assert_eq!(body["job"]["progress"], 100);
    assert_eq!(body["versions"].as_array().unwrap().len(), 1);
    assert!(body["versions"][0]["content"].as_str().unwrap().starts_with("# App"));
}

#[tokio::test]
async fn test_generate_readme() {
    let app = TestApp::new(Some(SECRET));
    let request = json!({
        "repository": { "id": 7, "fullName": "acme/app-7" },
        "installationId": 42,
        "userId": "user-1",
        "options": { "style": "minimal" },
    });
    let response = app.send(authorized("POST", "/api/readme/generate", Some(request))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["job"]["status"], "COMPLETED");
    assert_eq!(body["job"]["userId"], "user-1");
    assert_eq!(body["job"]["options"]["style"], "minimal");
    assert!(body["content"].as_str().unwrap().contains("## Usage"));
    assert_eq!(body["metadata"]["tokensUsed"], 100);
    assert_eq!(body["metadata"]["contentHash"].as_str().unwrap().len(), 64);

    let response = app.send(get("/api/users/user-1/jobs")).await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_generate_requires_secret() {
    let app = TestApp::new(Some(SECRET));
    let request = Request::post("/api/readme/generate")
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({
                "repository": { "id": 7, "fullName": "acme/app-7" },
                "installationId": 42,
                "userId": "user-1",
            })
            .to_string(),
        ))
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_generate_rejects_invalid_repository() {
    let app = TestApp::new(Some(SECRET));
    let request = json!({
        "repository": { "id": 7, "fullName": "not-a-full-name" },
        "installationId": 42,
        "userId": "user-1",
    });
    let response = app.send(authorized("POST", "/api/readme/generate", Some(request))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_failure_is_server_error() {
    let app = TestApp::with_model(
        Some(SECRET),
        FakeModel(Err(GenerationError::fatal("model refused the request"))),
    );
    let request = json!({
        "repository": { "id": 7, "fullName": "acme/app-7" },
        "installationId": 42,
        "userId": "user-1",
    });
    let response = app.send(authorized("POST", "/api/readme/generate", Some(request))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_job_not_found() {
    let app = TestApp::new(Some(SECRET));
    assert_eq!(app.send(get("/api/jobs/404")).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_job() {
    let app = TestApp::new(Some(SECRET));
    let job = app.enqueue(1, "user-1").await;
    let uri = format!("/api/jobs/{}", job.id);
    let delete = || Request::delete(&uri).body(Body::empty()).unwrap();

    assert_eq!(app.send(delete()).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.send(delete()).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.send(get(&uri)).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_jobs_for_user() {
    let app = TestApp::new(Some(SECRET));
    app.enqueue(1, "user-1").await;
    app.enqueue(2, "user-1").await;
    app.enqueue(3, "user-2").await;

    let response = app.send(get("/api/users/user-1/jobs")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let jobs = body_json(response).await;
    let jobs = jobs.as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j["userId"] == "user-1"));

    let response = app.send(get("/api/users/nobody/jobs")).await;
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_save_version() {
    let app = TestApp::new(Some(SECRET));
    let job = app.enqueue(1, "user-1").await;
    let uri = format!("/api/jobs/{}/versions", job.id);
    let save = |content: &str| {
        Request::post(&uri)
            .header("Content-Type", "application/json")
            .body(Body::from(json!({ "content": content }).to_string()))
            .unwrap()
    };

    let response = app.send(save("# Edited\n")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    assert_eq!(first["content"], "# Edited\n");

    // Identical content returns the existing version
    let second = body_json(app.send(save("# Edited\n")).await).await;
    assert_eq!(second["id"], first["id"]);

    assert_eq!(app.send(save("   ")).await.status(), StatusCode::BAD_REQUEST);

    let request = Request::post("/api/jobs/999/versions")
        .header("Content-Type", "application/json")
        .body(Body::from(json!({ "content": "# Orphan\n" }).to_string()))
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::NOT_FOUND);
}
