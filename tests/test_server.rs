//! HTTP tests driving the router with `tower::ServiceExt::oneshot`.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::*;
use serde_json::Value;
use tower::ServiceExt;
use tumorseg::server::{router, AppState};

const BOUNDARY: &str = "tumorseg-test-boundary";

fn app() -> Router {
    router(AppState::new(pipeline()), 64 * 1024 * 1024)
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/zip\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn post_predict(parts: &[Part<'_>]) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart(parts)))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_predict_success() {
    let zip = case_zip();
    let (status, json) = post_predict(&[
        Part::Text("filename", CASE),
        Part::File("file", "case.zip", &zip),
    ])
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["image"].as_str().is_some_and(|s| !s.is_empty()));
    assert!(json["gpt3_prompt"].as_str().unwrap().starts_with("Hello GPT-3"));
    let regions = json["tumor_properties"].as_array().unwrap();
    assert_eq!(regions.len(), 20);
    for key in ["slice_index", "bounding_box", "size", "center", "width", "height"] {
        assert!(regions[0].get(key).is_some(), "missing {key}");
    }
    assert!(json.get("evaluation").is_none());
}

#[tokio::test]
async fn test_case_id_is_trimmed() {
    let zip = case_zip();
    let padded = format!("  {CASE}\n");
    let (status, _) = post_predict(&[
        Part::Text("filename", &padded),
        Part::File("file", "case.zip", &zip),
    ])
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_file_part() {
    let (status, json) = post_predict(&[Part::Text("filename", CASE)]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file part in the request");
}

#[tokio::test]
async fn test_empty_file_name() {
    let zip = case_zip();
    let (status, json) = post_predict(&[
        Part::Text("filename", CASE),
        Part::File("file", "", &zip),
    ])
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No selected file");
}

#[tokio::test]
async fn test_missing_filename_field() {
    let zip = case_zip();
    let (status, json) = post_predict(&[Part::File("file", "case.zip", &zip)]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("filename"));
}

#[tokio::test]
async fn test_path_like_case_id_rejected() {
    let zip = case_zip();
    let (status, _) = post_predict(&[
        Part::Text("filename", "../etc"),
        Part::File("file", "case.zip", &zip),
    ])
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_archive_entry_is_bad_request() {
    let zip = zip_of(&[(entry(CASE, "flair.nii"), flair_bytes())]);
    let (status, json) = post_predict(&[
        Part::Text("filename", CASE),
        Part::File("file", "case.zip", &zip),
    ])
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("_t1ce.nii"));
}

#[tokio::test]
async fn test_malformed_zip_is_server_error() {
    let (status, json) = post_predict(&[
        Part::Text("filename", CASE),
        Part::File("file", "case.zip", b"this is not a zip archive"),
    ])
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_all_zero_volumes_are_server_error() {
    let zeros = volume_bytes(|_, _, _| 0.0);
    let zip = zip_of(&[
        (entry(CASE, "flair.nii"), zeros.clone()),
        (entry(CASE, "t1ce.nii"), zeros),
    ]);
    let (status, json) = post_predict(&[
        Part::Text("filename", CASE),
        Part::File("file", "case.zip", &zip),
    ])
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("maximum intensity"));
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["model"], "bright-spot");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
