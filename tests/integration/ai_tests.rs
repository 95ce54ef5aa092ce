//! Image-editing route integration tests.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use notesai_api::error::InferenceError;

use super::test_utils::{
    json_body, request, test_router, token_for, MemoryProjectStore, MockImageEditor, ALICE,
};

const RESULT_URL: &str = "https://replicate.delivery/pbxt/out-0.png";

#[tokio::test]
async fn test_process_returns_result_url() {
    let editor = MockImageEditor::succeeding(RESULT_URL);
    let router = test_router(MemoryProjectStore::new(), editor.clone());

    let response = router
        .oneshot(request(
            Method::POST,
            "/projects/ai/process",
            Some(&token_for(ALICE)),
            Some(json!({
                "imageBase64": "data:image/png;base64,iVBORw0KGgo=",
                "prompt": "turn the sketch into a watercolor"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"result": RESULT_URL}));

    assert_eq!(editor.call_count(), 1);
    assert_eq!(
        editor.last_input().await,
        Some((
            "data:image/png;base64,iVBORw0KGgo=".to_string(),
            "turn the sketch into a watercolor".to_string()
        ))
    );
}

#[tokio::test]
async fn test_process_missing_input_skips_provider() {
    let editor = MockImageEditor::succeeding(RESULT_URL);
    let store = MemoryProjectStore::new();
    let router = test_router(store.clone(), editor.clone());

    for body in [
        json!({"prompt": "hat"}),
        json!({"imageBase64": "AAAA"}),
        json!({"imageBase64": "", "prompt": "hat"}),
        json!({"imageBase64": "AAAA", "prompt": "  "}),
        json!({}),
    ] {
        let response = router
            .clone()
            .oneshot(request(
                Method::POST,
                "/projects/ai/process",
                Some(&token_for(ALICE)),
                Some(body.clone()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(
            json_body(response).await,
            json!({"message": "Image and prompt are required"})
        );
    }

    assert_eq!(editor.call_count(), 0);
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_process_unparseable_body() {
    let editor = MockImageEditor::succeeding(RESULT_URL);
    let router = test_router(MemoryProjectStore::new(), editor.clone());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/projects/ai/process")
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(ALICE)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(editor.call_count(), 0);
}

#[tokio::test]
async fn test_process_provider_failure_is_opaque() {
    let failures = [
        InferenceError::Provider {
            status: 401,
            detail: "Invalid token".to_string(),
        },
        InferenceError::PredictionFailed {
            status: "failed".to_string(),
            error: Some("CUDA out of memory".to_string()),
        },
        InferenceError::Timeout { waited_secs: 300 },
        InferenceError::Request("connection reset".to_string()),
    ];

    for failure in failures {
        let editor = MockImageEditor::failing(failure);
        let router = test_router(MemoryProjectStore::new(), editor.clone());

        let response = router
            .oneshot(request(
                Method::POST,
                "/projects/ai/process",
                Some(&token_for(ALICE)),
                Some(json!({"imageBase64": "AAAA", "prompt": "hat"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({"message": "Error processing image"})
        );
        assert_eq!(editor.call_count(), 1);
    }
}

#[tokio::test]
async fn test_process_does_not_touch_store() {
    let store = MemoryProjectStore::new();
    let router = test_router(store.clone(), MockImageEditor::succeeding(RESULT_URL));

    let response = router
        .oneshot(request(
            Method::POST,
            "/projects/ai/process",
            Some(&token_for(ALICE)),
            Some(json!({"imageBase64": "AAAA", "prompt": "hat"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.call_count(), 0);
}
