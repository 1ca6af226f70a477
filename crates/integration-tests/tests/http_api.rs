//! HTTP contract tests for the provisioning API.
//!
//! Requests go through the full router (CORS, request id, tracing) with the
//! in-memory fakes behind it.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;

use nutri_api::middleware::REQUEST_ID_HEADER;
use nutri_integration_tests::Harness;

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn maria_body() -> Value {
    json!({
        "patientData": {
            "name": "Maria Silva",
            "email": "maria@example.com",
            "height": 165,
            "initial_weight": 68,
            "goal": "weight loss",
            "gender": "female"
        },
        "nutritionistId": "n1"
    })
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// POST /patients
// =============================================================================

#[tokio::test]
async fn test_create_patient_success() {
    let harness = Harness::new();

    let response = harness
        .router()
        .oneshot(post_json("/patients", &maria_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));

    let body = json_body(response).await;
    let identity_id = harness.identity.created()[0].id.to_string();
    assert_eq!(body["message"], "Patient created and invitation sent");
    assert_eq!(body["patient"]["id"], identity_id.as_str());
    assert_eq!(body["patient"]["auth_user_id"], identity_id.as_str());
    assert_eq!(body["patient"]["nutritionist_id"], "n1");
    assert_eq!(body["patient"]["gender"], "Feminino");
    assert_eq!(body["patient"]["height_cm"], 165.0);
    assert!(body["patient"]["phone"].is_null());
}

#[tokio::test]
async fn test_outer_nutritionist_id_wins() {
    let harness = Harness::new();
    let mut body = maria_body();
    body["patientData"]["nutritionist_id"] = json!("n-inner");
    body["nutritionistId"] = json!("n-outer");

    let response = harness
        .router()
        .oneshot(post_json("/patients", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["patient"]["nutritionist_id"], "n-outer");
}

#[tokio::test]
async fn test_missing_field_is_400() {
    let harness = Harness::new();
    let mut body = maria_body();
    body["patientData"]["email"] = Value::Null;

    let response = harness
        .router()
        .oneshot(post_json("/patients", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "insufficient data");
    assert_eq!(body["detail"], "email is required");
    assert_eq!(harness.identity.created_count(), 0);
}

#[tokio::test]
async fn test_missing_nutritionist_is_400() {
    let harness = Harness::new();
    let mut body = maria_body();
    body.as_object_mut().unwrap().remove("nutritionistId");

    let response = harness
        .router()
        .oneshot(post_json("/patients", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "insufficient data");
}

#[tokio::test]
async fn test_missing_patient_data_is_400() {
    let harness = Harness::new();

    let response = harness
        .router()
        .oneshot(post_json("/patients", &json!({ "nutritionistId": "n1" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["detail"], "patientData is required");
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let harness = Harness::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/patients")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = harness.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "insufficient data");
}

#[tokio::test]
async fn test_duplicate_email_is_409() {
    let harness = Harness::new();
    let router = harness.router();

    let first = router
        .clone()
        .oneshot(post_json("/patients", &maria_body()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .oneshot(post_json("/patients", &maria_body()))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert!(
        json_body(second).await["error"]
            .as_str()
            .unwrap()
            .contains("already been registered")
    );
    assert_eq!(harness.store.rows_with_email("maria@example.com"), 1);
}

#[tokio::test]
async fn test_insert_failure_is_500() {
    let harness = Harness::new();
    harness.store.fail_inserts_with("violates foreign key constraint");

    let response = harness
        .router()
        .oneshot(post_json("/patients", &maria_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("violates foreign key constraint")
    );
    assert_eq!(harness.identity.deleted().len(), 1);
}

#[tokio::test]
async fn test_dependency_timeout_is_504() {
    let harness = Harness::new();
    harness.identity.delay_creates(Duration::from_secs(2));

    let response = harness
        .router()
        .oneshot(post_json("/patients", &maria_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(
        json_body(response).await["error"],
        "identity creation timed out after 200ms"
    );
}

#[tokio::test]
async fn test_invitation_timeout_is_504() {
    let harness = Harness::new();
    harness.invitations.delay_sends(Duration::from_secs(2));

    let response = harness
        .router()
        .oneshot(post_json("/patients", &maria_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(harness.store.row_count(), 1);
}

#[tokio::test]
async fn test_client_disconnect_still_compensates() {
    let harness = Harness::new();
    harness.store.delay_inserts(Duration::from_millis(100));
    harness.store.fail_inserts_with("violates foreign key constraint");

    let request = harness
        .router()
        .oneshot(post_json("/patients", &maria_body()));
    assert!(
        tokio::time::timeout(Duration::from_millis(20), request)
            .await
            .is_err()
    );

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(harness.identity.created_count(), 1);
    assert_eq!(harness.identity.deleted().len(), 1);
    assert_eq!(harness.store.row_count(), 0);
}

// =============================================================================
// POST /patients/{id}/invitation
// =============================================================================

#[tokio::test]
async fn test_resend_unknown_patient_is_404() {
    let harness = Harness::new();

    let response = harness
        .router()
        .oneshot(post_json("/patients/nobody/invitation", &json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "patient not found: nobody");
}

#[tokio::test]
async fn test_resend_existing_patient() {
    let harness = Harness::new();
    let router = harness.router();

    let created = router
        .clone()
        .oneshot(post_json("/patients", &maria_body()))
        .await
        .unwrap();
    let id = json_body(created).await["patient"]["id"]
        .as_str()
        .unwrap()
        .to_owned();

    let response = router
        .oneshot(post_json(&format!("/patients/{id}/invitation"), &json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["message"], "Invitation sent");
    assert_eq!(harness.invitations.sent().len(), 2);
}

// =============================================================================
// CORS, request id, health
// =============================================================================

#[tokio::test]
async fn test_cors_preflight() {
    let harness = Harness::new();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/patients")
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(
            header::ACCESS_CONTROL_REQUEST_HEADERS,
            "authorization, x-client-info, apikey, content-type",
        )
        .body(Body::empty())
        .unwrap();

    let response = harness.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let allowed = response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS]
        .to_str()
        .unwrap()
        .to_lowercase();
    for name in ["authorization", "x-client-info", "apikey", "content-type"] {
        assert!(allowed.contains(name), "missing {name} in {allowed}");
    }
    assert_eq!(harness.identity.created_count(), 0);
}

#[tokio::test]
async fn test_request_id_is_propagated_on_errors() {
    let harness = Harness::new();
    let mut request = post_json("/patients", &json!({}));
    request
        .headers_mut()
        .insert(REQUEST_ID_HEADER, "req-123".parse().unwrap());

    let response = harness.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-123");
}

#[tokio::test]
async fn test_health_and_readiness() {
    let harness = Harness::new();
    let router = harness.router();

    let live = router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(live.status(), StatusCode::OK);

    let ready = router
        .clone()
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::OK);

    harness.store.set_unreachable();
    let not_ready = router
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(not_ready.status(), StatusCode::SERVICE_UNAVAILABLE);
}
