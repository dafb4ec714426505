use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::enrollment::router::enrollment_router;

const ENDPOINT: &str = "/api/v1/enrollment/submissions";

fn post(body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(ENDPOINT)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("serialize")))
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn contact_phase_returns_201_and_token_then_200_on_replay() {
    let (service, _, _) = build_service();
    let router = enrollment_router(service);

    let first = router
        .clone()
        .oneshot(post(
            json!({
                "submissionPhase": "contactInfo",
                "personalInfo": { "email": "a@b.com", "firstName": "A" },
            }),
            None,
        ))
        .await
        .expect("dispatch");
    assert_eq!(first.status(), StatusCode::CREATED);
    let payload = body_json(first).await;
    let token = payload
        .get("enrollmentToken")
        .and_then(Value::as_str)
        .expect("token issued")
        .to_string();
    assert!(!token.is_empty());

    let replay = router
        .clone()
        .oneshot(post(
            json!({
                "submissionPhase": "contactInfo",
                "personalInfo": { "email": "a@b.com", "lastName": "B" },
            }),
            None,
        ))
        .await
        .expect("dispatch");
    assert_eq!(replay.status(), StatusCode::OK);
    let payload = body_json(replay).await;
    assert!(payload.get("enrollmentToken").is_some());
}

#[tokio::test]
async fn later_phases_reject_missing_or_garbage_tokens() {
    let (service, _, _) = build_service();
    let router = enrollment_router(service);

    let body = json!({
        "submissionPhase": "scheduling",
        "scheduling": { "selectedClassId": "class-iop-mon" },
    });

    let missing = router
        .clone()
        .oneshot(post(body.clone(), None))
        .await
        .expect("dispatch");
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    let payload = body_json(missing).await;
    assert!(payload.get("error").is_some());

    let garbage = router
        .clone()
        .oneshot(post(body, Some("nope.nope.nope")))
        .await
        .expect("dispatch");
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn full_class_yields_conflict_over_the_wire() {
    let (service, _, _) = build_service();
    let router = enrollment_router(service);

    let created = router
        .clone()
        .oneshot(post(
            json!({
                "submissionPhase": "contactInfo",
                "personalInfo": { "email": "a@b.com" },
            }),
            None,
        ))
        .await
        .expect("dispatch");
    let token = body_json(created)
        .await
        .get("enrollmentToken")
        .and_then(Value::as_str)
        .expect("token")
        .to_string();

    let program = router
        .clone()
        .oneshot(post(
            json!({
                "submissionPhase": "programInfo",
                "personalInfo": { "county": "Polk", "selectedProgram": "IOP-12" },
            }),
            Some(&token),
        ))
        .await
        .expect("dispatch");
    assert_eq!(program.status(), StatusCode::OK);

    let full = router
        .clone()
        .oneshot(post(
            json!({
                "submissionPhase": "scheduling",
                "scheduling": { "selectedClassId": "class-iop-full" },
            }),
            Some(&token),
        ))
        .await
        .expect("dispatch");
    assert_eq!(full.status(), StatusCode::CONFLICT);

    let unknown = router
        .clone()
        .oneshot(post(
            json!({
                "submissionPhase": "scheduling",
                "scheduling": { "selectedClassId": "class-nope" },
            }),
            Some(&token),
        ))
        .await
        .expect("dispatch");
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn incomplete_final_form_returns_structured_details() {
    let (service, _, _) = build_service();
    let router = enrollment_router(service);

    let created = router
        .clone()
        .oneshot(post(
            json!({
                "submissionPhase": "contactInfo",
                "personalInfo": { "email": "a@b.com" },
            }),
            None,
        ))
        .await
        .expect("dispatch");
    let token = body_json(created)
        .await
        .get("enrollmentToken")
        .and_then(Value::as_str)
        .expect("token")
        .to_string();

    let response = router
        .clone()
        .oneshot(post(
            json!({
                "submissionPhase": "final",
                "personalInfo": { "email": "a@b.com" },
                "scheduling": {},
                "documents": {},
                "payment": {},
            }),
            Some(&token),
        ))
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let payload = body_json(response).await;
    let details = payload
        .get("details")
        .and_then(Value::as_array)
        .expect("details array");
    assert!(details
        .iter()
        .any(|d| d.as_str().unwrap_or_default().contains("firstName")));
    assert!(details
        .iter()
        .any(|d| d.as_str().unwrap_or_default().contains("selectedClassId")));
}

#[tokio::test]
async fn missing_section_is_a_bad_request() {
    let (service, _, _) = build_service();
    let router = enrollment_router(service);

    let response = router
        .clone()
        .oneshot(post(json!({ "submissionPhase": "contactInfo" }), None))
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = body_json(response).await;
    assert!(payload
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .contains("personalInfo"));
}

#[tokio::test]
async fn payment_phase_without_processor_is_service_unavailable() {
    let store = std::sync::Arc::new(MemoryStore::seeded());
    let service = std::sync::Arc::new(
        crate::enrollment::service::EnrollmentService::<_, RecordingProcessor>::new(
            store,
            None,
            token_issuer(),
            payments_config(),
        ),
    );
    let router = enrollment_router(service);

    let created = router
        .clone()
        .oneshot(post(
            json!({
                "submissionPhase": "contactInfo",
                "personalInfo": { "email": "a@b.com" },
            }),
            None,
        ))
        .await
        .expect("dispatch");
    let token = body_json(created)
        .await
        .get("enrollmentToken")
        .and_then(Value::as_str)
        .expect("token")
        .to_string();

    let response = router
        .clone()
        .oneshot(post(
            json!({
                "submissionPhase": "finalPayment",
                "paymentDetails": {
                    "cardNonce": "cnon:ok",
                    "dueTodayAmount": 54000,
                    "paymentOption": "full_program",
                },
            }),
            Some(&token),
        ))
        .await
        .expect("dispatch");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
