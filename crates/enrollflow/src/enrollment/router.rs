use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::capacity::ScheduleError;
use super::payments::{PaymentError, PaymentOutcome, PaymentProcessor, ProcessorError};
use super::service::{
    ConsentSection, ContactInfoSection, EnrollmentService, FinalFormPayload, PaymentDetailsSection,
    PhaseError, ProgramInfoSection, SchedulingSection,
};
use super::store::{EnrollmentStore, StoreError};

/// Discriminator carried in every submission body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmissionPhase {
    ContactInfo,
    ProgramInfo,
    Scheduling,
    Consent,
    #[serde(alias = "final")]
    FinalData,
    FinalPayment,
}

/// Envelope for the single phase-dispatch endpoint. Every phase reuses
/// this shape and fills in its own section.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub submission_phase: SubmissionPhase,
    #[serde(default)]
    pub personal_info: Option<serde_json::Value>,
    #[serde(default)]
    pub scheduling: Option<SchedulingSection>,
    #[serde(default)]
    pub documents: Option<ConsentSection>,
    #[serde(default)]
    pub payment: Option<serde_json::Value>,
    #[serde(default)]
    pub payment_details: Option<PaymentDetailsSection>,
}

/// Router builder for the enrollment funnel endpoint.
pub fn enrollment_router<S, P>(service: Arc<EnrollmentService<S, P>>) -> Router
where
    S: EnrollmentStore + 'static,
    P: PaymentProcessor + 'static,
{
    Router::new()
        .route(
            "/api/v1/enrollment/submissions",
            post(submission_handler::<S, P>),
        )
        .with_state(service)
}

pub(crate) async fn submission_handler<S, P>(
    State(service): State<Arc<EnrollmentService<S, P>>>,
    headers: HeaderMap,
    Json(request): Json<SubmissionRequest>,
) -> Response
where
    S: EnrollmentStore + 'static,
    P: PaymentProcessor + 'static,
{
    let bearer = bearer_token(&headers);

    match request.submission_phase {
        SubmissionPhase::ContactInfo => {
            let section: ContactInfoSection =
                match parse_section(request.personal_info, "personalInfo") {
                    Ok(section) => section,
                    Err(response) => return response,
                };
            match service.contact_info(section) {
                Ok(outcome) => {
                    let status = if outcome.created {
                        StatusCode::CREATED
                    } else {
                        StatusCode::OK
                    };
                    let message = if outcome.created {
                        "contact info received, enrollment started"
                    } else {
                        "contact info updated"
                    };
                    (
                        status,
                        Json(json!({
                            "message": message,
                            "enrollmentToken": outcome.token,
                        })),
                    )
                        .into_response()
                }
                Err(err) => phase_error_response(err),
            }
        }
        SubmissionPhase::ProgramInfo => {
            let client = match service.authorize(bearer) {
                Ok(client) => client,
                Err(err) => return phase_error_response(err),
            };
            let section: ProgramInfoSection =
                match parse_section(request.personal_info, "personalInfo") {
                    Ok(section) => section,
                    Err(response) => return response,
                };
            respond_simple(
                service.program_info(client, section),
                "program info recorded",
            )
        }
        SubmissionPhase::Scheduling => {
            let client = match service.authorize(bearer) {
                Ok(client) => client,
                Err(err) => return phase_error_response(err),
            };
            let Some(section) = request.scheduling else {
                return missing_section("scheduling");
            };
            respond_simple(service.scheduling(client, section), "class scheduled")
        }
        SubmissionPhase::Consent => {
            let client = match service.authorize(bearer) {
                Ok(client) => client,
                Err(err) => return phase_error_response(err),
            };
            let Some(section) = request.documents else {
                return missing_section("documents");
            };
            respond_simple(service.consent(client, section), "consent recorded")
        }
        SubmissionPhase::FinalData => {
            let client = match service.authorize(bearer) {
                Ok(client) => client,
                Err(err) => return phase_error_response(err),
            };
            let form = match build_final_form(request) {
                Ok(form) => form,
                Err(response) => return response,
            };
            respond_simple(
                service.final_data(client, form),
                "final data recorded, ready for payment",
            )
        }
        SubmissionPhase::FinalPayment => {
            let client = match service.authorize(bearer) {
                Ok(client) => client,
                Err(err) => return phase_error_response(err),
            };
            let Some(details) = request.payment_details else {
                return missing_section("paymentDetails");
            };
            match service.final_payment(client, details) {
                Ok(PaymentOutcome::Charged { payment_id }) => (
                    StatusCode::OK,
                    Json(json!({
                        "message": "payment completed, enrollment finished",
                        "paymentId": payment_id,
                    })),
                )
                    .into_response(),
                Ok(PaymentOutcome::SubscriptionActive { subscription_id }) => (
                    StatusCode::OK,
                    Json(json!({
                        "message": "autopay subscription active, enrollment finished",
                        "subscriptionId": subscription_id,
                    })),
                )
                    .into_response(),
                Err(err) => phase_error_response(err),
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

fn parse_section<T: serde::de::DeserializeOwned>(
    value: Option<serde_json::Value>,
    name: &str,
) -> Result<T, Response> {
    let Some(value) = value else {
        return Err(missing_section(name));
    };
    serde_json::from_value(value).map_err(|err| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("malformed {name} section: {err}") })),
        )
            .into_response()
    })
}

fn build_final_form(request: SubmissionRequest) -> Result<FinalFormPayload, Response> {
    let personal_info = parse_section(request.personal_info, "personalInfo")?;
    let payment = parse_section(request.payment, "payment")?;
    let Some(scheduling) = request.scheduling else {
        return Err(missing_section("scheduling"));
    };
    let Some(documents) = request.documents else {
        return Err(missing_section("documents"));
    };
    Ok(FinalFormPayload {
        personal_info,
        scheduling,
        documents,
        payment,
    })
}

fn missing_section(name: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": format!("{name} section is required for this phase") })),
    )
        .into_response()
}

fn respond_simple(result: Result<(), PhaseError>, message: &str) -> Response {
    match result {
        Ok(()) => (StatusCode::OK, Json(json!({ "message": message }))).into_response(),
        Err(err) => phase_error_response(err),
    }
}

/// Flat `{ error, details? }` bodies with the status mapping of the
/// failure taxonomy.
fn phase_error_response(err: PhaseError) -> Response {
    let (status, details) = match &err {
        PhaseError::Validation { details, .. } => {
            let details = (!details.is_empty()).then(|| json!(details));
            (StatusCode::BAD_REQUEST, details)
        }
        PhaseError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, None),
        PhaseError::NotFound(_) => (StatusCode::NOT_FOUND, None),
        PhaseError::Schedule(schedule_err) => (schedule_status(schedule_err), None),
        PhaseError::Payment(payment_err) => payment_status_and_details(payment_err),
        PhaseError::Store(store_err) => (store_status(store_err), None),
    };

    let body = match details {
        Some(details) => json!({ "error": err.to_string(), "details": details }),
        None => json!({ "error": err.to_string() }),
    };
    (status, Json(body)).into_response()
}

fn schedule_status(err: &ScheduleError) -> StatusCode {
    match err {
        ScheduleError::ClassNotFound(_) => StatusCode::NOT_FOUND,
        ScheduleError::ClassInactive(_)
        | ScheduleError::NoProgramSelected
        | ScheduleError::GroupMismatch { .. } => StatusCode::BAD_REQUEST,
        ScheduleError::Full(_) => StatusCode::CONFLICT,
        ScheduleError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ScheduleError::Store(store_err) => store_status(store_err),
    }
}

fn payment_status_and_details(err: &PaymentError) -> (StatusCode, Option<serde_json::Value>) {
    match err {
        PaymentError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, None),
        PaymentError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        PaymentError::Validation(_) => (StatusCode::BAD_REQUEST, None),
        PaymentError::Processor(processor_err) => {
            let status = match processor_err {
                ProcessorError::Transport {
                    status: Some(code), ..
                } => StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let details = processor_err.details();
            let details = (!details.is_empty()).then(|| json!(details));
            (status, details)
        }
        PaymentError::Store(store_err) => (store_status(store_err), None),
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Conflict => StatusCode::CONFLICT,
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
