use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::capacity::{assign_class, ScheduleError};
use super::domain::{Client, ClientId, EnrollmentStatus, PaymentOption};
use super::payments::{PaymentError, PaymentOrchestrator, PaymentOutcome, PaymentProcessor};
use super::resolver::ReferenceResolver;
use super::store::{EnrollmentStore, StoreError};
use super::token::{TokenError, TokenIssuer};
use crate::config::PaymentsConfig;

/// Contact phase payload: the only phase that runs unauthenticated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfoSection {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zipcode: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub consent_to_contact: Option<bool>,
}

/// Referral and program-selection phase payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramInfoSection {
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub county_other: Option<String>,
    #[serde(default)]
    pub referral_source: Option<String>,
    #[serde(default)]
    pub referral_source_other: Option<String>,
    #[serde(default)]
    pub selected_program: Option<String>,
    #[serde(default)]
    pub why_referred: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingSection {
    #[serde(default)]
    pub selected_class_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentSection {
    #[serde(default)]
    pub agreed_to_terms: Option<bool>,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSelectionSection {
    #[serde(default)]
    pub payment_option: Option<PaymentOption>,
    #[serde(default)]
    pub recurring_payment_consent: Option<bool>,
}

/// The full accumulated form, re-submitted and re-checked wholesale
/// before any money moves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalFormPayload {
    #[serde(default)]
    pub personal_info: FinalPersonalInfo,
    #[serde(default)]
    pub scheduling: SchedulingSection,
    #[serde(default)]
    pub documents: ConsentSection,
    #[serde(default)]
    pub payment: PaymentSelectionSection,
}

/// Contact and referral fields merged, as the final form carries both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalPersonalInfo {
    #[serde(flatten)]
    pub contact: ContactInfoSection,
    #[serde(flatten)]
    pub referral: ProgramInfoSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetailsSection {
    #[serde(default)]
    pub card_nonce: Option<String>,
    #[serde(default)]
    pub due_today_amount: Option<u32>,
    #[serde(default)]
    pub payment_option: Option<PaymentOption>,
}

/// Result of the contact phase: the caller needs the fresh token and the
/// created/updated distinction for its status code.
#[derive(Debug, Clone)]
pub struct ContactOutcome {
    pub client: Client,
    pub token: String,
    pub created: bool,
}

/// Error raised by a phase handler. The router maps each variant onto an
/// HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },
    #[error(transparent)]
    Unauthorized(#[from] TokenError),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PhaseError {
    fn validation(message: impl Into<String>) -> Self {
        PhaseError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }
}

/// Service composing the token issuer, reference resolver, capacity
/// checker, and payment orchestrator behind the phase dispatch endpoint.
pub struct EnrollmentService<S, P> {
    store: Arc<S>,
    tokens: TokenIssuer,
    payments: PaymentOrchestrator<S, P>,
}

impl<S, P> EnrollmentService<S, P>
where
    S: EnrollmentStore + 'static,
    P: PaymentProcessor + 'static,
{
    pub fn new(
        store: Arc<S>,
        processor: Option<Arc<P>>,
        tokens: TokenIssuer,
        payments_config: PaymentsConfig,
    ) -> Self {
        let payments = PaymentOrchestrator::new(store.clone(), processor, payments_config);
        Self {
            store,
            tokens,
            payments,
        }
    }

    /// Verifies the presented bearer token and loads the bound client.
    /// Every phase except contact info passes through here first.
    pub fn authorize(&self, bearer: Option<&str>) -> Result<Client, PhaseError> {
        let client_id = self.tokens.verify(bearer)?;
        self.store
            .fetch_client(&client_id)?
            .ok_or_else(|| PhaseError::NotFound("no client record for this token".to_string()))
    }

    /// Upserts a client by email and issues a fresh token. Resubmitting
    /// the same email updates the existing record in place.
    pub fn contact_info(&self, section: ContactInfoSection) -> Result<ContactOutcome, PhaseError> {
        let email = section
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| PhaseError::validation("email is required"))?
            .to_string();

        let now = Utc::now();
        let (mut client, created) = match self.store.find_client_by_email(&email)? {
            Some(existing) => (existing, false),
            None => (
                Client::new(ClientId(Uuid::new_v4().to_string()), email.clone(), now),
                true,
            ),
        };

        apply_contact(&mut client, &section);
        client.updated_at = now;

        let client = if created {
            tracing::info!(email, "new enrollment started");
            self.store.insert_client(client)?
        } else {
            tracing::info!(email, "returning enrollee updated contact info");
            self.store.update_client(client.clone())?;
            client
        };

        let token = self.tokens.issue(&client.id);
        Ok(ContactOutcome {
            client,
            token,
            created,
        })
    }

    /// Stores referral data with soft-resolved references plus the raw
    /// free text, and records the program selection.
    pub fn program_info(
        &self,
        mut client: Client,
        section: ProgramInfoSection,
    ) -> Result<(), PhaseError> {
        let resolver = ReferenceResolver::new(self.store.as_ref());

        client.county = match section.county.as_deref() {
            Some(name) => resolver.resolve_county(name)?,
            None => None,
        };
        client.county_other = fallback_text(
            client.county.is_none(),
            section.county.as_deref(),
            section.county_other.as_deref(),
        );

        client.referral_source = match section.referral_source.as_deref() {
            Some(type_name) => {
                resolver.resolve_referral_source(type_name, client.county.as_ref())?
            }
            None => None,
        };
        client.referral_source_other = fallback_text(
            client.referral_source.is_none(),
            section.referral_source.as_deref(),
            section.referral_source_other.as_deref(),
        );

        if let Some(code) = section.selected_program.as_deref() {
            client.selected_program = resolver.resolve_program_by_code(code)?;
        }
        if section.why_referred.is_some() {
            client.why_referred = section.why_referred.clone();
        }

        client.advance_status(EnrollmentStatus::ProgramInfoCollected);
        client.updated_at = Utc::now();
        self.store.update_client(client)?;
        Ok(())
    }

    /// Assigns the chosen class after the group and capacity checks pass.
    pub fn scheduling(
        &self,
        mut client: Client,
        section: SchedulingSection,
    ) -> Result<(), PhaseError> {
        let class_id = section
            .selected_class_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PhaseError::validation("selectedClassId is required"))?;

        assign_class(
            self.store.as_ref(),
            &mut client,
            &super::domain::ClassBlockId(class_id.to_string()),
        )?;
        client.updated_at = Utc::now();
        self.store.update_client(client)?;
        Ok(())
    }

    /// Records agreement and signature. Both fields are required;
    /// resubmission lands in the same state.
    pub fn consent(&self, mut client: Client, section: ConsentSection) -> Result<(), PhaseError> {
        let agreed = section.agreed_to_terms.unwrap_or(false);
        let signature = section
            .signature
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let mut details = Vec::new();
        if !agreed {
            details.push("documents.agreedToTerms must be accepted".to_string());
        }
        if signature.is_none() {
            details.push("documents.signature is required".to_string());
        }
        if !details.is_empty() {
            return Err(PhaseError::Validation {
                message: "consent requires agreement and a signature".to_string(),
                details,
            });
        }

        client.agreed_to_terms = true;
        client.signature = signature.map(str::to_string);
        client.advance_status(EnrollmentStatus::ConsentAgreed);
        client.updated_at = Utc::now();
        self.store.update_client(client)?;
        Ok(())
    }

    /// The trust-nothing checkpoint before money moves: the whole form is
    /// re-validated against one comprehensive schema and every reference
    /// is re-resolved from scratch.
    pub fn final_data(&self, mut client: Client, form: FinalFormPayload) -> Result<(), PhaseError> {
        let details = validate_final_form(&form);
        if !details.is_empty() {
            return Err(PhaseError::Validation {
                message: "final form is incomplete".to_string(),
                details,
            });
        }

        let contact = &form.personal_info.contact;
        apply_contact(&mut client, contact);

        let resolver = ReferenceResolver::new(self.store.as_ref());
        let referral = &form.personal_info.referral;

        client.county = match referral.county.as_deref() {
            Some(name) => resolver.resolve_county(name)?,
            None => None,
        };
        client.county_other = fallback_text(
            client.county.is_none(),
            referral.county.as_deref(),
            referral.county_other.as_deref(),
        );
        client.referral_source = match referral.referral_source.as_deref() {
            Some(type_name) => {
                resolver.resolve_referral_source(type_name, client.county.as_ref())?
            }
            None => None,
        };
        client.referral_source_other = fallback_text(
            client.referral_source.is_none(),
            referral.referral_source.as_deref(),
            referral.referral_source_other.as_deref(),
        );
        if let Some(why) = referral.why_referred.clone() {
            client.why_referred = Some(why);
        }

        let program_code = referral
            .selected_program
            .as_deref()
            .ok_or_else(|| PhaseError::validation("personalInfo.selectedProgram is required"))?;
        client.selected_program = Some(
            resolver
                .resolve_program_by_code(program_code)?
                .ok_or_else(|| {
                    PhaseError::validation(format!("unknown program code '{program_code}'"))
                })?,
        );

        let class_id = form
            .scheduling
            .selected_class_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PhaseError::validation("scheduling.selectedClassId is required"))?;
        assign_class(
            self.store.as_ref(),
            &mut client,
            &super::domain::ClassBlockId(class_id.to_string()),
        )?;

        client.agreed_to_terms = true;
        client.signature = form
            .documents
            .signature
            .as_deref()
            .map(str::trim)
            .map(str::to_string);
        client.payment_option = form.payment.payment_option;
        client.recurring_payment_consent = form.payment.recurring_payment_consent.unwrap_or(false);

        client.advance_status(EnrollmentStatus::FinalDataCollectedPendingPayment);
        client.updated_at = Utc::now();
        self.store.update_client(client)?;
        Ok(())
    }

    /// Runs the selected payment workflow via the orchestrator.
    pub fn final_payment(
        &self,
        mut client: Client,
        details: PaymentDetailsSection,
    ) -> Result<PaymentOutcome, PhaseError> {
        let option = details
            .payment_option
            .or(client.payment_option)
            .ok_or_else(|| PhaseError::validation("paymentDetails.paymentOption is required"))?;
        let card_nonce = details
            .card_nonce
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| PhaseError::validation("paymentDetails.cardNonce is required"))?;
        let due_today = details.due_today_amount.unwrap_or(0);

        client.payment_option = Some(option);
        let outcome = self
            .payments
            .collect(&mut client, card_nonce, due_today, option)?;
        Ok(outcome)
    }
}

/// Merge semantics for contact fields: absent fields leave the stored
/// value alone, so a replayed submission only adds information.
fn apply_contact(client: &mut Client, section: &ContactInfoSection) {
    if let Some(email) = section
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
    {
        client.email = email.to_string();
    }
    if section.first_name.is_some() {
        client.first_name = section.first_name.clone();
    }
    if section.last_name.is_some() {
        client.last_name = section.last_name.clone();
    }
    if section.phone.is_some() {
        client.phone = section.phone.clone();
    }
    if section.city.is_some() {
        client.city = section.city.clone();
    }
    if section.state.is_some() {
        client.state = section.state.clone();
    }
    if section.zipcode.is_some() {
        client.zipcode = section.zipcode.clone();
    }
    if section.sex.is_some() {
        client.sex = section.sex.clone();
    }
    if let Some(consent) = section.consent_to_contact {
        client.consent_to_contact = consent;
    }
}

/// Keeps the original submitted text in the `*_other` fallback when the
/// canonical lookup missed, preferring an explicitly supplied fallback.
fn fallback_text(
    unresolved: bool,
    submitted: Option<&str>,
    explicit_other: Option<&str>,
) -> Option<String> {
    let explicit = explicit_other
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    if explicit.is_some() {
        return explicit;
    }
    if unresolved {
        return submitted
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
    }
    None
}

fn validate_final_form(form: &FinalFormPayload) -> Vec<String> {
    let mut details = Vec::new();
    let contact = &form.personal_info.contact;
    let referral = &form.personal_info.referral;

    let require = |value: Option<&str>, field: &str, details: &mut Vec<String>| {
        if value.map(str::trim).filter(|v| !v.is_empty()).is_none() {
            details.push(format!("{field} is required"));
        }
    };

    require(contact.first_name.as_deref(), "personalInfo.firstName", &mut details);
    require(contact.last_name.as_deref(), "personalInfo.lastName", &mut details);
    require(contact.email.as_deref(), "personalInfo.email", &mut details);
    require(contact.phone.as_deref(), "personalInfo.phone", &mut details);
    require(
        referral.selected_program.as_deref(),
        "personalInfo.selectedProgram",
        &mut details,
    );
    require(
        form.scheduling.selected_class_id.as_deref(),
        "scheduling.selectedClassId",
        &mut details,
    );
    if !form.documents.agreed_to_terms.unwrap_or(false) {
        details.push("documents.agreedToTerms must be accepted".to_string());
    }
    require(
        form.documents.signature.as_deref(),
        "documents.signature",
        &mut details,
    );
    match form.payment.payment_option {
        None => details.push("payment.paymentOption is required".to_string()),
        Some(PaymentOption::AutopayWeekly) => {
            if !form.payment.recurring_payment_consent.unwrap_or(false) {
                details.push(
                    "payment.recurringPaymentConsent is required for weekly autopay".to_string(),
                );
            }
        }
        Some(_) => {}
    }

    details
}
