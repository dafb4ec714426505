use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::{
    Client, EnrollmentStatus, PaymentKind, PaymentOption, PaymentRecord, PaymentRecordId,
    PaymentStatus, Program,
};
use super::store::{EnrollmentStore, StoreError};
use crate::config::PaymentsConfig;

/// One-time charge request against the processor.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub source_token: String,
    pub amount: u32,
    pub currency: String,
    pub location_id: String,
    pub idempotency_key: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProcessorCharge {
    pub payment_id: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct CustomerRequest {
    pub idempotency_key: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct ProcessorCustomer {
    pub customer_id: String,
}

#[derive(Debug, Clone)]
pub struct CardRequest {
    pub customer_id: String,
    pub source_token: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone)]
pub struct ProcessorCard {
    pub card_id: String,
}

#[derive(Debug, Clone)]
pub struct SubscriptionRequest {
    pub customer_id: String,
    pub card_id: String,
    pub plan_id: String,
    pub location_id: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone)]
pub struct ProcessorSubscription {
    pub subscription_id: String,
    pub status: String,
}

/// Structured error detail reported by the processor, passed through to
/// the caller for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorErrorDetail {
    pub category: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Failure talking to the payment processor: either a structured decline
/// in the response body, or a transport/auth failure from the client SDK.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProcessorError {
    #[error("payment processor declined the request")]
    Declined { details: Vec<ProcessorErrorDetail> },
    #[error("payment processor unreachable: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },
}

impl ProcessorError {
    pub fn details(&self) -> Vec<ProcessorErrorDetail> {
        match self {
            ProcessorError::Declined { details } => details.clone(),
            ProcessorError::Transport { .. } => Vec::new(),
        }
    }
}

/// Outbound port to the third-party payment processor. The concrete
/// binding is constructed at process start and injected, never reached
/// for as ambient global state.
pub trait PaymentProcessor: Send + Sync {
    fn create_payment(&self, request: ChargeRequest) -> Result<ProcessorCharge, ProcessorError>;
    fn create_customer(
        &self,
        request: CustomerRequest,
    ) -> Result<ProcessorCustomer, ProcessorError>;
    fn create_card(&self, request: CardRequest) -> Result<ProcessorCard, ProcessorError>;
    fn create_subscription(
        &self,
        request: SubscriptionRequest,
    ) -> Result<ProcessorSubscription, ProcessorError>;
}

/// Failure taxonomy surfaced by the payment phase.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment processing is not configured")]
    Unavailable,
    #[error("payment configuration problem: {0}")]
    Configuration(String),
    #[error("invalid payment request: {0}")]
    Validation(String),
    #[error(transparent)]
    Processor(ProcessorError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Successful result of the payment phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Charged { payment_id: String },
    SubscriptionActive { subscription_id: String },
}

/// Drives the financial workflows of the final payment phase against the
/// injected processor, with compensating status writes on failure.
pub struct PaymentOrchestrator<S, P> {
    store: Arc<S>,
    processor: Option<Arc<P>>,
    config: PaymentsConfig,
}

impl<S, P> PaymentOrchestrator<S, P>
where
    S: EnrollmentStore,
    P: PaymentProcessor,
{
    pub fn new(store: Arc<S>, processor: Option<Arc<P>>, config: PaymentsConfig) -> Self {
        Self {
            store,
            processor,
            config,
        }
    }

    /// Executes the workflow selected by `option` for a finalized client.
    ///
    /// The mutated `client` is persisted as each step lands, so a retried
    /// request resumes from the recorded markers instead of repeating
    /// completed external calls.
    pub fn collect(
        &self,
        client: &mut Client,
        card_nonce: &str,
        due_today: u32,
        option: PaymentOption,
    ) -> Result<PaymentOutcome, PaymentError> {
        let processor = self.processor.as_ref().ok_or(PaymentError::Unavailable)?;
        let location_id = self
            .config
            .location_id
            .as_deref()
            .ok_or_else(|| {
                tracing::error!("PAYMENTS_LOCATION_ID is not set; refusing to charge");
                PaymentError::Configuration("payment location id is not configured".to_string())
            })?
            .to_string();
        if card_nonce.trim().is_empty() {
            return Err(PaymentError::Validation(
                "a one-time card token is required".to_string(),
            ));
        }

        match option {
            PaymentOption::FullProgram | PaymentOption::PayAsYouGo => {
                self.collect_one_time(processor, &location_id, client, card_nonce, due_today, option)
            }
            PaymentOption::AutopayWeekly => {
                self.setup_autopay(processor, &location_id, client, card_nonce)
            }
        }
    }

    fn collect_one_time(
        &self,
        processor: &Arc<P>,
        location_id: &str,
        client: &mut Client,
        card_nonce: &str,
        due_today: u32,
        option: PaymentOption,
    ) -> Result<PaymentOutcome, PaymentError> {
        if due_today == 0 {
            return Err(PaymentError::Validation(
                "due-today amount must be greater than zero".to_string(),
            ));
        }

        let (paid_status, kind) = match option {
            PaymentOption::FullProgram => (PaymentStatus::ActivePaidFull, PaymentKind::ProgramFeePif),
            _ => (
                PaymentStatus::ActivePaidEnrollmentFee,
                PaymentKind::EnrollmentFee,
            ),
        };

        let charge = self.charge(processor, location_id, client, card_nonce, due_today, None)?;

        client.payment_status = Some(paid_status);
        client.advance_status(EnrollmentStatus::EnrollmentComplete);
        self.store.update_client(client.clone())?;

        self.record_ledger(client, &charge, due_today, kind);
        Ok(PaymentOutcome::Charged {
            payment_id: charge.payment_id,
        })
    }

    /// Sequential, non-atomic pipeline: enrollment fee, customer, card on
    /// file, subscription. Each completed step is persisted onto the
    /// client before the next begins.
    fn setup_autopay(
        &self,
        processor: &Arc<P>,
        location_id: &str,
        client: &mut Client,
        card_nonce: &str,
    ) -> Result<PaymentOutcome, PaymentError> {
        let plan_id = self.config.weekly_plan_id.as_deref().ok_or_else(|| {
            tracing::error!("PAYMENTS_WEEKLY_PLAN_ID is not set; cannot start autopay");
            PaymentError::Configuration("weekly subscription plan is not configured".to_string())
        })?;

        let program = self.required_program(client)?;

        let fee_already_collected = matches!(
            client.payment_status,
            Some(PaymentStatus::PendingSubscription) | Some(PaymentStatus::ActiveAutopay)
        );
        if program.enrollment_fee > 0 && !fee_already_collected {
            let charge = self.charge(
                processor,
                location_id,
                client,
                card_nonce,
                program.enrollment_fee,
                Some(format!("enrollment fee for {}", program.name)),
            )?;
            client.payment_status = Some(PaymentStatus::PendingSubscription);
            self.store.update_client(client.clone())?;
            self.record_ledger(client, &charge, program.enrollment_fee, PaymentKind::EnrollmentFee);
        }

        let customer_id = match client.processor_customer_id.clone() {
            Some(existing) => existing,
            None => {
                let customer = processor
                    .create_customer(CustomerRequest {
                        idempotency_key: Uuid::new_v4().to_string(),
                        given_name: client.first_name.clone(),
                        family_name: client.last_name.clone(),
                        email: client.email.clone(),
                    })
                    .map_err(|err| self.surface(client, err))?;
                client.processor_customer_id = Some(customer.customer_id.clone());
                self.store.update_client(client.clone())?;
                customer.customer_id
            }
        };

        let card_id = match client.card_on_file_id.clone() {
            Some(existing) => existing,
            None => {
                let card = processor
                    .create_card(CardRequest {
                        customer_id: customer_id.clone(),
                        source_token: card_nonce.to_string(),
                        idempotency_key: Uuid::new_v4().to_string(),
                    })
                    .map_err(|err| self.surface(client, err))?;
                client.card_on_file_id = Some(card.card_id.clone());
                self.store.update_client(client.clone())?;
                card.card_id
            }
        };

        let subscription = processor
            .create_subscription(SubscriptionRequest {
                customer_id,
                card_id,
                plan_id: plan_id.to_string(),
                location_id: location_id.to_string(),
                idempotency_key: Uuid::new_v4().to_string(),
            })
            .map_err(|err| self.surface(client, err))?;

        client.subscription_id = Some(subscription.subscription_id.clone());
        client.payment_status = Some(PaymentStatus::ActiveAutopay);
        client.advance_status(EnrollmentStatus::EnrollmentComplete);
        self.store.update_client(client.clone())?;

        Ok(PaymentOutcome::SubscriptionActive {
            subscription_id: subscription.subscription_id,
        })
    }

    /// One-time charge with a fresh idempotency key. A processor failure
    /// flips the client to `payment_issue` before surfacing.
    fn charge(
        &self,
        processor: &Arc<P>,
        location_id: &str,
        client: &mut Client,
        card_nonce: &str,
        amount: u32,
        note: Option<String>,
    ) -> Result<ProcessorCharge, PaymentError> {
        let request = ChargeRequest {
            source_token: card_nonce.to_string(),
            amount,
            currency: self.config.currency.clone(),
            location_id: location_id.to_string(),
            idempotency_key: Uuid::new_v4().to_string(),
            note,
        };

        match processor.create_payment(request) {
            Ok(charge) => Ok(charge),
            Err(err) => {
                tracing::warn!(client = client.id.0, %err, "charge failed");
                client.payment_status = Some(PaymentStatus::PaymentIssue);
                if let Err(store_err) = self.store.update_client(client.clone()) {
                    tracing::error!(
                        client = client.id.0,
                        %store_err,
                        "could not record payment_issue status after failed charge"
                    );
                }
                Err(PaymentError::Processor(err))
            }
        }
    }

    /// The charge is the source of truth; the ledger is best-effort
    /// bookkeeping. A duplicate processor payment id means the record is
    /// already there, anything else is logged and swallowed.
    fn record_ledger(
        &self,
        client: &Client,
        charge: &ProcessorCharge,
        amount: u32,
        kind: PaymentKind,
    ) {
        let record = PaymentRecord {
            id: PaymentRecordId(Uuid::new_v4().to_string()),
            client: client.id.clone(),
            program: client.selected_program.clone(),
            processor_payment_id: charge.payment_id.clone(),
            processor_customer_id: client.processor_customer_id.clone(),
            amount,
            currency: self.config.currency.clone(),
            status: charge.status.clone(),
            payment_date: Utc::now().date_naive(),
            kind,
            payment_method: Some("card".to_string()),
            notes: None,
        };

        match self.store.insert_payment(record) {
            Ok(_) => {}
            Err(StoreError::Conflict) => {
                tracing::info!(
                    payment = charge.payment_id,
                    "ledger record already present for processor payment"
                );
            }
            Err(err) => {
                tracing::error!(
                    client = client.id.0,
                    payment = charge.payment_id,
                    %err,
                    "ledger write failed after successful charge"
                );
            }
        }
    }

    fn required_program(&self, client: &Client) -> Result<Program, PaymentError> {
        let program_id = client.selected_program.as_ref().ok_or_else(|| {
            PaymentError::Validation("no program selected for this client".to_string())
        })?;
        self.store
            .fetch_program(program_id)?
            .ok_or_else(|| {
                PaymentError::Configuration(format!(
                    "selected program {} is missing from the catalog",
                    program_id.0
                ))
            })
    }

    fn surface(&self, client: &Client, err: ProcessorError) -> PaymentError {
        tracing::warn!(client = client.id.0, %err, "autopay pipeline step failed");
        PaymentError::Processor(err)
    }
}
