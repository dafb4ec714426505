use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Duration;

use crate::config::PaymentsConfig;
use crate::enrollment::domain::{
    ClassBlock, ClassBlockId, ClassDay, Client, ClientId, County, CountyId, PaymentRecord, Program,
    ProgramGroup, ProgramGroupId, ProgramId, ReferralSource, ReferralSourceId, ReferralSourceType,
    ReferralSourceTypeId,
};
use crate::enrollment::payments::{
    CardRequest, ChargeRequest, CustomerRequest, PaymentProcessor, ProcessorCard, ProcessorCharge,
    ProcessorCustomer, ProcessorError, ProcessorErrorDetail, ProcessorSubscription,
    SubscriptionRequest,
};
use crate::enrollment::service::{ContactInfoSection, EnrollmentService, ProgramInfoSection};
use crate::enrollment::store::{ClassEnrollment, EnrollmentStore, StoreError};
use crate::enrollment::token::TokenIssuer;

/// In-memory store with a seeded catalog and a toggle for failing ledger
/// writes.
#[derive(Default)]
pub(super) struct MemoryStore {
    clients: Mutex<HashMap<ClientId, Client>>,
    counties: Mutex<Vec<County>>,
    source_types: Mutex<Vec<ReferralSourceType>>,
    sources: Mutex<Vec<ReferralSource>>,
    groups: Mutex<Vec<ProgramGroup>>,
    programs: Mutex<Vec<Program>>,
    classes: Mutex<HashMap<ClassBlockId, ClassBlock>>,
    payments: Mutex<Vec<PaymentRecord>>,
    pub(super) fail_ledger: AtomicBool,
}

impl MemoryStore {
    pub(super) fn seeded() -> Self {
        let store = Self::default();
        {
            let mut counties = store.counties.lock().expect("lock");
            counties.push(County {
                id: CountyId("county-polk".to_string()),
                name: "Polk".to_string(),
            });
            counties.push(County {
                id: CountyId("county-dallas".to_string()),
                name: "Dallas".to_string(),
            });
        }
        {
            let mut types = store.source_types.lock().expect("lock");
            types.push(ReferralSourceType {
                id: ReferralSourceTypeId("type-probation".to_string()),
                name: "Probation".to_string(),
            });
        }
        {
            let mut sources = store.sources.lock().expect("lock");
            sources.push(ReferralSource {
                id: ReferralSourceId("source-polk-probation".to_string()),
                county: CountyId("county-polk".to_string()),
                source_type: ReferralSourceTypeId("type-probation".to_string()),
            });
        }
        {
            let mut groups = store.groups.lock().expect("lock");
            groups.push(ProgramGroup {
                id: ProgramGroupId("group-iop".to_string()),
                code: "IOP".to_string(),
                spots_per_instance: 2,
            });
            groups.push(ProgramGroup {
                id: ProgramGroupId("group-dv".to_string()),
                code: "DV".to_string(),
                spots_per_instance: 10,
            });
        }
        {
            let mut programs = store.programs.lock().expect("lock");
            programs.push(Program {
                id: ProgramId("program-iop".to_string()),
                code: "IOP-12".to_string(),
                name: "Intensive Outpatient".to_string(),
                group: ProgramGroupId("group-iop".to_string()),
                enrollment_fee: 15_000,
                session_cost: 4_500,
                duration_weeks: 12,
            });
            programs.push(Program {
                id: ProgramId("program-dv".to_string()),
                code: "DV-24".to_string(),
                name: "Domestic Violence Education".to_string(),
                group: ProgramGroupId("group-dv".to_string()),
                enrollment_fee: 0,
                session_cost: 3_000,
                duration_weeks: 24,
            });
        }
        {
            let mut classes = store.classes.lock().expect("lock");
            for class in [
                ClassBlock {
                    id: ClassBlockId("class-iop-mon".to_string()),
                    group: ProgramGroupId("group-iop".to_string()),
                    day: ClassDay::Monday,
                    time: "18:00".to_string(),
                    parallel_instances: 1,
                    enrolled: Vec::new(),
                    active: true,
                },
                ClassBlock {
                    id: ClassBlockId("class-iop-full".to_string()),
                    group: ProgramGroupId("group-iop".to_string()),
                    day: ClassDay::Wednesday,
                    time: "18:00".to_string(),
                    parallel_instances: 1,
                    enrolled: vec![
                        ClientId("other-1".to_string()),
                        ClientId("other-2".to_string()),
                    ],
                    active: true,
                },
                ClassBlock {
                    id: ClassBlockId("class-iop-retired".to_string()),
                    group: ProgramGroupId("group-iop".to_string()),
                    day: ClassDay::Friday,
                    time: "09:00".to_string(),
                    parallel_instances: 1,
                    enrolled: Vec::new(),
                    active: false,
                },
                ClassBlock {
                    id: ClassBlockId("class-dv-tue".to_string()),
                    group: ProgramGroupId("group-dv".to_string()),
                    day: ClassDay::Tuesday,
                    time: "17:30".to_string(),
                    parallel_instances: 1,
                    enrolled: Vec::new(),
                    active: true,
                },
            ] {
                classes.insert(class.id.clone(), class);
            }
        }
        store
    }

    pub(super) fn class(&self, id: &str) -> ClassBlock {
        self.classes
            .lock()
            .expect("lock")
            .get(&ClassBlockId(id.to_string()))
            .cloned()
            .expect("class present")
    }

    pub(super) fn client(&self, id: &ClientId) -> Client {
        self.clients
            .lock()
            .expect("lock")
            .get(id)
            .cloned()
            .expect("client present")
    }

    pub(super) fn ledger(&self) -> Vec<PaymentRecord> {
        self.payments.lock().expect("lock").clone()
    }
}

impl EnrollmentStore for MemoryStore {
    fn find_client_by_email(&self, email: &str) -> Result<Option<Client>, StoreError> {
        let guard = self.clients.lock().expect("lock");
        Ok(guard
            .values()
            .find(|client| client.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn fetch_client(&self, id: &ClientId) -> Result<Option<Client>, StoreError> {
        let guard = self.clients.lock().expect("lock");
        Ok(guard.get(id).cloned())
    }

    fn insert_client(&self, client: Client) -> Result<Client, StoreError> {
        let mut guard = self.clients.lock().expect("lock");
        if guard.contains_key(&client.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(client.id.clone(), client.clone());
        Ok(client)
    }

    fn update_client(&self, client: Client) -> Result<(), StoreError> {
        let mut guard = self.clients.lock().expect("lock");
        if !guard.contains_key(&client.id) {
            return Err(StoreError::NotFound);
        }
        guard.insert(client.id.clone(), client);
        Ok(())
    }

    fn find_county_by_name(&self, name: &str) -> Result<Option<County>, StoreError> {
        let guard = self.counties.lock().expect("lock");
        Ok(guard
            .iter()
            .find(|county| county.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    fn find_referral_source_type_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ReferralSourceType>, StoreError> {
        let guard = self.source_types.lock().expect("lock");
        Ok(guard
            .iter()
            .find(|source_type| source_type.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    fn find_referral_source(
        &self,
        county: &CountyId,
        source_type: &ReferralSourceTypeId,
    ) -> Result<Option<ReferralSource>, StoreError> {
        let guard = self.sources.lock().expect("lock");
        Ok(guard
            .iter()
            .find(|source| &source.county == county && &source.source_type == source_type)
            .cloned())
    }

    fn find_program_by_code(&self, code: &str) -> Result<Option<Program>, StoreError> {
        let guard = self.programs.lock().expect("lock");
        Ok(guard
            .iter()
            .find(|program| program.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    fn fetch_program(&self, id: &ProgramId) -> Result<Option<Program>, StoreError> {
        let guard = self.programs.lock().expect("lock");
        Ok(guard.iter().find(|program| &program.id == id).cloned())
    }

    fn fetch_program_group(&self, id: &ProgramGroupId) -> Result<Option<ProgramGroup>, StoreError> {
        let guard = self.groups.lock().expect("lock");
        Ok(guard.iter().find(|group| &group.id == id).cloned())
    }

    fn fetch_class(&self, id: &ClassBlockId) -> Result<Option<ClassBlock>, StoreError> {
        let guard = self.classes.lock().expect("lock");
        Ok(guard.get(id).cloned())
    }

    fn enroll_client_if_capacity(
        &self,
        class_id: &ClassBlockId,
        client: &ClientId,
        total_spots: usize,
    ) -> Result<ClassEnrollment, StoreError> {
        let mut guard = self.classes.lock().expect("lock");
        let class = guard.get_mut(class_id).ok_or(StoreError::NotFound)?;
        if class.enrolled.contains(client) {
            return Ok(ClassEnrollment::AlreadyEnrolled);
        }
        if class.enrolled.len() >= total_spots {
            return Ok(ClassEnrollment::Full);
        }
        class.enrolled.push(client.clone());
        Ok(ClassEnrollment::Added)
    }

    fn insert_payment(&self, record: PaymentRecord) -> Result<PaymentRecord, StoreError> {
        if self.fail_ledger.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("ledger offline".to_string()));
        }
        if record.processor_payment_id.trim().is_empty() {
            return Err(StoreError::Invalid(
                "processor payment id is required".to_string(),
            ));
        }
        let mut guard = self.payments.lock().expect("lock");
        if guard
            .iter()
            .any(|existing| existing.processor_payment_id == record.processor_payment_id)
        {
            return Err(StoreError::Conflict);
        }
        guard.push(record.clone());
        Ok(record)
    }
}

/// Fake processor recording every request, with per-step failure toggles.
#[derive(Default)]
pub(super) struct RecordingProcessor {
    pub(super) charges: Mutex<Vec<ChargeRequest>>,
    pub(super) customers: Mutex<Vec<CustomerRequest>>,
    pub(super) cards: Mutex<Vec<CardRequest>>,
    pub(super) subscriptions: Mutex<Vec<SubscriptionRequest>>,
    pub(super) fail_charges: AtomicBool,
    pub(super) fail_customers: AtomicBool,
    pub(super) fail_subscriptions: AtomicBool,
    sequence: AtomicU64,
}

impl RecordingProcessor {
    fn next(&self, prefix: &str) -> String {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{n:04}")
    }

    fn declined() -> ProcessorError {
        ProcessorError::Declined {
            details: vec![ProcessorErrorDetail {
                category: "PAYMENT_METHOD_ERROR".to_string(),
                code: "CARD_DECLINED".to_string(),
                detail: Some("Card declined".to_string()),
            }],
        }
    }

    pub(super) fn charge_count(&self) -> usize {
        self.charges.lock().expect("lock").len()
    }

    pub(super) fn customer_count(&self) -> usize {
        self.customers.lock().expect("lock").len()
    }
}

impl PaymentProcessor for RecordingProcessor {
    fn create_payment(&self, request: ChargeRequest) -> Result<ProcessorCharge, ProcessorError> {
        if self.fail_charges.load(Ordering::Relaxed) {
            return Err(Self::declined());
        }
        let payment_id = self.next("pay");
        self.charges.lock().expect("lock").push(request);
        Ok(ProcessorCharge {
            payment_id,
            status: "COMPLETED".to_string(),
        })
    }

    fn create_customer(
        &self,
        request: CustomerRequest,
    ) -> Result<ProcessorCustomer, ProcessorError> {
        if self.fail_customers.load(Ordering::Relaxed) {
            return Err(ProcessorError::Transport {
                status: Some(502),
                message: "bad gateway".to_string(),
            });
        }
        let customer_id = self.next("cust");
        self.customers.lock().expect("lock").push(request);
        Ok(ProcessorCustomer { customer_id })
    }

    fn create_card(&self, request: CardRequest) -> Result<ProcessorCard, ProcessorError> {
        let card_id = self.next("card");
        self.cards.lock().expect("lock").push(request);
        Ok(ProcessorCard { card_id })
    }

    fn create_subscription(
        &self,
        request: SubscriptionRequest,
    ) -> Result<ProcessorSubscription, ProcessorError> {
        if self.fail_subscriptions.load(Ordering::Relaxed) {
            return Err(Self::declined());
        }
        let subscription_id = self.next("sub");
        self.subscriptions.lock().expect("lock").push(request);
        Ok(ProcessorSubscription {
            subscription_id,
            status: "ACTIVE".to_string(),
        })
    }
}

pub(super) fn payments_config() -> PaymentsConfig {
    PaymentsConfig {
        location_id: Some("LOC-TEST".to_string()),
        weekly_plan_id: Some("PLAN-WEEKLY".to_string()),
        currency: "USD".to_string(),
    }
}

pub(super) fn token_issuer() -> TokenIssuer {
    TokenIssuer::with_secret(vec![9u8; 32], Duration::seconds(3600))
}

pub(super) fn build_service() -> (
    Arc<EnrollmentService<MemoryStore, RecordingProcessor>>,
    Arc<MemoryStore>,
    Arc<RecordingProcessor>,
) {
    let store = Arc::new(MemoryStore::seeded());
    let processor = Arc::new(RecordingProcessor::default());
    let service = Arc::new(EnrollmentService::new(
        store.clone(),
        Some(processor.clone()),
        token_issuer(),
        payments_config(),
    ));
    (service, store, processor)
}

pub(super) fn contact_section(email: &str) -> ContactInfoSection {
    ContactInfoSection {
        first_name: Some("Avery".to_string()),
        last_name: Some("Quinn".to_string()),
        email: Some(email.to_string()),
        phone: Some("515-555-0100".to_string()),
        city: Some("Des Moines".to_string()),
        state: Some("IA".to_string()),
        zipcode: Some("50309".to_string()),
        sex: Some("F".to_string()),
        consent_to_contact: Some(true),
    }
}

pub(super) fn program_section() -> ProgramInfoSection {
    ProgramInfoSection {
        county: Some("Polk".to_string()),
        county_other: None,
        referral_source: Some("Probation".to_string()),
        referral_source_other: None,
        selected_program: Some("IOP-12".to_string()),
        why_referred: Some("court order".to_string()),
    }
}
