use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use enrollflow::enrollment::{
    CardRequest, ChargeRequest, ClassBlock, ClassBlockId, ClassDay, ClassEnrollment, Client,
    ClientId, County, CountyId, CustomerRequest, EnrollmentStore, PaymentRecord, PaymentProcessor,
    ProcessorCard, ProcessorCharge, ProcessorCustomer, ProcessorError, ProcessorSubscription,
    Program, ProgramGroup, ProgramGroupId, ProgramId, ReferralSource, ReferralSourceId,
    ReferralSourceType, ReferralSourceTypeId, StoreError, SubscriptionRequest,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-process store backing the service until a database binding lands.
/// Ships with the current program catalog and referral lookups seeded.
pub(crate) struct InMemoryEnrollmentStore {
    clients: Mutex<HashMap<String, Client>>,
    counties: Vec<County>,
    source_types: Vec<ReferralSourceType>,
    sources: Vec<ReferralSource>,
    groups: Vec<ProgramGroup>,
    programs: Vec<Program>,
    classes: Mutex<HashMap<String, ClassBlock>>,
    ledger: Mutex<Vec<PaymentRecord>>,
}

impl InMemoryEnrollmentStore {
    pub(crate) fn seeded() -> Self {
        let iop = ProgramGroupId("group-iop".to_string());
        let dv = ProgramGroupId("group-dv".to_string());

        let counties = ["Polk", "Dallas", "Story", "Warren"]
            .into_iter()
            .map(|name| County {
                id: CountyId(format!("county-{}", name.to_ascii_lowercase())),
                name: name.to_string(),
            })
            .collect::<Vec<_>>();

        let source_types = ["Probation", "Parole", "DHS", "Attorney", "Self"]
            .into_iter()
            .map(|name| ReferralSourceType {
                id: ReferralSourceTypeId(format!("type-{}", name.to_ascii_lowercase())),
                name: name.to_string(),
            })
            .collect::<Vec<_>>();

        let mut sources = Vec::new();
        for county in &counties {
            for source_type in &source_types {
                sources.push(ReferralSource {
                    id: ReferralSourceId(format!(
                        "source-{}-{}",
                        county.name.to_ascii_lowercase(),
                        source_type.name.to_ascii_lowercase()
                    )),
                    county: county.id.clone(),
                    source_type: source_type.id.clone(),
                });
            }
        }

        let groups = vec![
            ProgramGroup {
                id: iop.clone(),
                code: "IOP".to_string(),
                spots_per_instance: 8,
            },
            ProgramGroup {
                id: dv.clone(),
                code: "DV".to_string(),
                spots_per_instance: 12,
            },
        ];

        let programs = vec![
            Program {
                id: ProgramId("program-iop".to_string()),
                code: "IOP-12".to_string(),
                name: "Intensive Outpatient".to_string(),
                group: iop.clone(),
                enrollment_fee: 15_000,
                session_cost: 4_500,
                duration_weeks: 12,
            },
            Program {
                id: ProgramId("program-dv".to_string()),
                code: "DV-24".to_string(),
                name: "Domestic Violence Education".to_string(),
                group: dv.clone(),
                enrollment_fee: 10_000,
                session_cost: 3_000,
                duration_weeks: 24,
            },
        ];

        let classes = [
            ("class-iop-mon", iop.clone(), ClassDay::Monday, "18:00", 2),
            ("class-iop-thu", iop, ClassDay::Thursday, "18:00", 1),
            ("class-dv-tue", dv.clone(), ClassDay::Tuesday, "17:30", 1),
            ("class-dv-sat", dv, ClassDay::Saturday, "09:00", 1),
        ]
        .into_iter()
        .map(|(id, group, day, time, parallel_instances)| {
            (
                id.to_string(),
                ClassBlock {
                    id: ClassBlockId(id.to_string()),
                    group,
                    day,
                    time: time.to_string(),
                    parallel_instances,
                    enrolled: Vec::new(),
                    active: true,
                },
            )
        })
        .collect::<HashMap<_, _>>();

        Self {
            clients: Mutex::new(HashMap::new()),
            counties,
            source_types,
            sources,
            groups,
            programs,
            classes: Mutex::new(classes),
            ledger: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn ledger(&self) -> Vec<PaymentRecord> {
        self.ledger.lock().expect("ledger mutex poisoned").clone()
    }
}

impl EnrollmentStore for InMemoryEnrollmentStore {
    fn find_client_by_email(&self, email: &str) -> Result<Option<Client>, StoreError> {
        let guard = self.clients.lock().expect("client mutex poisoned");
        Ok(guard
            .values()
            .find(|c| c.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn fetch_client(&self, id: &ClientId) -> Result<Option<Client>, StoreError> {
        let guard = self.clients.lock().expect("client mutex poisoned");
        Ok(guard.get(&id.0).cloned())
    }

    fn insert_client(&self, client: Client) -> Result<Client, StoreError> {
        let mut guard = self.clients.lock().expect("client mutex poisoned");
        if guard.contains_key(&client.id.0) {
            return Err(StoreError::Conflict);
        }
        guard.insert(client.id.0.clone(), client.clone());
        Ok(client)
    }

    fn update_client(&self, client: Client) -> Result<(), StoreError> {
        let mut guard = self.clients.lock().expect("client mutex poisoned");
        if !guard.contains_key(&client.id.0) {
            return Err(StoreError::NotFound);
        }
        guard.insert(client.id.0.clone(), client);
        Ok(())
    }

    fn find_county_by_name(&self, name: &str) -> Result<Option<County>, StoreError> {
        Ok(self
            .counties
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
            .cloned())
    }

    fn find_referral_source_type_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ReferralSourceType>, StoreError> {
        Ok(self
            .source_types
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
            .cloned())
    }

    fn find_referral_source(
        &self,
        county: &CountyId,
        source_type: &ReferralSourceTypeId,
    ) -> Result<Option<ReferralSource>, StoreError> {
        Ok(self
            .sources
            .iter()
            .find(|s| &s.county == county && &s.source_type == source_type)
            .cloned())
    }

    fn find_program_by_code(&self, code: &str) -> Result<Option<Program>, StoreError> {
        Ok(self
            .programs
            .iter()
            .find(|p| p.code.eq_ignore_ascii_case(code.trim()))
            .cloned())
    }

    fn fetch_program(&self, id: &ProgramId) -> Result<Option<Program>, StoreError> {
        Ok(self.programs.iter().find(|p| &p.id == id).cloned())
    }

    fn fetch_program_group(&self, id: &ProgramGroupId) -> Result<Option<ProgramGroup>, StoreError> {
        Ok(self.groups.iter().find(|g| &g.id == id).cloned())
    }

    fn fetch_class(&self, id: &ClassBlockId) -> Result<Option<ClassBlock>, StoreError> {
        let guard = self.classes.lock().expect("class mutex poisoned");
        Ok(guard.get(&id.0).cloned())
    }

    fn enroll_client_if_capacity(
        &self,
        class_id: &ClassBlockId,
        client: &ClientId,
        total_spots: usize,
    ) -> Result<ClassEnrollment, StoreError> {
        let mut guard = self.classes.lock().expect("class mutex poisoned");
        let class = guard.get_mut(&class_id.0).ok_or(StoreError::NotFound)?;
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
        if record.processor_payment_id.is_empty() {
            return Err(StoreError::Invalid(
                "processor payment id is required".to_string(),
            ));
        }
        let mut guard = self.ledger.lock().expect("ledger mutex poisoned");
        if guard
            .iter()
            .any(|r| r.processor_payment_id == record.processor_payment_id)
        {
            return Err(StoreError::Conflict);
        }
        guard.push(record.clone());
        Ok(record)
    }
}

/// Stand-in processor for demo runs: approves everything and mints
/// sequential ids so the printed transitions are easy to follow.
#[derive(Default)]
pub(crate) struct DemoProcessor {
    sequence: AtomicUsize,
}

impl DemoProcessor {
    fn next(&self, prefix: &str) -> String {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        format!("{prefix}-{n:04}")
    }
}

impl PaymentProcessor for DemoProcessor {
    fn create_payment(&self, _request: ChargeRequest) -> Result<ProcessorCharge, ProcessorError> {
        Ok(ProcessorCharge {
            payment_id: self.next("demo-pay"),
            status: "COMPLETED".to_string(),
        })
    }

    fn create_customer(
        &self,
        _request: CustomerRequest,
    ) -> Result<ProcessorCustomer, ProcessorError> {
        Ok(ProcessorCustomer {
            customer_id: self.next("demo-cust"),
        })
    }

    fn create_card(&self, _request: CardRequest) -> Result<ProcessorCard, ProcessorError> {
        Ok(ProcessorCard {
            card_id: self.next("demo-card"),
        })
    }

    fn create_subscription(
        &self,
        _request: SubscriptionRequest,
    ) -> Result<ProcessorSubscription, ProcessorError> {
        Ok(ProcessorSubscription {
            subscription_id: self.next("demo-sub"),
            status: "ACTIVE".to_string(),
        })
    }
}
