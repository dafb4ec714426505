use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for client records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramGroupId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassBlockId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountyId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferralSourceTypeId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferralSourceId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentRecordId(pub String);

/// Strictly advancing process marker for the enrollment wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    ContactInfoCollected,
    ProgramInfoCollected,
    ScheduleSelected,
    ConsentAgreed,
    FinalDataCollectedPendingPayment,
    EnrollmentComplete,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::ContactInfoCollected => "contact_info_collected",
            EnrollmentStatus::ProgramInfoCollected => "program_info_collected",
            EnrollmentStatus::ScheduleSelected => "schedule_selected",
            EnrollmentStatus::ConsentAgreed => "consent_agreed",
            EnrollmentStatus::FinalDataCollectedPendingPayment => {
                "final_data_collected_pending_payment"
            }
            EnrollmentStatus::EnrollmentComplete => "enrollment_complete",
        }
    }
}

/// Billing state for a client, doubling as the persisted step marker for
/// the autopay setup pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    PendingEnrollmentFee,
    PendingSubscription,
    ActiveAutopay,
    ActivePaidFull,
    ActivePaidEnrollmentFee,
    PaymentIssue,
    Completed,
    OnHold,
    Cancelled,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::PendingEnrollmentFee => "pending_enrollment_fee",
            PaymentStatus::PendingSubscription => "pending_subscription",
            PaymentStatus::ActiveAutopay => "active_autopay",
            PaymentStatus::ActivePaidFull => "active_paid_full",
            PaymentStatus::ActivePaidEnrollmentFee => "active_paid_enrollment_fee",
            PaymentStatus::PaymentIssue => "payment_issue",
            PaymentStatus::Completed => "completed",
            PaymentStatus::OnHold => "on_hold",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

/// Payment plan selected on the final form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOption {
    FullProgram,
    PayAsYouGo,
    AutopayWeekly,
}

impl PaymentOption {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentOption::FullProgram => "full_program",
            PaymentOption::PayAsYouGo => "pay_as_you_go",
            PaymentOption::AutopayWeekly => "autopay_weekly",
        }
    }
}

/// Ledger classification for a recorded transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    EnrollmentFee,
    SessionFeeSubscription,
    SessionFeePayg,
    ProgramFeePif,
    Refund,
    Other,
}

impl PaymentKind {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentKind::EnrollmentFee => "enrollment_fee",
            PaymentKind::SessionFeeSubscription => "session_fee_subscription",
            PaymentKind::SessionFeePayg => "session_fee_payg",
            PaymentKind::ProgramFeePif => "program_fee_pif",
            PaymentKind::Refund => "refund",
            PaymentKind::Other => "other",
        }
    }
}

/// The central mutable aggregate: one enrollee moving through the funnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    /// Generated once at creation, immutable afterwards.
    pub public_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub sex: Option<String>,
    pub consent_to_contact: bool,
    pub county: Option<CountyId>,
    pub county_other: Option<String>,
    pub referral_source: Option<ReferralSourceId>,
    pub referral_source_other: Option<String>,
    pub why_referred: Option<String>,
    pub selected_program: Option<ProgramId>,
    pub class: Option<ClassBlockId>,
    pub agreed_to_terms: bool,
    pub signature: Option<String>,
    pub payment_option: Option<PaymentOption>,
    pub recurring_payment_consent: bool,
    pub payment_status: Option<PaymentStatus>,
    pub processor_customer_id: Option<String>,
    pub card_on_file_id: Option<String>,
    pub subscription_id: Option<String>,
    pub enrollment_status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Fresh record created on the first contact-info submission.
    pub fn new(id: ClientId, email: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            public_id: Uuid::new_v4().to_string(),
            first_name: None,
            last_name: None,
            email,
            phone: None,
            city: None,
            state: None,
            zipcode: None,
            sex: None,
            consent_to_contact: false,
            county: None,
            county_other: None,
            referral_source: None,
            referral_source_other: None,
            why_referred: None,
            selected_program: None,
            class: None,
            agreed_to_terms: false,
            signature: None,
            payment_option: None,
            recurring_payment_consent: false,
            payment_status: None,
            processor_customer_id: None,
            card_on_file_id: None,
            subscription_id: None,
            enrollment_status: EnrollmentStatus::ContactInfoCollected,
            created_at: now,
            updated_at: now,
        }
    }

    /// Statuses only ever advance; replayed phases must not regress one.
    pub fn advance_status(&mut self, status: EnrollmentStatus) {
        if status > self.enrollment_status {
            self.enrollment_status = status;
        }
    }
}

/// Catalog entry for an offered program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub code: String,
    pub name: String,
    pub group: ProgramGroupId,
    /// Integer cents.
    pub enrollment_fee: u32,
    /// Integer cents per session.
    pub session_cost: u32,
    pub duration_weeks: u16,
}

/// Capacity-sharing cluster of programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramGroup {
    pub id: ProgramGroupId,
    pub code: String,
    pub spots_per_instance: u16,
}

/// Day of week for a scheduled class block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// A recurring scheduled block for one or more parallel instances of a
/// program group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassBlock {
    pub id: ClassBlockId,
    pub group: ProgramGroupId,
    pub day: ClassDay,
    pub time: String,
    pub parallel_instances: u16,
    pub enrolled: Vec<ClientId>,
    pub active: bool,
}

impl ClassBlock {
    pub fn total_spots(&self, group: &ProgramGroup) -> usize {
        usize::from(self.parallel_instances) * usize::from(group.spots_per_instance)
    }

    pub fn available_spots(&self, group: &ProgramGroup) -> usize {
        self.total_spots(group).saturating_sub(self.enrolled.len())
    }
}

/// Canonical county lookup entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct County {
    pub id: CountyId,
    pub name: String,
}

/// Canonical referral-source-type lookup entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralSourceType {
    pub id: ReferralSourceTypeId,
    pub name: String,
}

/// A (county, source type) pair with a derived display title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralSource {
    pub id: ReferralSourceId,
    pub county: CountyId,
    pub source_type: ReferralSourceTypeId,
}

impl ReferralSource {
    pub fn title(&self, county: &County, source_type: &ReferralSourceType) -> String {
        format!("{} - {}", county.name, source_type.name)
    }
}

/// Immutable ledger record of one financial transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentRecordId,
    pub client: ClientId,
    pub program: Option<ProgramId>,
    /// Processor transaction id; creation is refused without one.
    pub processor_payment_id: String,
    pub processor_customer_id: Option<String>,
    /// Integer cents.
    pub amount: u32,
    pub currency: String,
    /// Free text mirroring the processor-reported status.
    pub status: String,
    pub payment_date: NaiveDate,
    pub kind: PaymentKind,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}
