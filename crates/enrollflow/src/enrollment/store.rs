use super::domain::{
    ClassBlock, ClassBlockId, Client, ClientId, County, CountyId, PaymentRecord, Program,
    ProgramGroup, ProgramGroupId, ProgramId, ReferralSource, ReferralSourceType,
    ReferralSourceTypeId,
};

/// Outcome of the atomic capacity-checked class enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassEnrollment {
    Added,
    AlreadyEnrolled,
    Full,
}

/// Storage abstraction over the backing document collections so the
/// enrollment workflow can be exercised in isolation.
pub trait EnrollmentStore: Send + Sync {
    fn find_client_by_email(&self, email: &str) -> Result<Option<Client>, StoreError>;
    fn fetch_client(&self, id: &ClientId) -> Result<Option<Client>, StoreError>;
    fn insert_client(&self, client: Client) -> Result<Client, StoreError>;
    fn update_client(&self, client: Client) -> Result<(), StoreError>;

    fn find_county_by_name(&self, name: &str) -> Result<Option<County>, StoreError>;
    fn find_referral_source_type_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ReferralSourceType>, StoreError>;
    fn find_referral_source(
        &self,
        county: &CountyId,
        source_type: &ReferralSourceTypeId,
    ) -> Result<Option<ReferralSource>, StoreError>;

    fn find_program_by_code(&self, code: &str) -> Result<Option<Program>, StoreError>;
    fn fetch_program(&self, id: &ProgramId) -> Result<Option<Program>, StoreError>;
    fn fetch_program_group(&self, id: &ProgramGroupId) -> Result<Option<ProgramGroup>, StoreError>;

    fn fetch_class(&self, id: &ClassBlockId) -> Result<Option<ClassBlock>, StoreError>;

    /// Append `client` to the class roster only while the roster holds
    /// fewer than `total_spots` entries, in one store-level operation.
    /// Re-enrolling an already-listed client reports `AlreadyEnrolled`
    /// without growing the roster.
    fn enroll_client_if_capacity(
        &self,
        class_id: &ClassBlockId,
        client: &ClientId,
        total_spots: usize,
    ) -> Result<ClassEnrollment, StoreError>;

    /// Ledger writes are idempotent per processor transaction: a record
    /// with an already-seen `processor_payment_id` yields `Conflict`, an
    /// empty one yields `Invalid`.
    fn insert_payment(&self, record: PaymentRecord) -> Result<PaymentRecord, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("invalid record: {0}")]
    Invalid(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
