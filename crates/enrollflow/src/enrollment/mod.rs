//! The phased enrollment workflow: token issuance, reference resolution,
//! class capacity checks, phase handlers, and payment orchestration
//! behind a single phase-dispatch endpoint.

pub mod capacity;
pub mod domain;
pub mod payments;
pub mod resolver;
pub mod router;
pub mod service;
pub mod store;
pub mod token;

#[cfg(test)]
mod tests;

pub use capacity::{assign_class, ScheduleError};
pub use domain::{
    ClassBlock, ClassBlockId, ClassDay, Client, ClientId, County, CountyId, EnrollmentStatus,
    PaymentKind, PaymentOption, PaymentRecord, PaymentRecordId, PaymentStatus, Program,
    ProgramGroup, ProgramGroupId, ProgramId, ReferralSource, ReferralSourceId, ReferralSourceType,
    ReferralSourceTypeId,
};
pub use payments::{
    CardRequest, ChargeRequest, CustomerRequest, PaymentError, PaymentOrchestrator, PaymentOutcome,
    PaymentProcessor, ProcessorCard, ProcessorCharge, ProcessorCustomer, ProcessorError,
    ProcessorErrorDetail, ProcessorSubscription, SubscriptionRequest,
};
pub use resolver::ReferenceResolver;
pub use router::{enrollment_router, SubmissionPhase, SubmissionRequest};
pub use service::{
    ConsentSection, ContactInfoSection, ContactOutcome, EnrollmentService, FinalFormPayload,
    FinalPersonalInfo, PaymentDetailsSection, PaymentSelectionSection, PhaseError,
    ProgramInfoSection, SchedulingSection,
};
pub use store::{ClassEnrollment, EnrollmentStore, StoreError};
pub use token::{TokenError, TokenIssuer};
