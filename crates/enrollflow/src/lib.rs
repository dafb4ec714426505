//! Enrollment funnel core: phased submission handling, reference
//! resolution, class capacity checks, and payment orchestration for a
//! behavioral-health program provider.

pub mod config;
pub mod enrollment;
pub mod error;
pub mod telemetry;
