use crate::infra::{DemoProcessor, InMemoryEnrollmentStore};
use clap::Args;
use std::sync::Arc;

use enrollflow::config::{EnrollmentConfig, PaymentsConfig};
use enrollflow::enrollment::{
    ConsentSection, ContactInfoSection, EnrollmentService, EnrollmentStore, PaymentDetailsSection,
    PaymentOption, PaymentOutcome, ProgramInfoSection, SchedulingSection, TokenIssuer,
};
use enrollflow::error::AppError;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Email for the synthetic enrollee
    #[arg(long, default_value = "demo@example.com")]
    pub(crate) email: String,
    /// Program code to enroll into
    #[arg(long, default_value = "IOP-12")]
    pub(crate) program: String,
    /// Class block to schedule
    #[arg(long, default_value = "class-iop-mon")]
    pub(crate) class: String,
    /// Payment plan: full_program, pay_as_you_go, or autopay_weekly
    #[arg(long, default_value = "autopay_weekly", value_parser = parse_payment_option)]
    pub(crate) payment_option: PaymentOption,
}

fn parse_payment_option(raw: &str) -> Result<PaymentOption, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "full_program" => Ok(PaymentOption::FullProgram),
        "pay_as_you_go" => Ok(PaymentOption::PayAsYouGo),
        "autopay_weekly" => Ok(PaymentOption::AutopayWeekly),
        other => Err(format!(
            "unknown payment option '{other}' (expected full_program, pay_as_you_go, or autopay_weekly)"
        )),
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        email,
        program,
        class,
        payment_option,
    } = args;

    println!("Enrollment workflow demo");
    println!("- enrollee: {email}");
    println!("- program:  {program} | class: {class} | plan: {}", payment_option.label());

    let store = Arc::new(InMemoryEnrollmentStore::seeded());
    let processor = Arc::new(DemoProcessor::default());
    let tokens = TokenIssuer::from_config(&EnrollmentConfig {
        token_secret_hex: None,
        token_ttl_secs: 3_600,
    });
    let payments = PaymentsConfig {
        location_id: Some("LOC-DEMO".to_string()),
        weekly_plan_id: Some("PLAN-WEEKLY-DEMO".to_string()),
        currency: "USD".to_string(),
    };
    let service = Arc::new(EnrollmentService::new(
        store.clone(),
        Some(processor),
        tokens,
        payments,
    ));

    let outcome = match service.contact_info(ContactInfoSection {
        first_name: Some("Demo".to_string()),
        last_name: Some("Enrollee".to_string()),
        email: Some(email.clone()),
        phone: Some("515-555-0100".to_string()),
        ..ContactInfoSection::default()
    }) {
        Ok(outcome) => outcome,
        Err(err) => {
            println!("  contact phase rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "\n[contactInfo] client {} created (status: {:?})",
        outcome.client.public_id, outcome.client.enrollment_status
    );

    macro_rules! phase {
        ($label:literal, $call:expr) => {{
            let client = match service.authorize(Some(&outcome.token)) {
                Ok(client) => client,
                Err(err) => {
                    println!("  token rejected: {err}");
                    return Ok(());
                }
            };
            if let Err(err) = $call(client) {
                println!("[{}] rejected: {err}", $label);
                return Ok(());
            }
            let after = store.find_client_by_email(&email).ok().flatten();
            if let Some(after) = after {
                println!("[{}] ok (status: {:?})", $label, after.enrollment_status);
            }
        }};
    }

    phase!("programInfo", |client| service.program_info(
        client,
        ProgramInfoSection {
            county: Some("Polk".to_string()),
            referral_source: Some("Probation".to_string()),
            selected_program: Some(program.clone()),
            why_referred: Some("court ordered".to_string()),
            ..ProgramInfoSection::default()
        }
    ));

    phase!("scheduling", |client| service.scheduling(
        client,
        SchedulingSection {
            selected_class_id: Some(class.clone()),
        }
    ));

    phase!("consent", |client| service.consent(
        client,
        ConsentSection {
            agreed_to_terms: Some(true),
            signature: Some("Demo Enrollee".to_string()),
        }
    ));

    let client = match service.authorize(Some(&outcome.token)) {
        Ok(client) => client,
        Err(err) => {
            println!("  token rejected: {err}");
            return Ok(());
        }
    };
    match service.final_payment(
        client,
        PaymentDetailsSection {
            card_nonce: Some("cnon:demo-card".to_string()),
            due_today_amount: Some(15_000),
            payment_option: Some(payment_option),
        },
    ) {
        Ok(PaymentOutcome::Charged { payment_id }) => {
            println!("[finalPayment] charged ({payment_id})");
        }
        Ok(PaymentOutcome::SubscriptionActive { subscription_id }) => {
            println!("[finalPayment] autopay subscription active ({subscription_id})");
        }
        Err(err) => {
            println!("[finalPayment] rejected: {err}");
            return Ok(());
        }
    }

    if let Ok(Some(final_state)) = store.find_client_by_email(&email) {
        println!(
            "\nFinal state: enrollment {:?} | payment {:?}",
            final_state.enrollment_status, final_state.payment_status
        );
    }
    for record in store.ledger() {
        println!(
            "Ledger: {} {} {} ({})",
            record.processor_payment_id,
            record.amount,
            record.currency,
            record.kind.label()
        );
    }

    Ok(())
}
