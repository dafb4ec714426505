use super::domain::{ClassBlockId, Client, EnrollmentStatus};
use super::store::{ClassEnrollment, EnrollmentStore, StoreError};

/// Why a class assignment was refused.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("class {0} does not exist")]
    ClassNotFound(String),
    #[error("class {0} is not currently offered")]
    ClassInactive(String),
    #[error("no program selected yet; submit program info before scheduling")]
    NoProgramSelected,
    #[error("catalog configuration problem: {0}")]
    Configuration(String),
    #[error("class belongs to group {class_group} but program {program_name} is in group {program_group}")]
    GroupMismatch {
        program_name: String,
        program_group: String,
        class_group: String,
    },
    #[error("class {0} has no open spots")]
    Full(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validates that a candidate class matches the client's program group and
/// still has room, then enrolls the client and advances their record.
///
/// The roster append is capacity-checked inside the store so that two
/// simultaneous requests for the last spot cannot both land; the follow-up
/// write to the client record is a separate document update.
pub fn assign_class<S: EnrollmentStore>(
    store: &S,
    client: &mut Client,
    class_id: &ClassBlockId,
) -> Result<(), ScheduleError> {
    let class = store
        .fetch_class(class_id)?
        .ok_or_else(|| ScheduleError::ClassNotFound(class_id.0.clone()))?;
    if !class.active {
        return Err(ScheduleError::ClassInactive(class_id.0.clone()));
    }

    let program_id = client
        .selected_program
        .as_ref()
        .ok_or(ScheduleError::NoProgramSelected)?;
    let program = store.fetch_program(program_id)?.ok_or_else(|| {
        ScheduleError::Configuration(format!("selected program {} is missing", program_id.0))
    })?;
    let program_group = store.fetch_program_group(&program.group)?.ok_or_else(|| {
        ScheduleError::Configuration(format!("program group {} is missing", program.group.0))
    })?;
    let class_group = store.fetch_program_group(&class.group)?.ok_or_else(|| {
        ScheduleError::Configuration(format!("class group {} is missing", class.group.0))
    })?;

    if class_group.id != program_group.id {
        return Err(ScheduleError::GroupMismatch {
            program_name: program.name.clone(),
            program_group: program_group.code.clone(),
            class_group: class_group.code.clone(),
        });
    }

    let total_spots = class.total_spots(&class_group);
    match store.enroll_client_if_capacity(class_id, &client.id, total_spots)? {
        ClassEnrollment::Added => {
            tracing::info!(
                client = client.id.0,
                class = class_id.0,
                "client enrolled into class block"
            );
        }
        ClassEnrollment::AlreadyEnrolled => {}
        ClassEnrollment::Full => return Err(ScheduleError::Full(class_id.0.clone())),
    }

    client.class = Some(class_id.clone());
    client.advance_status(EnrollmentStatus::ScheduleSelected);
    Ok(())
}
