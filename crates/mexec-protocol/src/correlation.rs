//! Correlation capabilities.
//!
//! Each trait contributes one identifier and no behaviour. Field and accessor
//! names are the same on every event that carries them, so a consumer can join
//! otherwise unrelated events (an `AgreementCreated` and a later
//! `PaymentAccepted`) on the id alone.

use crate::ids::{AgreementId, ProposalId, TaskId};

/// An event about one negotiation proposal.
pub trait ProposalEvent {
    fn prop_id(&self) -> &ProposalId;
}

/// An event about one provider agreement.
pub trait AgreementEvent {
    fn agr_id(&self) -> &AgreementId;
}

/// An event about one unit of work.
pub trait TaskEvent {
    fn task_id(&self) -> &TaskId;
}

/// An event about a batch of commands sent to an activity.
///
/// Scripts always run under an agreement. They belong to a task only when
/// they are part of its accounting; setup and teardown scripts are not.
pub trait ScriptEvent: AgreementEvent {
    fn task_id(&self) -> Option<&TaskId>;
}
