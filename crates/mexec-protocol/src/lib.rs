//! # mexec-protocol — marketplace executor events
//!
//! Shared event taxonomy for an executor that runs work on a decentralized
//! market of providers. Producers (negotiation, payments, the worker
//! scheduler) build these events; consumers (loggers, summaries, UIs) read
//! them.
//!
//! The crate is dependency-light and has no runtime; it is a pure contract.
//!
//! ## Module Overview
//!
//! - [`ids`] — Typed correlation ids (SubscriptionId, ProposalId, AgreementId, TaskId, ...)
//! - [`exc`] — ExcInfo, the captured exception triple, and the HasExcInfo capability
//! - [`correlation`] — ProposalEvent, AgreementEvent, TaskEvent, ScriptEvent
//! - [`event`] — the leaf event structs, the closed `Event` union, extraction protocol
//! - [`node`] — NodeInfo provider properties
//! - [`error`] — ProtocolError, ProtocolResult

pub mod correlation;
pub mod error;
pub mod event;
pub mod exc;
pub mod ids;
pub mod node;

pub use correlation::{AgreementEvent, ProposalEvent, ScriptEvent, TaskEvent};
pub use error::{ProtocolError, ProtocolResult, parse_amount};
pub use event::{
    ActivityCreateFailed, ActivityCreated, AgreementConfirmed, AgreementCreated,
    AgreementRejected, CollectFailed, CommandExecuted, ComputationFinished, ComputationStarted,
    DownloadFinished, DownloadStarted, Event, GettingResults, InvoiceReceived, LifecyclePhase,
    NoProposalsConfirmed, PaymentAccepted, PaymentPrepared, PaymentQueued, ProposalConfirmed,
    ProposalFailed, ProposalReceived, ProposalRejected, ProposalResponded, ScriptFinished,
    ScriptSent, SubscriptionCreated, SubscriptionFailed, TaskAccepted, TaskRejected, TaskStarted,
    WorkerFinished, WorkerStarted,
};
pub use exc::{ExcInfo, HasExcInfo, SharedError};
pub use ids::{
    ActivityId, AgreementId, InvoiceId, ProposalId, ProviderId, SubscriptionId, TaskId,
};
pub use node::NodeInfo;
