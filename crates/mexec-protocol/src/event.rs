//! The executor event taxonomy.
//!
//! Every lifecycle milestone of a computation (market discovery,
//! negotiation, agreements, payments, activities, scripts, tasks and result
//! transfers) is one leaf struct below. [`Event`] is the closed union of all
//! of them; consumers match on it to get at phase-specific payloads and use
//! the correlation accessors (`sub_id`, `prop_id`, `agr_id`, `task_id`) to
//! group events without matching.
//!
//! Events are values. Nothing here mutates an event after construction; the
//! extraction protocol ([`Event::extract_exc_info`]) returns a cleaned copy.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::correlation::{AgreementEvent, ProposalEvent, ScriptEvent, TaskEvent};
use crate::error::{ProtocolError, ProtocolResult};
use crate::exc::{ExcInfo, HasExcInfo};
use crate::ids::*;
use crate::node::NodeInfo;

// ─── Computation ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputationStarted {}

/// Indicates successful completion if `exc_info` is `None` and a failure otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputationFinished {
    #[serde(skip)]
    pub exc_info: Option<ExcInfo>,
}

impl ComputationFinished {
    pub fn ok() -> Self {
        Self { exc_info: None }
    }

    pub fn failed(exc_info: ExcInfo) -> Self {
        Self {
            exc_info: Some(exc_info),
        }
    }
}

// ─── Market ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionCreated {
    pub sub_id: SubscriptionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionFailed {
    pub reason: String,
}

/// Collecting offers for a subscription failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectFailed {
    pub sub_id: SubscriptionId,
    pub reason: String,
}

// ─── Negotiation ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalReceived {
    pub prop_id: ProposalId,
    pub provider_id: ProviderId,
}

/// `reason: None` (no reason given) is a distinct outcome from `Some("")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRejected {
    pub prop_id: ProposalId,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalResponded {
    pub prop_id: ProposalId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalConfirmed {
    pub prop_id: ProposalId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalFailed {
    pub prop_id: ProposalId,
    pub reason: String,
}

/// No proposal was confirmed within `timeout`, out of `num_offers` offers seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoProposalsConfirmed {
    pub num_offers: u64,
    pub timeout: Duration,
}

// ─── Agreements ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementCreated {
    pub agr_id: AgreementId,
    pub provider_id: NodeInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementConfirmed {
    pub agr_id: AgreementId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementRejected {
    pub agr_id: AgreementId,
}

// ─── Payments ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAccepted {
    pub agr_id: AgreementId,
    pub inv_id: InvoiceId,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPrepared {
    pub agr_id: AgreementId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentQueued {
    pub agr_id: AgreementId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceReceived {
    pub agr_id: AgreementId,
    pub inv_id: InvoiceId,
    pub amount: String,
}

// ─── Activities and workers ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStarted {
    pub agr_id: AgreementId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityCreated {
    pub agr_id: AgreementId,
    pub act_id: ActivityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityCreateFailed {
    pub agr_id: AgreementId,
}

/// A task started on the worker running under `agr_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStarted {
    pub agr_id: AgreementId,
    pub task_id: TaskId,
    pub task_data: serde_json::Value,
}

/// Indicates successful completion if `exc_info` is `None` and a failure otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerFinished {
    pub agr_id: AgreementId,
    #[serde(skip)]
    pub exc_info: Option<ExcInfo>,
}

impl WorkerFinished {
    pub fn ok(agr_id: AgreementId) -> Self {
        Self {
            agr_id,
            exc_info: None,
        }
    }

    pub fn failed(agr_id: AgreementId, exc_info: ExcInfo) -> Self {
        Self {
            agr_id,
            exc_info: Some(exc_info),
        }
    }
}

// ─── Scripts ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSent {
    pub agr_id: AgreementId,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub cmds: serde_json::Value,
}

/// Outcome of command `cmd_idx` of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandExecuted {
    pub agr_id: AgreementId,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub success: bool,
    pub cmd_idx: usize,
    pub command: serde_json::Value,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GettingResults {
    pub agr_id: AgreementId,
    #[serde(default)]
    pub task_id: Option<TaskId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptFinished {
    pub agr_id: AgreementId,
    #[serde(default)]
    pub task_id: Option<TaskId>,
}

// ─── Tasks ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAccepted {
    pub task_id: TaskId,
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRejected {
    pub task_id: TaskId,
    #[serde(default)]
    pub reason: Option<String>,
}

// ─── Transfers ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadStarted {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadFinished {
    pub path: String,
}

// ─── Capabilities ──────────────────────────────────────────────────

macro_rules! correlates {
    (proposal: $($ty:ident),+ $(,)?) => {
        $(impl ProposalEvent for $ty {
            fn prop_id(&self) -> &ProposalId {
                &self.prop_id
            }
        })+
    };
    (agreement: $($ty:ident),+ $(,)?) => {
        $(impl AgreementEvent for $ty {
            fn agr_id(&self) -> &AgreementId {
                &self.agr_id
            }
        })+
    };
    (task: $($ty:ident),+ $(,)?) => {
        $(impl TaskEvent for $ty {
            fn task_id(&self) -> &TaskId {
                &self.task_id
            }
        })+
    };
    (script: $($ty:ident),+ $(,)?) => {
        $(impl ScriptEvent for $ty {
            fn task_id(&self) -> Option<&TaskId> {
                self.task_id.as_ref()
            }
        })+
    };
}

correlates!(proposal:
    ProposalReceived, ProposalRejected, ProposalResponded, ProposalConfirmed, ProposalFailed,
);
correlates!(agreement:
    AgreementCreated, AgreementConfirmed, AgreementRejected,
    PaymentAccepted, PaymentPrepared, PaymentQueued, InvoiceReceived,
    WorkerStarted, ActivityCreated, ActivityCreateFailed, TaskStarted, WorkerFinished,
    ScriptSent, CommandExecuted, GettingResults, ScriptFinished,
);
correlates!(task: TaskStarted, TaskAccepted, TaskRejected);
correlates!(script: ScriptSent, CommandExecuted, GettingResults, ScriptFinished);

impl HasExcInfo for ComputationFinished {
    fn exc_info(&self) -> Option<&ExcInfo> {
        self.exc_info.as_ref()
    }

    fn with_exc_info(&self, exc_info: Option<ExcInfo>) -> Self {
        Self { exc_info }
    }
}

impl HasExcInfo for WorkerFinished {
    fn exc_info(&self) -> Option<&ExcInfo> {
        self.exc_info.as_ref()
    }

    fn with_exc_info(&self, exc_info: Option<ExcInfo>) -> Self {
        Self {
            exc_info,
            ..self.clone()
        }
    }
}

// ─── The closed union ──────────────────────────────────────────────

/// Lifecycle phase an event reports on. Derived from the variant, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Computation,
    Market,
    Negotiation,
    Agreement,
    Payment,
    Activity,
    Script,
    Task,
    Transfer,
}

impl LifecyclePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Computation => "computation",
            Self::Market => "market",
            Self::Negotiation => "negotiation",
            Self::Agreement => "agreement",
            Self::Payment => "payment",
            Self::Activity => "activity",
            Self::Script => "script",
            Self::Task => "task",
            Self::Transfer => "transfer",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! event_union {
    ($($variant:ident => $phase:ident),+ $(,)?) => {
        /// Discriminated union of every executor event.
        ///
        /// Serialized with an internal `"type"` tag naming the variant.
        /// Exception state is never serialized; see [`Event::to_json`].
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type")]
        pub enum Event {
            $($variant($variant),)+
        }

        impl Event {
            /// Variant name, identical to the serialized `"type"` tag.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => stringify!($variant),)+
                }
            }

            pub fn phase(&self) -> LifecyclePhase {
                match self {
                    $(Self::$variant(_) => LifecyclePhase::$phase,)+
                }
            }
        }

        $(impl From<$variant> for Event {
            fn from(event: $variant) -> Self {
                Self::$variant(event)
            }
        })+
    };
}

event_union! {
    ComputationStarted => Computation,
    ComputationFinished => Computation,
    SubscriptionCreated => Market,
    SubscriptionFailed => Market,
    CollectFailed => Market,
    ProposalReceived => Negotiation,
    ProposalRejected => Negotiation,
    ProposalResponded => Negotiation,
    ProposalConfirmed => Negotiation,
    ProposalFailed => Negotiation,
    NoProposalsConfirmed => Negotiation,
    AgreementCreated => Agreement,
    AgreementConfirmed => Agreement,
    AgreementRejected => Agreement,
    PaymentAccepted => Payment,
    PaymentPrepared => Payment,
    PaymentQueued => Payment,
    InvoiceReceived => Payment,
    WorkerStarted => Activity,
    ActivityCreated => Activity,
    ActivityCreateFailed => Activity,
    TaskStarted => Task,
    WorkerFinished => Activity,
    ScriptSent => Script,
    CommandExecuted => Script,
    GettingResults => Script,
    ScriptFinished => Script,
    TaskAccepted => Task,
    TaskRejected => Task,
    DownloadStarted => Transfer,
    DownloadFinished => Transfer,
}

impl Event {
    /// Extract exception information from this event.
    ///
    /// Returns the captured triple (if any) and a copy of the event without
    /// it. Events that cannot carry exception state return `(None, copy)`.
    /// `self` is left untouched, so repeated calls give the same answer.
    pub fn extract_exc_info(&self) -> (Option<ExcInfo>, Event) {
        match self {
            Self::ComputationFinished(event) => {
                let (exc_info, clean) = event.extract();
                (exc_info, clean.into())
            }
            Self::WorkerFinished(event) => {
                let (exc_info, clean) = event.extract();
                (exc_info, clean.into())
            }
            other => (None, other.clone()),
        }
    }

    /// Consuming form of [`Event::extract_exc_info`].
    pub fn into_exc_info(self) -> (Option<ExcInfo>, Event) {
        match self {
            Self::ComputationFinished(mut event) => {
                let exc_info = event.exc_info.take();
                (exc_info, event.into())
            }
            Self::WorkerFinished(mut event) => {
                let exc_info = event.exc_info.take();
                (exc_info, event.into())
            }
            other => (None, other),
        }
    }

    pub fn exc_info(&self) -> Option<&ExcInfo> {
        match self {
            Self::ComputationFinished(event) => event.exc_info(),
            Self::WorkerFinished(event) => event.exc_info(),
            _ => None,
        }
    }

    pub fn has_exc_info(&self) -> bool {
        self.exc_info().is_some()
    }

    /// Serialize to JSON, refusing events that still carry exception state.
    pub fn to_json(&self) -> ProtocolResult<serde_json::Value> {
        if self.has_exc_info() {
            return Err(ProtocolError::ExceptionNotExtracted { event: self.name() });
        }
        Ok(serde_json::to_value(self)?)
    }

    pub fn sub_id(&self) -> Option<&SubscriptionId> {
        match self {
            Self::SubscriptionCreated(e) => Some(&e.sub_id),
            Self::CollectFailed(e) => Some(&e.sub_id),
            _ => None,
        }
    }

    pub fn prop_id(&self) -> Option<&ProposalId> {
        self.as_proposal_event().map(|event| event.prop_id())
    }

    pub fn agr_id(&self) -> Option<&AgreementId> {
        self.as_agreement_event().map(|event| event.agr_id())
    }

    /// The task this event belongs to, whether through [`TaskEvent`] or the
    /// optional task of a [`ScriptEvent`].
    pub fn task_id(&self) -> Option<&TaskId> {
        if let Some(event) = self.as_task_event() {
            return Some(event.task_id());
        }
        self.as_script_event().and_then(|event| event.task_id())
    }

    pub fn as_proposal_event(&self) -> Option<&dyn ProposalEvent> {
        match self {
            Self::ProposalReceived(e) => Some(e),
            Self::ProposalRejected(e) => Some(e),
            Self::ProposalResponded(e) => Some(e),
            Self::ProposalConfirmed(e) => Some(e),
            Self::ProposalFailed(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_agreement_event(&self) -> Option<&dyn AgreementEvent> {
        match self {
            Self::AgreementCreated(e) => Some(e),
            Self::AgreementConfirmed(e) => Some(e),
            Self::AgreementRejected(e) => Some(e),
            Self::PaymentAccepted(e) => Some(e),
            Self::PaymentPrepared(e) => Some(e),
            Self::PaymentQueued(e) => Some(e),
            Self::InvoiceReceived(e) => Some(e),
            Self::WorkerStarted(e) => Some(e),
            Self::ActivityCreated(e) => Some(e),
            Self::ActivityCreateFailed(e) => Some(e),
            Self::TaskStarted(e) => Some(e),
            Self::WorkerFinished(e) => Some(e),
            Self::ScriptSent(e) => Some(e),
            Self::CommandExecuted(e) => Some(e),
            Self::GettingResults(e) => Some(e),
            Self::ScriptFinished(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_task_event(&self) -> Option<&dyn TaskEvent> {
        match self {
            Self::TaskStarted(e) => Some(e),
            Self::TaskAccepted(e) => Some(e),
            Self::TaskRejected(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_script_event(&self) -> Option<&dyn ScriptEvent> {
        match self {
            Self::ScriptSent(e) => Some(e),
            Self::CommandExecuted(e) => Some(e),
            Self::GettingResults(e) => Some(e),
            Self::ScriptFinished(e) => Some(e),
            _ => None,
        }
    }

    /// Expected negative outcomes, modelled as their own variants.
    pub fn is_failure_variant(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionFailed(_)
                | Self::CollectFailed(_)
                | Self::ProposalFailed(_)
                | Self::AgreementRejected(_)
                | Self::ActivityCreateFailed(_)
                | Self::TaskRejected(_)
                | Self::CommandExecuted(CommandExecuted { success: false, .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashSet};

    #[derive(Debug)]
    struct RuntimeFault;

    impl fmt::Display for RuntimeFault {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("exe-unit terminated")
        }
    }

    impl std::error::Error for RuntimeFault {}

    fn agr(id: &str) -> AgreementId {
        AgreementId::from_string(id)
    }

    fn task(id: &str) -> TaskId {
        TaskId::from_string(id)
    }

    fn prop(id: &str) -> ProposalId {
        ProposalId::from_string(id)
    }

    /// One instance of every variant, each built with all required fields.
    fn every_variant() -> Vec<Event> {
        vec![
            ComputationStarted {}.into(),
            ComputationFinished::ok().into(),
            SubscriptionCreated {
                sub_id: SubscriptionId::from_string("s1"),
            }
            .into(),
            SubscriptionFailed {
                reason: "market unreachable".into(),
            }
            .into(),
            CollectFailed {
                sub_id: SubscriptionId::from_string("s1"),
                reason: "subscription expired".into(),
            }
            .into(),
            ProposalReceived {
                prop_id: prop("p1"),
                provider_id: ProviderId::from_string("0xabc"),
            }
            .into(),
            ProposalRejected {
                prop_id: prop("p1"),
                reason: None,
            }
            .into(),
            ProposalResponded { prop_id: prop("p1") }.into(),
            ProposalConfirmed { prop_id: prop("p1") }.into(),
            ProposalFailed {
                prop_id: prop("p1"),
                reason: "counter-proposal rejected".into(),
            }
            .into(),
            NoProposalsConfirmed {
                num_offers: 0,
                timeout: Duration::from_secs(20),
            }
            .into(),
            AgreementCreated {
                agr_id: agr("A1"),
                provider_id: NodeInfo::new("provider-1"),
            }
            .into(),
            AgreementConfirmed { agr_id: agr("A1") }.into(),
            AgreementRejected { agr_id: agr("A1") }.into(),
            PaymentAccepted {
                agr_id: agr("A1"),
                inv_id: InvoiceId::from_string("i1"),
                amount: "0.01".into(),
            }
            .into(),
            PaymentPrepared { agr_id: agr("A1") }.into(),
            PaymentQueued { agr_id: agr("A1") }.into(),
            InvoiceReceived {
                agr_id: agr("A1"),
                inv_id: InvoiceId::from_string("i1"),
                amount: "0.01".into(),
            }
            .into(),
            WorkerStarted { agr_id: agr("A1") }.into(),
            ActivityCreated {
                agr_id: agr("A1"),
                act_id: ActivityId::from_string("act1"),
            }
            .into(),
            ActivityCreateFailed { agr_id: agr("A1") }.into(),
            TaskStarted {
                agr_id: agr("A1"),
                task_id: task("T1"),
                task_data: json!({ "frame": 1 }),
            }
            .into(),
            WorkerFinished::ok(agr("A1")).into(),
            ScriptSent {
                agr_id: agr("A1"),
                task_id: Some(task("T1")),
                cmds: json!([{ "run": { "entry_point": "/bin/render" } }]),
            }
            .into(),
            CommandExecuted {
                agr_id: agr("A1"),
                task_id: Some(task("T1")),
                success: true,
                cmd_idx: 0,
                command: json!({ "run": { "entry_point": "/bin/render" } }),
                message: "ok".into(),
            }
            .into(),
            GettingResults {
                agr_id: agr("A1"),
                task_id: Some(task("T1")),
            }
            .into(),
            ScriptFinished {
                agr_id: agr("A1"),
                task_id: None,
            }
            .into(),
            TaskAccepted {
                task_id: task("T1"),
                result: json!("frame-1.png"),
            }
            .into(),
            TaskRejected {
                task_id: task("T1"),
                reason: Some("bad output".into()),
            }
            .into(),
            DownloadStarted {
                path: "/out/frame-1.png".into(),
            }
            .into(),
            DownloadFinished {
                path: "/out/frame-1.png".into(),
            }
            .into(),
        ]
    }

    #[test]
    fn every_variant_is_constructible_and_distinctly_named() {
        let events = every_variant();
        assert_eq!(events.len(), 31);
        let names: HashSet<_> = events.iter().map(Event::name).collect();
        assert_eq!(names.len(), events.len());
    }

    #[test]
    fn extraction_without_exception_state_returns_equal_event() {
        for event in every_variant() {
            let (exc_info, clean) = event.extract_exc_info();
            assert!(exc_info.is_none(), "{} carried exc_info", event.name());
            assert_eq!(clean, event);
        }
    }

    #[test]
    fn extraction_detaches_the_captured_triple() {
        let exc = ExcInfo::capture(RuntimeFault);
        let event: Event = ComputationFinished::failed(exc.clone()).into();

        let (extracted, clean) = event.extract_exc_info();
        assert_eq!(extracted, Some(exc));
        assert_eq!(clean, Event::from(ComputationFinished::ok()));
        assert!(!clean.has_exc_info());
        // the original still carries it
        assert!(event.has_exc_info());
    }

    #[test]
    fn extraction_is_repeatable_on_the_original() {
        let event: Event = WorkerFinished::failed(agr("A1"), ExcInfo::capture(RuntimeFault)).into();
        let first = event.extract_exc_info();
        let second = event.extract_exc_info();
        assert_eq!(first, second);
    }

    #[test]
    fn extraction_on_the_cleaned_copy_yields_nothing() {
        let event: Event = WorkerFinished::failed(agr("A1"), ExcInfo::capture(RuntimeFault)).into();
        let (_, clean) = event.extract_exc_info();
        let (again, same) = clean.extract_exc_info();
        assert!(again.is_none());
        assert_eq!(same, clean);
    }

    #[test]
    fn consuming_extraction_matches_borrowing_extraction() {
        let event: Event = WorkerFinished::failed(agr("A1"), ExcInfo::capture(RuntimeFault)).into();
        let borrowed = event.extract_exc_info();
        let consumed = event.into_exc_info();
        assert_eq!(borrowed, consumed);
    }

    #[test]
    fn worker_extraction_keeps_the_agreement() {
        let exc = ExcInfo::capture(RuntimeFault);
        let finished = WorkerFinished::failed(agr("A9"), exc.clone());
        let (extracted, clean) = finished.extract();
        assert_eq!(extracted, Some(exc));
        assert_eq!(clean.agr_id, agr("A9"));
        assert!(clean.exc_info.is_none());
        assert!(finished.is_failure());
        assert!(!clean.is_failure());
    }

    #[test]
    fn agreement_trait_joins_events_per_agreement() {
        let events: Vec<Event> = vec![
            AgreementCreated {
                agr_id: agr("A1"),
                provider_id: NodeInfo::new("alpha"),
            }
            .into(),
            AgreementCreated {
                agr_id: agr("A2"),
                provider_id: NodeInfo::new("beta"),
            }
            .into(),
            PaymentAccepted {
                agr_id: agr("A1"),
                inv_id: InvoiceId::from_string("i1"),
                amount: "1".into(),
            }
            .into(),
            ComputationStarted {}.into(),
            ScriptFinished {
                agr_id: agr("A2"),
                task_id: None,
            }
            .into(),
        ];

        let mut per_agreement: BTreeMap<AgreementId, Vec<&'static str>> = BTreeMap::new();
        for event in &events {
            if let Some(id) = event.agr_id() {
                per_agreement.entry(id.clone()).or_default().push(event.name());
            }
        }

        assert_eq!(
            per_agreement[&agr("A1")],
            vec!["AgreementCreated", "PaymentAccepted"]
        );
        assert_eq!(
            per_agreement[&agr("A2")],
            vec!["AgreementCreated", "ScriptFinished"]
        );
    }

    #[test]
    fn task_started_carries_both_agreement_and_task() {
        let event: Event = TaskStarted {
            agr_id: agr("A1"),
            task_id: task("T1"),
            task_data: json!(null),
        }
        .into();
        assert_eq!(event.agr_id(), Some(&agr("A1")));
        assert_eq!(event.task_id(), Some(&task("T1")));
        assert_eq!(event.phase(), LifecyclePhase::Task);
    }

    #[test]
    fn script_task_id_is_optional() {
        let setup = GettingResults {
            agr_id: agr("A1"),
            task_id: None,
        };
        assert_eq!(ScriptEvent::task_id(&setup), None);
        let event: Event = setup.into();
        assert_eq!(event.task_id(), None);
        assert_eq!(event.agr_id(), Some(&agr("A1")));
    }

    #[test]
    fn missing_reason_differs_from_empty_reason() {
        let none = ProposalRejected {
            prop_id: prop("p1"),
            reason: None,
        };
        let empty = ProposalRejected {
            prop_id: prop("p1"),
            reason: Some(String::new()),
        };
        assert_ne!(none, empty);
        assert_eq!(Event::from(none).prop_id(), Some(&prop("p1")));
    }

    #[test]
    fn lifecycle_scenario_only_the_last_event_carries_a_fault() {
        let created: Event = AgreementCreated {
            agr_id: agr("A1"),
            provider_id: NodeInfo::new("alpha"),
        }
        .into();
        let started: Event = TaskStarted {
            agr_id: agr("A1"),
            task_id: task("T1"),
            task_data: json!({ "frame": 3 }),
        }
        .into();
        let fault = ExcInfo::capture(RuntimeFault);
        let finished: Event = WorkerFinished::failed(agr("A1"), fault.clone()).into();

        let (extracted, clean) = finished.extract_exc_info();
        assert_eq!(extracted, Some(fault));
        assert_eq!(clean, Event::from(WorkerFinished::ok(agr("A1"))));

        for event in [&created, &started] {
            let (exc_info, same) = event.extract_exc_info();
            assert!(exc_info.is_none());
            assert_eq!(&same, event);
        }
        assert!(
            [&created, &started, &clean]
                .iter()
                .all(|event| event.agr_id() == Some(&agr("A1")))
        );
    }

    #[test]
    fn serialized_events_are_type_tagged() {
        let event: Event = ProposalRejected {
            prop_id: prop("p1"),
            reason: None,
        }
        .into();
        let json = event.to_json().unwrap();
        assert_eq!(json["type"], "ProposalRejected");
        assert_eq!(json["prop_id"], "p1");
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn to_json_refuses_unextracted_exception_state() {
        let event: Event = ComputationFinished::failed(ExcInfo::capture(RuntimeFault)).into();
        let err = event.to_json().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ExceptionNotExtracted {
                event: "ComputationFinished"
            }
        ));
        let (_, clean) = event.extract_exc_info();
        assert_eq!(clean.to_json().unwrap(), json!({ "type": "ComputationFinished" }));
    }

    #[test]
    fn timeout_survives_a_json_roundtrip() {
        let event: Event = NoProposalsConfirmed {
            num_offers: 4,
            timeout: Duration::from_millis(1500),
        }
        .into();
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn failure_variants_are_recognised() {
        let failed_cmd: Event = CommandExecuted {
            agr_id: agr("A1"),
            task_id: None,
            success: false,
            cmd_idx: 2,
            command: json!("transfer"),
            message: "no such file".into(),
        }
        .into();
        assert!(failed_cmd.is_failure_variant());
        assert!(!Event::from(ProposalConfirmed { prop_id: prop("p1") }).is_failure_variant());
        assert!(Event::from(AgreementRejected { agr_id: agr("A1") }).is_failure_variant());
    }

    #[test]
    fn phases_follow_the_variant() {
        let phases: HashSet<_> = every_variant().iter().map(Event::phase).collect();
        assert_eq!(phases.len(), 9);
        assert_eq!(LifecyclePhase::Transfer.to_string(), "transfer");
    }
}
