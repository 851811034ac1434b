//! Human-oriented summary of a computation.
//!
//! [`SummaryLogger`] correlates events by their ids (proposal → provider,
//! agreement → provider, task → agreement) and reports progress in plain
//! sentences through `tracing::info!`. When `ComputationFinished` arrives it
//! logs a final [`ComputationSummary`].

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use indexmap::{IndexMap, IndexSet};
use mexec_protocol::{
    AgreementId, Event, ExcInfo, ProposalId, ProviderId, TaskId, parse_amount,
};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SinkResult;
use crate::sink::EventSink;

/// Snapshot of what a computation achieved so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComputationSummary {
    pub duration: Option<Duration>,
    /// Agreements created, whether or not they were confirmed.
    pub agreements: usize,
    /// Distinct provider names among those agreements. Nodes without a name
    /// all report as `<unnamed>` and count once.
    pub providers: usize,
    /// Tasks computed per provider name, including providers with none.
    pub tasks_per_provider: IndexMap<String, u64>,
    pub failed_providers: Vec<String>,
    pub total_cost: f64,
    /// Set when the computation itself finished with a fault.
    pub failed: bool,
}

#[derive(Debug, Default)]
struct SummaryState {
    started_at: Option<Instant>,
    finished_in: Option<Duration>,
    received_proposals: HashMap<ProposalId, ProviderId>,
    confirmed_proposals: HashSet<ProposalId>,
    agreement_providers: IndexMap<AgreementId, String>,
    task_agreements: HashMap<TaskId, AgreementId>,
    task_data: HashMap<TaskId, serde_json::Value>,
    provider_tasks: IndexMap<String, u64>,
    failed_providers: IndexSet<String>,
    total_cost: f64,
    computation_failed: bool,
}

impl SummaryState {
    fn provider(&self, agr_id: &AgreementId) -> &str {
        self.agreement_providers
            .get(agr_id)
            .map(String::as_str)
            .unwrap_or("<unknown>")
    }

    fn confirmed_providers(&self) -> usize {
        self.confirmed_proposals
            .iter()
            .filter_map(|prop_id| self.received_proposals.get(prop_id))
            .collect::<HashSet<_>>()
            .len()
    }

    fn snapshot(&self) -> ComputationSummary {
        let mut tasks_per_provider = IndexMap::new();
        for provider in self.agreement_providers.values() {
            let computed = self.provider_tasks.get(provider).copied().unwrap_or(0);
            tasks_per_provider.insert(provider.clone(), computed);
        }
        ComputationSummary {
            duration: self
                .finished_in
                .or_else(|| self.started_at.map(|started| started.elapsed())),
            agreements: self.agreement_providers.len(),
            providers: tasks_per_provider.len(),
            tasks_per_provider,
            failed_providers: self.failed_providers.iter().cloned().collect(),
            total_cost: self.total_cost,
            failed: self.computation_failed,
        }
    }

    fn handle(&mut self, event: &Event, exc_info: Option<&ExcInfo>) -> SinkResult<()> {
        match event {
            Event::ComputationStarted(_) => {
                *self = SummaryState {
                    started_at: Some(Instant::now()),
                    ..Default::default()
                };
            }
            Event::ProposalReceived(e) => {
                self.received_proposals
                    .insert(e.prop_id.clone(), e.provider_id.clone());
            }
            Event::ProposalConfirmed(e) => {
                self.confirmed_proposals.insert(e.prop_id.clone());
                let providers = self.confirmed_providers();
                info!(providers, "received proposals from {providers} providers so far");
            }
            Event::NoProposalsConfirmed(e) => {
                let timeout = e.timeout.as_secs_f64();
                if e.num_offers == 0 {
                    warn!(
                        timeout_secs = timeout,
                        "no offers have been collected from the market for {timeout:.0}s; \
                         check the subnet the demand is published on"
                    );
                } else {
                    warn!(
                        num_offers = e.num_offers,
                        timeout_secs = timeout,
                        "{} offers have been collected from the market, \
                         but no provider has responded for {timeout:.0}s",
                        e.num_offers
                    );
                }
            }
            Event::AgreementCreated(e) => {
                let provider = e.provider_id.display_name().to_owned();
                info!(agr_id = %e.agr_id, %provider, "agreement proposed to provider '{provider}'");
                self.agreement_providers.insert(e.agr_id.clone(), provider);
            }
            Event::AgreementConfirmed(e) => {
                let provider = self.provider(&e.agr_id);
                info!(agr_id = %e.agr_id, %provider, "agreement confirmed by provider '{provider}'");
            }
            Event::TaskStarted(e) => {
                self.task_agreements
                    .insert(e.task_id.clone(), e.agr_id.clone());
                self.task_data.insert(e.task_id.clone(), e.task_data.clone());
            }
            Event::ScriptSent(e) => {
                let provider = self.provider(&e.agr_id);
                let data = e
                    .task_id
                    .as_ref()
                    .and_then(|task_id| self.task_data.get(task_id));
                info!(
                    agr_id = %e.agr_id,
                    %provider,
                    "task sent to provider '{provider}', task data: {}",
                    data.map(|d| d.to_string()).unwrap_or_else(|| "none".to_owned())
                );
            }
            Event::CommandExecuted(e) if !e.success => {
                let provider = self.provider(&e.agr_id);
                warn!(
                    agr_id = %e.agr_id,
                    %provider,
                    cmd_idx = e.cmd_idx,
                    "command failed on provider '{provider}', command: {}, output: {}",
                    e.command,
                    e.message
                );
            }
            Event::TaskAccepted(e) => {
                let data = self.task_data.remove(&e.task_id);
                let Some(agr_id) = self.task_agreements.remove(&e.task_id) else {
                    warn!(task_id = %e.task_id, "accepted task was never started");
                    return Ok(());
                };
                let provider = self.provider(&agr_id).to_owned();
                info!(
                    task_id = %e.task_id,
                    %provider,
                    "task computed by provider '{provider}', task data: {}",
                    data.map(|d| d.to_string())
                        .unwrap_or_else(|| "none".to_owned())
                );
                *self.provider_tasks.entry(provider).or_insert(0) += 1;
            }
            // a retried task sends a fresh TaskStarted
            Event::TaskRejected(e) => {
                self.task_data.remove(&e.task_id);
                self.task_agreements.remove(&e.task_id);
            }
            Event::PaymentAccepted(e) => {
                let amount = parse_amount(&e.amount)?;
                self.total_cost += amount;
                let provider = self.provider(&e.agr_id);
                info!(
                    agr_id = %e.agr_id,
                    inv_id = %e.inv_id,
                    %provider,
                    "accepted payment of {} for invoice {} from provider '{provider}'",
                    e.amount,
                    e.inv_id
                );
            }
            Event::WorkerFinished(e) => {
                if let Some(exc) = exc_info {
                    let provider = self.provider(&e.agr_id).to_owned();
                    warn!(
                        agr_id = %e.agr_id,
                        %provider,
                        "activity failed on provider '{provider}'; reason: {}",
                        exc.render()
                    );
                    self.failed_providers.insert(provider);
                }
            }
            Event::ComputationFinished(_) => {
                self.finished_in = self.started_at.map(|started| started.elapsed());
                if let Some(exc) = exc_info {
                    self.computation_failed = true;
                    warn!(exc_type = exc.exc_type(), "computation failed; reason: {}", exc.render());
                }
                self.log_summary();
            }
            _ => {}
        }
        Ok(())
    }

    fn log_summary(&self) {
        let summary = self.snapshot();
        if let Some(duration) = summary.duration {
            info!(
                duration_secs = duration.as_secs_f64(),
                "computation finished in {:.1}s",
                duration.as_secs_f64()
            );
        }
        info!(
            agreements = summary.agreements,
            providers = summary.providers,
            "negotiated {} agreements with {} providers",
            summary.agreements,
            summary.providers
        );
        for (provider, tasks) in &summary.tasks_per_provider {
            if *tasks == 0 {
                info!(%provider, "provider '{provider}' did not compute any tasks");
            } else {
                info!(%provider, tasks, "provider '{provider}' computed {tasks} tasks");
            }
        }
        for provider in &summary.failed_providers {
            info!(%provider, "provider '{provider}' failed");
        }
        info!(total_cost = summary.total_cost, "total cost: {}", summary.total_cost);
    }
}

/// Aggregates events into a [`ComputationSummary`] and logs progress.
///
/// Safe to share between concurrent producers.
#[derive(Debug, Default)]
pub struct SummaryLogger {
    state: Mutex<SummaryState>,
}

impl SummaryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> ComputationSummary {
        self.state.lock().snapshot()
    }
}

impl EventSink for SummaryLogger {
    fn emit(&self, event: &Event) -> SinkResult<()> {
        let (exc_info, event) = event.extract_exc_info();
        self.state.lock().handle(&event, exc_info.as_ref())
    }
}
