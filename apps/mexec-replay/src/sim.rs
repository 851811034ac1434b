//! A scripted marketplace computation.
//!
//! Plays the producer side of the executor: negotiation, agreements, one
//! worker per provider running its share of tasks concurrently, payments.
//! Events go out over an mpsc channel in the order each producer observes
//! its milestones.

use std::time::Duration;

use anyhow::Result;
use mexec_protocol::{
    ActivityCreated, ActivityId, AgreementConfirmed, AgreementCreated, AgreementId,
    CommandExecuted, ComputationFinished, ComputationStarted, DownloadFinished, DownloadStarted,
    Event, ExcInfo, GettingResults, InvoiceId, InvoiceReceived, NodeInfo, PaymentAccepted,
    PaymentPrepared, PaymentQueued, ProposalConfirmed, ProposalId, ProposalReceived,
    ProposalRejected, ProposalResponded, ProviderId, ScriptFinished, ScriptSent,
    SubscriptionCreated, SubscriptionId, TaskAccepted, TaskId, TaskRejected, TaskStarted,
    WorkerFinished, WorkerStarted,
};
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

const PRICE_PER_TASK: f64 = 0.01;

#[derive(Debug, Error)]
#[error("exe-unit on provider '{provider}' terminated while running task {task}")]
pub struct ExeUnitFault {
    pub provider: String,
    pub task: TaskId,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub providers: usize,
    pub tasks: usize,
    /// Index of a provider whose worker crashes on its second task.
    pub fail_provider: Option<usize>,
    pub subnet_tag: String,
}

#[derive(Clone)]
struct Emitter(mpsc::Sender<Event>);

impl Emitter {
    async fn emit(&self, event: impl Into<Event>) -> Result<()> {
        self.0.send(event.into()).await?;
        Ok(())
    }
}

struct Worker {
    index: usize,
    agr_id: AgreementId,
    node: NodeInfo,
    tasks: Vec<TaskId>,
    fails: bool,
}

pub async fn run(scenario: Scenario, tx: mpsc::Sender<Event>) -> Result<()> {
    let out = Emitter(tx);
    out.emit(ComputationStarted {}).await?;
    out.emit(SubscriptionCreated {
        sub_id: SubscriptionId::new_uuid(),
    })
    .await?;

    let mut workers = Vec::with_capacity(scenario.providers);
    for index in 0..scenario.providers {
        let provider_id = ProviderId::from_string(format!("0x{index:040x}"));

        // every provider first sends an offer we turn down
        let stale = ProposalId::new_uuid();
        out.emit(ProposalReceived {
            prop_id: stale.clone(),
            provider_id: provider_id.clone(),
        })
        .await?;
        out.emit(ProposalRejected {
            prop_id: stale,
            reason: Some("price above limit".to_owned()),
        })
        .await?;

        let prop_id = ProposalId::new_uuid();
        out.emit(ProposalReceived {
            prop_id: prop_id.clone(),
            provider_id,
        })
        .await?;
        out.emit(ProposalResponded {
            prop_id: prop_id.clone(),
        })
        .await?;
        out.emit(ProposalConfirmed { prop_id }).await?;

        let agr_id = AgreementId::new_uuid();
        let node =
            NodeInfo::new(format!("provider-{index}")).with_subnet_tag(&scenario.subnet_tag);
        out.emit(AgreementCreated {
            agr_id: agr_id.clone(),
            provider_id: node.clone(),
        })
        .await?;
        out.emit(AgreementConfirmed {
            agr_id: agr_id.clone(),
        })
        .await?;

        workers.push(Worker {
            index,
            agr_id,
            node,
            tasks: Vec::new(),
            fails: scenario.fail_provider == Some(index),
        });
    }

    if !workers.is_empty() {
        for n in 0..scenario.tasks {
            let slot = n % workers.len();
            workers[slot].tasks.push(TaskId::from_string(format!("task-{n}")));
        }
    }

    let mut handles = Vec::with_capacity(workers.len());
    for worker in workers {
        let out = out.clone();
        handles.push(tokio::spawn(run_worker(worker, out)));
    }
    for handle in handles {
        handle.await??;
    }

    out.emit(ComputationFinished::ok()).await?;
    Ok(())
}

async fn run_worker(worker: Worker, out: Emitter) -> Result<()> {
    let agr_id = worker.agr_id.clone();
    debug!(
        agr_id = %agr_id,
        provider = worker.node.display_name(),
        tasks = worker.tasks.len(),
        "worker scheduled"
    );

    out.emit(WorkerStarted {
        agr_id: agr_id.clone(),
    })
    .await?;
    out.emit(ActivityCreated {
        agr_id: agr_id.clone(),
        act_id: ActivityId::from_string(format!("activity-{}", worker.index)),
    })
    .await?;

    let mut computed = 0usize;
    let mut fault = None;
    for (position, task_id) in worker.tasks.iter().enumerate() {
        out.emit(TaskStarted {
            agr_id: agr_id.clone(),
            task_id: task_id.clone(),
            task_data: json!({ "frame": task_id.as_str() }),
        })
        .await?;

        let command = json!({
            "run": { "entry_point": "/usr/local/bin/render", "args": [task_id.as_str()] }
        });
        out.emit(ScriptSent {
            agr_id: agr_id.clone(),
            task_id: Some(task_id.clone()),
            cmds: json!([command]),
        })
        .await?;
        tokio::time::sleep(Duration::from_millis(5)).await;

        if worker.fails && position == 1 {
            out.emit(CommandExecuted {
                agr_id: agr_id.clone(),
                task_id: Some(task_id.clone()),
                success: false,
                cmd_idx: 0,
                command,
                message: "exit code 137".to_owned(),
            })
            .await?;
            out.emit(TaskRejected {
                task_id: task_id.clone(),
                reason: Some("worker crashed".to_owned()),
            })
            .await?;
            fault = Some(ExcInfo::capture(ExeUnitFault {
                provider: worker.node.display_name().to_owned(),
                task: task_id.clone(),
            }));
            break;
        }

        out.emit(CommandExecuted {
            agr_id: agr_id.clone(),
            task_id: Some(task_id.clone()),
            success: true,
            cmd_idx: 0,
            command,
            message: String::new(),
        })
        .await?;
        out.emit(GettingResults {
            agr_id: agr_id.clone(),
            task_id: Some(task_id.clone()),
        })
        .await?;
        let path = format!("output/{task_id}.png");
        out.emit(DownloadStarted { path: path.clone() }).await?;
        out.emit(DownloadFinished { path: path.clone() }).await?;
        out.emit(ScriptFinished {
            agr_id: agr_id.clone(),
            task_id: Some(task_id.clone()),
        })
        .await?;
        out.emit(TaskAccepted {
            task_id: task_id.clone(),
            result: json!(path),
        })
        .await?;
        computed += 1;
    }

    if computed > 0 {
        let inv_id = InvoiceId::new_uuid();
        let amount = format!("{:.4}", computed as f64 * PRICE_PER_TASK);
        out.emit(InvoiceReceived {
            agr_id: agr_id.clone(),
            inv_id: inv_id.clone(),
            amount: amount.clone(),
        })
        .await?;
        out.emit(PaymentPrepared {
            agr_id: agr_id.clone(),
        })
        .await?;
        out.emit(PaymentQueued {
            agr_id: agr_id.clone(),
        })
        .await?;
        out.emit(PaymentAccepted {
            agr_id: agr_id.clone(),
            inv_id,
            amount,
        })
        .await?;
    }

    let finished = match fault {
        Some(exc_info) => WorkerFinished::failed(agr_id, exc_info),
        None => WorkerFinished::ok(agr_id),
    };
    out.emit(finished).await
}
