//! Deferred fan-out: a fixed pool of worker tasks draining a bounded job queue.
//!
//! The pool is shared for the process lifetime. Each job covers all members of
//! one resolved group for one inbound event: the worker re-queries the member
//! list and sends one outbound message per member, in store order, sequentially.
//! A failed send is logged and isolated — the remaining members of the same job
//! are still attempted, and nothing propagates back to the webhook caller,
//! which was acknowledged before the job started. No retry; a failed send is
//! terminal for that address.

use crate::membership::MembershipResolver;
use crate::provider::OutboundSender;
use crate::routing::RouteEntry;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// One unit of deferred work, owned by the worker that executes it.
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    /// Job id for log correlation.
    pub id: String,
    /// Original sender number (logged; deferred sends originate from the
    /// route's configured number).
    pub from: String,
    /// Relay text sent to every member.
    pub text: String,
    /// Route the inbound event resolved to.
    pub route: RouteEntry,
}

impl DeliveryJob {
    pub fn new(from: impl Into<String>, text: impl Into<String>, route: RouteEntry) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from: from.into(),
            text: text.into(),
            route,
        }
    }
}

/// Submission failed; the caller decides how to answer the webhook.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The bounded backlog is at capacity.
    #[error("delivery backlog is full")]
    BacklogFull,
    /// The pool has been shut down.
    #[error("worker pool is stopped")]
    PoolStopped,
}

/// Fixed-size worker pool with a bounded job queue.
pub struct WorkerPool {
    tx: mpsc::Sender<DeliveryJob>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks sharing one queue of depth `queue_depth`.
    pub fn start(
        workers: usize,
        queue_depth: usize,
        membership: Arc<dyn MembershipResolver>,
        sender: Arc<dyn OutboundSender>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<DeliveryJob>(queue_depth);
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..workers)
            .map(|worker| {
                let rx = rx.clone();
                let membership = membership.clone();
                let sender = sender.clone();
                tokio::spawn(async move {
                    run_worker(worker, rx, membership, sender).await;
                })
            })
            .collect();
        log::info!("worker pool started: {} worker(s), queue depth {}", workers, queue_depth);
        Self { tx, handles }
    }

    /// Enqueue a job without blocking. Returns immediately; the job runs in the
    /// background. A full backlog is reported instead of queuing without bound.
    pub fn submit(&self, job: DeliveryJob) -> Result<(), SubmitError> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::BacklogFull,
            mpsc::error::TrySendError::Closed(_) => SubmitError::PoolStopped,
        })
    }

    /// Close the queue and wait for workers to drain remaining jobs.
    pub async fn shutdown(mut self) {
        drop(self.tx);
        for h in self.handles.drain(..) {
            let _ = h.await;
        }
        log::info!("worker pool drained");
    }
}

async fn run_worker(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<DeliveryJob>>>,
    membership: Arc<dyn MembershipResolver>,
    sender: Arc<dyn OutboundSender>,
) {
    loop {
        // Hold the lock only while waiting for a job, not while running it,
        // so the other workers keep consuming the queue.
        let job = rx.lock().await.recv().await;
        let Some(job) = job else { break };
        run_job(job, membership.as_ref(), sender.as_ref()).await;
    }
    log::debug!("worker {} stopped", worker);
}

/// Run one job to completion: every member is attempted regardless of earlier
/// failures. The outcome is observable only through logs.
async fn run_job(job: DeliveryJob, membership: &dyn MembershipResolver, sender: &dyn OutboundSender) {
    log::info!(
        "delivery job {}: group {} ({}), message from {}",
        job.id,
        job.route.group_id,
        job.route.name,
        job.from
    );

    let members = match membership.member_addresses(job.route.group_id).await {
        Ok(members) => members,
        Err(e) => {
            log::error!(
                "delivery job {}: member query for group {} failed: {}",
                job.id,
                job.route.group_id,
                e
            );
            return;
        }
    };

    let mut failures = 0usize;
    for member in &members {
        if let Err(e) = sender.send(member, &job.route.phone_number, &job.text).await {
            failures += 1;
            log::warn!(
                "delivery job {}: send to {} (group {}) failed: {}",
                job.id,
                member,
                job.route.group_id,
                e
            );
        }
    }

    if failures == 0 {
        log::info!("delivery job {}: completed, {} message(s) sent", job.id, members.len());
    } else {
        log::warn!(
            "delivery job {}: completed with {} failure(s) out of {} member(s)",
            job.id,
            failures,
            members.len()
        );
    }
}
