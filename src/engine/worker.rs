//! Partition Worker
//!
//! One tokio task per partition. The task owns that partition's `ContainerRegistry`
//! by value and runs commands strictly one at a time, in arrival order. Nothing else
//! can reach the containers, so they need no locking.
//!
//! ## Primary handling
//! 1. Run the operation against the containers.
//! 2. Derive the backup from the effect and hand it to each replica's ordered
//!    replication channel.
//! 3. Fire item events.
//! 4. Reply, after the synchronous backups acknowledged or the ack timeout passed.
//!    Waiting for acks happens off the worker; the next command runs immediately.
//!
//! An operation that has to wait (poll on an empty queue, offer on a full one) is
//! parked instead of blocking the task. It runs again when an effect may have made
//! its condition true, or gets its timeout response when its deadline passes.

use crate::config::ClusterConfig;
use crate::container::listener::{ItemEventKind, ListenerRegistry};
use crate::container::registry::ContainerRegistry;
use crate::engine::replication::ReplicationService;
use crate::error::ApplicationError;
use crate::membership::types::MemberId;
use crate::operation::ops::{Effect, Operation, RunOutcome, WaitCondition};
use crate::operation::types::{QueueItem, Response};
use crate::partition::router::PartitionRouter;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

pub type OperationResult = Result<Response, ApplicationError>;

pub enum PartitionCommand {
    Primary {
        operation: Operation,
        reply: oneshot::Sender<OperationResult>,
    },
    Backup {
        operation: Operation,
        reply: oneshot::Sender<OperationResult>,
    },
    /// Snapshot of one container's items, for inspection and tests.
    Inspect {
        name: String,
        reply: oneshot::Sender<Vec<QueueItem>>,
    },
    /// Number of operations parked in this partition.
    CountParked { reply: oneshot::Sender<usize> },
}

/// Item events of one committed primary, handed to the event dispatcher.
pub struct EventBatch {
    pub name: String,
    pub kind: ItemEventKind,
    pub items: Vec<QueueItem>,
}

/// Member-wide collaborators every worker of a node shares.
pub struct WorkerContext {
    pub member_id: MemberId,
    pub router: Arc<PartitionRouter>,
    pub config: Arc<ClusterConfig>,
    pub replication: Arc<ReplicationService>,
    pub listeners: Arc<ListenerRegistry>,
    pub events: mpsc::UnboundedSender<EventBatch>,
}

struct PendingPrimary {
    operation: Operation,
    reply: oneshot::Sender<OperationResult>,
    /// `None` waits forever.
    deadline: Option<Instant>,
}

struct Parked {
    pending: PendingPrimary,
    condition: WaitCondition,
}

pub struct PartitionWorker {
    partition_id: u32,
    context: Arc<WorkerContext>,
    containers: ContainerRegistry,
    commands: mpsc::UnboundedReceiver<PartitionCommand>,
    parked: Vec<Parked>,
    ready: VecDeque<PendingPrimary>,
}

impl PartitionWorker {
    /// Spawns the worker for `partition_id` and returns its command channel.
    pub fn spawn(
        partition_id: u32,
        context: Arc<WorkerContext>,
    ) -> mpsc::UnboundedSender<PartitionCommand> {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Self {
            partition_id,
            containers: ContainerRegistry::new(partition_id, context.config.clone()),
            context,
            commands: rx,
            parked: Vec::new(),
            ready: VecDeque::new(),
        };

        tokio::spawn(worker.run());
        tx
    }

    async fn run(mut self) {
        tracing::debug!(
            "Partition worker {} started on {}",
            self.partition_id,
            self.context.member_id
        );

        loop {
            let next_deadline = self
                .parked
                .iter()
                .filter_map(|parked| parked.pending.deadline)
                .min();
            let expiry = async move {
                match next_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = expiry => self.expire(Instant::now()),
            }

            self.drain_ready();
        }

        tracing::debug!("Partition worker {} stopped", self.partition_id);
    }

    fn handle(&mut self, command: PartitionCommand) {
        match command {
            PartitionCommand::Primary { operation, reply } => {
                let deadline = match operation.wait_timeout_ms() {
                    Some(timeout_ms) if timeout_ms > 0 => {
                        Some(Instant::now() + Duration::from_millis(timeout_ms as u64))
                    }
                    _ => None,
                };
                self.execute(PendingPrimary {
                    operation,
                    reply,
                    deadline,
                });
            }
            PartitionCommand::Backup { operation, reply } => {
                let result = operation
                    .run(&mut self.containers)
                    .map(|outcome| match outcome {
                        RunOutcome::Done { response, .. } => response,
                        RunOutcome::Wait(_) => Response::None,
                    });
                let _ = reply.send(result);
            }
            PartitionCommand::Inspect { name, reply } => {
                let items = self
                    .containers
                    .get(&name)
                    .map(|container| container.items())
                    .unwrap_or_default();
                let _ = reply.send(items);
            }
            PartitionCommand::CountParked { reply } => {
                let _ = reply.send(self.parked.len());
            }
        }
    }

    fn execute(&mut self, pending: PendingPrimary) {
        match pending.operation.run(&mut self.containers) {
            Err(e) => {
                tracing::debug!(
                    "Operation on {} failed in partition {}: {}",
                    pending.operation.name(),
                    self.partition_id,
                    e
                );
                let _ = pending.reply.send(Err(e));
            }
            Ok(RunOutcome::Wait(condition)) => {
                tracing::trace!(
                    "Parking operation on {} until {:?}",
                    pending.operation.name(),
                    condition
                );
                self.sweep_abandoned();
                self.parked.push(Parked { pending, condition });
            }
            Ok(RunOutcome::Done { response, effect }) => {
                self.commit(pending, response, effect);
            }
        }
    }

    fn commit(&mut self, pending: PendingPrimary, response: Response, effect: Effect) {
        let PendingPrimary {
            operation, reply, ..
        } = pending;

        // Phase two: hand the backup to the replicas before anything is observable
        let acks = match operation.backup(&effect) {
            Some(backup) => self.replicate(&operation, backup),
            None => Vec::new(),
        };

        match &effect {
            Effect::Added(items) => {
                self.publish_events(operation.name(), ItemEventKind::Added, items);
                self.wake(WaitCondition::ItemAvailable);
            }
            Effect::Removed(items) => {
                self.publish_events(operation.name(), ItemEventKind::Removed, items);
                self.wake(WaitCondition::SpaceAvailable);
            }
            Effect::Destroyed => self.wake(WaitCondition::SpaceAvailable),
            Effect::None => {}
        }

        if acks.is_empty() {
            let _ = reply.send(Ok(response));
            return;
        }

        let timeout = self.context.config.invocation.backup_ack_timeout();
        tokio::spawn(await_backup_acks(acks, timeout, reply, response));
    }

    /// Enqueues `backup` to every replica the queue's config asks for and returns
    /// the ack receivers of the synchronous ones.
    fn replicate(&self, operation: &Operation, backup: Operation) -> Vec<oneshot::Receiver<bool>> {
        let queue_config = self.context.config.find_queue_config(operation.name());
        let replicas = self.context.router.backups_of(self.partition_id);
        let total = queue_config.total_backup_count().min(replicas.len());
        let sync = queue_config.backup_count.min(total);

        let mut acks = Vec::with_capacity(sync);
        for (index, replica) in replicas.iter().take(total).enumerate() {
            let ack = self
                .context
                .replication
                .enqueue(replica, self.partition_id, backup.clone());
            if index < sync {
                acks.push(ack);
            }
        }
        acks
    }

    fn publish_events(&self, name: &str, kind: ItemEventKind, items: &[QueueItem]) {
        if items.is_empty() || !self.context.listeners.has_listeners(name) {
            return;
        }
        let batch = EventBatch {
            name: name.to_string(),
            kind,
            items: items.to_vec(),
        };
        if self.context.events.send(batch).is_err() {
            tracing::warn!("Event dispatcher is gone, dropping {:?} events for {}", kind, name);
        }
    }

    /// Moves every operation parked on `condition` to the ready queue, in
    /// parking order.
    fn wake(&mut self, condition: WaitCondition) {
        let mut index = 0;
        while index < self.parked.len() {
            if self.parked[index].condition == condition {
                let parked = self.parked.remove(index);
                self.ready.push_back(parked.pending);
            } else {
                index += 1;
            }
        }
    }

    fn drain_ready(&mut self) {
        while let Some(pending) = self.ready.pop_front() {
            // A caller that stopped waiting never sees the result; do not apply it
            if pending.reply.is_closed() {
                tracing::debug!(
                    "Dropping parked operation on {}: caller went away",
                    pending.operation.name()
                );
                continue;
            }
            self.execute(pending);
        }
    }

    /// Drops parked operations whose caller stopped waiting. Without this an
    /// operation with no deadline stays parked until its condition next fires.
    fn sweep_abandoned(&mut self) {
        let before = self.parked.len();
        self.parked.retain(|parked| !parked.pending.reply.is_closed());
        let dropped = before - self.parked.len();
        if dropped > 0 {
            tracing::debug!(
                "Dropped {} abandoned parked operations in partition {}",
                dropped,
                self.partition_id
            );
        }
    }

    fn expire(&mut self, now: Instant) {
        self.sweep_abandoned();
        let mut index = 0;
        while index < self.parked.len() {
            let expired = self.parked[index]
                .pending
                .deadline
                .is_some_and(|deadline| deadline <= now);
            if expired {
                let parked = self.parked.remove(index);
                let response = parked.pending.operation.on_wait_timeout();
                let _ = parked.pending.reply.send(Ok(response));
            } else {
                index += 1;
            }
        }
    }
}

async fn await_backup_acks(
    acks: Vec<oneshot::Receiver<bool>>,
    timeout: Duration,
    reply: oneshot::Sender<OperationResult>,
    response: Response,
) {
    let deadline = Instant::now() + timeout;
    for ack in acks {
        match tokio::time::timeout_at(deadline, ack).await {
            Ok(Ok(true)) => {}
            Ok(_) => tracing::warn!("Synchronous backup was not applied"),
            Err(_) => {
                tracing::warn!("Timed out after {:?} waiting for backup acks", timeout);
                break;
            }
        }
    }
    let _ = reply.send(Ok(response));
}

/// Feeds committed item events to the listener registry off the partition workers.
pub async fn run_event_dispatcher(
    member_id: MemberId,
    listeners: Arc<ListenerRegistry>,
    mut events: mpsc::UnboundedReceiver<EventBatch>,
) {
    while let Some(batch) = events.recv().await {
        listeners.dispatch(&batch.name, batch.kind, &batch.items, &member_id);
    }
}
