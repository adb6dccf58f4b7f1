//! Backup Replication
//!
//! One ordered outbound channel per replica member, drained by a single delivery
//! task. Backups for a replica therefore leave in exactly the order the owner's
//! partition workers enqueued them, which is the order their primaries ran.
//!
//! Delivery failures are retried with backoff, then logged and reported as a
//! negative ack. They never reach the caller of the primary operation.

use crate::config::InvocationConfig;
use crate::invocation::protocol::{RequestPacket, ResponsePacket};
use crate::invocation::transport::Transport;
use crate::membership::types::MemberId;
use crate::operation::ops::Operation;

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

struct BackupEnvelope {
    partition_id: u32,
    operation: Operation,
    ack: oneshot::Sender<bool>,
}

pub struct ReplicationService {
    local: MemberId,
    transport: Arc<dyn Transport>,
    config: InvocationConfig,
    channels: DashMap<MemberId, mpsc::UnboundedSender<BackupEnvelope>>,
}

impl ReplicationService {
    pub fn new(local: MemberId, transport: Arc<dyn Transport>, config: InvocationConfig) -> Arc<Self> {
        Arc::new(Self {
            local,
            transport,
            config,
            channels: DashMap::new(),
        })
    }

    /// Queues `operation` for `replica` behind everything queued before it.
    ///
    /// The receiver resolves to `true` once the replica applied the backup, or to
    /// `false` when delivery was given up.
    pub fn enqueue(
        &self,
        replica: &MemberId,
        partition_id: u32,
        operation: Operation,
    ) -> oneshot::Receiver<bool> {
        let (ack, acked) = oneshot::channel();
        let envelope = BackupEnvelope {
            partition_id,
            operation,
            ack,
        };

        let sender = self
            .channels
            .entry(replica.clone())
            .or_insert_with(|| self.spawn_channel(replica.clone()))
            .clone();

        if let Err(mpsc::error::SendError(envelope)) = sender.send(envelope) {
            tracing::error!("Replication channel to {} is closed", replica);
            let _ = envelope.ack.send(false);
        }

        acked
    }

    fn spawn_channel(&self, replica: MemberId) -> mpsc::UnboundedSender<BackupEnvelope> {
        let (tx, mut rx) = mpsc::unbounded_channel::<BackupEnvelope>();
        let transport = self.transport.clone();
        let attempts = self.config.backup_attempts.max(1);

        tracing::info!("Opening replication channel {} -> {}", self.local, replica);

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let applied = deliver(
                    transport.as_ref(),
                    &replica,
                    envelope.partition_id,
                    &envelope.operation,
                    attempts,
                )
                .await;
                // Async backups drop their receiver
                let _ = envelope.ack.send(applied);
            }
            tracing::debug!("Replication channel to {} closed", replica);
        });

        tx
    }
}

/// Sends one backup, retrying transport failures. Returns whether the replica
/// applied it.
async fn deliver(
    transport: &dyn Transport,
    replica: &MemberId,
    partition_id: u32,
    operation: &Operation,
    attempts: u32,
) -> bool {
    let packet = RequestPacket::backup(partition_id, operation.clone()).encode();
    let mut delay_ms = 150u64;

    for attempt in 1..=attempts {
        match transport.send(replica, packet.clone()).await {
            Ok(reply) => {
                return match ResponsePacket::decode(reply) {
                    Ok(ResponsePacket::Ok(_)) => {
                        tracing::debug!(
                            "Replicated {} (class {}) to {} for partition {}",
                            operation.name(),
                            operation.class_id(),
                            replica,
                            partition_id
                        );
                        true
                    }
                    Ok(other) => {
                        tracing::error!("Backup rejected by {}: {:?}", replica, other);
                        false
                    }
                    Err(e) => {
                        tracing::error!("Unreadable backup reply from {}: {}", replica, e);
                        false
                    }
                };
            }
            Err(e) => {
                if attempt == attempts {
                    tracing::error!(
                        "Giving up backup of {} to {} after {} attempts: {}",
                        operation.name(),
                        replica,
                        attempts,
                        e
                    );
                    return false;
                }
                tracing::warn!("Backup to {} failed (attempt {}): {}", replica, attempt, e);
                let jitter = rand::random::<u64>() % 50;
                tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                delay_ms = (delay_ms * 2).min(1200);
            }
        }
    }

    false
}
