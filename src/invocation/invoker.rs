//! Operation Invoker
//!
//! Turns an operation plus a partition id into an `InvocationFuture`. Each
//! invocation runs as its own task: resolve the owner, send the encoded request,
//! decode the reply. A reply saying the receiver is not the owner, or a member
//! that cannot be reached, sends the task back to the router for a fresh owner.
//! After `max_attempts` it gives up with `QueueError::Routing`.
//!
//! The future resolves exactly once, through a oneshot channel. A caller that
//! stops waiting (interrupt or drop) closes the channel, which also stops any
//! further retries of that invocation.

use super::protocol::{RequestPacket, ResponsePacket};
use super::transport::Transport;
use crate::config::InvocationConfig;
use crate::error::{DecodeError, QueueError, Result};
use crate::operation::ops::Operation;
use crate::operation::types::Response;
use crate::partition::router::PartitionRouter;

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{oneshot, watch};

#[derive(Clone)]
pub struct OperationInvoker {
    router: Arc<PartitionRouter>,
    transport: Arc<dyn Transport>,
    config: InvocationConfig,
    next_call_id: Arc<AtomicI64>,
}

impl OperationInvoker {
    pub fn new(
        router: Arc<PartitionRouter>,
        transport: Arc<dyn Transport>,
        config: InvocationConfig,
    ) -> Self {
        Self {
            router,
            transport,
            config,
            next_call_id: Arc::new(AtomicI64::new(1)),
        }
    }

    pub fn router(&self) -> &Arc<PartitionRouter> {
        &self.router
    }

    pub fn invoke(&self, operation: Operation, partition_id: u32) -> InvocationFuture {
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let operation = operation.with_call_id(call_id);
        let (mut tx, rx) = oneshot::channel();
        let invoker = self.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                result = invoker.send_until_routed(operation, partition_id) => result,
                _ = tx.closed() => {
                    tracing::debug!("Call {} abandoned by its caller", call_id);
                    return;
                }
            };
            let _ = tx.send(result);
        });

        InvocationFuture { partition_id, rx }
    }

    async fn send_until_routed(&self, operation: Operation, partition_id: u32) -> Result<Response> {
        let packet = RequestPacket::primary(partition_id, operation).encode();
        let max_attempts = self.config.max_attempts.max(1);
        let mut last = String::new();

        for attempt in 1..=max_attempts {
            match self.router.owner_of(partition_id) {
                None => last = format!("partition {} has no owner", partition_id),
                Some(owner) => match self.transport.send(&owner, packet.clone()).await {
                    Ok(reply) => match ResponsePacket::decode(reply)? {
                        ResponsePacket::Ok(response) => return Ok(response),
                        ResponsePacket::Error(e) => return Err(QueueError::Application(e)),
                        ResponsePacket::DecodeFailure(reason) => {
                            return Err(QueueError::Decode(DecodeError::Rejected(reason)));
                        }
                        ResponsePacket::WrongTarget { owner: hint, .. } => {
                            last = format!("{} does not own it (points at {:?})", owner, hint);
                        }
                    },
                    Err(e) => last = e.to_string(),
                },
            }

            if attempt < max_attempts {
                tracing::debug!(
                    "Re-resolving partition {} (attempt {}): {}",
                    partition_id,
                    attempt,
                    last
                );
                tokio::time::sleep(self.config.retry_pause()).await;
            }
        }

        tracing::warn!(
            "Partition {} unroutable after {} attempts: {}",
            partition_id,
            max_attempts,
            last
        );
        Err(QueueError::Routing {
            partition_id,
            attempts: max_attempts,
            last,
        })
    }
}

/// The pending result of one invocation.
pub struct InvocationFuture {
    partition_id: u32,
    rx: oneshot::Receiver<Result<Response>>,
}

impl InvocationFuture {
    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    pub async fn get(self) -> Result<Response> {
        self.rx.await.unwrap_or(Err(QueueError::Interrupted))
    }

    /// Like `get`, but gives up with `QueueError::Interrupted` as soon as
    /// `interrupt` fires. The operation may still be applied on its owner.
    pub async fn get_interruptible(self, interrupt: &Interrupt) -> Result<Response> {
        tokio::select! {
            result = self.rx => result.unwrap_or(Err(QueueError::Interrupted)),
            _ = interrupt.interrupted() => Err(QueueError::Interrupted),
        }
    }
}

/// A cancellation signal a caller can race against a pending invocation.
#[derive(Clone)]
pub struct Interrupt {
    signal: Arc<watch::Sender<bool>>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal: Arc::new(signal),
        }
    }

    pub fn interrupt(&self) {
        self.signal.send_replace(true);
    }

    pub fn is_interrupted(&self) -> bool {
        *self.signal.borrow()
    }

    pub async fn interrupted(&self) {
        let mut rx = self.signal.subscribe();
        // The sender lives as long as `self`, so this only returns once set
        let _ = rx.wait_for(|interrupted| *interrupted).await;
    }
}
