//! Packet Transport
//!
//! Moves encoded packets between members. Framing below the packet (HTTP, or a
//! direct in-process call) is this module's concern only; everything above deals in
//! `Bytes` in and `Bytes` out.

use super::protocol::ENDPOINT_OPERATION;
use crate::engine::node::Node;
use crate::error::TransportError;
use crate::membership::types::{Member, MemberId};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers `packet` to `target` and returns its encoded reply.
    async fn send(&self, target: &MemberId, packet: Bytes) -> Result<Bytes, TransportError>;
}

/// In-process transport for members living in the same runtime.
///
/// Members can be cut off and reattached to simulate a partitioned network, or
/// stalled so that packets to them never get an answer.
#[derive(Default)]
pub struct LocalTransport {
    nodes: DashMap<MemberId, Weak<Node>>,
    disconnected: DashSet<MemberId>,
    stalled: DashSet<MemberId>,
}

impl LocalTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, node: &Arc<Node>) {
        self.nodes
            .insert(node.member_id().clone(), Arc::downgrade(node));
    }

    pub fn disconnect(&self, member: &MemberId) {
        tracing::info!("Disconnecting member {}", member);
        self.disconnected.insert(member.clone());
    }

    pub fn reconnect(&self, member: &MemberId) {
        tracing::info!("Reconnecting member {}", member);
        self.disconnected.remove(member);
        self.stalled.remove(member);
    }

    /// Packets sent to `member` from now on hang until the sender gives up.
    pub fn stall(&self, member: &MemberId) {
        tracing::info!("Stalling member {}", member);
        self.stalled.insert(member.clone());
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, target: &MemberId, packet: Bytes) -> Result<Bytes, TransportError> {
        if self.disconnected.contains(target) {
            return Err(TransportError::Unreachable {
                member: target.clone(),
                reason: "disconnected".to_string(),
            });
        }
        if self.stalled.contains(target) {
            return std::future::pending().await;
        }

        let node = self
            .nodes
            .get(target)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::UnknownMember(target.clone()))?;
        let node = node.upgrade().ok_or_else(|| TransportError::Unreachable {
            member: target.clone(),
            reason: "member shut down".to_string(),
        })?;

        Ok(node.handle_packet(packet).await)
    }
}

/// Posts packets to `ENDPOINT_OPERATION` on the target's address.
pub struct HttpTransport {
    members: HashMap<MemberId, SocketAddr>,
    http_client: reqwest::Client,
    attempts: usize,
}

impl HttpTransport {
    pub fn new(members: &[Member], attempts: usize) -> Self {
        Self {
            members: members
                .iter()
                .map(|member| (member.id.clone(), member.addr))
                .collect(),
            http_client: reqwest::Client::new(),
            attempts: attempts.max(1),
        }
    }

    async fn post_with_retry(
        &self,
        url: String,
        packet: Bytes,
        timeout: Duration,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut delay_ms = 150u64;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let response = self
                .http_client
                .post(url.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(packet.clone())
                .timeout(timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt >= self.attempts => return Err(e),
                Err(e) => {
                    tracing::debug!("POST {} failed (attempt {}): {}", url, attempt, e);
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, target: &MemberId, packet: Bytes) -> Result<Bytes, TransportError> {
        let addr = self
            .members
            .get(target)
            .ok_or_else(|| TransportError::UnknownMember(target.clone()))?;
        let unreachable = |reason: String| TransportError::Unreachable {
            member: target.clone(),
            reason,
        };

        // Parked poll/offer calls hold the request open for their whole wait
        let response = self
            .post_with_retry(
                format!("http://{}{}", addr, ENDPOINT_OPERATION),
                packet,
                Duration::from_secs(3600),
            )
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unreachable(format!("HTTP {}", response.status())));
        }

        response
            .bytes()
            .await
            .map_err(|e| unreachable(e.to_string()))
    }
}
