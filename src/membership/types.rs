use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Stable identity of a cluster member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A member as seen by the static topology: identity plus the address
/// its operation endpoint listens on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub id: MemberId,
    pub addr: SocketAddr,
}

impl FromStr for Member {
    type Err = anyhow::Error;

    /// Parses `id=host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, addr) = s
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected id=host:port, got {}", s))?;
        if id.is_empty() {
            return Err(anyhow::anyhow!("member id must not be empty"));
        }
        Ok(Self {
            id: MemberId(id.to_string()),
            addr: addr.parse()?,
        })
    }
}
