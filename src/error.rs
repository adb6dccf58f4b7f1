//! Error Types
//!
//! Every failure a queue call can observe falls into one of four buckets:
//!
//! - **`DecodeError`**: malformed or truncated wire bytes. Isolated to the single
//!   invocation whose packet could not be read; never takes down a partition worker.
//! - **`QueueError::Routing`**: the partition owner could not be reached or kept
//!   rejecting the operation after the bounded number of re-resolutions.
//! - **`ApplicationError`**: a business-rule violation raised while an operation ran
//!   on its owner (null item, illegal argument). The kind survives the trip back
//!   to the caller.
//! - **`QueueError::Interrupted`**: the caller stopped waiting. The operation may or
//!   may not have been applied on the owner.

use crate::membership::types::MemberId;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated stream: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    #[error("unknown record: factory {factory_id}, class {class_id}")]
    UnknownRecord { factory_id: i32, class_id: i32 },

    #[error("invalid {field} tag: {tag}")]
    InvalidTag { field: &'static str, tag: i32 },

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    #[error("unexpected response for {0}")]
    UnexpectedResponse(&'static str),

    #[error("remote member rejected the packet: {0}")]
    Rejected(String),
}

/// Business-rule failure kinds carried over the wire as an `i32` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationErrorKind {
    NullItem,
    IllegalArgument,
    IllegalState,
    Internal,
}

impl ApplicationErrorKind {
    pub fn code(self) -> i32 {
        match self {
            ApplicationErrorKind::NullItem => 1,
            ApplicationErrorKind::IllegalArgument => 2,
            ApplicationErrorKind::IllegalState => 3,
            ApplicationErrorKind::Internal => 4,
        }
    }

    pub fn from_code(code: i32) -> std::result::Result<Self, DecodeError> {
        match code {
            1 => Ok(ApplicationErrorKind::NullItem),
            2 => Ok(ApplicationErrorKind::IllegalArgument),
            3 => Ok(ApplicationErrorKind::IllegalState),
            4 => Ok(ApplicationErrorKind::Internal),
            tag => Err(DecodeError::InvalidTag {
                field: "application error kind",
                tag,
            }),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct ApplicationError {
    pub kind: ApplicationErrorKind,
    pub message: String,
}

impl ApplicationError {
    pub fn new(kind: ApplicationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn null_item() -> Self {
        Self::new(ApplicationErrorKind::NullItem, "Object is null")
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new(ApplicationErrorKind::IllegalArgument, message)
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new(ApplicationErrorKind::IllegalState, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApplicationErrorKind::Internal, message)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("unknown member {0}")]
    UnknownMember(MemberId),

    #[error("member {member} unreachable: {reason}")]
    Unreachable { member: MemberId, reason: String },
}

/// The error surfaced by every proxy call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("partition {partition_id} could not be routed after {attempts} attempts: {last}")]
    Routing {
        partition_id: u32,
        attempts: u32,
        last: String,
    },

    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error("invocation interrupted while waiting for a response")]
    Interrupted,
}

impl QueueError {
    /// `true` when the caller cannot tell whether the operation was applied.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, QueueError::Interrupted)
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
