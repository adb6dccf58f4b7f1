//! Network Protocol Definitions
//!
//! Binary packets exchanged between members on `ENDPOINT_OPERATION`, plus the
//! JSON DTOs of the public queue API.
//!
//! ```text
//! request:  [-1][0][1][partition_id i32][backup bool][operation record]
//! response: [-1][1][1][status u8][status fields]
//! ```
//!
//! The operation record is always the last field of a request so its decoder can
//! apply the trailing-bytes rule to the whole packet.

use crate::error::{ApplicationError, ApplicationErrorKind, DecodeError};
use crate::membership::types::MemberId;
use crate::operation::ops::Operation;
use crate::operation::registry::OperationRegistry;
use crate::operation::types::Response;
use crate::serialization::codec::{ObjectDataInput, ObjectDataOutput};
use crate::serialization::versioned::{
    RecordHeader, VersionedRecord, encode_record, finish_record, open_record, write_record,
};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_OPERATION: &str = "/internal/operation";
pub const ENDPOINT_QUEUE_OFFER: &str = "/queue/:name/offer";
pub const ENDPOINT_QUEUE_POLL: &str = "/queue/:name/poll";
pub const ENDPOINT_QUEUE_PEEK: &str = "/queue/:name/peek";
pub const ENDPOINT_QUEUE_SIZE: &str = "/queue/:name/size";
pub const ENDPOINT_QUEUE_CLEAR: &str = "/queue/:name/clear";
pub const ENDPOINT_QUEUE_DRAIN: &str = "/queue/:name/drain";

pub const SPI_FACTORY_ID: i32 = -1;
pub const PACKET_VERSION: i32 = 1;

pub mod packet_class {
    pub const REQUEST: i32 = 0;
    pub const RESPONSE: i32 = 1;
}

const STATUS_OK: u8 = 0;
const STATUS_ERROR: u8 = 1;
const STATUS_WRONG_TARGET: u8 = 2;
const STATUS_DECODE_FAILURE: u8 = 3;

/// An operation addressed to one partition of the receiving member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPacket {
    pub partition_id: u32,
    /// Set when the operation is a replica-side apply rather than a primary call.
    pub backup: bool,
    pub operation: Operation,
}

impl RequestPacket {
    pub fn primary(partition_id: u32, operation: Operation) -> Self {
        Self {
            partition_id,
            backup: false,
            operation,
        }
    }

    pub fn backup(partition_id: u32, operation: Operation) -> Self {
        Self {
            partition_id,
            backup: true,
            operation,
        }
    }

    pub fn encode(&self) -> Bytes {
        encode_record(self)
    }

    pub fn decode(bytes: Bytes, registry: &OperationRegistry) -> Result<Self, DecodeError> {
        let mut input = ObjectDataInput::new(bytes);
        let (header, partition_id, backup) = {
            let mut record = open_record(&mut input)?;
            record.expect(SPI_FACTORY_ID, packet_class::REQUEST)?;
            let partition_id = record.read_i32()?;
            let partition_id = u32::try_from(partition_id).map_err(|_| DecodeError::InvalidTag {
                field: "partition id",
                tag: partition_id,
            })?;
            (record.header(), partition_id, record.read_bool()?)
        };

        let operation = registry.read_operation(&mut input)?;
        finish_record(&mut input, header, PACKET_VERSION)?;

        Ok(Self {
            partition_id,
            backup,
            operation,
        })
    }
}

impl VersionedRecord for RequestPacket {
    fn header(&self) -> RecordHeader {
        RecordHeader::new(SPI_FACTORY_ID, packet_class::REQUEST, PACKET_VERSION)
    }

    fn write_fields(&self, out: &mut ObjectDataOutput) {
        out.write_i32(self.partition_id as i32);
        out.write_bool(self.backup);
        write_record(&self.operation, out);
    }
}

/// What the receiving member made of a `RequestPacket`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePacket {
    Ok(Response),
    /// The operation ran and raised a business-rule error.
    Error(ApplicationError),
    /// The receiver does not own the partition; `owner` is who it thinks does.
    WrongTarget {
        partition_id: u32,
        owner: Option<MemberId>,
    },
    /// The request could not be read. Nothing was applied.
    DecodeFailure(String),
}

impl ResponsePacket {
    pub fn encode(&self) -> Bytes {
        encode_record(self)
    }

    pub fn decode(bytes: Bytes) -> Result<Self, DecodeError> {
        let mut input = ObjectDataInput::new(bytes);
        let (header, packet) = {
            let mut record = open_record(&mut input)?;
            record.expect(SPI_FACTORY_ID, packet_class::RESPONSE)?;
            let packet = match record.read_u8()? {
                STATUS_OK => ResponsePacket::Ok(Response::read_from(&mut record)?),
                STATUS_ERROR => {
                    let kind = ApplicationErrorKind::from_code(record.read_i32()?)?;
                    ResponsePacket::Error(ApplicationError::new(kind, record.read_string()?))
                }
                STATUS_WRONG_TARGET => {
                    let partition_id = record.read_i32()? as u32;
                    let owner = if record.read_bool()? {
                        Some(MemberId(record.read_string()?))
                    } else {
                        None
                    };
                    ResponsePacket::WrongTarget {
                        partition_id,
                        owner,
                    }
                }
                STATUS_DECODE_FAILURE => ResponsePacket::DecodeFailure(record.read_string()?),
                tag => {
                    return Err(DecodeError::InvalidTag {
                        field: "response status",
                        tag: tag as i32,
                    });
                }
            };
            (record.header(), packet)
        };

        finish_record(&mut input, header, PACKET_VERSION)?;
        Ok(packet)
    }
}

impl VersionedRecord for ResponsePacket {
    fn header(&self) -> RecordHeader {
        RecordHeader::new(SPI_FACTORY_ID, packet_class::RESPONSE, PACKET_VERSION)
    }

    fn write_fields(&self, out: &mut ObjectDataOutput) {
        match self {
            ResponsePacket::Ok(response) => {
                out.write_u8(STATUS_OK);
                response.write_to(out);
            }
            ResponsePacket::Error(error) => {
                out.write_u8(STATUS_ERROR);
                out.write_i32(error.kind.code());
                out.write_string(&error.message);
            }
            ResponsePacket::WrongTarget {
                partition_id,
                owner,
            } => {
                out.write_u8(STATUS_WRONG_TARGET);
                out.write_i32(*partition_id as i32);
                out.write_bool(owner.is_some());
                if let Some(owner) = owner {
                    out.write_string(&owner.0);
                }
            }
            ResponsePacket::DecodeFailure(reason) => {
                out.write_u8(STATUS_DECODE_FAILURE);
                out.write_string(reason);
            }
        }
    }
}

// --- Public JSON API ---

#[derive(Debug, Serialize, Deserialize)]
pub struct OfferRequest {
    pub item: String,
    #[serde(default)]
    pub timeout_ms: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PollRequest {
    #[serde(default)]
    pub timeout_ms: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DrainRequest {
    /// Drains everything when absent.
    pub max_size: Option<usize>,
}

/// Reply shape shared by the queue endpoints; only the fields that apply are set.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct QueueResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}
