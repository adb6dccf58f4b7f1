use crate::error::DecodeError;
use crate::serialization::codec::{ObjectDataInput, ObjectDataOutput};
use crate::serialization::versioned::{RecordHeader, finish_record, open_record};
use bytes::Bytes;

/// Factory id shared by every queue operation and queue value.
pub const QUEUE_FACTORY_ID: i32 = -11;

/// Current schema version of queue operation records.
///
/// Version 2 appended the trailing `call_id` field.
pub const OPERATION_VERSION: i32 = 2;

/// Schema version of the item collection carried by `Response::Items`.
pub const ITEM_COLLECTION_VERSION: i32 = 1;

/// Class ids within `QUEUE_FACTORY_ID`. Stable across releases.
pub mod class_id {
    pub const OFFER: i32 = 0;
    pub const POLL: i32 = 1;
    pub const PEEK: i32 = 2;
    pub const OFFER_BACKUP: i32 = 3;
    pub const POLL_BACKUP: i32 = 4;
    pub const ADD_ALL_BACKUP: i32 = 5;
    pub const ADD_ALL: i32 = 6;
    pub const CLEAR_BACKUP: i32 = 7;
    pub const CLEAR: i32 = 8;
    pub const COMPARE_AND_REMOVE_BACKUP: i32 = 9;
    pub const COMPARE_AND_REMOVE: i32 = 10;
    pub const CONTAINS: i32 = 11;
    pub const DRAIN_BACKUP: i32 = 12;
    pub const DRAIN: i32 = 13;
    pub const ITERATOR: i32 = 14;
    pub const REMOVE_BACKUP: i32 = 16;
    pub const REMOVE: i32 = 17;
    pub const SIZE: i32 = 18;
    pub const DESTROY: i32 = 19;
    pub const DESTROY_BACKUP: i32 = 20;
    pub const ITEM_COLLECTION: i32 = 30;
}

/// Identifier assigned by the owner when an item enters a queue. Backups reuse it.
pub type ItemId = i64;

/// Opaque serialized item. An empty buffer stands for a null item.
pub type Data = Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub item_id: ItemId,
    pub data: Data,
}

impl QueueItem {
    pub fn new(item_id: ItemId, data: Data) -> Self {
        Self { item_id, data }
    }
}

/// Value an operation hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    None,
    Bool(bool),
    Int(i32),
    Item(Option<Data>),
    Items(Vec<Data>),
}

const RESPONSE_NONE: u8 = 0;
const RESPONSE_BOOL: u8 = 1;
const RESPONSE_INT: u8 = 2;
const RESPONSE_ITEM: u8 = 3;
const RESPONSE_ITEMS: u8 = 4;

impl Response {
    pub fn write_to(&self, out: &mut ObjectDataOutput) {
        match self {
            Response::None => out.write_u8(RESPONSE_NONE),
            Response::Bool(value) => {
                out.write_u8(RESPONSE_BOOL);
                out.write_bool(*value);
            }
            Response::Int(value) => {
                out.write_u8(RESPONSE_INT);
                out.write_i32(*value);
            }
            Response::Item(item) => {
                out.write_u8(RESPONSE_ITEM);
                out.write_nullable_byte_array(item.as_deref());
            }
            Response::Items(items) => {
                out.write_u8(RESPONSE_ITEMS);
                // A collection is a complex value and carries its own header
                RecordHeader::new(QUEUE_FACTORY_ID, class_id::ITEM_COLLECTION, ITEM_COLLECTION_VERSION)
                    .write_to(out);
                out.write_len(items.len());
                for item in items {
                    out.write_byte_array(item);
                }
            }
        }
    }

    pub fn read_from(input: &mut ObjectDataInput) -> Result<Self, DecodeError> {
        match input.read_u8()? {
            RESPONSE_NONE => Ok(Response::None),
            RESPONSE_BOOL => Ok(Response::Bool(input.read_bool()?)),
            RESPONSE_INT => Ok(Response::Int(input.read_i32()?)),
            RESPONSE_ITEM => Ok(Response::Item(input.read_nullable_byte_array()?)),
            RESPONSE_ITEMS => {
                let (header, items) = {
                    let mut record = open_record(input)?;
                    record.expect(QUEUE_FACTORY_ID, class_id::ITEM_COLLECTION)?;
                    if record.version() < 1 {
                        return Err(DecodeError::InvalidTag {
                            field: "item collection version",
                            tag: record.version(),
                        });
                    }
                    let len = record.read_len(4)?;
                    let mut items = Vec::with_capacity(len);
                    for _ in 0..len {
                        items.push(record.read_byte_array()?);
                    }
                    (record.header(), items)
                };
                finish_record(input, header, ITEM_COLLECTION_VERSION)?;
                Ok(Response::Items(items))
            }
            tag => Err(DecodeError::InvalidTag {
                field: "response",
                tag: tag as i32,
            }),
        }
    }

    pub fn into_bool(self) -> Result<bool, DecodeError> {
        match self {
            Response::Bool(value) => Ok(value),
            _ => Err(DecodeError::UnexpectedResponse("bool")),
        }
    }

    pub fn into_int(self) -> Result<i32, DecodeError> {
        match self {
            Response::Int(value) => Ok(value),
            _ => Err(DecodeError::UnexpectedResponse("int")),
        }
    }

    pub fn into_item(self) -> Result<Option<Data>, DecodeError> {
        match self {
            Response::Item(item) => Ok(item),
            _ => Err(DecodeError::UnexpectedResponse("item")),
        }
    }

    pub fn into_items(self) -> Result<Vec<Data>, DecodeError> {
        match self {
            Response::Items(items) => Ok(items),
            _ => Err(DecodeError::UnexpectedResponse("items")),
        }
    }
}
