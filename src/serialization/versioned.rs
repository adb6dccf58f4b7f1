//! Versioned Record Stream
//!
//! Every operation and every complex value on the wire starts with a fixed header:
//!
//! ```text
//! [factory_id: i32][class_id: i32][schema_version: i32][fields...]
//! ```
//!
//! The header is read by the framework and attached to a `VersionedInput` before the
//! record's own decode routine sees a single field. Fields are only ever appended in
//! later schema versions, so a decoder guards each newer field with `since(n)`.

use super::codec::{ObjectDataInput, ObjectDataOutput};
use crate::error::DecodeError;
use bytes::Bytes;
use std::ops::{Deref, DerefMut};

pub const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordHeader {
    pub factory_id: i32,
    pub class_id: i32,
    pub version: i32,
}

impl RecordHeader {
    pub fn new(factory_id: i32, class_id: i32, version: i32) -> Self {
        Self {
            factory_id,
            class_id,
            version,
        }
    }

    pub fn write_to(&self, out: &mut ObjectDataOutput) {
        out.write_i32(self.factory_id);
        out.write_i32(self.class_id);
        out.write_i32(self.version);
    }

    pub fn read_from(input: &mut ObjectDataInput) -> Result<Self, DecodeError> {
        Ok(Self {
            factory_id: input.read_i32()?,
            class_id: input.read_i32()?,
            version: input.read_i32()?,
        })
    }
}

/// A record that knows its header and how to write its own fields.
pub trait VersionedRecord {
    fn header(&self) -> RecordHeader;

    fn write_fields(&self, out: &mut ObjectDataOutput);
}

/// Input stream with the record header attached as read-only context.
pub struct VersionedInput<'a> {
    input: &'a mut ObjectDataInput,
    header: RecordHeader,
}

impl<'a> VersionedInput<'a> {
    fn new(input: &'a mut ObjectDataInput, header: RecordHeader) -> Self {
        Self { input, header }
    }

    pub fn header(&self) -> RecordHeader {
        self.header
    }

    pub fn factory_id(&self) -> i32 {
        self.header.factory_id
    }

    pub fn class_id(&self) -> i32 {
        self.header.class_id
    }

    pub fn version(&self) -> i32 {
        self.header.version
    }

    /// `true` when the writer's schema includes fields added in `version`.
    pub fn since(&self, version: i32) -> bool {
        self.header.version >= version
    }

    pub fn expect(&self, factory_id: i32, class_id: i32) -> Result<(), DecodeError> {
        if self.header.factory_id != factory_id || self.header.class_id != class_id {
            return Err(DecodeError::UnknownRecord {
                factory_id: self.header.factory_id,
                class_id: self.header.class_id,
            });
        }
        Ok(())
    }
}

impl Deref for VersionedInput<'_> {
    type Target = ObjectDataInput;

    fn deref(&self) -> &Self::Target {
        self.input
    }
}

impl DerefMut for VersionedInput<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.input
    }
}

pub fn write_record(record: &impl VersionedRecord, out: &mut ObjectDataOutput) {
    record.header().write_to(out);
    record.write_fields(out);
}

pub fn encode_record(record: &impl VersionedRecord) -> Bytes {
    let mut out = ObjectDataOutput::new();
    write_record(record, &mut out);
    out.freeze()
}

/// Reads the next header and hands back the stream with it attached.
pub fn open_record(input: &mut ObjectDataInput) -> Result<VersionedInput<'_>, DecodeError> {
    let header = RecordHeader::read_from(input)?;
    Ok(VersionedInput::new(input, header))
}

/// Rejects leftover bytes unless the writer used a newer schema than `known_version`,
/// in which case the tail holds fields this member does not know about yet and is
/// skipped. A record that may grow must therefore be the last field of its parent.
pub fn finish_record(
    input: &mut ObjectDataInput,
    header: RecordHeader,
    known_version: i32,
) -> Result<(), DecodeError> {
    let remaining = input.remaining();
    if remaining == 0 {
        return Ok(());
    }
    if header.version <= known_version {
        return Err(DecodeError::TrailingBytes(remaining));
    }
    input.skip_remaining();
    Ok(())
}
