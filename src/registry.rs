//! Record type registry.
//!
//! Maps each local type of a document to the definition most recently
//! declared for it. Definitions are resolved against the
//! [decode table](crate::profile) once, when declared, so data records only
//! replay the stored field list.

use std::borrow::Cow;

use tinyvec::ArrayVec;
use tracing::debug;

use crate::{
    error::{Error, FormatError},
    profile::{self, FieldDescriptor, MessageDescriptor},
    sans::{data::Endianness, definition::FieldDefinition},
};

/// Number of local types.
pub const MAX_LOCAL_TYPES: usize = 16;

/// Maximum number of fields per definition.
pub const MAX_FIELDS: usize = 128;

/// The message a definition's global number resolves to.
#[derive(Debug, Clone, Copy)]
pub enum Descriptor {
    Known(&'static MessageDescriptor),
    /// A message this decoder has no table for; its fields are only logged.
    Unknown(u16),
}

impl Descriptor {
    pub fn resolve(global_message: u16) -> Self {
        match profile::message(global_message) {
            Some(message) => Self::Known(message),
            None => Self::Unknown(global_message),
        }
    }

    pub fn number(&self) -> u16 {
        match self {
            Self::Known(message) => message.number,
            Self::Unknown(number) => *number,
        }
    }

    /// Find the decoder entry for a field number.
    ///
    /// Universal fields take precedence over the message's own table.
    pub fn field(&self, number: u8) -> Option<&'static FieldDescriptor> {
        profile::universal_field(number).or_else(|| match self {
            Self::Known(message) => message.field(number),
            Self::Unknown(_) => None,
        })
    }
}

/// A stored definition.
#[derive(Debug, Clone)]
pub struct RecordDefinition {
    pub descriptor: Descriptor,
    /// Message name, synthesized as `msg-N` for unknown messages.
    pub name: Cow<'static, str>,
    pub endianness: Endianness,
    pub fields: ArrayVec<[FieldDefinition; MAX_FIELDS]>,
}

impl RecordDefinition {
    /// Number of bytes in a data record using this definition, excluding the
    /// record header.
    pub fn data_size(&self) -> usize {
        self.fields.iter().map(|f| f.size as usize).sum()
    }
}

/// Definitions for every local type.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    slots: [Option<RecordDefinition>; MAX_LOCAL_TYPES],
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every definition.
    pub fn reset(&mut self) {
        self.slots = Default::default();
    }

    /// Declare the definition of a local type, replacing any earlier one.
    pub fn define(
        &mut self,
        local: u8,
        global_message: u16,
        endianness: Endianness,
        fields: &[FieldDefinition],
    ) -> Result<&RecordDefinition, Error> {
        if fields.len() > MAX_FIELDS {
            Err(FormatError::TooManyFields(fields.len()))?;
        }

        let slot = self
            .slots
            .get_mut(local as usize)
            .ok_or(Error::UninitializedType(local))?;

        let descriptor = Descriptor::resolve(global_message);
        let name = match descriptor {
            Descriptor::Known(message) => Cow::Borrowed(message.name),
            Descriptor::Unknown(number) => {
                debug!(local, global_message, "Definition for unknown message");
                Cow::Owned(format!("msg-{number}"))
            }
        };

        let mut stored = ArrayVec::new();
        stored.extend_from_slice(fields);

        Ok(&*slot.insert(RecordDefinition {
            descriptor,
            name,
            endianness,
            fields: stored,
        }))
    }

    /// Retrieve the definition of a local type.
    pub fn lookup(&self, local: u8) -> Result<&RecordDefinition, Error> {
        self.slots
            .get(local as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::UninitializedType(local))
    }
}
