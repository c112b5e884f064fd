//! Definition records.

use zerocopy::FromBytes;

use super::data::Endianness;

/// Size of the fixed part of a definition record, after the record header.
pub const DEFINITION_SIZE: usize = 5;

/// Size of each field triple in a definition record.
pub const FIELD_DEFINITION_SIZE: usize = 3;

/// State token to decode the fixed part of a definition record.
#[derive(Debug)]
pub struct Definition(pub(super) ());

/// The fixed part of a definition record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefinitionHeader {
    /// Byte order of the global message number and of every field in data
    /// records using this definition.
    pub endianness: Endianness,
    pub global_message: u16,
    pub field_count: u8,
}

impl Definition {
    /// Decode the fixed part of a definition record.
    ///
    /// The global message number is read in the byte order the definition
    /// itself declares.
    pub fn advance(self, r: [u8; DEFINITION_SIZE]) -> DefinitionHeader {
        #[repr(C, packed)]
        #[derive(Debug, FromBytes)]
        struct DefinitionMessage {
            _reserved: u8,
            architecture: u8,
            global_message: [u8; 2],
            field_count: u8,
        }

        let DefinitionMessage {
            architecture,
            global_message,
            field_count,
            ..
        } = zerocopy::transmute!(r);

        let endianness = Endianness::from_architecture(architecture);
        let global_message = match endianness {
            Endianness::Little => u16::from_le_bytes(global_message),
            Endianness::Big => u16::from_be_bytes(global_message),
        };

        DefinitionHeader {
            endianness,
            global_message,
            field_count,
        }
    }
}

/// A field declared by a definition record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    pub number: u8,
    /// Size of the field in bytes; a multiple of the base type's size.
    pub size: u8,
    /// Raw base type code, including the endian-capable flag.
    pub base_type: u8,
}

impl FieldDefinition {
    /// Decode a field triple.
    pub fn decode(r: [u8; FIELD_DEFINITION_SIZE]) -> Self {
        #[repr(C, packed)]
        #[derive(FromBytes)]
        struct FieldHeader {
            number: u8,
            size: u8,
            base_type: u8,
        }

        let FieldHeader {
            number,
            size,
            base_type,
        } = zerocopy::transmute!(r);

        Self {
            number,
            size,
            base_type,
        }
    }
}
