//! Errors produced while decoding a dive.

use thiserror::Error;

use crate::sans::header::{DocumentHeaderError, RecordHeaderError};

/// Errors occurring while decoding or querying a dive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The data violates a structural invariant of the format.
    #[error("Malformed data: {0}")]
    Format(#[from] FormatError),
    /// A data record referenced a local type with no definition in this pass.
    #[error("Data record references uninitialized local type {0}.")]
    UninitializedType(u8),
    /// The requested field did not appear in the data.
    #[error("Field is not available.")]
    Unsupported,
    /// A fixed-capacity table is full.
    #[error("No free slot in the {0} table.")]
    ResourceExhausted(&'static str),
}

impl Error {
    /// Whether this error ends the current parse.
    ///
    /// `Unsupported` and `ResourceExhausted` only signal missing or dropped
    /// supplementary data.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Format(_) | Self::UninitializedType(_))
    }
}

impl From<DocumentHeaderError> for Error {
    fn from(err: DocumentHeaderError) -> Self {
        Self::Format(err.into())
    }
}

impl From<RecordHeaderError> for Error {
    fn from(err: RecordHeaderError) -> Self {
        Self::Format(err.into())
    }
}

/// Structural violations of the data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The buffer cannot hold the fixed prefix and document header.
    #[error("Buffer too short ({0} bytes).")]
    TooShort(usize),
    /// Incorrect file type marker.
    #[error("Missing .FIT marker.")]
    MissingMarker,
    /// The document header is shorter than its fixed part.
    #[error("Header length {0} is too short.")]
    HeaderLength(u8),
    /// The header sizes disagree with the buffer.
    #[error("Inconsistent size information (header {header}, data {data}, buffer {buffer}).")]
    InconsistentSize {
        header: usize,
        data: usize,
        buffer: usize,
    },
    /// Found a compressed timestamp header (not supported).
    #[error("Found compressed timestamp header.")]
    CompressedTimestamp,
    /// Found developer data (not supported).
    #[error("Found developer data.")]
    DeveloperData,
    /// A definition declared more fields than can be stored.
    #[error("Definition declares {0} fields.")]
    TooManyFields(usize),
    /// A field is larger than the data remaining in the document.
    #[error("Field {field} size {size} bigger than remaining data ({remaining}).")]
    FieldOverrun {
        field: u8,
        size: usize,
        remaining: usize,
    },
    /// A field's size is not a multiple of its base type's size.
    #[error("Field {field} size {size} is not a multiple of {base_size}.")]
    FieldSize {
        field: u8,
        size: usize,
        base_size: usize,
    },
    /// A string field carries no terminator.
    #[error("String field {0} is not terminated.")]
    UnterminatedString(u8),
    /// A record consumed no bytes.
    #[error("Empty record.")]
    EmptyRecord,
    /// A record extends past the declared data size.
    #[error("Record of {size} bytes exceeds remaining data ({remaining}).")]
    RecordOverrun { size: usize, remaining: usize },
    /// Calculated and found CRC values do not match.
    #[error("Calculated ({calculated}) and found ({found}) CRC values do not match.")]
    CyclicRedundancyCheck { found: u16, calculated: u16 },
}

impl From<DocumentHeaderError> for FormatError {
    fn from(err: DocumentHeaderError) -> Self {
        match err {
            DocumentHeaderError::NotFitData => Self::MissingMarker,
            DocumentHeaderError::HeaderLength(size) => Self::HeaderLength(size),
        }
    }
}

impl From<RecordHeaderError> for FormatError {
    fn from(err: RecordHeaderError) -> Self {
        match err {
            RecordHeaderError::CompressedTimestamp => Self::CompressedTimestamp,
            RecordHeaderError::DeveloperData => Self::DeveloperData,
        }
    }
}
