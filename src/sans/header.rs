//! Document and record headers.

use either::Either::{self, Left, Right};
use tartan_bitfield::bitfield;
use thiserror::Error;
use zerocopy::FromBytes;

use super::definition::Definition;

/// Size of the fixed part of a document header.
pub const DOCUMENT_HEADER_SIZE: usize = 12;

/// An error decoding a document header.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DocumentHeaderError {
    /// Incorrect filetype marker.
    #[error("Incorrect file type marker.")]
    NotFitData,
    /// Header length shorter than the fixed header.
    #[error("Header length too short ({0}).")]
    HeaderLength(u8),
}

/// A decoded document header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentHeader {
    /// Size of the header, including any trailing bytes beyond the fixed part.
    pub header_size: u8,
    pub protocol_version: u8,
    pub profile_version: u16,
    /// Number of record bytes following the header.
    pub data_size: u32,
}

impl DocumentHeader {
    /// Decode the fixed part of a document header.
    ///
    /// Headers longer than the fixed part (such as the 14-byte header carrying
    /// its own check value) are accepted; the caller skips the excess.
    pub fn decode(r: [u8; DOCUMENT_HEADER_SIZE]) -> Result<Self, DocumentHeaderError> {
        #[repr(C, packed)]
        #[derive(FromBytes)]
        struct FileHeader {
            header_size: u8,
            protocol_version: u8,
            profile_version: [u8; 2],
            data_size: [u8; 4],
            data_type: [u8; 4],
        }

        let FileHeader {
            header_size,
            protocol_version,
            profile_version,
            data_size,
            data_type,
        } = zerocopy::transmute!(r);

        if &data_type != b".FIT" {
            Err(DocumentHeaderError::NotFitData)?;
        }

        if (header_size as usize) < DOCUMENT_HEADER_SIZE {
            Err(DocumentHeaderError::HeaderLength(header_size))?;
        }

        Ok(Self {
            header_size,
            protocol_version,
            profile_version: u16::from_le_bytes(profile_version),
            data_size: u32::from_le_bytes(data_size),
        })
    }
}

/// An error decoding a record header.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RecordHeaderError {
    /// Found a compressed timestamp header (not supported).
    #[error("Found compressed timestamp header.")]
    CompressedTimestamp,
    /// Found developer data (not supported).
    #[error("Found developer data.")]
    DeveloperData,
}

/// State token for a data record of a local type.
#[derive(Debug)]
pub struct Data(pub(super) ());

/// Decode a record header.
///
/// Returns the local type, and a token for the record kind that follows.
pub fn decode_record_header(r: u8) -> Result<(u8, Either<Definition, Data>), RecordHeaderError> {
    bitfield! {
        struct RecordHeader(u8) {
            [0..4] local_type: u8,
            [5] is_developer,
            [6] is_definition,
            [7] is_compressed,
        }
    }

    let header = RecordHeader(r);

    // Producers may reserve compressed headers, so reject rather than
    // misread them.
    if header.is_compressed() {
        Err(RecordHeaderError::CompressedTimestamp)?;
    }

    if header.is_developer() {
        Err(RecordHeaderError::DeveloperData)?;
    }

    let successor = if header.is_definition() {
        Left(Definition(()))
    } else {
        Right(Data(()))
    };

    Ok((header.local_type(), successor))
}
