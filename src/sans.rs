//! Low-level machinery for the Flexible and Interoperable Data Transfer
//! format.
//!
//! This module knows how bytes are laid out, but nothing about dives. It is
//! used by the [traversal engine](crate::traverse), and is public for vendor
//! glue needing to inspect documents directly.
//!
//! # Layout
//!
//! A document starts with a [header](header::DocumentHeader) declaring the
//! number of record bytes that follow. Each record begins with a one-byte
//! [record header](header::decode_record_header) selecting one of sixteen local types:
//!
//! - A definition record declares the layout (global message number, byte
//! order, and field list) for later data records of its local type. See
//! [`definition`].
//!
//! - A data record carries field values, laid out as its local type's most
//! recent definition declares. Field values are encoded as one of a fixed set
//! of [base types](data::BaseType).
//!
//! The records are followed by a [cyclic redundancy check](check).

pub mod check;
pub mod data;
pub mod definition;
pub mod header;
