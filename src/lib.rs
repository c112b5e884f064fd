//! A decoder for dive logs in Garmin's Flexible and Interoperable Data
//! Transfer protocol.
//!
//! Regulator interprets the self-describing record stream of a downloaded
//! dive: definitions arrive in-band and declare the layout of the data
//! records that follow. Decoded values land in a [field cache](cache) that
//! answers dive-level queries (duration, depths, gas mixes, tanks, ...), or
//! are streamed as time-series [samples](sample).
//!
//! Most users should begin with [`Parser`]:
//!
//! ```ignore
//! let mut parser = Parser::new();
//! parser.set_data(&blob)?;
//!
//! let max_depth = parser.field(FieldKind::MaxDepth, 0)?;
//! parser.samples_foreach(&mut |sample: Sample| println!("{sample:?}"))?;
//! ```
//!
//! The byte-level machinery is exposed in the [`sans`] module for vendor glue
//! needing finer control.
//!
//! ## Logging
//!
//! Diagnostics are emitted through [`tracing`]; unknown messages and fields
//! are logged at `debug`, dropped data at `warn`. No subscriber is installed.

pub mod accumulator;
pub mod cache;
pub mod config;
pub mod decode;
pub mod error;
pub mod parser;
pub mod profile;
pub mod registry;
pub mod sample;
pub mod sans;
pub mod traverse;

pub use cache::{FieldKind, FieldValue};
pub use config::{ParserConfig, PressureDepth};
pub use error::{Error, FormatError};
pub use parser::{DiveDateTime, Parser};
pub use sample::{Sample, SampleSink, SampleValue};
