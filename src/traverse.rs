//! Record traversal engine.
//!
//! Walks the records of a fully buffered document, registering definitions
//! and replaying them over data records. The same walk serves both passes: a
//! silent pass that fills the field cache, and a streaming pass that also
//! emits samples to a sink.

use either::Either::{Left, Right};
use tinyvec::ArrayVec;
use tracing::{debug, trace, warn};

use crate::{
    accumulator::Accumulator,
    cache::{FieldCache, FieldKind, FieldValue},
    config::ParserConfig,
    decode,
    error::{Error, FormatError},
    profile::{Effect, universal},
    registry::{MAX_FIELDS, RecordDefinition, Registry},
    sample::{Sample, SampleSink, SampleValue},
    sans::{
        check::compute_crc,
        data::BaseType,
        definition::{DEFINITION_SIZE, Definition, FIELD_DEFINITION_SIZE, FieldDefinition},
        header::{DOCUMENT_HEADER_SIZE, DocumentHeader, decode_record_header},
    },
};

/// Where decoded fields go during a pass.
pub struct Output<'a> {
    pub cache: &'a mut FieldCache,
    pub config: &'a ParserConfig,
    sink: Option<&'a mut dyn SampleSink>,
    /// Latest timestamp, in seconds since the format's epoch.
    timestamp: Option<u32>,
}

impl<'a> Output<'a> {
    pub fn new(
        cache: &'a mut FieldCache,
        config: &'a ParserConfig,
        sink: Option<&'a mut dyn SampleSink>,
    ) -> Self {
        Self {
            cache,
            config,
            sink,
            timestamp: None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.sink.is_some()
    }

    pub fn timestamp(&self) -> Option<u32> {
        self.timestamp
    }

    /// Advance the current time. The first timestamp of a dive is its start
    /// until a session says otherwise.
    pub fn set_timestamp(&mut self, timestamp: u32) {
        self.timestamp = Some(timestamp);

        if !self.cache.contains(FieldKind::StartTime) {
            self.cache.assign(FieldValue::StartTime(timestamp));
        }
    }

    /// Seconds from the start of the dive to the current time.
    pub fn time(&self) -> u32 {
        match self.timestamp {
            Some(timestamp) => timestamp.saturating_sub(self.cache.start_time().unwrap_or(timestamp)),
            None => 0,
        }
    }

    /// Send a sample to the sink, if streaming.
    pub fn emit(&mut self, value: SampleValue) {
        let time = self.time();

        if let Some(sink) = self.sink.as_deref_mut() {
            trace!(time, ?value, "Sample");
            sink.add_sample(Sample { time, value });
        }
    }
}

/// The framed parts of a dive blob.
#[derive(Debug)]
pub struct Payload<'a> {
    pub header: DocumentHeader,
    /// The record section.
    pub records: &'a [u8],
}

/// Validate the framing of a dive blob and locate its records.
pub fn locate<'a>(data: &'a [u8], config: &ParserConfig) -> Result<Payload<'a>, Error> {
    let document = data
        .get(config.name_size..)
        .filter(|d| d.len() >= DOCUMENT_HEADER_SIZE)
        .ok_or(FormatError::TooShort(data.len()))?;

    let header = document
        .first_chunk::<DOCUMENT_HEADER_SIZE>()
        .ok_or(FormatError::TooShort(data.len()))?;
    let header = DocumentHeader::decode(*header)?;

    let header_size = header.header_size as usize;
    let data_size = header.data_size as usize;
    let end = header_size + data_size; // Offset to the end of the record section.

    let inconsistent = FormatError::InconsistentSize {
        header: header_size,
        data: data_size,
        buffer: document.len(),
    };

    let records = document.get(header_size..end).ok_or(inconsistent.clone())?;

    if config.verify_crc {
        let found = document
            .get(end..)
            .and_then(|r| r.first_chunk::<2>())
            .map(|r| u16::from_le_bytes(*r))
            .ok_or(inconsistent)?;
        let calculated = compute_crc(0, &document[..end]);

        if found != calculated {
            Err(FormatError::CyclicRedundancyCheck { found, calculated })?;
        }
    }

    debug!(
        protocol = header.protocol_version,
        profile = header.profile_version,
        size = data_size,
        "Located records"
    );

    Ok(Payload { header, records })
}

/// Run one pass over a dive blob.
///
/// Without a sink this is the silent pass; with one, samples are emitted in
/// record order.
pub fn traverse<'a>(
    data: &[u8],
    config: &'a ParserConfig,
    cache: &'a mut FieldCache,
    sink: Option<&'a mut dyn SampleSink>,
) -> Result<(), Error> {
    let Payload { records, .. } = locate(data, config)?;

    let mut registry = Registry::new();
    let mut acc = Accumulator::new();
    let mut out = Output::new(cache, config, sink);

    let mut i = 0; // Counter of bytes read.

    while i < records.len() {
        let size = record(&records[i..], &mut registry, &mut acc, &mut out)?;

        if size == 0 {
            Err(FormatError::EmptyRecord)?;
        }

        i += size;
        acc.end_record(&mut out);
    }

    Ok(())
}

/// Scan a dive blob for the first sign that it records a dive: a dive
/// sub-sport, or a summary average depth.
///
/// Only definitions and the discriminating fields are decoded, and the scan
/// stops at the first hit, so later faults in the blob go unnoticed.
pub fn classify(data: &[u8], config: &ParserConfig) -> Result<bool, Error> {
    let Payload { records, .. } = locate(data, config)?;

    let mut registry = Registry::new();
    let mut i = 0; // Counter of bytes read.

    while let Some((&header, body)) = records.get(i..).and_then(<[u8]>::split_first) {
        let (local, successor) = decode_record_header(header)?;

        let size = match successor {
            Left(state) => definition(state, local, body, &mut registry)?,
            Right(_) => {
                let layout = registry.lookup(local)?;
                let size = layout.data_size();
                let body = body.get(..size).ok_or(FormatError::RecordOverrun {
                    size: 1 + size,
                    remaining: body.len() + 1,
                })?;

                if discriminates(layout, body) {
                    trace!(message = %layout.name, "Found dive discriminant");
                    return Ok(true);
                }

                size
            }
        };

        i += 1 + size;
    }

    Ok(false)
}

/// Whether a data record carries a dive sub-sport or an average depth.
fn discriminates(definition: &RecordDefinition, r: &[u8]) -> bool {
    let mut offset = 0;

    for field in definition.fields.iter() {
        let start = offset;
        offset += field.size as usize;

        let Some(descriptor) = definition.descriptor.field(field.number) else {
            continue;
        };
        if !matches!(descriptor.effect, Effect::SubSport | Effect::AvgDepth) {
            continue;
        }

        let Some(base) = BaseType::from_code(field.base_type) else {
            continue;
        };
        let Some(span) = r.get(start..offset).filter(|s| !s.is_empty() && s.len() % base.size() == 0)
        else {
            continue;
        };
        if !compatible(descriptor.base, base) {
            continue;
        }

        let Some(value) = base.decode(span, definition.endianness, descriptor.extra_invalid) else {
            continue;
        };

        let found = match descriptor.effect {
            Effect::SubSport => decode::dive_mode(value.as_u64().min(u8::MAX as u64) as u8).is_some(),
            _ => true,
        };
        if found {
            return true;
        }
    }

    false
}

/// Decode one record, returning the number of bytes it spans.
fn record(
    r: &[u8],
    registry: &mut Registry,
    acc: &mut Accumulator,
    out: &mut Output<'_>,
) -> Result<usize, Error> {
    let Some((&header, body)) = r.split_first() else {
        return Ok(0);
    };

    let (local, successor) = decode_record_header(header)?;

    Ok(match successor {
        Left(state) => 1 + definition(state, local, body, registry)?,
        Right(_) => 1 + data(registry.lookup(local)?, body, acc, out)?,
    })
}

fn definition(state: Definition, local: u8, r: &[u8], registry: &mut Registry) -> Result<usize, Error> {
    let overrun = |size| FormatError::RecordOverrun {
        size: 1 + size,
        remaining: r.len() + 1,
    };

    let fixed = r.first_chunk::<DEFINITION_SIZE>().ok_or(overrun(DEFINITION_SIZE))?;
    let header = state.advance(*fixed);

    let size = DEFINITION_SIZE + FIELD_DEFINITION_SIZE * header.field_count as usize;
    let triples = r.get(DEFINITION_SIZE..size).ok_or(overrun(size))?;

    let fields: Vec<FieldDefinition> = triples
        .chunks_exact(FIELD_DEFINITION_SIZE)
        .filter_map(|c| c.first_chunk().copied())
        .map(FieldDefinition::decode)
        .collect();

    let definition = registry.define(local, header.global_message, header.endianness, &fields)?;

    trace!(
        local,
        message = %definition.name,
        endianness = ?definition.endianness,
        fields = definition.fields.len(),
        "Definition"
    );

    Ok(size)
}

fn data(
    definition: &RecordDefinition,
    r: &[u8],
    acc: &mut Accumulator,
    out: &mut Output<'_>,
) -> Result<usize, Error> {
    // Offsets of each field, checked against the remaining data up front.
    let mut spans: ArrayVec<[(FieldDefinition, usize); MAX_FIELDS]> = ArrayVec::new();
    let mut offset = 0;

    for field in definition.fields.iter() {
        let size = field.size as usize;
        let remaining = r.len() - offset;

        if size > remaining {
            Err(FormatError::FieldOverrun {
                field: field.number,
                size,
                remaining,
            })?;
        }

        spans.push((*field, offset));
        offset += size;
    }

    trace!(message = %definition.name, size = offset, "Data");

    // The timestamp goes first so the record's samples carry its time.
    let is_timestamp = |f: &FieldDefinition| f.number == universal::TIMESTAMP;
    let ordered = spans
        .iter()
        .filter(|(f, _)| is_timestamp(f))
        .chain(spans.iter().filter(|(f, _)| !is_timestamp(f)));

    for &(field, start) in ordered {
        let end = start + field.size as usize;
        decode_field(definition, field, &r[start..end], acc, out)?;
    }

    Ok(offset)
}

/// Whether a field written as `found` can be read as `expected`.
fn compatible(expected: BaseType, found: BaseType) -> bool {
    let integral = |b: BaseType| !b.is_signed() && !b.is_float() && b != BaseType::String;

    expected == found || (expected.size() == found.size() && integral(expected) && integral(found))
}

fn decode_field(
    definition: &RecordDefinition,
    field: FieldDefinition,
    r: &[u8],
    acc: &mut Accumulator,
    out: &mut Output<'_>,
) -> Result<(), Error> {
    let Some(base) = BaseType::from_code(field.base_type) else {
        warn!(
            message = %definition.name,
            field = field.number,
            code = field.base_type,
            "Skipping field of unknown base type"
        );
        return Ok(());
    };

    let size = field.size as usize;

    if size % base.size() != 0 {
        Err(FormatError::FieldSize {
            field: field.number,
            size,
            base_size: base.size(),
        })?;
    }

    if size == 0 {
        trace!(message = %definition.name, field = field.number, "Empty field");
        return Ok(());
    }

    if base == BaseType::String && !r.contains(&0) {
        Err(FormatError::UnterminatedString(field.number))?;
    }

    let Some(descriptor) = definition.descriptor.field(field.number) else {
        debug!(message = %definition.name, field = field.number, "Skipping unknown field");
        return Ok(());
    };

    if !compatible(descriptor.base, base) {
        warn!(
            message = %definition.name,
            field = descriptor.name,
            expected = ?descriptor.base,
            found = ?base,
            "Skipping field of unexpected base type"
        );
        return Ok(());
    }

    match base.decode(r, definition.endianness, descriptor.extra_invalid) {
        Some(value) => {
            trace!(message = %definition.name, field = descriptor.name, ?value, "Field");
            decode::apply(descriptor, value, acc, out);
        }
        None => debug!(message = %definition.name, field = descriptor.name, "Skipping invalid value"),
    }

    Ok(())
}
