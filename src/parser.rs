//! Dive parser.

use chrono::{DateTime, Datelike, Timelike};
use tracing::debug;

use crate::{
    cache::{DeviceInfo, FieldCache, FieldKind, FieldValue},
    config::ParserConfig,
    error::Error,
    sample::SampleSink,
    traverse::{classify, traverse},
};

/// Seconds from the Unix epoch to the format's epoch, 1989-12-31T00:00:00Z.
pub const FIT_EPOCH: i64 = 631_065_600;

/// Calendar start of a dive, in the dive's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiveDateTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// Offset from UTC in seconds, when known.
    pub timezone: Option<i32>,
}

/// Decodes one dive blob.
///
/// [`set_data`](Self::set_data) runs a silent pass that answers the
/// dive-level queries; [`samples_foreach`](Self::samples_foreach) replays the
/// blob to stream its samples.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
    data: Vec<u8>,
    cache: FieldCache,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Load a dive blob, replacing any previous one.
    ///
    /// The blob is copied. On failure the parser holds no dive.
    pub fn set_data(&mut self, data: &[u8]) -> Result<(), Error> {
        self.data.clear();
        self.cache.reset();

        if let Err(err) = traverse(data, &self.config, &mut self.cache, None) {
            debug!(%err, "Rejected dive");
            self.cache.reset();
            return Err(err);
        }

        self.data.extend_from_slice(data);

        Ok(())
    }

    /// The name prefix identifying the dive.
    pub fn fingerprint(&self) -> &[u8] {
        &self.data[..self.config.name_size.min(self.data.len())]
    }

    /// Retrieve a dive-level field.
    ///
    /// Fails with [`Error::Unsupported`] if the dive did not record it.
    pub fn field(&self, kind: FieldKind, index: usize) -> Result<FieldValue<'_>, Error> {
        self.cache.get(kind, index)
    }

    /// The dive computer that recorded the dive.
    pub fn devinfo(&self) -> Result<DeviceInfo, Error> {
        match self.cache.get(FieldKind::Device, 0)? {
            FieldValue::Device(device) => Ok(device),
            _ => Err(Error::Unsupported),
        }
    }

    /// The start of the dive, in its local time when the offset is known.
    pub fn datetime(&self) -> Result<DiveDateTime, Error> {
        let start = self.cache.start_time().ok_or(Error::Unsupported)?;

        let timezone = match self.cache.get(FieldKind::UtcOffset, 0) {
            Ok(FieldValue::UtcOffset(offset)) => Some(offset),
            _ => None,
        };

        let local = FIT_EPOCH + start as i64 + timezone.unwrap_or(0) as i64;
        let time = DateTime::from_timestamp(local, 0).ok_or(Error::Unsupported)?;

        Ok(DiveDateTime {
            year: time.year(),
            month: time.month(),
            day: time.day(),
            hour: time.hour(),
            minute: time.minute(),
            second: time.second(),
            timezone,
        })
    }

    /// Stream the samples of the loaded dive to a sink.
    ///
    /// Field answers are unaffected, and repeated calls emit identical
    /// sequences.
    pub fn samples_foreach<S: SampleSink>(&self, sink: &mut S) -> Result<(), Error> {
        let mut cache = self.cache.clone();

        traverse(&self.data, &self.config, &mut cache, Some(sink))
    }

    /// Whether a blob records a dive rather than some other activity.
    ///
    /// This is a quick scan that stops at the first dive sub-sport or average
    /// depth, without filling a field cache. Blobs whose framing or leading
    /// records fail to decode are not dives.
    pub fn is_dive(data: &[u8], config: &ParserConfig) -> bool {
        classify(data, config).unwrap_or_else(|err| {
            debug!(%err, "Not a dive");
            false
        })
    }
}
