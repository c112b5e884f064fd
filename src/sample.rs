//! Time-series samples emitted while streaming a dive.

/// One time-series data point.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Seconds since the start of the dive.
    pub time: u32,
    pub value: SampleValue,
}

/// The measurement carried by a sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    /// Depth in metres.
    Depth(f64),
    /// Temperature in degrees Celsius.
    Temperature(f64),
    /// Tank pressure in bar.
    Pressure { tank: usize, pressure: f64 },
    /// Switch to the gas mix at this index.
    GasMix(usize),
    Deco(Deco),
    /// Heart rate in beats per minute.
    HeartBeat(u8),
    /// Central nervous system oxygen toxicity, as a fraction.
    Cns(f64),
    /// Closed circuit setpoint in bar.
    Setpoint(f64),
    /// Remaining bottom time in minutes.
    Rbt(u32),
    Event(Event),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoKind {
    /// No decompression obligation; `time` is the no-decompression limit.
    Ndl,
    /// A mandatory stop at `depth` for `time`.
    DecoStop,
}

/// Decompression status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deco {
    pub kind: DecoKind,
    /// Seconds.
    pub time: u32,
    /// Stop depth in metres.
    pub depth: f64,
    /// Time to surface in seconds.
    pub tts: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    State,
    Notify,
    Warning,
    Alarm,
}

/// A named dive event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Event number, as recorded.
    pub code: u8,
    /// Event data, as recorded.
    pub data: u32,
    pub name: &'static str,
    pub severity: Severity,
}

/// Receive samples from a streaming pass.
///
/// Implemented for closures taking a [`Sample`], and for `Vec<Sample>`.
pub trait SampleSink {
    fn add_sample(&mut self, sample: Sample);
}

impl<F: FnMut(Sample)> SampleSink for F {
    fn add_sample(&mut self, sample: Sample) {
        self(sample)
    }
}

impl SampleSink for Vec<Sample> {
    fn add_sample(&mut self, sample: Sample) {
        self.push(sample)
    }
}
