//! Parser configuration.
//!
//! These are the constants vendor glue supplies rather than the decoder
//! guessing them: the framing around the document, and the scaling of
//! readings whose units vary between producers.

/// Length of the dive file name preceding the document, as downloaded from a
/// Garmin Descent (`YYYY-MM-DD-hh-mm-ss.fit` and a terminator).
pub const FIT_NAME_SIZE: usize = 24;

/// Standard gravity in m/s².
const GRAVITY: f64 = 9.80665;

#[derive(Debug, Clone, PartialEq)]
pub struct ParserConfig {
    /// Bytes of name/fingerprint prefix before the document.
    pub name_size: usize,
    /// Whether to verify the document's trailing cyclic redundancy check.
    pub verify_crc: bool,
    /// Bar per raw unit of tank pressure.
    pub tank_pressure_scale: f64,
    /// Derive depth from absolute pressure for records without a depth.
    pub pressure_depth: Option<PressureDepth>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            name_size: FIT_NAME_SIZE,
            verify_crc: false,
            tank_pressure_scale: 0.01,
            pressure_depth: None,
        }
    }
}

impl ParserConfig {
    pub fn with_name_size(mut self, name_size: usize) -> Self {
        self.name_size = name_size;
        self
    }

    pub fn with_verify_crc(mut self, verify_crc: bool) -> Self {
        self.verify_crc = verify_crc;
        self
    }

    pub fn with_tank_pressure_scale(mut self, scale: f64) -> Self {
        self.tank_pressure_scale = scale;
        self
    }

    pub fn with_pressure_depth(mut self, pressure_depth: PressureDepth) -> Self {
        self.pressure_depth = Some(pressure_depth);
        self
    }
}

/// Conversion from absolute pressure to depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureDepth {
    /// Surface pressure in bar. When absent, the dive's atmospheric pressure
    /// is used, falling back to one standard atmosphere.
    pub surface_pressure: Option<f64>,
    /// Water density in kg/m³.
    pub density: f64,
}

impl Default for PressureDepth {
    fn default() -> Self {
        Self {
            surface_pressure: None,
            density: 1025.0,
        }
    }
}

impl PressureDepth {
    /// Depth in metres for an absolute pressure in bar.
    pub fn depth(&self, pressure: f64, atmospheric: Option<f64>) -> f64 {
        let surface = self.surface_pressure.or(atmospheric).unwrap_or(1.01325);

        ((pressure - surface) * 100_000.0 / (self.density * GRAVITY)).max(0.0)
    }
}
