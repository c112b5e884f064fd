//! Store of decoded dive-level fields.
//!
//! The cache is the single answer to every [`field`](crate::Parser::field)
//! query. Each field kind carries a presence bit that is set together with
//! its value; a field is never read before its bit is set.

use tracing::warn;

use crate::error::Error;

/// Capacity of the indexed gas mix and tank tables.
pub const MAX_GASES: usize = 16;

/// Capacity of the descriptive string table.
pub const MAX_STRINGS: usize = 32;

/// A kind of dive-level field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Dive duration in seconds.
    DiveTime,
    /// Maximum depth in metres.
    MaxDepth,
    /// Average depth in metres.
    AvgDepth,
    /// Surface pressure in bar.
    Atmospheric,
    DiveMode,
    GasMixCount,
    /// Indexed by gas number.
    GasMix,
    Salinity,
    TankCount,
    /// Indexed by tank number.
    Tank,
    /// Start of the dive, in seconds since the format's epoch.
    StartTime,
    /// Offset of local time from UTC, in seconds.
    UtcOffset,
    /// Dive entry latitude in degrees.
    Latitude,
    /// Dive entry longitude in degrees.
    Longitude,
    /// Closed circuit low setpoint in bar.
    LowSetpoint,
    /// Closed circuit high setpoint in bar.
    HighSetpoint,
    Device,
    /// Indexed by string slot.
    String,
}

impl FieldKind {
    fn bit(self) -> u32 {
        1 << self as u32
    }

    /// Whether values of this kind are addressed by index.
    pub fn is_indexed(self) -> bool {
        matches!(self, Self::GasMix | Self::Tank | Self::String)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DiveMode {
    Freedive,
    Gauge,
    #[default]
    OpenCircuit,
    ClosedCircuit,
}

/// Gas fractions, each in `0.0..=1.0`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct GasMix {
    pub oxygen: f64,
    pub helium: f64,
    pub nitrogen: f64,
}

impl GasMix {
    /// Build a mix from oxygen and helium percentages.
    pub fn from_percent(oxygen: u8, helium: u8) -> Self {
        let oxygen = oxygen as f64 / 100.0;
        let helium = helium as f64 / 100.0;

        Self {
            oxygen,
            helium,
            nitrogen: (1.0 - oxygen - helium).max(0.0),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WaterType {
    Fresh,
    #[default]
    Salt,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Salinity {
    pub water: WaterType,
    /// Density in kg/m³.
    pub density: f64,
}

/// A tank monitored by a transmitter.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Tank {
    /// Identifier of the transmitter reporting this tank.
    pub sensor: u32,
    pub name: Option<String>,
    /// Volume in litres.
    pub volume: Option<f64>,
    /// Rated working pressure in bar.
    pub working_pressure: Option<f64>,
    /// Reserve pressure in bar.
    pub reserve_pressure: Option<f64>,
    /// Pressure at the start of the dive in bar.
    pub begin_pressure: Option<f64>,
    /// Pressure at the end of the dive in bar.
    pub end_pressure: Option<f64>,
}

/// The dive computer that recorded the dive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial: u32,
    pub product: u16,
    /// Firmware version, in hundredths.
    pub firmware: u16,
}

/// A descriptive key/value string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldString {
    pub desc: &'static str,
    pub value: String,
}

/// A field value, tagged with its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    DiveTime(u32),
    MaxDepth(f64),
    AvgDepth(f64),
    Atmospheric(f64),
    DiveMode(DiveMode),
    GasMixCount(u32),
    GasMix(GasMix),
    Salinity(Salinity),
    TankCount(u32),
    Tank(Tank),
    StartTime(u32),
    UtcOffset(i32),
    Latitude(f64),
    Longitude(f64),
    LowSetpoint(f64),
    HighSetpoint(f64),
    Device(DeviceInfo),
    String(&'a FieldString),
}

impl FieldValue<'_> {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::DiveTime(_) => FieldKind::DiveTime,
            Self::MaxDepth(_) => FieldKind::MaxDepth,
            Self::AvgDepth(_) => FieldKind::AvgDepth,
            Self::Atmospheric(_) => FieldKind::Atmospheric,
            Self::DiveMode(_) => FieldKind::DiveMode,
            Self::GasMixCount(_) => FieldKind::GasMixCount,
            Self::GasMix(_) => FieldKind::GasMix,
            Self::Salinity(_) => FieldKind::Salinity,
            Self::TankCount(_) => FieldKind::TankCount,
            Self::Tank(_) => FieldKind::Tank,
            Self::StartTime(_) => FieldKind::StartTime,
            Self::UtcOffset(_) => FieldKind::UtcOffset,
            Self::Latitude(_) => FieldKind::Latitude,
            Self::Longitude(_) => FieldKind::Longitude,
            Self::LowSetpoint(_) => FieldKind::LowSetpoint,
            Self::HighSetpoint(_) => FieldKind::HighSetpoint,
            Self::Device(_) => FieldKind::Device,
            Self::String(_) => FieldKind::String,
        }
    }
}

/// Decoded dive-level fields, with presence tracking.
#[derive(Debug, Clone)]
pub struct FieldCache {
    initialized: u32,

    dive_time: u32,
    max_depth: f64,
    avg_depth: f64,
    atmospheric: f64,
    dive_mode: DiveMode,
    gas_mix_count: u32,
    salinity: Salinity,
    tank_count: u32,
    start_time: u32,
    utc_offset: i32,
    latitude: f64,
    longitude: f64,
    low_setpoint: f64,
    high_setpoint: f64,
    device: DeviceInfo,

    // Per-slot presence for the indexed tables.
    gas_mix_slots: u16,
    gas_mixes: [GasMix; MAX_GASES],
    tank_slots: u16,
    tanks: [Tank; MAX_GASES],

    strings: [Option<FieldString>; MAX_STRINGS],
}

impl Default for FieldCache {
    fn default() -> Self {
        Self {
            initialized: 0,
            dive_time: 0,
            max_depth: 0.0,
            avg_depth: 0.0,
            atmospheric: 0.0,
            dive_mode: DiveMode::default(),
            gas_mix_count: 0,
            salinity: Salinity::default(),
            tank_count: 0,
            start_time: 0,
            utc_offset: 0,
            latitude: 0.0,
            longitude: 0.0,
            low_setpoint: 0.0,
            high_setpoint: 0.0,
            device: DeviceInfo::default(),
            gas_mix_slots: 0,
            gas_mixes: [GasMix::default(); MAX_GASES],
            tank_slots: 0,
            tanks: Default::default(),
            strings: [const { None }; MAX_STRINGS],
        }
    }
}

impl FieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every field.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether a field of this kind has been assigned.
    pub fn contains(&self, kind: FieldKind) -> bool {
        self.initialized & kind.bit() != 0
    }

    /// Store a scalar field, marking it present.
    ///
    /// Indexed kinds are stored at index 0; strings must be added with
    /// [`add_string`](Self::add_string).
    pub fn assign(&mut self, value: FieldValue<'_>) {
        self.assign_indexed(0, value);
    }

    /// Store a field at an index of its table, marking it present.
    ///
    /// Scalar kinds ignore the index. Indices beyond a table's capacity are
    /// dropped with a warning.
    pub fn assign_indexed(&mut self, index: usize, value: FieldValue<'_>) {
        let kind = value.kind();

        match value {
            FieldValue::DiveTime(v) => self.dive_time = v,
            FieldValue::MaxDepth(v) => self.max_depth = v,
            FieldValue::AvgDepth(v) => self.avg_depth = v,
            FieldValue::Atmospheric(v) => self.atmospheric = v,
            FieldValue::DiveMode(v) => self.dive_mode = v,
            FieldValue::GasMixCount(v) => self.gas_mix_count = v,
            FieldValue::Salinity(v) => self.salinity = v,
            FieldValue::TankCount(v) => self.tank_count = v,
            FieldValue::StartTime(v) => self.start_time = v,
            FieldValue::UtcOffset(v) => self.utc_offset = v,
            FieldValue::Latitude(v) => self.latitude = v,
            FieldValue::Longitude(v) => self.longitude = v,
            FieldValue::LowSetpoint(v) => self.low_setpoint = v,
            FieldValue::HighSetpoint(v) => self.high_setpoint = v,
            FieldValue::Device(v) => self.device = v,
            FieldValue::GasMix(v) => {
                let Some(slot) = self.gas_mixes.get_mut(index) else {
                    warn!(index, capacity = MAX_GASES, "Dropping gas mix beyond table capacity");
                    return;
                };
                *slot = v;
                self.gas_mix_slots |= 1u16 << index;
            }
            FieldValue::Tank(v) => {
                let Some(slot) = self.tanks.get_mut(index) else {
                    warn!(index, capacity = MAX_GASES, "Dropping tank beyond table capacity");
                    return;
                };
                *slot = v;
                self.tank_slots |= 1u16 << index;
            }
            FieldValue::String(s) => {
                warn!(desc = s.desc, "Strings must be added, not assigned");
                return;
            }
        }

        self.initialized |= kind.bit();
    }

    /// Store a descriptive string in the next free slot.
    ///
    /// The value is copied. Fails with [`Error::ResourceExhausted`] once every
    /// slot is taken, leaving existing strings unchanged.
    pub fn add_string(&mut self, desc: &'static str, value: impl Into<String>) -> Result<(), Error> {
        let Some(slot) = self.strings.iter_mut().find(|s| s.is_none()) else {
            return Err(Error::ResourceExhausted("string"));
        };

        *slot = Some(FieldString {
            desc,
            value: value.into(),
        });
        self.initialized |= FieldKind::String.bit();

        Ok(())
    }

    /// Store a descriptive string, replacing the value of an existing string
    /// with the same description.
    pub fn replace_string(&mut self, desc: &'static str, value: impl Into<String>) -> Result<(), Error> {
        match self.strings.iter_mut().flatten().find(|s| s.desc == desc) {
            Some(existing) => {
                existing.value = value.into();
                Ok(())
            }
            None => self.add_string(desc, value),
        }
    }

    /// Whether a string with this description has been added.
    pub fn has_string(&self, desc: &str) -> bool {
        self.strings.iter().flatten().any(|s| s.desc == desc)
    }

    /// Retrieve a field.
    ///
    /// Scalar kinds ignore `index`. Fails with [`Error::Unsupported`] if the
    /// field (or the indexed slot) was never stored.
    pub fn get(&self, kind: FieldKind, index: usize) -> Result<FieldValue<'_>, Error> {
        if !self.contains(kind) {
            return Err(Error::Unsupported);
        }

        let slot_present = |mask: u16| index < MAX_GASES && mask & (1u16 << index) != 0;

        Ok(match kind {
            FieldKind::DiveTime => FieldValue::DiveTime(self.dive_time),
            FieldKind::MaxDepth => FieldValue::MaxDepth(self.max_depth),
            FieldKind::AvgDepth => FieldValue::AvgDepth(self.avg_depth),
            FieldKind::Atmospheric => FieldValue::Atmospheric(self.atmospheric),
            FieldKind::DiveMode => FieldValue::DiveMode(self.dive_mode),
            FieldKind::GasMixCount => FieldValue::GasMixCount(self.gas_mix_count),
            FieldKind::Salinity => FieldValue::Salinity(self.salinity),
            FieldKind::TankCount => FieldValue::TankCount(self.tank_count),
            FieldKind::StartTime => FieldValue::StartTime(self.start_time),
            FieldKind::UtcOffset => FieldValue::UtcOffset(self.utc_offset),
            FieldKind::Latitude => FieldValue::Latitude(self.latitude),
            FieldKind::Longitude => FieldValue::Longitude(self.longitude),
            FieldKind::LowSetpoint => FieldValue::LowSetpoint(self.low_setpoint),
            FieldKind::HighSetpoint => FieldValue::HighSetpoint(self.high_setpoint),
            FieldKind::Device => FieldValue::Device(self.device),
            FieldKind::GasMix if slot_present(self.gas_mix_slots) => {
                FieldValue::GasMix(self.gas_mixes[index])
            }
            FieldKind::Tank if slot_present(self.tank_slots) => {
                FieldValue::Tank(self.tanks[index].clone())
            }
            FieldKind::String => match self.strings.get(index) {
                Some(Some(s)) => FieldValue::String(s),
                _ => return Err(Error::Unsupported),
            },
            FieldKind::GasMix | FieldKind::Tank => return Err(Error::Unsupported),
        })
    }

    /// The present tanks, with their indices.
    pub fn tanks(&self) -> impl Iterator<Item = (usize, &Tank)> {
        self.tanks
            .iter()
            .enumerate()
            .filter(|(i, _)| self.tank_slots & (1u16 << *i) != 0)
    }

    /// Index of the tank reported by a transmitter.
    pub fn tank_index(&self, sensor: u32) -> Option<usize> {
        self.tanks().find(|(_, t)| t.sensor == sensor).map(|(i, _)| i)
    }

    /// Mutable access to a present tank.
    pub fn tank_mut(&mut self, index: usize) -> Option<&mut Tank> {
        if index < MAX_GASES && self.tank_slots & (1u16 << index) != 0 {
            self.tanks.get_mut(index)
        } else {
            None
        }
    }

    /// The start time, if present.
    pub fn start_time(&self) -> Option<u32> {
        self.contains(FieldKind::StartTime).then_some(self.start_time)
    }

    /// The maximum depth, if present.
    pub fn max_depth(&self) -> Option<f64> {
        self.contains(FieldKind::MaxDepth).then_some(self.max_depth)
    }

    pub fn gas_mix_count(&self) -> u32 {
        if self.contains(FieldKind::GasMixCount) {
            self.gas_mix_count
        } else {
            0
        }
    }

    pub fn tank_count(&self) -> u32 {
        if self.contains(FieldKind::TankCount) {
            self.tank_count
        } else {
            0
        }
    }

    pub fn atmospheric(&self) -> Option<f64> {
        self.contains(FieldKind::Atmospheric).then_some(self.atmospheric)
    }

    pub fn setpoint(&self, high: bool) -> Option<f64> {
        if high {
            self.contains(FieldKind::HighSetpoint).then_some(self.high_setpoint)
        } else {
            self.contains(FieldKind::LowSetpoint).then_some(self.low_setpoint)
        }
    }
}
