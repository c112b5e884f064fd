//! Composite record accumulator.
//!
//! Some semantic events are spread over several fields of one record: a gas
//! mix needs its oxygen, helium and status; a decompression status needs the
//! stop depth, stop time and time to surface. Field decoders stash their part
//! in a scratch area and mark the composite pending. At the record boundary
//! [`end_record`](Accumulator::end_record) resolves every pending composite
//! exactly once: into the field cache during a silent pass, or into samples
//! while streaming.

use tartan_bitfield::bitfield;
use tracing::{debug, trace, warn};

use crate::{
    cache::{DeviceInfo, FieldKind, FieldValue, GasMix, MAX_GASES, Salinity, Tank, WaterType},
    profile::mesg,
    sample::{Deco, DecoKind, Event, SampleValue, Severity},
    traverse::Output,
};

bitfield! {
    /// Composite kinds awaiting the record boundary.
    pub struct Pending(u16) {
        [0] pub gas_mix,
        [1] pub deco,
        [2] pub event,
        [3] pub device_info,
        [4] pub settings,
        [5] pub sensor_profile,
        [6] pub tank_update,
        [7] pub tank_summary,
        [8] pub summary,
        [9] pub utc_offset,
        [10] pub pressure,
    }
}

#[derive(Debug, Default, Clone)]
pub struct GasScratch {
    pub oxygen: Option<u8>,
    pub helium: Option<u8>,
    pub status: Option<u8>,
}

#[derive(Debug, Default, Clone)]
pub struct DecoScratch {
    /// Millimetres.
    pub stop_depth: Option<u32>,
    pub stop_time: Option<u32>,
    pub time_to_surface: Option<u32>,
    pub ndl: Option<u32>,
}

#[derive(Debug, Default, Clone)]
pub struct EventScratch {
    pub number: Option<u8>,
    pub kind: Option<u8>,
    pub data: Option<u32>,
}

#[derive(Debug, Default, Clone)]
pub struct DeviceScratch {
    pub index: Option<u8>,
    pub serial: Option<u32>,
    pub product: Option<u16>,
    pub firmware: Option<u16>,
    pub name: Option<String>,
    /// Set for `file_id`, whose values only fill gaps left by `device_info`.
    pub fallback: bool,
}

#[derive(Debug, Default, Clone)]
pub struct SettingsScratch {
    pub model: Option<u8>,
    pub gf_low: Option<u8>,
    pub gf_high: Option<u8>,
    pub water: Option<u8>,
    pub density: Option<f64>,
    /// Centibar.
    pub low_setpoint: Option<u8>,
    pub high_setpoint: Option<u8>,
}

#[derive(Debug, Default, Clone)]
pub struct SensorScratch {
    pub id: Option<u32>,
    pub name: Option<String>,
    pub enabled: Option<u8>,
    pub rated: Option<u16>,
    pub reserve: Option<u16>,
    /// Tenths of a litre.
    pub volume: Option<u16>,
}

#[derive(Debug, Default, Clone)]
pub struct TankScratch {
    pub sensor: Option<u32>,
    pub pressure: Option<u16>,
    pub start: Option<u16>,
    pub end: Option<u16>,
}

#[derive(Debug, Default, Clone)]
pub struct SummaryScratch {
    pub reference: Option<u16>,
    /// Millimetres.
    pub avg_depth: Option<u32>,
    pub max_depth: Option<u32>,
    pub dive_number: Option<u32>,
    /// Milliseconds.
    pub bottom_time: Option<u32>,
}

/// Field values of the current record, consumed at its boundary.
#[derive(Debug, Default, Clone)]
pub struct Scratch {
    pub message_index: Option<u16>,
    pub gas: GasScratch,
    pub deco: DecoScratch,
    pub event: EventScratch,
    pub device: DeviceScratch,
    pub settings: SettingsScratch,
    pub sensor: SensorScratch,
    pub tank: TankScratch,
    pub summary: SummaryScratch,
    pub local_timestamp: Option<u32>,
    /// Pascal.
    pub absolute_pressure: Option<u32>,
    /// Whether the record carried a depth.
    pub depth: bool,
}

pub struct Accumulator {
    pub pending: Pending,
    pub scratch: Scratch,
    /// Set once a dive summary supplied the maximum depth, which then wins
    /// over depth readings.
    pub max_depth_final: bool,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            pending: Pending(0),
            scratch: Scratch::default(),
            max_depth_final: false,
        }
    }
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any composite awaits the record boundary.
    pub fn is_pending(&self) -> bool {
        self.pending.0 != 0
    }

    /// Resolve every pending composite, then clear all per-record state.
    ///
    /// Calling this with nothing pending only clears the scratch area.
    pub fn end_record(&mut self, out: &mut Output<'_>) {
        if self.is_pending() {
            if out.is_streaming() {
                self.flush_samples(out);
            } else {
                self.flush_cache(out);
            }
        }

        self.pending = Pending(0);
        self.scratch = Scratch::default();
    }

    fn flush_cache(&mut self, out: &mut Output<'_>) {
        let p = Pending(self.pending.0);
        let s = &self.scratch;

        if p.device_info() {
            device_info(&s.device, out);
        }
        if p.gas_mix() {
            gas_mix(&s.gas, s.message_index, out);
        }
        if p.settings() {
            settings(&s.settings, out);
        }
        if p.sensor_profile() {
            sensor_profile(&s.sensor, out);
        }
        if p.tank_update() {
            tank_update(&s.tank, out);
        }
        if p.tank_summary() {
            tank_summary(&s.tank, out);
        }
        if p.summary() && summary(&s.summary, out) {
            self.max_depth_final = true;
        }
        if p.utc_offset() {
            if let (Some(local), Some(timestamp)) = (s.local_timestamp, out.timestamp()) {
                let offset = local as i64 - timestamp as i64;
                match i32::try_from(offset) {
                    Ok(offset) => out.cache.assign(FieldValue::UtcOffset(offset)),
                    Err(_) => debug!(offset, "Skipping out of range UTC offset"),
                }
            }
        }
        if p.pressure() && !out.cache.contains(FieldKind::Atmospheric) {
            if let Some(pa) = s.absolute_pressure {
                out.cache.assign(FieldValue::Atmospheric(pa as f64 / 100_000.0));
            }
        }
    }

    fn flush_samples(&mut self, out: &mut Output<'_>) {
        let p = Pending(self.pending.0);
        let s = &self.scratch;

        if p.pressure() && !s.depth {
            if let (Some(conversion), Some(pa)) = (out.config.pressure_depth, s.absolute_pressure) {
                let depth = conversion.depth(pa as f64 / 100_000.0, out.cache.atmospheric());
                out.emit(SampleValue::Depth(depth));
            }
        }
        if p.deco() {
            out.emit(SampleValue::Deco(deco(&s.deco)));
        }
        if p.tank_update() {
            if let (Some(sensor), Some(raw)) = (s.tank.sensor, s.tank.pressure) {
                match out.cache.tank_index(sensor) {
                    Some(tank) => {
                        let pressure = raw as f64 * out.config.tank_pressure_scale;
                        out.emit(SampleValue::Pressure { tank, pressure });
                    }
                    None => debug!(sensor, "Pressure from unknown tank"),
                }
            }
        }
        if p.event() {
            event(&s.event, out);
        }
    }
}

/// Add a descriptive string, tolerating a full table.
fn add_string(out: &mut Output<'_>, desc: &'static str, value: String) {
    if let Err(err) = out.cache.add_string(desc, value) {
        warn!(desc, %err, "Dropping string");
    }
}

/// Store a device string. Without `replace`, an existing value wins.
fn set_string(out: &mut Output<'_>, desc: &'static str, value: String, replace: bool) {
    let result = if replace {
        out.cache.replace_string(desc, value)
    } else if out.cache.has_string(desc) {
        Ok(())
    } else {
        out.cache.add_string(desc, value)
    };

    if let Err(err) = result {
        warn!(desc, %err, "Dropping string");
    }
}

fn device_info(s: &DeviceScratch, out: &mut Output<'_>) {
    // Only the recording device describes the dive.
    if s.index.unwrap_or(0) != 0 {
        trace!(index = s.index, "Skipping secondary device");
        return;
    }

    let mut device = match out.cache.get(FieldKind::Device, 0) {
        Ok(FieldValue::Device(device)) => device,
        _ => DeviceInfo::default(),
    };

    if let Some(serial) = s.serial.filter(|_| !s.fallback || device.serial == 0) {
        device.serial = serial;
        set_string(out, "Serial", serial.to_string(), !s.fallback);
    }
    if let Some(product) = s.product.filter(|_| !s.fallback || device.product == 0) {
        device.product = product;
    }
    if let Some(firmware) = s.firmware {
        device.firmware = firmware;
        let version = format!("{}.{:02}", firmware / 100, firmware % 100);
        set_string(out, "Firmware", version, true);
    }
    if let Some(name) = &s.name {
        set_string(out, "Product", name.clone(), true);
    }

    out.cache.assign(FieldValue::Device(device));
}

fn gas_mix(s: &GasScratch, message_index: Option<u16>, out: &mut Output<'_>) {
    // Gases without a status predate the field and are in use.
    if s.status == Some(0) {
        trace!(index = message_index, "Skipping disabled gas");
        return;
    }

    let count = out.cache.gas_mix_count();
    let index = message_index.map_or(count as usize, |i| (i & 0x0FFF) as usize);
    let mix = GasMix::from_percent(s.oxygen.unwrap_or(21), s.helium.unwrap_or(0));

    out.cache.assign_indexed(index, FieldValue::GasMix(mix));

    if index < MAX_GASES && index as u32 >= count {
        out.cache.assign(FieldValue::GasMixCount(index as u32 + 1));
    }
}

fn settings(s: &SettingsScratch, out: &mut Output<'_>) {
    if let (Some(low), Some(high)) = (s.gf_low, s.gf_high) {
        if s.model.unwrap_or(0) == 0 && !out.cache.has_string("Deco model") {
            add_string(out, "Deco model", format!("Buhlmann ZHL-16C {low}/{high}"));
        }
    }

    let salinity = match s.water {
        Some(0) => Some((WaterType::Fresh, 1000.0)),
        Some(1) => Some((WaterType::Salt, 1025.0)),
        Some(2) => Some((WaterType::Salt, 1020.0)),
        Some(3) => s.density.map(|d| {
            let water = if d < 1010.0 { WaterType::Fresh } else { WaterType::Salt };
            (water, d)
        }),
        Some(other) => {
            debug!(water_type = other, "Unknown water type");
            None
        }
        None => None,
    };

    if let Some((water, density)) = salinity {
        out.cache.assign(FieldValue::Salinity(Salinity { water, density }));
    }

    if let Some(low) = s.low_setpoint {
        out.cache.assign(FieldValue::LowSetpoint(low as f64 / 100.0));
    }
    if let Some(high) = s.high_setpoint {
        out.cache.assign(FieldValue::HighSetpoint(high as f64 / 100.0));
    }
}

/// Find the tank reported by a transmitter, adding one if needed.
fn tank_for(sensor: u32, out: &mut Output<'_>) -> Option<usize> {
    if let Some(index) = out.cache.tank_index(sensor) {
        return Some(index);
    }

    let index = out.cache.tank_count() as usize;
    if index >= MAX_GASES {
        warn!(sensor, capacity = MAX_GASES, "Dropping tank beyond table capacity");
        return None;
    }

    let tank = Tank {
        sensor,
        ..Default::default()
    };
    out.cache.assign_indexed(index, FieldValue::Tank(tank));
    out.cache.assign(FieldValue::TankCount(index as u32 + 1));

    Some(index)
}

fn sensor_profile(s: &SensorScratch, out: &mut Output<'_>) {
    let Some(sensor) = s.id else {
        return;
    };

    if s.enabled == Some(0) {
        trace!(sensor, "Skipping disabled sensor");
        return;
    }

    let Some(tank) = tank_for(sensor, out).and_then(|i| out.cache.tank_mut(i)) else {
        return;
    };

    if let Some(name) = &s.name {
        tank.name = Some(name.clone());
    }
    if let Some(volume) = s.volume {
        tank.volume = Some(volume as f64 / 10.0);
    }
    if let Some(rated) = s.rated {
        tank.working_pressure = Some(rated as f64);
    }
    if let Some(reserve) = s.reserve {
        tank.reserve_pressure = Some(reserve as f64);
    }
}

fn tank_update(s: &TankScratch, out: &mut Output<'_>) {
    let (Some(sensor), Some(raw)) = (s.sensor, s.pressure) else {
        return;
    };

    let pressure = raw as f64 * out.config.tank_pressure_scale;

    if let Some(tank) = tank_for(sensor, out).and_then(|i| out.cache.tank_mut(i)) {
        tank.begin_pressure.get_or_insert(pressure);
        tank.end_pressure = Some(pressure);
    }
}

fn tank_summary(s: &TankScratch, out: &mut Output<'_>) {
    let Some(sensor) = s.sensor else {
        return;
    };

    let scale = out.config.tank_pressure_scale;

    if let Some(tank) = tank_for(sensor, out).and_then(|i| out.cache.tank_mut(i)) {
        if let Some(start) = s.start {
            tank.begin_pressure = Some(start as f64 * scale);
        }
        if let Some(end) = s.end {
            tank.end_pressure = Some(end as f64 * scale);
        }
    }
}

/// Returns whether the summary supplied a maximum depth.
fn summary(s: &SummaryScratch, out: &mut Output<'_>) -> bool {
    // Lap summaries repeat per lap; only the session summary describes the
    // whole dive.
    if s.reference.is_some_and(|r| r != mesg::SESSION) {
        trace!(reference = s.reference, "Skipping non-session summary");
        return false;
    }

    if let Some(avg) = s.avg_depth {
        out.cache.assign(FieldValue::AvgDepth(avg as f64 / 1000.0));
    }
    if let Some(max) = s.max_depth {
        out.cache.assign(FieldValue::MaxDepth(max as f64 / 1000.0));
    }
    if let Some(number) = s.dive_number {
        if !out.cache.has_string("Dive number") {
            add_string(out, "Dive number", number.to_string());
        }
    }
    if let Some(bottom_time) = s.bottom_time {
        if !out.cache.contains(FieldKind::DiveTime) {
            out.cache.assign(FieldValue::DiveTime(bottom_time / 1000));
        }
    }

    s.max_depth.is_some()
}

fn deco(s: &DecoScratch) -> Deco {
    match s.stop_depth {
        Some(depth) if depth > 0 => Deco {
            kind: DecoKind::DecoStop,
            time: s.stop_time.unwrap_or(0),
            depth: depth as f64 / 1000.0,
            tts: s.time_to_surface,
        },
        _ => Deco {
            kind: DecoKind::Ndl,
            time: s.ndl.unwrap_or(0),
            depth: 0.0,
            tts: s.time_to_surface,
        },
    }
}

pub const EVENT_DIVE_ALERT: u8 = 56;
pub const EVENT_GAS_SWITCH: u8 = 57;

/// Names of the tank pod events, by event number.
const TANK_EVENTS: [(u8, &str, Severity); 6] = [
    (71, "Tank pressure reserve", Severity::Warning),
    (72, "Tank pressure critical", Severity::Alarm),
    (73, "Tank lost", Severity::Warning),
    (76, "Tank battery low", Severity::Warning),
    (81, "Tank pod connected", Severity::State),
    (82, "Tank pod disconnected", Severity::Notify),
];

/// Names of the dive alerts, by alert number.
const DIVE_ALERTS: [(&str, Severity); 40] = [
    ("Deco required", Severity::Warning),
    ("Gas switch prompted", Severity::Notify),
    ("Near surface", Severity::Notify),
    ("Approaching NDL", Severity::Warning),
    ("ppO2 warning", Severity::Warning),
    ("ppO2 critical high", Severity::Alarm),
    ("ppO2 critical low", Severity::Alarm),
    ("Time alert", Severity::Notify),
    ("Depth alert", Severity::Notify),
    ("Deco ceiling broken", Severity::Alarm),
    ("Deco complete", Severity::State),
    ("Safety stop ceiling broken", Severity::Warning),
    ("Safety stop complete", Severity::State),
    ("CNS warning", Severity::Warning),
    ("CNS critical", Severity::Alarm),
    ("OTU warning", Severity::Warning),
    ("OTU critical", Severity::Alarm),
    ("Ascent speed critical", Severity::Alarm),
    ("Alert dismissed", Severity::State),
    ("Alert timed out", Severity::State),
    ("Battery low", Severity::Warning),
    ("Battery critical", Severity::Alarm),
    ("Safety stop started", Severity::State),
    ("Approaching deco stop", Severity::Notify),
    ("Setpoint switch auto low", Severity::State),
    ("Setpoint switch auto high", Severity::State),
    ("Setpoint switch manual low", Severity::State),
    ("Setpoint switch manual high", Severity::State),
    ("Auto setpoint switch ignored", Severity::Notify),
    ("Switched to open circuit", Severity::State),
    ("Switched to closed circuit", Severity::State),
    ("Unknown alert", Severity::Notify),
    ("Tank battery low", Severity::Warning),
    ("ppO2 diluent low", Severity::Alarm),
    ("Deco stop cleared", Severity::State),
    ("Apnea neutral buoyancy", Severity::Notify),
    ("Apnea target depth", Severity::Notify),
    ("Apnea surface", Severity::Notify),
    ("Apnea high speed", Severity::Warning),
    ("Apnea low speed", Severity::Warning),
];

fn event(s: &EventScratch, out: &mut Output<'_>) {
    let Some(code) = s.number else {
        return;
    };
    let data = s.data.unwrap_or(0);

    match code {
        EVENT_DIVE_ALERT => {
            let Some(&(name, severity)) = DIVE_ALERTS.get(data as usize) else {
                debug!(alert = data, "Unknown dive alert");
                return;
            };

            out.emit(SampleValue::Event(Event {
                code,
                data,
                name,
                severity,
            }));

            // Setpoint switches carry no value; report the configured one.
            if let 24..=27 = data {
                let high = data % 2 == 1;
                if let Some(setpoint) = out.cache.setpoint(high) {
                    out.emit(SampleValue::Setpoint(setpoint));
                }
            }
        }
        EVENT_GAS_SWITCH => {
            let index = (data & 0x0FFF) as usize;
            if out.cache.get(FieldKind::GasMix, index).is_ok() {
                out.emit(SampleValue::GasMix(index));
            } else {
                debug!(index, "Switch to unknown gas");
            }
        }
        _ => match TANK_EVENTS.iter().find(|(c, ..)| *c == code) {
            Some(&(_, name, severity)) => out.emit(SampleValue::Event(Event {
                code,
                data,
                name,
                severity,
            })),
            None => trace!(code, kind = s.kind, data, "Unhandled event"),
        },
    }
}
