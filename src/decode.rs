//! Semantic effects of decoded fields.
//!
//! A field's [`Effect`] either writes straight through to the field cache,
//! stashes the value in the [accumulator](crate::accumulator) for its
//! composite, or emits a sample when streaming.

use tracing::{debug, trace};

use crate::{
    accumulator::Accumulator,
    cache::{DiveMode, FieldValue},
    profile::{Effect, FieldDescriptor},
    sample::SampleValue,
    sans::data::Value,
    traverse::Output,
};

/// Degrees per semicircle.
const SEMICIRCLE: f64 = 180.0 / 2_147_483_648.0;

/// Map a sport sub-type to a dive mode, for the sub-types that are dives.
pub fn dive_mode(sub_sport: u8) -> Option<DiveMode> {
    Some(match sub_sport {
        53 | 54 => DiveMode::OpenCircuit, // single gas, multi gas
        55 => DiveMode::Gauge,
        56 | 57 => DiveMode::Freedive, // apnea, apnea hunting
        63 => DiveMode::ClosedCircuit,
        _ => return None,
    })
}

/// Apply the effect of one valid field value.
pub fn apply(field: &FieldDescriptor, value: Value<'_>, acc: &mut Accumulator, out: &mut Output<'_>) {
    let s = &mut acc.scratch;
    let p = &mut acc.pending;

    let byte = || value.as_u64().min(u8::MAX as u64) as u8;
    let short = || value.as_u64().min(u16::MAX as u64) as u16;
    let long = || value.as_u32();
    let string = || value.as_str().map(str::to_owned);

    match field.effect {
        Effect::Ignore => trace!(field = field.name, "Ignoring field"),

        Effect::PartIndex => trace!(part = long(), "Part index"),
        Effect::Timestamp => out.set_timestamp(long()),
        Effect::MessageIndex => s.message_index = Some(short()),

        Effect::FileSerial => {
            s.device.serial = Some(long());
            s.device.fallback = true;
            p.set_device_info(true);
        }
        Effect::FileProduct => {
            s.device.product = Some(short());
            s.device.fallback = true;
            p.set_device_info(true);
        }
        Effect::DeviceSerial => {
            s.device.serial = Some(long());
            p.set_device_info(true);
        }
        Effect::DeviceProduct => {
            s.device.product = Some(short());
            p.set_device_info(true);
        }
        Effect::DeviceIndex => {
            s.device.index = Some(byte());
            p.set_device_info(true);
        }
        Effect::SoftwareVersion => {
            s.device.firmware = Some(short());
            p.set_device_info(true);
        }
        Effect::ProductName => {
            s.device.name = string();
            p.set_device_info(true);
        }

        Effect::SubSport => match dive_mode(byte()) {
            Some(mode) => out.cache.assign(FieldValue::DiveMode(mode)),
            None => debug!(sub_sport = byte(), "Not a dive sub-sport"),
        },

        Effect::StartTime => out.cache.assign(FieldValue::StartTime(long())),
        Effect::StartLatitude => {
            out.cache.assign(FieldValue::Latitude(value.as_i64() as f64 * SEMICIRCLE))
        }
        Effect::StartLongitude => {
            out.cache.assign(FieldValue::Longitude(value.as_i64() as f64 * SEMICIRCLE))
        }
        Effect::ElapsedTime => out.cache.assign(FieldValue::DiveTime(long() / 1000)),

        Effect::HeartRate => out.emit(SampleValue::HeartBeat(byte())),
        Effect::Temperature => out.emit(SampleValue::Temperature(value.as_f64())),
        Effect::AbsolutePressure => {
            s.absolute_pressure = Some(long());
            p.set_pressure(true);
        }
        Effect::Depth => {
            let depth = value.as_f64() / 1000.0;
            s.depth = true;

            if out.is_streaming() {
                out.emit(SampleValue::Depth(depth));
            } else if !acc.max_depth_final
                && out.cache.max_depth().is_none_or(|max| depth > max)
            {
                out.cache.assign(FieldValue::MaxDepth(depth));
            }
        }
        Effect::NextStopDepth => {
            s.deco.stop_depth = Some(long());
            p.set_deco(true);
        }
        Effect::NextStopTime => {
            s.deco.stop_time = Some(long());
            p.set_deco(true);
        }
        Effect::TimeToSurface => {
            s.deco.time_to_surface = Some(long());
            p.set_deco(true);
        }
        Effect::NdlTime => {
            s.deco.ndl = Some(long());
            p.set_deco(true);
        }
        Effect::CnsLoad => out.emit(SampleValue::Cns(value.as_f64() / 100.0)),
        Effect::AirTimeRemaining => out.emit(SampleValue::Rbt(long() / 60)),

        Effect::EventNumber => {
            s.event.number = Some(byte());
            p.set_event(true);
        }
        Effect::EventType => {
            s.event.kind = Some(byte());
            p.set_event(true);
        }
        Effect::EventData => {
            s.event.data = Some(long());
            p.set_event(true);
        }

        Effect::LocalTimestamp => {
            s.local_timestamp = Some(long());
            p.set_utc_offset(true);
        }

        Effect::SensorId => {
            s.sensor.id = Some(long());
            p.set_sensor_profile(true);
        }
        Effect::SensorName => {
            s.sensor.name = string();
            p.set_sensor_profile(true);
        }
        Effect::SensorEnabled => {
            s.sensor.enabled = Some(byte());
            p.set_sensor_profile(true);
        }
        Effect::RatedPressure => {
            s.sensor.rated = Some(short());
            p.set_sensor_profile(true);
        }
        Effect::ReservePressure => {
            s.sensor.reserve = Some(short());
            p.set_sensor_profile(true);
        }
        Effect::TankVolume => {
            s.sensor.volume = Some(short());
            p.set_sensor_profile(true);
        }

        Effect::DecoModel => {
            s.settings.model = Some(byte());
            p.set_settings(true);
        }
        Effect::GfLow => {
            s.settings.gf_low = Some(byte());
            p.set_settings(true);
        }
        Effect::GfHigh => {
            s.settings.gf_high = Some(byte());
            p.set_settings(true);
        }
        Effect::WaterType => {
            s.settings.water = Some(byte());
            p.set_settings(true);
        }
        Effect::WaterDensity => {
            s.settings.density = Some(value.as_f64());
            p.set_settings(true);
        }
        Effect::LowSetpoint => {
            s.settings.low_setpoint = Some(byte());
            p.set_settings(true);
        }
        Effect::HighSetpoint => {
            s.settings.high_setpoint = Some(byte());
            p.set_settings(true);
        }

        Effect::GasHelium => {
            s.gas.helium = Some(byte());
            p.set_gas_mix(true);
        }
        Effect::GasOxygen => {
            s.gas.oxygen = Some(byte());
            p.set_gas_mix(true);
        }
        Effect::GasStatus => {
            s.gas.status = Some(byte());
            p.set_gas_mix(true);
        }

        Effect::SummaryReference => {
            s.summary.reference = Some(short());
            p.set_summary(true);
        }
        Effect::AvgDepth => {
            s.summary.avg_depth = Some(long());
            p.set_summary(true);
        }
        Effect::MaxDepth => {
            s.summary.max_depth = Some(long());
            p.set_summary(true);
        }
        Effect::DiveNumber => {
            s.summary.dive_number = Some(long());
            p.set_summary(true);
        }
        Effect::BottomTime => {
            s.summary.bottom_time = Some(long());
            p.set_summary(true);
        }

        // Shared by tank updates and summaries; the pressures decide which.
        Effect::TankSensor => s.tank.sensor = Some(long()),
        Effect::TankPressure => {
            s.tank.pressure = Some(short());
            p.set_tank_update(true);
        }
        Effect::TankStartPressure => {
            s.tank.start = Some(short());
            p.set_tank_summary(true);
        }
        Effect::TankEndPressure => {
            s.tank.end = Some(short());
            p.set_tank_summary(true);
        }
    }
}
