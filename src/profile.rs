//! The field decode table.
//!
//! Each known message lists the fields this decoder understands: their
//! expected base type, any additional invalid marker, and the [`Effect`]
//! applied to a valid value. Fields absent from a table are logged and
//! skipped, since newer firmware regularly adds fields.

use crate::sans::data::BaseType;

/// Global message numbers.
pub mod mesg {
    pub const FILE_ID: u16 = 0;
    pub const SPORT: u16 = 12;
    pub const SESSION: u16 = 18;
    pub const LAP: u16 = 19;
    pub const RECORD: u16 = 20;
    pub const EVENT: u16 = 21;
    pub const DEVICE_INFO: u16 = 23;
    pub const ACTIVITY: u16 = 34;
    pub const SENSOR_PROFILE: u16 = 147;
    pub const DIVE_SETTINGS: u16 = 258;
    pub const DIVE_GAS: u16 = 259;
    pub const DIVE_SUMMARY: u16 = 268;
    pub const TANK_UPDATE: u16 = 319;
    pub const TANK_SUMMARY: u16 = 323;
}

/// Field numbers shared by every message.
pub mod universal {
    pub const PART_INDEX: u8 = 250;
    pub const TIMESTAMP: u8 = 253;
    pub const MESSAGE_INDEX: u8 = 254;
}

/// The semantic effect of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Known, but carries nothing this decoder uses.
    Ignore,

    PartIndex,
    Timestamp,
    MessageIndex,

    FileSerial,
    FileProduct,

    SubSport,

    StartTime,
    StartLatitude,
    StartLongitude,
    ElapsedTime,

    HeartRate,
    Temperature,
    AbsolutePressure,
    Depth,
    NextStopDepth,
    NextStopTime,
    TimeToSurface,
    NdlTime,
    CnsLoad,
    AirTimeRemaining,

    EventNumber,
    EventType,
    EventData,

    DeviceIndex,
    DeviceSerial,
    DeviceProduct,
    SoftwareVersion,
    ProductName,

    LocalTimestamp,

    SensorId,
    SensorName,
    SensorEnabled,
    RatedPressure,
    ReservePressure,
    TankVolume,

    DecoModel,
    GfLow,
    GfHigh,
    WaterType,
    WaterDensity,
    LowSetpoint,
    HighSetpoint,

    GasHelium,
    GasOxygen,
    GasStatus,

    SummaryReference,
    AvgDepth,
    MaxDepth,
    DiveNumber,
    BottomTime,

    TankSensor,
    TankPressure,
    TankStartPressure,
    TankEndPressure,
}

/// A decode table entry for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub number: u8,
    pub name: &'static str,
    pub base: BaseType,
    /// A second invalid marker, for fields whose producers use one besides
    /// the base type's.
    pub extra_invalid: Option<u64>,
    pub effect: Effect,
}

/// A decode table for one message.
#[derive(Debug)]
pub struct MessageDescriptor {
    pub number: u16,
    pub name: &'static str,
    pub fields: &'static [FieldDescriptor],
}

impl MessageDescriptor {
    pub fn field(&self, number: u8) -> Option<&'static FieldDescriptor> {
        let fields: &'static [FieldDescriptor] = self.fields;
        fields.iter().find(|f| f.number == number)
    }
}

const fn field(number: u8, name: &'static str, base: BaseType, effect: Effect) -> FieldDescriptor {
    FieldDescriptor {
        number,
        name,
        base,
        extra_invalid: None,
        effect,
    }
}

/// Positions recorded without a fix use the most negative value.
const fn position(number: u8, name: &'static str, effect: Effect) -> FieldDescriptor {
    FieldDescriptor {
        extra_invalid: Some(0x8000_0000),
        ..field(number, name, BaseType::SInt32, effect)
    }
}

use BaseType::*;
use Effect::*;

static UNIVERSAL: [FieldDescriptor; 3] = [
    field(universal::PART_INDEX, "part_index", UInt32, PartIndex),
    field(universal::TIMESTAMP, "timestamp", UInt32, Timestamp),
    field(universal::MESSAGE_INDEX, "message_index", UInt16, MessageIndex),
];

static MESSAGES: [MessageDescriptor; 14] = [
    MessageDescriptor {
        number: mesg::FILE_ID,
        name: "file_id",
        fields: &[
            field(0, "type", Enum, Ignore),
            field(1, "manufacturer", UInt16, Ignore),
            field(2, "product", UInt16, FileProduct),
            field(3, "serial_number", UInt32Z, FileSerial),
            field(4, "time_created", UInt32, Ignore),
        ],
    },
    MessageDescriptor {
        number: mesg::SPORT,
        name: "sport",
        fields: &[
            field(0, "sport", Enum, Ignore),
            field(1, "sub_sport", Enum, SubSport),
            field(3, "name", String, Ignore),
        ],
    },
    MessageDescriptor {
        number: mesg::SESSION,
        name: "session",
        fields: &[
            field(2, "start_time", UInt32, StartTime),
            position(3, "start_position_lat", StartLatitude),
            position(4, "start_position_long", StartLongitude),
            field(5, "sport", Enum, Ignore),
            field(6, "sub_sport", Enum, SubSport),
            field(7, "total_elapsed_time", UInt32, ElapsedTime),
            field(8, "total_timer_time", UInt32, Ignore),
        ],
    },
    MessageDescriptor {
        number: mesg::LAP,
        name: "lap",
        fields: &[
            field(2, "start_time", UInt32, Ignore),
            position(3, "start_position_lat", Ignore),
            position(4, "start_position_long", Ignore),
            position(5, "end_position_lat", Ignore),
            position(6, "end_position_long", Ignore),
            field(7, "total_elapsed_time", UInt32, Ignore),
        ],
    },
    MessageDescriptor {
        number: mesg::RECORD,
        name: "record",
        fields: &[
            position(0, "position_lat", Ignore),
            position(1, "position_long", Ignore),
            field(3, "heart_rate", UInt8, HeartRate),
            field(5, "distance", UInt32, Ignore),
            field(13, "temperature", SInt8, Temperature),
            field(91, "absolute_pressure", UInt32, AbsolutePressure),
            field(92, "depth", UInt32, Depth),
            field(93, "next_stop_depth", UInt32, NextStopDepth),
            field(94, "next_stop_time", UInt32, NextStopTime),
            field(95, "time_to_surface", UInt32, TimeToSurface),
            field(96, "ndl_time", UInt32, NdlTime),
            field(97, "cns_load", UInt8, CnsLoad),
            field(98, "n2_load", UInt16, Ignore),
            field(123, "air_time_remaining", UInt32, AirTimeRemaining),
        ],
    },
    MessageDescriptor {
        number: mesg::EVENT,
        name: "event",
        fields: &[
            field(0, "event", Enum, EventNumber),
            field(1, "event_type", Enum, EventType),
            field(3, "data", UInt32, EventData),
            field(4, "event_group", UInt8, Ignore),
        ],
    },
    MessageDescriptor {
        number: mesg::DEVICE_INFO,
        name: "device_info",
        fields: &[
            field(0, "device_index", UInt8, DeviceIndex),
            field(2, "manufacturer", UInt16, Ignore),
            field(3, "serial_number", UInt32Z, DeviceSerial),
            field(4, "product", UInt16, DeviceProduct),
            field(5, "software_version", UInt16, SoftwareVersion),
            field(27, "product_name", String, ProductName),
        ],
    },
    MessageDescriptor {
        number: mesg::ACTIVITY,
        name: "activity",
        fields: &[
            field(0, "total_timer_time", UInt32, Ignore),
            field(1, "num_sessions", UInt16, Ignore),
            field(5, "local_timestamp", UInt32, LocalTimestamp),
        ],
    },
    MessageDescriptor {
        number: mesg::SENSOR_PROFILE,
        name: "sensor_profile",
        fields: &[
            field(0, "ant_channel_id", UInt32Z, SensorId),
            field(2, "name", String, SensorName),
            field(3, "enabled", Enum, SensorEnabled),
            field(74, "pressure_units", Enum, Ignore),
            field(75, "rated_pressure", UInt16, RatedPressure),
            field(76, "reserve_pressure", UInt16, ReservePressure),
            field(77, "volume", UInt16, TankVolume),
        ],
    },
    MessageDescriptor {
        number: mesg::DIVE_SETTINGS,
        name: "dive_settings",
        fields: &[
            field(0, "name", String, Ignore),
            field(1, "model", Enum, DecoModel),
            field(2, "gf_low", UInt8, GfLow),
            field(3, "gf_high", UInt8, GfHigh),
            field(4, "water_type", Enum, WaterType),
            field(5, "water_density", Float32, WaterDensity),
            field(29, "ccr_low_setpoint", UInt8, LowSetpoint),
            field(32, "ccr_high_setpoint", UInt8, HighSetpoint),
        ],
    },
    MessageDescriptor {
        number: mesg::DIVE_GAS,
        name: "dive_gas",
        fields: &[
            field(0, "helium_content", UInt8, GasHelium),
            field(1, "oxygen_content", UInt8, GasOxygen),
            field(2, "status", Enum, GasStatus),
        ],
    },
    MessageDescriptor {
        number: mesg::DIVE_SUMMARY,
        name: "dive_summary",
        fields: &[
            field(0, "reference_mesg", UInt16, SummaryReference),
            field(1, "reference_index", UInt16, Ignore),
            field(2, "avg_depth", UInt32, AvgDepth),
            field(3, "max_depth", UInt32, MaxDepth),
            field(4, "surface_interval", UInt32, Ignore),
            field(10, "dive_number", UInt32, DiveNumber),
            field(11, "bottom_time", UInt32, BottomTime),
        ],
    },
    MessageDescriptor {
        number: mesg::TANK_UPDATE,
        name: "tank_update",
        fields: &[
            field(0, "sensor", UInt32Z, TankSensor),
            field(1, "pressure", UInt16, TankPressure),
        ],
    },
    MessageDescriptor {
        number: mesg::TANK_SUMMARY,
        name: "tank_summary",
        fields: &[
            field(0, "sensor", UInt32Z, TankSensor),
            field(1, "start_pressure", UInt16, TankStartPressure),
            field(2, "end_pressure", UInt16, TankEndPressure),
            field(3, "volume_used", UInt32, Ignore),
        ],
    },
];

/// Find the decode table for a global message number.
pub fn message(number: u16) -> Option<&'static MessageDescriptor> {
    MESSAGES.iter().find(|m| m.number == number)
}

/// Find the decode table entry for a field shared by every message.
pub fn universal_field(number: u8) -> Option<&'static FieldDescriptor> {
    UNIVERSAL.iter().find(|f| f.number == number)
}
