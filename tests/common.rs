
use fit::{BIG, Fit, Int, LITTLE, SENSOR, Str, T0, field, invalid, string};
use regulator::{
    DiveDateTime, Error, FieldKind, FieldValue, FormatError, Parser, ParserConfig, PressureDepth,
    Sample, SampleValue,
    cache::{DeviceInfo, DiveMode, FieldCache, GasMix, MAX_STRINGS, Salinity, WaterType},
    sample::{Deco, DecoKind},
    sans::data::BaseType::{self, Enum, Float32, SInt8, SInt32, UInt8, UInt16, UInt32, UInt32Z},
};

fn parse(data: &[u8]) -> Parser {
    let mut parser = Parser::new();
    parser.set_data(data).unwrap();
    parser
}

fn samples(parser: &Parser) -> Vec<Sample> {
    let mut samples = Vec::new();
    parser.samples_foreach(&mut samples).unwrap();
    samples
}

fn values(parser: &Parser) -> Vec<SampleValue> {
    samples(parser).into_iter().map(|s| s.value).collect()
}

fn string_value(parser: &Parser, desc: &str) -> Option<String> {
    (0..MAX_STRINGS).find_map(|i| match parser.field(FieldKind::String, i) {
        Ok(FieldValue::String(s)) if s.desc == desc => Some(s.value.clone()),
        _ => None,
    })
}

#[test]
fn descent_dive_fields() {
    fit::init_tracing();
    let parser = parse(&fit::descent_dive().build());

    assert_eq!(parser.field(FieldKind::DiveTime, 0), Ok(FieldValue::DiveTime(40)));
    assert_eq!(parser.field(FieldKind::MaxDepth, 0), Ok(FieldValue::MaxDepth(18.3)));
    assert_eq!(parser.field(FieldKind::AvgDepth, 0), Ok(FieldValue::AvgDepth(9.1)));
    assert_eq!(
        parser.field(FieldKind::Atmospheric, 0),
        Ok(FieldValue::Atmospheric(1.01325))
    );
    assert_eq!(
        parser.field(FieldKind::DiveMode, 0),
        Ok(FieldValue::DiveMode(DiveMode::OpenCircuit))
    );
    assert_eq!(
        parser.field(FieldKind::Salinity, 0),
        Ok(FieldValue::Salinity(Salinity {
            water: WaterType::Salt,
            density: 1025.0
        }))
    );
    assert_eq!(parser.field(FieldKind::StartTime, 0), Ok(FieldValue::StartTime(T0)));
    assert_eq!(parser.field(FieldKind::UtcOffset, 0), Ok(FieldValue::UtcOffset(7200)));
    assert_eq!(parser.field(FieldKind::Latitude, 0), Ok(FieldValue::Latitude(22.5)));
    assert_eq!(parser.field(FieldKind::Longitude, 0), Ok(FieldValue::Longitude(-90.0)));
    assert_eq!(parser.field(FieldKind::LowSetpoint, 0), Ok(FieldValue::LowSetpoint(0.7)));
    assert_eq!(parser.field(FieldKind::HighSetpoint, 0), Ok(FieldValue::HighSetpoint(1.3)));
}

#[test]
fn descent_dive_gases() {
    let parser = parse(&fit::descent_dive().build());

    assert_eq!(parser.field(FieldKind::GasMixCount, 0), Ok(FieldValue::GasMixCount(2)));
    assert_eq!(
        parser.field(FieldKind::GasMix, 0),
        Ok(FieldValue::GasMix(GasMix::from_percent(21, 0)))
    );
    assert_eq!(
        parser.field(FieldKind::GasMix, 1),
        Ok(FieldValue::GasMix(GasMix::from_percent(50, 0)))
    );
    // Disabled.
    assert_eq!(parser.field(FieldKind::GasMix, 2), Err(Error::Unsupported));
}

#[test]
fn descent_dive_tank() {
    let parser = parse(&fit::descent_dive().build());

    assert_eq!(parser.field(FieldKind::TankCount, 0), Ok(FieldValue::TankCount(1)));

    let Ok(FieldValue::Tank(tank)) = parser.field(FieldKind::Tank, 0) else {
        panic!("missing tank");
    };
    assert_eq!(tank.sensor, SENSOR as u32);
    assert_eq!(tank.name.as_deref(), Some("Back gas"));
    assert_eq!(tank.volume, Some(12.0));
    assert_eq!(tank.working_pressure, Some(232.0));
    assert_eq!(tank.reserve_pressure, Some(50.0));
    // The tank summary overrides the updates.
    assert_eq!(tank.begin_pressure, Some(201.0));
    assert_eq!(tank.end_pressure, Some(190.0));
}

#[test]
fn descent_dive_device() {
    let data = fit::descent_dive().build();
    let parser = parse(&data);

    assert_eq!(
        parser.devinfo(),
        Ok(DeviceInfo {
            serial: 3_412_345_678,
            product: 3258,
            firmware: 1150,
        })
    );
    assert_eq!(string_value(&parser, "Serial").as_deref(), Some("3412345678"));
    assert_eq!(string_value(&parser, "Firmware").as_deref(), Some("11.50"));
    assert_eq!(string_value(&parser, "Product").as_deref(), Some("Descent Mk2i"));
    assert_eq!(
        string_value(&parser, "Deco model").as_deref(),
        Some("Buhlmann ZHL-16C 40/85")
    );
    assert_eq!(string_value(&parser, "Dive number").as_deref(), Some("42"));

    assert_eq!(parser.fingerprint(), fit::NAME);
}

#[test]
fn descent_dive_datetime() {
    let parser = parse(&fit::descent_dive().build());

    assert_eq!(
        parser.datetime(),
        Ok(DiveDateTime {
            year: 2021,
            month: 9,
            day: 8,
            hour: 3,
            minute: 46,
            second: 40,
            timezone: Some(7200),
        })
    );
}

#[test]
fn fields_survive_streaming() {
    let parser = parse(&fit::descent_dive().build());
    let before = parser.field(FieldKind::MaxDepth, 0);

    samples(&parser);

    assert_eq!(parser.field(FieldKind::MaxDepth, 0), before);
}

#[test]
fn classifies_dives() {
    let config = ParserConfig::default();
    assert!(Parser::is_dive(&fit::descent_dive().build(), &config));

    let mut run = Fit::new();
    run.define(0, 12, LITTLE, &[field(0, Enum), field(1, Enum)])
        .data(0, &[Int(1), Int(0)]);
    assert!(!Parser::is_dive(&run.build(), &config));

    assert!(!Parser::is_dive(b"not a dive", &config));

    // A summary alone is enough.
    let mut summary = Fit::new();
    summary
        .define(0, 268, LITTLE, &[field(0, UInt16), field(2, UInt32)])
        .data(0, &[Int(18), Int(9100)]);
    assert!(Parser::is_dive(&summary.build(), &config));
}

#[test]
fn classification_stops_at_first_discriminant() {
    let config = ParserConfig::default();

    // Undefined local type after the sport record.
    let mut dive = fit::descent_dive();
    dive.raw(&[0x0F, 0, 0, 0, 0]);
    let data = dive.build();

    assert!(Parser::is_dive(&data, &config));
    assert_eq!(Parser::new().set_data(&data), Err(Error::UninitializedType(15)));

    // Faults ahead of the discriminant still reject the blob.
    let mut early = Fit::new();
    early
        .raw(&[0x0F, 0, 0, 0, 0])
        .define(0, 12, LITTLE, &[field(0, Enum), field(1, Enum)])
        .data(0, &[Int(53), Int(54)]);
    assert!(!Parser::is_dive(&early.build(), &config));
}

#[test]
fn start_time_from_first_timestamp() {
    // A session carrying only a timestamp and an unfixed start position.
    let mut fit = Fit::new();
    fit.define(0, 18, LITTLE, &[field(253, UInt32), field(3, SInt32)])
        .data(0, &[Int(100), Int(i32::MIN as i64)]);

    let parser = parse(&fit.build());

    assert_eq!(parser.field(FieldKind::StartTime, 0), Ok(FieldValue::StartTime(100)));
    assert_eq!(parser.field(FieldKind::Latitude, 0), Err(Error::Unsupported));
}

#[test]
fn unknown_message_still_timestamps() {
    let mut fit = Fit::new();
    fit.define(0, 0xFF00, LITTLE, &[field(253, UInt32), field(2, SInt32)])
        .raw(&[0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80]);

    let parser = parse(&fit.build());

    assert_eq!(parser.field(FieldKind::StartTime, 0), Ok(FieldValue::StartTime(100)));
    assert_eq!(parser.field(FieldKind::Latitude, 0), Err(Error::Unsupported));
}

#[test]
fn undefined_local_types_fail() {
    for local in 0..16u8 {
        let mut fit = Fit::new();
        // Define every other local type first.
        for other in (0..16u8).filter(|o| *o != local) {
            fit.define(other, 20, LITTLE, &[field(92, UInt32)]);
        }
        fit.raw(&[local, 0, 0, 0, 0]);

        let mut parser = Parser::new();
        assert_eq!(parser.set_data(&fit.build()), Err(Error::UninitializedType(local)));
    }
}

#[test]
fn invalid_values_are_suppressed() {
    let cases: [(u16, u8, BaseType, FieldKind); 8] = [
        (20, 92, UInt32, FieldKind::MaxDepth),
        (18, 3, SInt32, FieldKind::Latitude),
        (18, 2, UInt32, FieldKind::StartTime),
        (12, 1, Enum, FieldKind::DiveMode),
        (258, 5, Float32, FieldKind::Salinity),
        (259, 1, UInt8, FieldKind::GasMix),
        (147, 0, UInt32Z, FieldKind::Tank),
        (23, 3, UInt32Z, FieldKind::Device),
    ];

    for (message, number, base, kind) in cases {
        let mut fit = Fit::new();
        let extra = if message == 258 {
            // Custom water, so only the density decides.
            fit.define(0, message, LITTLE, &[field(4, Enum), field(number, base)]);
            vec![Int(3), invalid(base)]
        } else {
            fit.define(0, message, LITTLE, &[field(number, base)]);
            vec![invalid(base)]
        };
        fit.data(0, &extra);

        let parser = parse(&fit.build());
        assert_eq!(parser.field(kind, 0), Err(Error::Unsupported), "{message}.{number}");
        assert!(samples(&parser).is_empty(), "{message}.{number}");
    }
}

#[test]
fn invalid_samples_are_suppressed() {
    let mut fit = Fit::new();
    fit.define(0, 20, LITTLE, &[
        field(253, UInt32),
        field(92, UInt32),
        field(13, SInt8),
        field(3, UInt8),
        field(97, UInt8),
        field(123, UInt32),
    ])
    .data(0, &[
        Int(T0 as i64),
        invalid(UInt32),
        invalid(SInt8),
        invalid(UInt8),
        invalid(UInt8),
        invalid(UInt32),
    ]);

    let parser = parse(&fit.build());
    assert!(samples(&parser).is_empty());
}

#[test]
fn endianness_per_definition() {
    let mut fit = Fit::new();
    fit.define(0, 20, LITTLE, &[field(253, UInt32), field(92, UInt32)])
        .define(1, 20, BIG, &[field(253, UInt32), field(92, UInt32)])
        .data(0, &[Int(T0 as i64), Int(1500)])
        .data(1, &[Int(T0 as i64 + 1), Int(2500)])
        .data(0, &[Int(T0 as i64 + 2), Int(0x0102_0304)]);

    let parser = parse(&fit.build());

    assert_eq!(
        values(&parser),
        [
            SampleValue::Depth(1.5),
            SampleValue::Depth(2.5),
            SampleValue::Depth(0x0102_0304 as f64 / 1000.0),
        ]
    );
}

#[test]
fn redefinition_governs_later_records() {
    let mut fit = Fit::new();
    fit.define(0, 20, LITTLE, &[field(253, UInt32), field(92, UInt32)])
        .data(0, &[Int(T0 as i64), Int(4000)])
        .define(0, 20, LITTLE, &[field(253, UInt32), field(13, SInt8)])
        .data(0, &[Int(T0 as i64 + 5), Int(-1)]);

    let parser = parse(&fit.build());

    assert_eq!(
        samples(&parser),
        [
            Sample {
                time: 0,
                value: SampleValue::Depth(4.0)
            },
            Sample {
                time: 5,
                value: SampleValue::Temperature(-1.0)
            },
        ]
    );
}

#[test]
fn composites_flush_once_per_record() {
    let mut fit = Fit::new();
    fit.define(0, 20, LITTLE, &[
        field(253, UInt32),
        field(93, UInt32),
        field(94, UInt32),
        field(95, UInt32),
        field(96, UInt32),
    ])
    .data(0, &[Int(T0 as i64), Int(0), Int(0), Int(300), Int(1200)])
    .data(0, &[Int(T0 as i64 + 60), Int(6000), Int(60), Int(540), Int(0)]);

    let parser = parse(&fit.build());

    assert_eq!(
        samples(&parser),
        [
            Sample {
                time: 0,
                value: SampleValue::Deco(Deco {
                    kind: DecoKind::Ndl,
                    time: 1200,
                    depth: 0.0,
                    tts: Some(300),
                })
            },
            Sample {
                time: 60,
                value: SampleValue::Deco(Deco {
                    kind: DecoKind::DecoStop,
                    time: 60,
                    depth: 6.0,
                    tts: Some(540),
                })
            },
        ]
    );
}

#[test]
fn timestamp_applies_before_other_fields() {
    // The timestamp is written last, but the depth still carries its time.
    let mut fit = Fit::new();
    fit.define(0, 20, LITTLE, &[field(253, UInt32)])
        .data(0, &[Int(T0 as i64)])
        .define(1, 20, LITTLE, &[field(92, UInt32), field(253, UInt32)])
        .data(1, &[Int(3000), Int(T0 as i64 + 7)]);

    let parser = parse(&fit.build());

    assert_eq!(
        samples(&parser),
        [Sample {
            time: 7,
            value: SampleValue::Depth(3.0)
        }]
    );
}

#[test]
fn declared_size_boundary() {
    let mut fit = Fit::new();
    fit.define(0, 20, LITTLE, &[field(253, UInt32), field(92, UInt32)])
        .data(0, &[Int(T0 as i64), Int(1000)])
        .data(0, &[Int(T0 as i64 + 1), Int(2000)]);
    let size = fit.records_len() as u32;

    // Exactly the records written.
    let mut parser = Parser::new();
    parser.set_data(&fit.build_declaring(size)).unwrap();

    // The last record runs past the declared size.
    let err = parser.set_data(&fit.build_declaring(size - 1)).unwrap_err();
    assert_eq!(
        err,
        Error::Format(FormatError::FieldOverrun {
            field: 92,
            size: 4,
            remaining: 3
        })
    );
    assert!(err.is_fatal());

    // More declared than the buffer holds.
    let err = parser.set_data(&fit.build_declaring(size + 3)).unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::InconsistentSize { .. })));
}

#[test]
fn rejects_unsupported_headers() {
    let mut fit = Fit::new();
    fit.define(0, 20, LITTLE, &[field(92, UInt32)]);

    let mut compressed = fit.clone();
    compressed.raw(&[0x80, 0, 0, 0, 0]);
    assert_eq!(
        Parser::new().set_data(&compressed.build()),
        Err(Error::Format(FormatError::CompressedTimestamp))
    );

    let mut developer = fit.clone();
    developer.raw(&[0x60, 0, 0, 20, 0, 0, 0]);
    assert_eq!(
        Parser::new().set_data(&developer.build()),
        Err(Error::Format(FormatError::DeveloperData))
    );
}

#[test]
fn legacy_header() {
    let mut fit = Fit::new().short_header();
    fit.define(0, 20, LITTLE, &[field(253, UInt32), field(92, UInt32)])
        .data(0, &[Int(T0 as i64), Int(1000)]);

    let parser = parse(&fit.build());
    assert_eq!(parser.field(FieldKind::MaxDepth, 0), Ok(FieldValue::MaxDepth(1.0)));
}

#[test]
fn verifies_crc_when_configured() {
    let config = ParserConfig::default().with_verify_crc(true);
    let mut data = fit::descent_dive().build();

    Parser::with_config(config.clone()).set_data(&data).unwrap();

    let last = data.len() - 3;
    data[last] ^= 0x01;

    assert!(matches!(
        Parser::with_config(config).set_data(&data),
        Err(Error::Format(FormatError::CyclicRedundancyCheck { .. }))
    ));
}

#[test]
fn batch_skips_bad_dives() {
    let good = fit::descent_dive().build();
    let mut truncated = good.clone();
    truncated.truncate(good.len() / 2);

    let blobs = [good.clone(), truncated, b"garbage".to_vec(), good];

    let mut parser = Parser::new();
    let results: Vec<_> = blobs.iter().map(|b| parser.set_data(b)).collect();

    assert!(results[0].is_ok());
    assert!(results[1].as_ref().is_err_and(Error::is_fatal));
    assert!(results[2].as_ref().is_err_and(Error::is_fatal));
    assert!(results[3].is_ok());
}

#[test]
fn unterminated_strings_fail() {
    let mut fit = Fit::new();
    fit.define(0, 23, LITTLE, &[string(27, 4)])
        .data(0, &[Str("Mk2i")]);

    assert_eq!(
        Parser::new().set_data(&fit.build()),
        Err(Error::Format(FormatError::UnterminatedString(27)))
    );
}

#[test]
fn unknown_fields_and_base_types_are_skipped() {
    let mut fit = Fit::new();
    fit.define(0, 20, LITTLE, &[
        field(253, UInt32),
        (200, 4, 0x86), // unknown field
        (92, 4, 0x1F),  // unknown base type
        (3, 2, 0x84),   // unexpected base type
        field(92, UInt32),
    ])
    .raw(&[0x00])
    .raw(&T0.to_le_bytes())
    .raw(&[1, 2, 3, 4])
    .raw(&[5, 6, 7, 8])
    .raw(&[72, 0])
    .raw(&2000u32.to_le_bytes());

    let parser = parse(&fit.build());
    assert_eq!(values(&parser), [SampleValue::Depth(2.0)]);
}

#[test]
fn depth_from_pressure() {
    let conversion = PressureDepth {
        surface_pressure: Some(1.0),
        density: 1000.0,
    };
    let config = ParserConfig::default().with_pressure_depth(conversion);

    let mut fit = Fit::new();
    fit.define(0, 20, LITTLE, &[field(253, UInt32), field(91, UInt32)])
        .data(0, &[Int(T0 as i64), Int(198_066)]);

    let mut parser = Parser::with_config(config);
    parser.set_data(&fit.build()).unwrap();

    let values = values(&parser);
    let [SampleValue::Depth(depth)] = values.as_slice() else {
        panic!("expected one depth, got {values:?}");
    };
    assert!((depth - 10.0).abs() < 1e-3, "{depth}");
}

#[test]
fn string_table_exhaustion() {
    let mut cache = FieldCache::new();

    for i in 0..MAX_STRINGS {
        cache.add_string("Note", format!("note {i}")).unwrap();
    }

    let err = cache.add_string("Note", "one too many").unwrap_err();
    assert_eq!(err, Error::ResourceExhausted("string"));
    assert!(!err.is_fatal());

    for i in 0..MAX_STRINGS {
        let Ok(FieldValue::String(s)) = cache.get(FieldKind::String, i) else {
            panic!("missing string {i}");
        };
        assert_eq!(s.value, format!("note {i}"));
    }
}

#[test]
fn device_info_wins_over_file_id() {
    let file_id = [field(0, Enum), field(1, UInt16), field(2, UInt16), field(3, UInt32Z)];
    let device_info = [field(0, UInt8), field(3, UInt32Z), field(4, UInt16)];

    let mut fit = Fit::new();
    fit.define(0, 0, LITTLE, &file_id)
        .data(0, &[Int(4), Int(1), Int(3258), Int(111)])
        .define(1, 23, LITTLE, &device_info)
        .data(1, &[Int(0), Int(222), Int(3300)]);

    let parser = parse(&fit.build());
    assert_eq!(
        parser.devinfo(),
        Ok(DeviceInfo {
            serial: 222,
            product: 3258,
            firmware: 3300,
        })
    );
    assert_eq!(string_value(&parser, "Serial").as_deref(), Some("222"));

    // A late file_id does not override the device.
    let mut fit = Fit::new();
    fit.define(1, 23, LITTLE, &device_info)
        .data(1, &[Int(0), Int(222), Int(3300)])
        .define(0, 0, LITTLE, &file_id)
        .data(0, &[Int(4), Int(1), Int(3258), Int(111)]);

    let parser = parse(&fit.build());
    assert_eq!(
        parser.devinfo(),
        Ok(DeviceInfo {
            serial: 222,
            product: 3258,
            firmware: 3300,
        })
    );
    assert_eq!(string_value(&parser, "Serial").as_deref(), Some("222"));
}

#[test]
fn out_of_range_utc_offset_is_skipped() {
    let mut fit = Fit::new();
    fit.define(0, 34, LITTLE, &[field(253, UInt32), field(5, UInt32)])
        .data(0, &[Int(1), Int(0xFFFF_FFF0)]);

    let parser = parse(&fit.build());

    assert_eq!(parser.field(FieldKind::UtcOffset, 0), Err(Error::Unsupported));
    assert_eq!(parser.datetime().map(|d| d.timezone), Ok(None));
}
