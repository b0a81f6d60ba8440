//! Integration tests for the GATT payload codecs (bit-exact wire laws).

use velotrain::ble::codec::{
    encode_cps_measurement, encode_indoor_bike_data, encode_rsc_measurement,
    parse_cps_measurement, parse_indoor_bike_data, parse_rsc_measurement, CrankCadenceTracker,
    CrankRevolutionData, WheelRevolutionData,
};

#[test]
fn test_indoor_bike_data_wire_format() {
    // Cadence 90 rpm, power 250 W, speed pinned to zero.
    assert_eq!(
        encode_indoor_bike_data(90, 250, true, true),
        vec![0x44, 0x00, 0x00, 0x00, 0xB4, 0x00, 0xFA, 0x00]
    );
}

#[test]
fn test_cps_measurement_wire_format() {
    let bytes = encode_cps_measurement(
        250,
        Some(WheelRevolutionData {
            cumulative_revs: 0x0102_0304,
            last_event_time_2048: 0x1122,
        }),
        Some(CrankRevolutionData {
            cumulative_revs: 0x3344,
            last_event_time_1024: 0x5566,
        }),
    );
    assert_eq!(
        &bytes[..14],
        &[
            0x30, 0x00, 0xFA, 0x00, 0x04, 0x03, 0x02, 0x01, 0x22, 0x11, 0x44, 0x33, 0x66, 0x55
        ]
    );
}

#[test]
fn test_indoor_bike_data_parse() {
    let parsed =
        parse_indoor_bike_data(&[0x44, 0x00, 0xE8, 0x03, 0xB4, 0x00, 0xFA, 0x00]).unwrap();
    assert!((parsed.speed_mps.unwrap() - 10.0).abs() < 0.005);
    assert_eq!(parsed.cadence_rpm, Some(90));
    assert_eq!(parsed.power_w, Some(250));
}

#[test]
fn test_cps_cadence_from_successive_frames() {
    // One crank revolution, 1024 ticks (one second) apart: 60 rpm.
    let frame = |revs: u16, time: u16| {
        encode_cps_measurement(
            200,
            None,
            Some(CrankRevolutionData {
                cumulative_revs: revs,
                last_event_time_1024: time,
            }),
        )
    };

    let mut tracker = CrankCadenceTracker::new();
    let first = parse_cps_measurement(&frame(500, 10_000)).unwrap();
    assert!(tracker.update(first.crank.unwrap()).is_none());
    let second = parse_cps_measurement(&frame(501, 11_024)).unwrap();
    let cadence = tracker.update(second.crank.unwrap()).unwrap();
    assert!((cadence - 60.0).abs() < 1e-9, "cadence was {}", cadence);
}

#[test]
fn test_rsc_measurement_round_trip() {
    let bytes = encode_rsc_measurement(2.5, 85);
    let parsed = parse_rsc_measurement(&bytes).unwrap();
    assert!((parsed.speed_mps - 2.5).abs() < 1.0 / 256.0);
    assert_eq!(parsed.cadence_rpm, 85);
}

#[test]
fn test_parsers_reject_truncated_frames() {
    assert!(parse_indoor_bike_data(&[0x44]).is_none());
    assert!(parse_indoor_bike_data(&[0x44, 0x00, 0x00, 0x00, 0xB4]).is_none());
    assert!(parse_cps_measurement(&[0x30, 0x00, 0xFA]).is_none());
    assert!(parse_rsc_measurement(&[0x00, 0x80]).is_none());
}
