//! SIG-assigned GATT UUIDs for the advertised services.

use uuid::Uuid;

/// Fitness Machine Service UUID (0x1826)
pub const FTMS_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1826_0000_1000_8000_0080_5f9b_34fb);

/// Fitness Machine Feature Characteristic UUID (0x2ACC)
pub const FTMS_FEATURE_UUID: Uuid = Uuid::from_u128(0x0000_2acc_0000_1000_8000_0080_5f9b_34fb);

/// Indoor Bike Data Characteristic UUID (0x2AD2)
pub const INDOOR_BIKE_DATA_UUID: Uuid = Uuid::from_u128(0x0000_2ad2_0000_1000_8000_0080_5f9b_34fb);

/// Fitness Machine Status Characteristic UUID (0x2ADA)
pub const FTMS_STATUS_UUID: Uuid = Uuid::from_u128(0x0000_2ada_0000_1000_8000_0080_5f9b_34fb);

/// Fitness Machine Control Point UUID (0x2AD9)
pub const FTMS_CONTROL_POINT_UUID: Uuid =
    Uuid::from_u128(0x0000_2ad9_0000_1000_8000_0080_5f9b_34fb);

/// Supported Power Range Characteristic UUID (0x2AD8)
pub const SUPPORTED_POWER_RANGE_UUID: Uuid =
    Uuid::from_u128(0x0000_2ad8_0000_1000_8000_0080_5f9b_34fb);

/// Cycling Power Service UUID (0x1818)
pub const CYCLING_POWER_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_1818_0000_1000_8000_0080_5f9b_34fb);

/// Cycling Power Measurement Characteristic UUID (0x2A63)
pub const CYCLING_POWER_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a63_0000_1000_8000_0080_5f9b_34fb);

/// Cycling Power Feature Characteristic UUID (0x2A65)
pub const CYCLING_POWER_FEATURE_UUID: Uuid =
    Uuid::from_u128(0x0000_2a65_0000_1000_8000_0080_5f9b_34fb);

/// Running Speed and Cadence Service UUID (0x1814)
pub const RSC_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1814_0000_1000_8000_0080_5f9b_34fb);

/// RSC Measurement Characteristic UUID (0x2A53)
pub const RSC_MEASUREMENT_UUID: Uuid = Uuid::from_u128(0x0000_2a53_0000_1000_8000_0080_5f9b_34fb);

/// RSC Feature Characteristic UUID (0x2A54)
pub const RSC_FEATURE_UUID: Uuid = Uuid::from_u128(0x0000_2a54_0000_1000_8000_0080_5f9b_34fb);

/// Sensor Location Characteristic UUID (0x2A5D)
pub const SENSOR_LOCATION_UUID: Uuid = Uuid::from_u128(0x0000_2a5d_0000_1000_8000_0080_5f9b_34fb);

/// Characteristic User Description Descriptor UUID (0x2901)
pub const USER_DESCRIPTION_UUID: Uuid = Uuid::from_u128(0x0000_2901_0000_1000_8000_0080_5f9b_34fb);
