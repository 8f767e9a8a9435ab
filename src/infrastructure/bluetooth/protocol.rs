//! SN60 Plus Wire Protocol
//!
//! Stateless codec between the tracker's byte-level protocol and the typed
//! values used by the engines. All frames are little-endian, fixed layout,
//! with no checksum. Several bytes in the user-data and device-settings
//! frames are opaque constants sniffed from the vendor app; the device
//! rejects the frame unless they are reproduced byte for byte.

use crate::domain::models::{ActivityCounters, AlarmSpec};
use crate::domain::settings::{Gender, TimeFormat, UserProfile};
use crate::error::DeviceError;
use chrono::{Datelike, Local, Timelike};
use tracing::trace;

/// Vendor activity/control service UUID.
pub const SERVICE_ACTIVITY_UUID: &str = "0000feea-0000-1000-8000-00805f9b34fb";

/// Standard GATT services the device also exposes.
pub const SERVICE_HEART_RATE_UUID: &str = "0000180d-0000-1000-8000-00805f9b34fb";
pub const SERVICE_BATTERY_UUID: &str = "0000180f-0000-1000-8000-00805f9b34fb";
pub const SERVICE_DEVICE_INFORMATION_UUID: &str = "0000180a-0000-1000-8000-00805f9b34fb";

/// Cumulative activity counters are notified/read here.
pub const ACTIVITY_DATA_CHAR_UUID: &str = "0000fee1-0000-1000-8000-00805f9b34fb";

/// Outbound command characteristic.
pub const CONTROL_CHAR_UUID: &str = "0000fee2-0000-1000-8000-00805f9b34fb";

/// Standard GATT heart-rate measurement characteristic.
pub const HEART_RATE_MEASUREMENT_UUID: &str = "00002a37-0000-1000-8000-00805f9b34fb";

/// Standard GATT battery level characteristic.
pub const BATTERY_LEVEL_UUID: &str = "00002a19-0000-1000-8000-00805f9b34fb";

/// Standard GATT device-information characteristics.
pub const FIRMWARE_REVISION_UUID: &str = "00002a26-0000-1000-8000-00805f9b34fb";
pub const HARDWARE_REVISION_UUID: &str = "00002a27-0000-1000-8000-00805f9b34fb";
pub const BODY_SENSOR_LOCATION_UUID: &str = "00002a38-0000-1000-8000-00805f9b34fb";

/// Command opcodes, first byte of every outbound frame.
pub mod opcode {
    pub const DISPLAY_SETTINGS: u8 = 0xa0;
    pub const DATETIME: u8 = 0xa3;
    pub const USER_DATA: u8 = 0xa9;
    /// Shared by the alarm-slot and vibration frames.
    pub const ALARM: u8 = 0xab;
    pub const FACTORY_RESET: u8 = 0xad;
    pub const FETCH_STEPS: u8 = 0xb2;
    pub const NOTIFICATION: u8 = 0xc1;
    pub const ICON: u8 = 0xc3;
    pub const DEVICE_SETTINGS: u8 = 0xd3;
}

/// Weekday bits for the alarm repetition bitmask.
pub mod repeat {
    pub const MONDAY: u8 = 0x01;
    pub const TUESDAY: u8 = 0x02;
    pub const WEDNESDAY: u8 = 0x04;
    pub const THURSDAY: u8 = 0x08;
    pub const FRIDAY: u8 = 0x10;
    pub const SATURDAY: u8 = 0x20;
    pub const SUNDAY: u8 = 0x40;
    pub const EVERY_DAY: u8 = 0x7f;
}

/// First byte of a valid heart-rate notification.
const HEART_RATE_MARKER: u8 = 0x06;

/// Length of a cumulative activity payload.
pub const ACTIVITY_PAYLOAD_LEN: usize = 9;

/// Number of alarm slots on the device.
pub const MAX_ALARMS: u8 = 3;

/// Notification text is truncated to this many encoded bytes.
const NOTIFICATION_TEXT_LEN: usize = 18;

/// Second byte of a notification-type frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Call,
    Sms,
}

impl NotificationKind {
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Call => 0x02,
            Self::Sms => 0x03,
        }
    }
}

const NOTIFICATION_HEADER: u8 = 0x01;
const NOTIFICATION_STOP: u8 = 0x04;

/// Icons the device can flash on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Qq,
    WeChat,
    Mail,
}

impl Icon {
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Qq => 0x01,
            Self::WeChat => 0x02,
            Self::Mail => 0x04,
        }
    }
}

fn read_u24_le(bytes: &[u8]) -> u32 {
    (bytes[0] as u32) | ((bytes[1] as u32) << 8) | ((bytes[2] as u32) << 16)
}

/// Decode a cumulative activity payload: three 3-byte little-endian unsigned
/// integers (steps, meters, calories). Trailing bytes are ignored.
pub fn decode_activity(payload: &[u8]) -> Result<ActivityCounters, DeviceError> {
    if payload.len() < ACTIVITY_PAYLOAD_LEN {
        return Err(DeviceError::MalformedPayload {
            expected: ACTIVITY_PAYLOAD_LEN,
            actual: payload.len(),
        });
    }

    let counters = ActivityCounters::new(
        read_u24_le(&payload[0..3]),
        read_u24_le(&payload[3..6]),
        read_u24_le(&payload[6..9]),
    );
    trace!(?counters, "decoded activity payload");
    Ok(counters)
}

/// Encode counters back into the 9-byte activity layout. Values are masked
/// to 24 bits, the range the device can represent.
pub fn encode_activity(counters: &ActivityCounters) -> [u8; ACTIVITY_PAYLOAD_LEN] {
    let mut frame = [0u8; ACTIVITY_PAYLOAD_LEN];
    for (chunk, value) in frame
        .chunks_exact_mut(3)
        .zip([counters.steps, counters.meters, counters.calories])
    {
        chunk.copy_from_slice(&value.to_le_bytes()[..3]);
    }
    frame
}

/// Decode a heart-rate notification: `[0x06, bpm]`. Any other first byte or
/// length is an unrecognized frame, silently ignorable rather than an error
/// to surface.
pub fn decode_heart_rate(payload: &[u8]) -> Option<u8> {
    if payload.len() == 2 && payload[0] == HEART_RATE_MARKER {
        Some(payload[1])
    } else {
        None
    }
}

/// Set-time frame for the current local wall clock.
pub fn encode_set_time_now() -> [u8; 8] {
    let now = Local::now();
    encode_set_time(
        now.year() as u16,
        now.month() as u8,
        now.day() as u8,
        now.hour() as u8,
        now.minute() as u8,
        now.second() as u8,
    )
}

pub fn encode_set_time(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> [u8; 8] {
    [
        opcode::DATETIME,
        (year / 256) as u8,
        (year % 256) as u8,
        month,
        day,
        hour,
        minute,
        second,
    ]
}

/// Vibration burst: `duration` and `count` of pulses. The trailing
/// `0x07 0x01` pair was sniffed from the vendor app.
pub fn encode_vibration(duration: u8, count: u8) -> [u8; 8] {
    [
        opcode::ALARM,
        0x00,
        0x00,
        0x00,
        duration,
        count,
        0x07,
        0x01,
    ]
}

/// One alarm slot. A slot outside the device's three slots is a user-facing
/// configuration error, rejected here before any frame is built.
pub fn encode_alarm(alarm: &AlarmSpec) -> Result<[u8; 9], DeviceError> {
    if alarm.position >= MAX_ALARMS {
        return Err(DeviceError::Configuration(format!(
            "only {MAX_ALARMS} alarms are supported"
        )));
    }

    let enabled = alarm.enabled;
    Ok([
        opcode::ALARM,
        alarm.repetition,
        alarm.hour,
        alarm.minute,
        if enabled { 2 } else { 0 },  // vibration duration
        if enabled { 10 } else { 0 }, // vibration count
        if enabled { 2 } else { 0 },
        0x00,
        alarm.position + 1,
    ])
}

/// Display preferences: distance unit and clock format.
pub fn encode_display_settings(metric_units: bool, time_format: TimeFormat) -> [u8; 3] {
    [
        opcode::DISPLAY_SETTINGS,
        if metric_units { 1 } else { 2 },
        match time_format {
            TimeFormat::TwentyFourHour => 1,
            TimeFormat::AmPm => 2,
        },
    ]
}

/// User profile frame, fixed 17-byte record. Bytes marked unknown carry
/// constants sniffed from the vendor app.
pub fn encode_user_data(profile: &UserProfile, lift_wrist: bool) -> [u8; 17] {
    [
        opcode::USER_DATA,
        0x00, // unknown
        profile.step_length_cm(),
        0x00, // unknown
        profile.weight_kg,
        0x05, // screen on time / display timeout
        0x00, // unknown
        0x00, // unknown
        (profile.steps_goal / 256) as u8,
        (profile.steps_goal % 256) as u8,
        if lift_wrist { 0x01 } else { 0x00 },
        0xff, // unknown
        0x00, // unknown
        profile.age,
        match profile.gender {
            Gender::Male => 1,
            Gender::Female => 2,
        },
        0x00, // lost function
        0x02, // unknown
    ]
}

/// Device settings frame, fixed 7-byte record. All bytes after the
/// inactivity-alarm flag were sniffed from the vendor app.
pub fn encode_device_settings(inactivity_alarm: bool) -> [u8; 7] {
    [
        opcode::DEVICE_SETTINGS,
        if inactivity_alarm { 0x01 } else { 0x00 },
        0x3c,
        0x02,
        0x03,
        0x01,
        0x00,
    ]
}

/// Notification body frame: header byte then the text in the device's legacy
/// single-byte encoding, truncated to 18 bytes. Must be followed by a
/// [`encode_notification_kind`] frame.
pub fn encode_notification_text(text: &str) -> Vec<u8> {
    let encoded = encode_legacy_text(text);
    let length = encoded.len().min(NOTIFICATION_TEXT_LEN);

    let mut frame = Vec::with_capacity(length + 2);
    frame.push(opcode::NOTIFICATION);
    frame.push(NOTIFICATION_HEADER);
    frame.extend_from_slice(&encoded[..length]);
    frame
}

pub fn encode_notification_kind(kind: NotificationKind) -> [u8; 2] {
    [opcode::NOTIFICATION, kind.as_byte()]
}

pub fn encode_notification_stop() -> [u8; 2] {
    [opcode::NOTIFICATION, NOTIFICATION_STOP]
}

pub fn encode_icon(icon: Icon) -> [u8; 2] {
    [opcode::ICON, icon.as_byte()]
}

pub fn encode_fetch_steps() -> [u8; 2] {
    [opcode::FETCH_STEPS, 0xfa]
}

pub fn encode_factory_reset() -> [u8; 1] {
    [opcode::FACTORY_RESET]
}

/// The device renders one byte per character in a legacy code page. ASCII
/// maps through unchanged; anything outside it becomes `?`.
fn encode_legacy_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_activity_triple() {
        let counters = decode_activity(&[10, 0, 0, 5, 0, 0, 2, 0, 0]).unwrap();
        assert_eq!(counters, ActivityCounters::new(10, 5, 2));
    }

    #[test]
    fn decode_activity_multibyte_values() {
        // 0x030201 = 197121, 0x000100 = 256, 0x010000 = 65536
        let counters =
            decode_activity(&[0x01, 0x02, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01]).unwrap();
        assert_eq!(counters, ActivityCounters::new(197121, 256, 65536));
    }

    #[test]
    fn decode_activity_ignores_trailing_bytes() {
        let counters = decode_activity(&[10, 0, 0, 5, 0, 0, 2, 0, 0, 0xde, 0xad]).unwrap();
        assert_eq!(counters.steps, 10);
    }

    #[test]
    fn decode_activity_rejects_short_payload() {
        let err = decode_activity(&[10, 0, 0, 5, 0]).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::MalformedPayload {
                expected: 9,
                actual: 5
            }
        ));
    }

    #[test]
    fn activity_codec_round_trips() {
        let counters = ActivityCounters::new(123_456, 78_901, 2_345);
        let decoded = decode_activity(&encode_activity(&counters)).unwrap();
        assert_eq!(decoded, counters);
    }

    #[test]
    fn heart_rate_requires_marker_and_length() {
        assert_eq!(decode_heart_rate(&[0x06, 72]), Some(72));
        assert_eq!(decode_heart_rate(&[0x05, 72]), None);
        assert_eq!(decode_heart_rate(&[0x06]), None);
        assert_eq!(decode_heart_rate(&[0x06, 72, 0x00]), None);
    }

    #[test]
    fn set_time_splits_year() {
        let frame = encode_set_time(2021, 7, 15, 13, 37, 42);
        assert_eq!(frame, [0xa3, 0x07, 0xe5, 7, 15, 13, 37, 42]);
    }

    #[test]
    fn vibration_layout() {
        assert_eq!(
            encode_vibration(1, 3),
            [0xab, 0x00, 0x00, 0x00, 1, 3, 0x07, 0x01]
        );
    }

    #[test]
    fn alarm_layout_enabled_slot() {
        let frame = encode_alarm(&AlarmSpec {
            position: 1,
            enabled: true,
            hour: 6,
            minute: 30,
            repetition: repeat::MONDAY | repeat::FRIDAY,
        })
        .unwrap();
        assert_eq!(frame, [0xab, 0x11, 6, 30, 2, 10, 2, 0x00, 2]);
    }

    #[test]
    fn alarm_disabled_slot_zeroes_vibration() {
        let frame = encode_alarm(&AlarmSpec {
            position: 0,
            enabled: false,
            hour: 6,
            minute: 30,
            repetition: repeat::EVERY_DAY,
        })
        .unwrap();
        assert_eq!(frame[4], 0);
        assert_eq!(frame[5], 0);
        assert_eq!(frame[8], 1);
    }

    #[test]
    fn fourth_alarm_slot_is_rejected() {
        let err = encode_alarm(&AlarmSpec {
            position: 3,
            enabled: true,
            hour: 6,
            minute: 30,
            repetition: 0,
        })
        .unwrap_err();
        assert!(matches!(err, DeviceError::Configuration(_)));
    }

    #[test]
    fn notification_text_is_truncated_to_18_bytes() {
        let frame = encode_notification_text("this text is much longer than the device fits");
        assert_eq!(frame.len(), 20);
        assert_eq!(frame[0], 0xc1);
        assert_eq!(frame[1], 0x01);
        assert_eq!(&frame[2..], b"this text is much ");
    }

    #[test]
    fn notification_text_substitutes_non_ascii() {
        let frame = encode_notification_text("café");
        assert_eq!(&frame[2..], b"caf?");
    }

    #[test]
    fn user_data_magic_bytes() {
        let profile = UserProfile {
            height_cm: 180,
            weight_kg: 80,
            age: 30,
            gender: Gender::Male,
            steps_goal: 10_000,
        };
        let frame = encode_user_data(&profile, false);
        assert_eq!(frame.len(), 17);
        assert_eq!(frame[0], 0xa9);
        assert_eq!(frame[5], 0x05);
        assert_eq!(frame[8], (10_000u16 / 256) as u8);
        assert_eq!(frame[9], (10_000u16 % 256) as u8);
        assert_eq!(frame[11], 0xff);
        assert_eq!(frame[14], 1);
        assert_eq!(frame[16], 0x02);
    }

    #[test]
    fn device_settings_magic_bytes() {
        assert_eq!(
            encode_device_settings(true),
            [0xd3, 0x01, 0x3c, 0x02, 0x03, 0x01, 0x00]
        );
    }

    #[test]
    fn fetch_frame() {
        assert_eq!(encode_fetch_steps(), [0xb2, 0xfa]);
    }
}
