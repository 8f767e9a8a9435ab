//! BLE Transport collaborator
//!
//! The driver core never talks GATT directly: connection management,
//! characteristic discovery, MTU and pairing all live behind this trait. The
//! transport delivers inbound notifications (and read responses) serially,
//! one at a time in arrival order, so a single session never races on decode.

use crate::infrastructure::bluetooth::protocol;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("device is not connected")]
    NotConnected,

    #[error("characteristic {0:?} is not available on this device")]
    CharacteristicUnavailable(Characteristic),

    #[error("BLE write failed: {0}")]
    WriteFailed(String),

    #[error("BLE subscribe failed: {0}")]
    SubscribeFailed(String),
}

/// Closed set of characteristics this driver knows how to talk to. Inbound
/// dispatch matches on this instead of raw UUID strings; anything the driver
/// does not recognise lands on `Unrecognized` explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// Cumulative activity counters, notify + read.
    ActivityData,
    /// Outbound command frames.
    Control,
    /// Standard heart-rate measurement.
    HeartRateMeasurement,
    /// Standard battery level.
    BatteryLevel,
    FirmwareRevision,
    HardwareRevision,
    BodySensorLocation,
    Unrecognized,
}

impl Characteristic {
    pub fn from_uuid(uuid: &str) -> Self {
        // BLE UUIDs are case-insensitive on every backend we have seen.
        match uuid.to_ascii_lowercase().as_str() {
            protocol::ACTIVITY_DATA_CHAR_UUID => Self::ActivityData,
            protocol::CONTROL_CHAR_UUID => Self::Control,
            protocol::HEART_RATE_MEASUREMENT_UUID => Self::HeartRateMeasurement,
            protocol::BATTERY_LEVEL_UUID => Self::BatteryLevel,
            protocol::FIRMWARE_REVISION_UUID => Self::FirmwareRevision,
            protocol::HARDWARE_REVISION_UUID => Self::HardwareRevision,
            protocol::BODY_SENSOR_LOCATION_UUID => Self::BodySensorLocation,
            _ => Self::Unrecognized,
        }
    }

    /// Service hosting the characteristic, for transports that filter
    /// discovery by service.
    pub fn service_uuid(&self) -> Option<&'static str> {
        match self {
            Self::ActivityData | Self::Control => Some(protocol::SERVICE_ACTIVITY_UUID),
            Self::HeartRateMeasurement | Self::BodySensorLocation => {
                Some(protocol::SERVICE_HEART_RATE_UUID)
            }
            Self::BatteryLevel => Some(protocol::SERVICE_BATTERY_UUID),
            Self::FirmwareRevision | Self::HardwareRevision => {
                Some(protocol::SERVICE_DEVICE_INFORMATION_UUID)
            }
            Self::Unrecognized => None,
        }
    }

    pub fn uuid(&self) -> Option<&'static str> {
        match self {
            Self::ActivityData => Some(protocol::ACTIVITY_DATA_CHAR_UUID),
            Self::Control => Some(protocol::CONTROL_CHAR_UUID),
            Self::HeartRateMeasurement => Some(protocol::HEART_RATE_MEASUREMENT_UUID),
            Self::BatteryLevel => Some(protocol::BATTERY_LEVEL_UUID),
            Self::FirmwareRevision => Some(protocol::FIRMWARE_REVISION_UUID),
            Self::HardwareRevision => Some(protocol::HARDWARE_REVISION_UUID),
            Self::BodySensorLocation => Some(protocol::BODY_SENSOR_LOCATION_UUID),
            Self::Unrecognized => None,
        }
    }
}

/// Write-bytes / subscribe capability provided by the BLE stack.
///
/// Failed writes are not retried by this core; the caller surfaces the
/// failure and the user re-initiates.
pub trait BleTransport: Send + Sync {
    /// Write one frame to a characteristic.
    fn write(&self, characteristic: Characteristic, payload: &[u8]) -> Result<(), TransportError>;

    /// Enable or disable notifications on a characteristic.
    fn subscribe(&self, characteristic: Characteristic, enabled: bool)
        -> Result<(), TransportError>;

    /// Request a one-shot read. The value arrives later through the same
    /// serial notification callback as notify data.
    fn read(&self, characteristic: Characteristic) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_uuids_map_to_variants() {
        assert_eq!(
            Characteristic::from_uuid(protocol::ACTIVITY_DATA_CHAR_UUID),
            Characteristic::ActivityData
        );
        assert_eq!(
            Characteristic::from_uuid("00002A37-0000-1000-8000-00805F9B34FB"),
            Characteristic::HeartRateMeasurement
        );
    }

    #[test]
    fn unknown_uuid_is_explicitly_unrecognized() {
        let c = Characteristic::from_uuid("0000ffff-0000-1000-8000-00805f9b34fb");
        assert_eq!(c, Characteristic::Unrecognized);
        assert_eq!(c.uuid(), None);
        assert_eq!(c.service_uuid(), None);
    }

    #[test]
    fn characteristics_resolve_their_hosting_service() {
        assert_eq!(
            Characteristic::ActivityData.service_uuid(),
            Some(protocol::SERVICE_ACTIVITY_UUID)
        );
        assert_eq!(
            Characteristic::Control.service_uuid(),
            Some(protocol::SERVICE_ACTIVITY_UUID)
        );
        assert_eq!(
            Characteristic::HeartRateMeasurement.service_uuid(),
            Some(protocol::SERVICE_HEART_RATE_UUID)
        );
        assert_eq!(
            Characteristic::BatteryLevel.service_uuid(),
            Some(protocol::SERVICE_BATTERY_UUID)
        );
        assert_eq!(
            Characteristic::FirmwareRevision.service_uuid(),
            Some(protocol::SERVICE_DEVICE_INFORMATION_UUID)
        );
    }
}
