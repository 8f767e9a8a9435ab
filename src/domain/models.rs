use serde::{Deserialize, Serialize};

/// Cumulative activity counters as reported by the device.
///
/// The tracker only ever reports a running total since its last internal
/// reset (typically daily, but the reset point is not observable). A decoded
/// snapshot is immutable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounters {
    pub steps: u32,
    pub meters: u32,
    pub calories: u32,
}

impl ActivityCounters {
    pub fn new(steps: u32, meters: u32, calories: u32) -> Self {
        Self {
            steps,
            meters,
            calories,
        }
    }

    /// Element-wise difference, clamped at zero per field. Rounding differs
    /// by metric on the device, so meters/calories can lag even when steps
    /// advanced.
    pub fn saturating_sub(&self, other: &ActivityCounters) -> ActivityCounters {
        ActivityCounters {
            steps: self.steps.saturating_sub(other.steps),
            meters: self.meters.saturating_sub(other.meters),
            calories: self.calories.saturating_sub(other.calories),
        }
    }
}

/// Raw activity kind codes used by the sample store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    Activity,
    DeepSleep,
    LightSleep,
    Unknown,
}

impl SampleKind {
    pub fn raw_kind(&self) -> i32 {
        match self {
            SampleKind::Activity => 1,
            SampleKind::DeepSleep => 4,
            SampleKind::LightSleep => 5,
            SampleKind::Unknown => -1,
        }
    }
}

/// A persisted incremental activity record.
///
/// A sample holds only the uncounted remainder at its timestamp, never a
/// restatement of prior totals: summed over a day window, samples
/// approximate the device's last-seen cumulative counters for that window.
/// Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySample {
    pub device_id: String,
    pub user_id: String,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    pub steps: u32,
    pub distance_meters: u32,
    pub calories_burnt: u32,
    /// None when the tick carried no heart-rate reading.
    pub heart_rate: Option<u16>,
    pub kind: SampleKind,
}

/// Session controller lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Initializing,
    Initialized,
    BusyFetching,
}

/// Firmware/hardware revision strings delivered by the device-info profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfo {
    pub firmware: Option<String>,
    pub hardware: Option<String>,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Per-tick differential sample for live UI display.
    RealtimeSample(ActivitySample),
    /// A reconciled sample was appended to the store.
    SampleRecorded(ActivitySample),
    ConnectionState(ConnectionState),
    BatteryLevel(u8),
    Version(VersionInfo),
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// One alarm slot request. The device supports three slots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AlarmSpec {
    /// Zero-based slot index, must be in [0, 2].
    pub position: u8,
    pub enabled: bool,
    pub hour: u8,
    pub minute: u8,
    /// Weekday repetition bitmask, see [`crate::infrastructure::bluetooth::protocol::repeat`].
    pub repetition: u8,
}
