//! Driver core for the SN60 Plus BLE fitness tracker.
//!
//! Decodes the tracker's proprietary binary notifications, reconciles its
//! cumulative activity counters against already-persisted history so that
//! repeated polls never double count, and produces a per-tick differential
//! stream for live display.
//!
//! The BLE stack and the sample database stay outside this crate: plug in a
//! [`BleTransport`](infrastructure::bluetooth::transport::BleTransport) and a
//! [`SampleStore`](infrastructure::store::SampleStore), then drive a
//! [`TrackerSession`].
//!
//! ## Modules
//!
//! - [`domain`] - data model, reconciliation and realtime differencing
//!   engines, persisted settings
//! - [`infrastructure`] - wire protocol, session controller, collaborator
//!   traits, logging setup

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::models::{
    ActivityCounters, ActivitySample, AlarmSpec, ConnectionState, SampleKind, SessionEvent,
};
pub use domain::realtime::RealtimeSamples;
pub use domain::reconcile::Reconciler;
pub use domain::settings::{Settings, SettingsService};
pub use error::DeviceError;
pub use infrastructure::bluetooth::transport::{BleTransport, Characteristic, TransportError};
pub use infrastructure::bluetooth::TrackerSession;
pub use infrastructure::store::{SampleStore, StoreError};
