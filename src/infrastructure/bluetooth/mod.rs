//! Bluetooth Module
//!
//! Everything that faces the SN60 Plus over BLE.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     TrackerSession                       │
//! │  (Session controller - public API for the application)   │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!            ┌──────────┴──────────┐
//!            ▼                     ▼
//!    ┌──────────────┐      ┌──────────────┐
//!    │   Protocol   │      │  Transport   │
//!    │              │      │              │
//!    │ - UUIDs      │      │ - write      │
//!    │ - frame      │      │ - subscribe  │
//!    │   codec      │      │ - notify     │
//!    └──────────────┘      └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - wire-format codec: command frames, activity and
//!   heart-rate payloads
//! - [`transport`] - abstract BLE write/subscribe capability and the closed
//!   characteristic set
//! - [`session`] - session controller: initialization, inbound dispatch,
//!   realtime tick, one-shot commands

pub mod protocol;
pub mod session;
pub mod transport;

// Re-export the session controller for convenience
pub use session::TrackerSession;
