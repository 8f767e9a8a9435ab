//! Error taxonomy for the tracker driver.
//!
//! No error here is fatal: each one is scoped to the single operation that
//! triggered it and leaves the session in its current state.

use crate::infrastructure::bluetooth::transport::TransportError;
use crate::infrastructure::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    /// Wrong-length or garbled inbound frame. Logged and dropped, no sample
    /// is produced from it.
    #[error("malformed payload: expected {expected} bytes, got {actual}")]
    MalformedPayload { expected: usize, actual: usize },

    /// BLE write/subscribe failure. Surfaced to the user, not retried.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Persistence layer could not be reached. The in-flight sample is
    /// discarded; engine state is unaffected.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid request rejected before any frame is written, e.g. a fourth
    /// alarm slot.
    #[error("configuration error: {0}")]
    Configuration(String),
}
