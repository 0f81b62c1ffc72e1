//! Error types for the synchronizer.
//!
//! Every failed pass is reported through [`SyncError`]. None of them are fatal:
//! the synchronizer stays usable for the next trigger, and its phase only moves
//! on a snapshot that was decoded, validated and applied.

use thiserror::Error;

/// A snapshot that failed to decode or failed required-field validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The body was not valid JSON for the snapshot schema.
    #[error("malformed snapshot json: {0}")]
    Json(String),

    /// A list that this kind of snapshot must carry was absent.
    #[error("snapshot is missing required field `{0}`")]
    MissingField(&'static str),

    /// Width or height was zero or negative.
    #[error("invalid grid dimensions {width}x{height}")]
    InvalidDimensions {
        /// Reported width.
        width: i32,
        /// Reported height.
        height: i32,
    },

    /// A cell reference fell outside the grid.
    #[error("{category} cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        /// Category the offending entry belongs to.
        category: &'static str,
        /// Grid x.
        x: i32,
        /// Grid y.
        y: i32,
        /// Grid width.
        width: i32,
        /// Grid height.
        height: i32,
    },
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err.to_string())
    }
}

/// Registry invariant breach. Signals a bug, not bad input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A handle was inserted under a key that already owns one.
    #[error("key {0} already owns a visual")]
    KeyOccupied(String),
}

/// Errors surfaced by a synchronization pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Network or HTTP failure while fetching a snapshot.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The snapshot was rejected before any state was touched.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Reconciliation broke a registry invariant.
    #[error("reconciliation failed: {0}")]
    Reconciliation(#[from] RegistryError),

    /// A step snapshot arrived before the world was loaded.
    #[error("world has not been loaded yet")]
    NotLoaded,

    /// The simulation already reported its terminal snapshot.
    #[error("simulation already finished")]
    Finished,

    /// The visual host has nowhere to put visuals yet.
    #[error("visual host is not attached to a scene")]
    HostDetached,

    /// Configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for synchronizer operations.
pub type SyncResult<T> = Result<T, SyncError>;
