//! Crate-wide error type.
//!
//! The engine never swallows errors: every failure aborts the current build
//! and surfaces to the caller, which is responsible for any retry.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A node ID was requested that storage does not hold.
    #[error("node {0} not found in storage")]
    NodeNotFound(u32),

    /// A node name was requested that storage does not hold.
    #[error("no node named {0:?}")]
    NameNotFound(String),

    /// A bind-map key that seeding guarantees to exist was absent.
    /// This indicates an internal bug and is fatal to the build.
    #[error("no bitmap bound for key {0:?}")]
    MissingCacheKey(String),

    /// A decimal node key failed to parse back into an ID; the map is corrupt.
    #[error("invalid node key {key:?}")]
    KeyParse {
        key: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// `bind` was called with no keys.
    #[error("cannot bind an empty key group")]
    EmptyBindGroup,

    #[error("unknown direction {0:?} (expected \"children\" or \"parents\")")]
    UnknownDirection(String),

    /// Snapshot encode/decode failure.
    #[error("snapshot codec: {0}")]
    Snapshot(String),
}
