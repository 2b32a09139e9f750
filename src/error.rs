//! Errors raised while setting up or configuring a [`crate::MockService`].
//! Failed assertions are not errors, see [`crate::Mismatch`].

use std::{io, net::SocketAddr};

/// Setup and configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The listening socket could not be created or bound.
    #[error("failed to bind mock service listener on {0}: {1}")]
    Bind(SocketAddr, #[source] io::Error),

    /// The OS did not tell us which port it picked.
    #[error("failed to get local address of mock service listener: {0}")]
    LocalAddress(#[source] io::Error),

    /// Status codes must be in `100..=999`, or `0` to reset.
    #[error("invalid response status code {0}")]
    InvalidStatus(u16),

    /// A structured response body could not be encoded as JSON.
    #[error("failed to serialize response body as JSON: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The listener stopped before the awaited event happened.
    #[error("mock service is closed")]
    Closed,
}
