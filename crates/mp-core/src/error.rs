//! Typed error definitions for the market-pricing pipeline.
//!
//! Provides [`MpError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use thiserror::Error;

/// Domain-specific errors for the market-pricing pipeline.
#[derive(Debug, Error)]
pub enum MpError {
    /// Configuration parsing, validation, or component selection error.
    #[error("config error: {0}")]
    Config(String),

    /// Network failure or non-2xx response from a market data source.
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body did not match the expected schema.
    #[error("decode error: {0}")]
    Decode(String),

    /// Publisher could not accept or deliver a record.
    #[error("publish error: {0}")]
    Publish(String),

    /// Reader was run before it was fully wired, or its task failed.
    #[error("reader error: {0}")]
    Reader(String),
}
