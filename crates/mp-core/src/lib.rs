//! # mp-core
//!
//! Core crate for the market-pricing pipeline, providing:
//!
//! - **Types** (`types`): observations, data-channel messages, component selectors
//! - **Configuration** (`config`): JSON config deserialization + properties files
//! - **Error types** (`error`): domain-specific `MpError` via thiserror
//! - **Time utilities** (`time_util`): watermark and display timestamps
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
