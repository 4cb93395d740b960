//! # mp-pub
//!
//! Publishing side of the pricing pipeline.
//!
//! Each sink implements the [`Publisher`] trait. The lifecycle is:
//! `initialise()` → `publish()` per record → `cleanup()`.
//!
//! ## Publishers
//!
//! | Name                | Module    | Sink                         |
//! |---------------------|-----------|------------------------------|
//! | `console-publisher` | `console` | stdout (or any `io::Write`)  |
//! | `kafka-publisher`   | `kafka`   | Kafka topic (feature `kafka`) |

pub mod console;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod registry;

use async_trait::async_trait;
use mp_core::error::MpError;

/// Trait implemented by all publishers.
///
/// # Lifecycle
///
/// 1. Construct via [`registry::create_publisher`] or the publisher's `new`.
/// 2. Call [`initialise`](Publisher::initialise) to acquire connections.
/// 3. Call [`publish`](Publisher::publish) once per record, from a single task.
/// 4. Call [`cleanup`](Publisher::cleanup) before exit, even after an error.
#[async_trait]
pub trait Publisher: Send {
    /// Human-readable publisher name.
    fn name(&self) -> &str;

    /// Acquire any connection or resource the sink needs.
    async fn initialise(&mut self) -> Result<(), MpError>;

    /// Deliver one record. Safe to call repeatedly.
    async fn publish(&mut self, key: &str, payload: &str) -> Result<(), MpError>;

    /// Flush and release resources.
    async fn cleanup(&mut self) -> Result<(), MpError>;
}
