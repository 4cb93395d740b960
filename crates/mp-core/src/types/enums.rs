//! Enumerations used throughout the market-pricing pipeline.
//!
//! Component selectors ([`ReaderKind`], [`SourceKind`], [`PublisherKind`]) are
//! resolved once from their configuration strings at startup. Unknown names
//! produce an [`MpError::Config`] listing the valid options.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MpError;

/// Look up `name` among `options` by their config string, or build the
/// "options are" error.
fn resolve<T: Copy>(what: &str, name: &str, options: &[T], as_str: fn(T) -> &'static str) -> Result<T, MpError> {
    options.iter().copied().find(|o| as_str(*o) == name).ok_or_else(|| {
        let list: Vec<&str> = options.iter().map(|o| as_str(*o)).collect();
        MpError::Config(format!("specified {what} ({name}) does not exist. Options are: {}", list.join(" ")))
    })
}

// ---------------------------------------------------------------------------
// Component selectors
// ---------------------------------------------------------------------------

/// Which reader drives the market data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderKind {
    /// Poll on a fixed interval until stopped.
    TimeReader,
    /// One pass over the currency list, then done.
    OneShot,
}

impl ReaderKind {
    pub const ALL: &'static [Self] = &[Self::TimeReader, Self::OneShot];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TimeReader => "time-reader",
            Self::OneShot => "one-shot",
        }
    }
}

impl FromStr for ReaderKind {
    type Err = MpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve("reader", s, Self::ALL, Self::as_str)
    }
}

/// Which market data source is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Random-walk simulator, no network.
    Simulator,
    /// ECB statistical data web service.
    Ecb,
}

impl SourceKind {
    pub const ALL: &'static [Self] = &[Self::Simulator, Self::Ecb];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simulator => "simulator",
            Self::Ecb => "ecb",
        }
    }
}

impl FromStr for SourceKind {
    type Err = MpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve("market data source", s, Self::ALL, Self::as_str)
    }
}

/// Where normalized records are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublisherKind {
    Console,
    Kafka,
}

impl PublisherKind {
    pub const ALL: &'static [Self] = &[Self::Console, Self::Kafka];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Console => "console-publisher",
            Self::Kafka => "kafka-publisher",
        }
    }
}

impl FromStr for PublisherKind {
    type Err = MpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve("market publisher", s, Self::ALL, Self::as_str)
    }
}

impl std::fmt::Display for ReaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for PublisherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Reader policies
// ---------------------------------------------------------------------------

/// How the `since` watermark moves between timer ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SincePolicy {
    /// Every tick re-requests from the configured `since` value.
    #[default]
    Fixed,
    /// After a tick with no failures, `since` becomes the current time.
    Advance,
}

/// What a reader does when a fetch or decode fails for one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorPolicy {
    /// Report the failure and continue with the next currency.
    #[default]
    Skip,
    /// Report the failure and terminate the reader.
    Halt,
}

// ---------------------------------------------------------------------------
// Reader lifecycle
// ---------------------------------------------------------------------------

/// Reader state machine: `Idle → Initialised → Running → Draining → Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReaderState {
    #[default]
    Idle,
    Initialised,
    Running,
    Draining,
    Terminated,
}
