//! Console publisher: prints each record as a `Key:`/`Data:` block.

use std::io::{self, Write};

use async_trait::async_trait;
use mp_core::error::MpError;
use tracing::debug;

use crate::Publisher;

/// Writes records to stdout, or to any writer for testing.
pub struct ConsolePublisher<W: Write + Send = io::Stdout> {
    out: W,
}

impl ConsolePublisher {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for ConsolePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> ConsolePublisher<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[async_trait]
impl<W: Write + Send> Publisher for ConsolePublisher<W> {
    fn name(&self) -> &str {
        "console-publisher"
    }

    async fn initialise(&mut self) -> Result<(), MpError> {
        debug!("[console-publisher] ready");
        Ok(())
    }

    async fn publish(&mut self, key: &str, payload: &str) -> Result<(), MpError> {
        writeln!(self.out, "Key: {key}\nData: {payload}")
            .map_err(|e| MpError::Publish(format!("console write failed: {e}")))
    }

    async fn cleanup(&mut self) -> Result<(), MpError> {
        self.out.flush().map_err(|e| MpError::Publish(format!("console flush failed: {e}")))
    }
}
