//! # mp-runner
//!
//! Wires a reader, a market data source and a publisher into a
//! [`Coordinator`] and runs it. The `mp-runner` binary is a thin CLI around
//! [`build_pipeline`] and [`Coordinator::run`].

pub mod coordinator;

pub use coordinator::{Coordinator, PipelineSettings, PipelineStats};

use mp_core::config::AppConfig;
use mp_core::{PublisherKind, error::MpError};
use tracing::info;

/// Resolve component names from `config` and build the pipeline.
///
/// `dry_run` replaces the configured publisher with the console publisher.
/// Unknown component names fail here, before anything is started.
pub fn build_pipeline(config: &AppConfig, dry_run: bool) -> Result<Coordinator, MpError> {
    let reader_kind = config.reader_kind()?;
    let source_kind = config.source_kind()?;
    let publisher_kind = if dry_run {
        info!("dry run: publishing to the console");
        PublisherKind::Console
    } else {
        config.publisher_kind()?
    };

    let source = mp_md::registry::create_source(source_kind, config)?;
    let reader = mp_md::registry::create_reader(reader_kind, config);
    let publisher = mp_pub::registry::create_publisher(publisher_kind, config)?;

    Ok(Coordinator::new(reader, source, publisher, PipelineSettings::from_config(config)))
}
