//! The pipeline driver.
//!
//! Composes the leaf crates per game version: download coordination, mapping
//! parsing, whole-jar remapping and side-data emission, scheduled over a
//! fixed-degree thread pool with typed task categories and cooperative
//! cancellation. All shared state travels in an explicit [`PipelineEnv`].

mod env;
mod job;
mod logs;
mod scheduler;
mod task;

pub use env::{DataLayout, PipelineEnv};
pub use job::{fetch_artifact, load_mappings, remap_version, JobMappings, RemapJob, RemapSummary};
pub use logs::{FileLogSink, LogSink, MemoryLogSink};
pub use scheduler::{CategoryLimits, Scheduler, SchedulerConfig, TaskKind};
pub use task::TaskHandle;

use std::sync::Arc;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Jar(#[from] remint_jar::JarError),
    #[error(transparent)]
    Remap(#[from] remint_remap::RemapError),
    #[error(transparent)]
    Mapping(#[from] remint_mappings::MappingError),
    #[error(transparent)]
    Cache(#[from] remint_cache::CacheError),
    #[error(transparent)]
    Download(#[from] Arc<remint_net::DownloadError>),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("job cancelled")]
    Cancelled,
    #[error("worker task panicked")]
    Panicked,
}

impl PipelineError {
    /// Whether this failure came from cancellation rather than a real error.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            PipelineError::Cancelled
                | PipelineError::Remap(remint_remap::RemapError::Cancelled)
        )
    }
}
