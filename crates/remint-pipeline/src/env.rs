//! The explicit environment handle.
//!
//! All shared pipeline state (thread pools, download registry, cache
//! directories, log sinks, the top-level cancellation token) lives in one
//! value passed into every operation. Nothing in the pipeline is a
//! module-level singleton.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use remint_cache::ContentCache;
use remint_net::Downloads;
use tokio_util::sync::CancellationToken;

use crate::logs::{FileLogSink, LogSink};
use crate::scheduler::{Scheduler, SchedulerConfig};

/// The per-run filesystem layout, rooted at a data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Obfuscated input jars, organized by provider/version.
    pub fn jars_dir(&self) -> PathBuf {
        self.root.join("jars")
    }

    /// Remapped outputs mirror the input layout under `jars/mapped`.
    pub fn mapped_jar(&self, provider: &str, relative: &Path) -> PathBuf {
        self.root.join("jars/mapped").join(provider).join(relative)
    }

    pub fn mappings_dir(&self, provider: &str, version: &str) -> PathBuf {
        self.root
            .join("cache/mappings")
            .join(provider)
            .join(version)
    }

    pub fn mappings_comments(&self, provider: &str, version: &str) -> PathBuf {
        self.mappings_dir(provider, version)
            .join("mappings-comments.json")
    }

    pub fn mappings_metadata(&self, provider: &str, version: &str) -> PathBuf {
        self.mappings_dir(provider, version)
            .join("mappings-metadata.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn content_cache_dir(&self) -> PathBuf {
        self.root.join("cache/content")
    }
}

/// Everything a pipeline operation needs, injected explicitly.
#[derive(Clone)]
pub struct PipelineEnv {
    pub scheduler: Scheduler,
    pub downloads: Downloads,
    pub cache: ContentCache,
    pub layout: DataLayout,
    pub logs: Arc<dyn LogSink>,
    pub cancel: CancellationToken,
}

impl PipelineEnv {
    /// An environment with the default scheduler and a file log sink under
    /// the layout's log directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let layout = DataLayout::new(root);
        Self::with_parts(
            Scheduler::new(SchedulerConfig::default()),
            layout.clone(),
            Arc::new(FileLogSink::new(layout.logs_dir())),
        )
    }

    pub fn with_parts(scheduler: Scheduler, layout: DataLayout, logs: Arc<dyn LogSink>) -> Self {
        let cache = ContentCache::new(layout.content_cache_dir());
        Self {
            scheduler,
            downloads: Downloads::new(),
            cache,
            layout,
            logs,
            cancel: CancellationToken::new(),
        }
    }

    /// A child token for one job; cancelling the environment cancels every
    /// child.
    pub fn job_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }
}
