//! Content-addressed file cache.
//!
//! Resource outputs are stored once per content under
//! `cache_dir/<sha256[0..2]>/<sha256[2..]><suffix>` and materialized at their
//! target paths as hard links, so identical resources across game versions
//! share a single inode.

mod blob;
mod util;

pub use blob::{copy_cached, write_cached, ContentCache};
pub use util::atomic_write;

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache path has no file name: {0}")]
    NoFileName(PathBuf),
}
