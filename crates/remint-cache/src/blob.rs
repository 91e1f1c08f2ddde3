use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::util::atomic_write;
use crate::Result;

/// A content cache rooted at a fixed directory.
///
/// Thin convenience wrapper over [`write_cached`] / [`copy_cached`] for
/// callers that carry the cache directory around in an environment handle.
#[derive(Debug, Clone)]
pub struct ContentCache {
    dir: PathBuf,
}

impl ContentCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, target: &Path, content: &[u8]) -> Result<()> {
        write_cached(target, content, &self.dir)
    }

    pub fn copy_tree(
        &self,
        src_dir: &Path,
        dst_dir: &Path,
        rename_jar_resource: bool,
    ) -> Result<()> {
        copy_cached(src_dir, dst_dir, &self.dir, rename_jar_resource)
    }
}

/// Returns `"." + everything after the first dot` of a file name, or `""` if
/// the name has no dot. `archive.jar.resource` yields `.jar.resource`.
fn suffix_from(name: &str) -> String {
    match name.find('.') {
        Some(idx) => name[idx..].to_string(),
        None => String::new(),
    }
}

fn blob_path(cache_dir: &Path, hash: &str, target_name: &str) -> PathBuf {
    cache_dir
        .join(&hash[..2])
        .join(format!("{}{}", &hash[2..], suffix_from(target_name)))
}

/// Materializes `content` at `target` through the content cache.
///
/// The content is stored once under its SHA-256 and `target` becomes a hard
/// link to the blob. Re-running with identical content is a no-op apart from
/// re-linking the target. Concurrent writers of identical content race
/// benignly: the blob path is a pure function of the bytes, and the final
/// delete-then-link step is last-writer-wins over identical content.
pub fn write_cached(target: &Path, content: &[u8], cache_dir: &Path) -> Result<()> {
    let hash = format!("{:x}", Sha256::digest(content));
    let target_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let blob = blob_path(cache_dir, &hash, &target_name);

    if !blob.exists() {
        atomic_write(&blob, content)?;
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    if target.exists() {
        fs::remove_file(target)?;
    }
    fs::hard_link(&blob, target)?;
    Ok(())
}

/// Recursively copies `src_dir` into `dst_dir` through the content cache.
///
/// Directories are mirrored; every file goes through [`write_cached`]. When
/// `rename_jar_resource` is set, files named `*.jar.resource` are written to
/// a `*.jar` target instead, which is how extracted bundler jars shed their
/// resource suffix on the way out.
pub fn copy_cached(
    src_dir: &Path,
    dst_dir: &Path,
    cache_dir: &Path,
    rename_jar_resource: bool,
) -> Result<()> {
    for entry in walkdir::WalkDir::new(src_dir).follow_links(false) {
        let entry = entry.map_err(|err| {
            crate::CacheError::Io(err.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "walkdir error")
            }))
        })?;
        let rel = entry
            .path()
            .strip_prefix(src_dir)
            .expect("walkdir yields paths under its root");

        if entry.file_type().is_dir() {
            fs::create_dir_all(dst_dir.join(rel))?;
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let content = fs::read(entry.path())?;
        let mut target = dst_dir.join(rel);
        if rename_jar_resource {
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if let Some(stem) = name.strip_suffix(".jar.resource") {
                target.set_file_name(format!("{stem}.jar"));
            }
        }
        write_cached(&target, &content, cache_dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn suffixes() {
        assert_eq!(suffix_from("foo.jar"), ".jar");
        assert_eq!(suffix_from("foo.jar.resource"), ".jar.resource");
        assert_eq!(suffix_from("LICENSE"), "");
    }

    #[test]
    fn write_is_idempotent_and_links() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = tmp.path().join("cache");
        let a = tmp.path().join("out/a.txt");
        let b = tmp.path().join("out/b.txt");

        write_cached(&a, b"same content", &cache).unwrap();
        write_cached(&a, b"same content", &cache).unwrap();
        write_cached(&b, b"same content", &cache).unwrap();

        assert_eq!(fs::read(&a).unwrap(), b"same content");
        assert_eq!(fs::read(&b).unwrap(), b"same content");

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            assert_eq!(
                fs::metadata(&a).unwrap().ino(),
                fs::metadata(&b).unwrap().ino(),
                "identical content must share an inode"
            );
        }
    }

    #[test]
    fn write_replaces_existing_target() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = tmp.path().join("cache");
        let target = tmp.path().join("file.bin");

        fs::write(&target, b"old").unwrap();
        write_cached(&target, b"new", &cache).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn copy_tree_renames_jar_resources() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        let cache = tmp.path().join("cache");

        fs::create_dir_all(src.join("libs")).unwrap();
        fs::write(src.join("libs/dep.jar.resource"), b"jar bytes").unwrap();
        fs::write(src.join("data.json"), b"{}").unwrap();

        copy_cached(&src, &dst, &cache, true).unwrap();

        assert_eq!(fs::read(dst.join("libs/dep.jar")).unwrap(), b"jar bytes");
        assert!(!dst.join("libs/dep.jar.resource").exists());
        assert_eq!(fs::read(dst.join("data.json")).unwrap(), b"{}");
    }
}
