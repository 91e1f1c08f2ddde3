use std::io::Read;
use std::path::Path;

/// Smallest possible zip archive: the end-of-central-directory record alone.
pub const MIN_JAR_SIZE: u64 = 22;

/// Whether `path` is a plausible, readable jar.
///
/// Checks the size floor and then opens every entry's compressed stream; a
/// truncated or corrupted archive fails somewhere in that sweep. Failures
/// are logged and reported as `false`, which callers treat as "file not
/// present".
pub fn is_jar_good(path: &Path, min_size: u64) -> bool {
    match try_probe(path, min_size) {
        Ok(good) => good,
        Err(err) => {
            tracing::debug!(
                target = "remint.net",
                path = %path.display(),
                error = %err,
                "jar integrity check failed"
            );
            false
        }
    }
}

fn try_probe(path: &Path, min_size: u64) -> std::io::Result<bool> {
    let file = std::fs::File::open(path)?;
    if file.metadata()?.len() < min_size {
        return Ok(false);
    }

    let mut archive = match zip::ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(err) => return Err(std::io::Error::other(err)),
    };

    let mut sink = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(std::io::Error::other)?;
        sink.clear();
        entry.read_to_end(&mut sink)?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn accepts_valid_jar() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ok.jar");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("a/B.class", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"\xCA\xFE\xBA\xBE").unwrap();
        zip.finish().unwrap();

        assert!(is_jar_good(&path, MIN_JAR_SIZE));
    }

    #[test]
    fn rejects_garbage_and_truncation() {
        let tmp = tempfile::tempdir().unwrap();

        let garbage = tmp.path().join("garbage.jar");
        std::fs::write(&garbage, vec![0u8; 256]).unwrap();
        assert!(!is_jar_good(&garbage, MIN_JAR_SIZE));

        let tiny = tmp.path().join("tiny.jar");
        std::fs::write(&tiny, b"PK").unwrap();
        assert!(!is_jar_good(&tiny, MIN_JAR_SIZE));

        let missing = tmp.path().join("missing.jar");
        assert!(!is_jar_good(&missing, MIN_JAR_SIZE));
    }

    #[test]
    fn rejects_below_requested_minimum() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("small.jar");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("x", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.finish().unwrap();

        assert!(!is_jar_good(&path, 1024 * 1024));
    }
}
