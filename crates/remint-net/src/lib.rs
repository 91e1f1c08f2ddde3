//! Download coordination.
//!
//! A process-scoped [`Downloads`] registry serializes concurrent requests
//! for the same `(url, destination)` pair: the first caller's future is
//! shared with every later caller, so the body executes at most once.
//! Network bodies stream through a fixed-size buffer into a `.tmp` sibling
//! and are renamed into place on success; transient read failures retry.

mod integrity;

pub use integrity::{is_jar_good, MIN_JAR_SIZE};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use url::Url;

pub type Result<T> = std::result::Result<T, DownloadError>;

/// What awaiting a coordinated download yields. The error is shared because
/// every caller of the same key observes the same completion.
pub type SharedResult = std::result::Result<(), Arc<DownloadError>>;

pub type DownloadFuture = Shared<BoxFuture<'static, SharedResult>>;

/// Invoked per buffer read with `(content_length, bytes_so_far)`; content
/// length is `-1` when the server does not announce one.
pub type ProgressSink = Arc<dyn Fn(i64, u64) + Send + Sync>;

const RETRY_ATTEMPTS: u32 = 5;
const RETRY_PAUSE: Duration = Duration::from_millis(500);
const BUFFER_SIZE: usize = 8 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unsupported download url: {0}")]
    UnsupportedUrl(String),
    #[error("download cancelled")]
    Cancelled,
    #[error("download of {url} failed after {attempts} attempts")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Box<DownloadError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DownloadKey {
    url: Url,
    dest: PathBuf,
}

/// The at-most-once download registry. Cheap to clone; all clones share the
/// same map.
#[derive(Clone, Default)]
pub struct Downloads {
    pending: Arc<Mutex<HashMap<DownloadKey, DownloadFuture>>>,
}

impl Downloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the future that completes when `dest` is a valid file for
    /// `url`. Every caller passing the same `(url, dest)` receives the same
    /// future; the body executes at most once. A completed future (failed or
    /// not) stays registered and is handed back as-is.
    pub fn download(
        &self,
        url: Url,
        dest: PathBuf,
        progress: Option<ProgressSink>,
        cancel: CancellationToken,
    ) -> DownloadFuture {
        let key = DownloadKey {
            url: url.clone(),
            dest: dest.clone(),
        };

        let mut pending = self.pending.lock().expect("download map lock");
        if let Some(existing) = pending.get(&key) {
            return existing.clone();
        }

        let future = async move {
            let body = download_body(url, dest, progress, cancel.clone());
            tokio::select! {
                result = body => result.map_err(Arc::new),
                _ = cancel.cancelled() => Err(Arc::new(DownloadError::Cancelled)),
            }
        }
        .boxed()
        .shared();

        pending.insert(key, future.clone());
        future
    }
}

async fn download_body(
    url: Url,
    dest: PathBuf,
    progress: Option<ProgressSink>,
    cancel: CancellationToken,
) -> Result<()> {
    if dest_is_valid(&dest).await? {
        return Ok(());
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if url.scheme() == "file" {
        let src = url
            .to_file_path()
            .map_err(|()| DownloadError::UnsupportedUrl(url.to_string()))?;
        tokio::fs::copy(&src, &dest).await?;
        return Ok(());
    }

    if !matches!(url.scheme(), "http" | "https") {
        return Err(DownloadError::UnsupportedUrl(url.to_string()));
    }

    let mut last_error: Option<DownloadError> = None;
    for attempt in 1..=RETRY_ATTEMPTS {
        match fetch_to_tmp(&url, &dest, progress.as_ref(), &cancel).await {
            Ok(()) => return Ok(()),
            Err(DownloadError::Cancelled) => return Err(DownloadError::Cancelled),
            Err(err) => {
                tracing::debug!(
                    target = "remint.net",
                    url = %url,
                    attempt,
                    error = %err,
                    "download attempt failed"
                );
                last_error = Some(err);
                if attempt < RETRY_ATTEMPTS {
                    tokio::time::sleep(RETRY_PAUSE).await;
                }
            }
        }
    }

    Err(DownloadError::Exhausted {
        url: url.to_string(),
        attempts: RETRY_ATTEMPTS,
        source: Box::new(last_error.expect("at least one attempt ran")),
    })
}

/// The fast path: an existing destination counts unless it claims to be a
/// jar and fails the integrity probe, which is treated as "file not
/// present" and triggers a re-download.
async fn dest_is_valid(dest: &Path) -> Result<bool> {
    match tokio::fs::metadata(dest).await {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err.into()),
        Ok(_) => {}
    }

    let is_jar = dest
        .file_name()
        .map(|n| n.to_string_lossy().ends_with(".jar"))
        .unwrap_or(false);
    if !is_jar {
        return Ok(true);
    }

    let dest = dest.to_path_buf();
    let good = tokio::task::spawn_blocking(move || is_jar_good(&dest, MIN_JAR_SIZE))
        .await
        .map_err(|err| DownloadError::Io(std::io::Error::other(err)))?;
    Ok(good)
}

async fn fetch_to_tmp(
    url: &Url,
    dest: &Path,
    progress: Option<&ProgressSink>,
    cancel: &CancellationToken,
) -> Result<()> {
    use futures::TryStreamExt;

    let response = reqwest::get(url.clone()).await?.error_for_status()?;
    let content_length = response
        .content_length()
        .map(|len| len as i64)
        .unwrap_or(-1);

    let mut tmp_path = dest.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);

    let stream = response
        .bytes_stream()
        .map_err(std::io::Error::other);
    let mut reader = tokio_util::io::StreamReader::new(stream);
    let mut file = tokio::fs::File::create(&tmp_path).await?;

    let mut buffer = [0u8; BUFFER_SIZE];
    let mut written: u64 = 0;
    let result = loop {
        if cancel.is_cancelled() {
            break Err(DownloadError::Cancelled);
        }
        let read = match reader.read(&mut buffer).await {
            Ok(read) => read,
            Err(err) => break Err(err.into()),
        };
        if read == 0 {
            break Ok(());
        }
        if let Err(err) = file.write_all(&buffer[..read]).await {
            break Err(err.into());
        }
        written += read as u64;
        if let Some(progress) = progress {
            progress(content_length, written);
        }
    };

    match result {
        Ok(()) => {
            file.flush().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, dest).await?;
            Ok(())
        }
        Err(err) => {
            // The stream is closed by dropping it; the target path is never
            // finalized on failure.
            drop(file);
            let _ = tokio::fs::remove_file(&tmp_path).await;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, content) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn same_key_shares_one_future() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src.bin");
        std::fs::write(&src, b"payload").unwrap();
        let url = Url::from_file_path(&src).unwrap();
        let dest = tmp.path().join("dest.bin");

        let downloads = Downloads::new();
        let token = CancellationToken::new();
        let first = downloads.download(url.clone(), dest.clone(), None, token.clone());
        let second = downloads.download(url.clone(), dest.clone(), None, token.clone());
        assert!(Shared::ptr_eq(&first, &second));

        let other = downloads.download(url, tmp.path().join("elsewhere.bin"), None, token);
        assert!(!Shared::ptr_eq(&first, &other));

        let (a, b) = tokio::join!(first, second);
        a.unwrap();
        b.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn existing_destination_completes_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("data.txt");
        std::fs::write(&dest, b"already here").unwrap();

        let url = Url::parse("https://invalid.example/never-fetched").unwrap();
        let downloads = Downloads::new();
        downloads
            .download(url, dest.clone(), None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn corrupt_jar_destination_is_refetched() {
        let server = httpmock::MockServer::start();
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("lib.jar");

        // A jar destination that fails the integrity probe is treated as
        // absent.
        std::fs::write(&dest, b"not a zip at all, but long enough to pass size").unwrap();

        let good_jar = tmp.path().join("good.jar");
        write_zip(&good_jar, &[("entry.txt", b"ok")]);
        let jar_bytes = std::fs::read(&good_jar).unwrap();

        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/lib.jar");
            then.status(200).body(jar_bytes.clone());
        });

        let url = Url::parse(&server.url("/lib.jar")).unwrap();
        Downloads::new()
            .download(url, dest.clone(), None, CancellationToken::new())
            .await
            .unwrap();

        mock.assert();
        assert_eq!(std::fs::read(&dest).unwrap(), jar_bytes);
        assert!(!dest.with_file_name("lib.jar.tmp").exists());
    }

    #[tokio::test]
    async fn reports_progress_per_read() {
        let server = httpmock::MockServer::start();
        let body = vec![0xAB_u8; 64 * 1024];
        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/blob");
            then.status(200).body(body.clone());
        });

        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("blob.bin");
        let seen = Arc::new(AtomicU64::new(0));
        let seen_in_sink = Arc::clone(&seen);
        let sink: ProgressSink = Arc::new(move |total, done| {
            assert_eq!(total, 64 * 1024);
            seen_in_sink.store(done, Ordering::SeqCst);
        });

        let url = Url::parse(&server.url("/blob")).unwrap();
        Downloads::new()
            .download(url, dest.clone(), Some(sink), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 64 * 1024);
        assert_eq!(std::fs::read(&dest).unwrap().len(), 64 * 1024);
    }

    #[tokio::test]
    async fn retries_five_times_then_fails() {
        let server = httpmock::MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/flaky");
            then.status(503);
        });

        let tmp = tempfile::tempdir().unwrap();
        let url = Url::parse(&server.url("/flaky")).unwrap();
        let err = Downloads::new()
            .download(
                url,
                tmp.path().join("flaky.bin"),
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        mock.assert_hits(5);
        match &*err {
            DownloadError::Exhausted { attempts, .. } => assert_eq!(*attempts, 5),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_download_fails_without_finalizing() {
        let tmp = tempfile::tempdir().unwrap();
        let url = Url::parse("https://invalid.example/slow").unwrap();
        let dest = tmp.path().join("slow.bin");

        let token = CancellationToken::new();
        token.cancel();
        let err = Downloads::new()
            .download(url, dest.clone(), None, token)
            .await
            .unwrap_err();
        assert!(matches!(&*err, DownloadError::Cancelled));
        assert!(!dest.exists());
    }
}
