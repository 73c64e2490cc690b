//! Dataset acquisition: download a Kaggle dataset archive, extract it into a cache
//! directory and move it under `<root>/data/<slug>`.
//!
//! A destination that already exists is returned as-is, without any network access.

mod archive;
mod kaggle;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

use crate::http_client::{self, FetchError};
use crate::project_dirs::{self, ProjectDirError};

pub use archive::ArchiveError;
pub use kaggle::{DatasetRef, KAGGLE_DOWNLOAD_BASE, KaggleCredentials};

/// Dataset fetched by `dynprice-download`.
pub const DEFAULT_DATASET: &str = "olistbr/brazilian-ecommerce";
const MAX_ARCHIVE_BYTES: usize = 2 * 1024 * 1024 * 1024;
const ARCHIVE_FILE_NAME: &str = "archive.zip";
const EXTRACTED_DIR_NAME: &str = "extracted";

/// Wraps any acquisition failure with the dataset it concerned.
#[derive(Debug, Error)]
#[error("Failed to process dataset '{dataset}'")]
pub struct DatasetDownloadError {
    pub dataset: String,
    #[source]
    pub cause: DownloadCause,
}

#[derive(Debug, Error)]
pub enum DownloadCause {
    #[error("Invalid dataset name: {0}")]
    InvalidName(String),
    #[error(transparent)]
    Http(#[from] FetchError),
    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadErrorKind {
    InvalidName,
    Http,
    Io,
    Archive,
}

impl DatasetDownloadError {
    fn new(dataset: &str, cause: impl Into<DownloadCause>) -> Self {
        Self {
            dataset: dataset.to_string(),
            cause: cause.into(),
        }
    }

    pub fn kind(&self) -> DownloadErrorKind {
        match self.cause {
            DownloadCause::InvalidName(_) => DownloadErrorKind::InvalidName,
            DownloadCause::Http(_) => DownloadErrorKind::Http,
            DownloadCause::Io { .. } => DownloadErrorKind::Io,
            DownloadCause::Archive(_) => DownloadErrorKind::Archive,
        }
    }
}

/// Where datasets come from and where they land.
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    /// Parent of the final `<slug>` directory.
    pub data_dir: PathBuf,
    /// Scratch space for archives and extraction.
    pub cache_dir: PathBuf,
    /// Download endpoint; must end with `/`.
    pub base_url: Url,
    pub credentials: Option<KaggleCredentials>,
}

#[derive(Debug, Error)]
pub enum AcquireSetupError {
    #[error(transparent)]
    Dirs(#[from] ProjectDirError),
    #[error("Invalid download base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
}

impl AcquireOptions {
    /// Project data directory, per-user cache, the public Kaggle endpoint and any
    /// credentials found in the environment or `~/.kaggle/kaggle.json`.
    pub fn discover() -> Result<Self, AcquireSetupError> {
        Ok(Self {
            data_dir: project_dirs::data_dir()?,
            cache_dir: project_dirs::download_cache_dir()?,
            base_url: Url::parse(KAGGLE_DOWNLOAD_BASE)?,
            credentials: KaggleCredentials::discover(),
        })
    }
}

/// Download `dataset_name` (`owner/slug`) and move it to `<data_dir>/<slug>`.
pub fn download_and_move_dataset(
    dataset_name: &str,
    options: &AcquireOptions,
) -> Result<PathBuf, DatasetDownloadError> {
    tracing::info!("Starting dataset download: {dataset_name}");
    let result = acquire(dataset_name, options);
    if let Err(err) = &result {
        tracing::error!(kind = ?err.kind(), "Dataset download/move failed: {err}: {}", err.cause);
    }
    result
}

fn acquire(dataset_name: &str, options: &AcquireOptions) -> Result<PathBuf, DatasetDownloadError> {
    let fail = |cause: DownloadCause| DatasetDownloadError::new(dataset_name, cause);
    let dataset = DatasetRef::parse(dataset_name)
        .map_err(|reason| fail(DownloadCause::InvalidName(reason)))?;
    let destination = options.data_dir.join(&dataset.slug);
    if destination.exists() {
        tracing::info!("Dataset already present at {}", destination.display());
        return Ok(destination);
    }

    let url = dataset
        .download_url(&options.base_url)
        .map_err(|err| fail(DownloadCause::InvalidName(err.to_string())))?;
    fs::create_dir_all(&options.cache_dir)
        .map_err(|source| fail(io_cause("create", &options.cache_dir, source)))?;
    let staging = tempfile::Builder::new()
        .prefix(&format!("{}-", dataset.slug))
        .tempdir_in(&options.cache_dir)
        .map_err(|source| fail(io_cause("create staging dir in", &options.cache_dir, source)))?;

    let archive_path = staging.path().join(ARCHIVE_FILE_NAME);
    download_archive(&url, options.credentials.as_ref(), &archive_path).map_err(&fail)?;
    tracing::info!("Dataset downloaded to {}", archive_path.display());

    let extracted = staging.path().join(EXTRACTED_DIR_NAME);
    let files = archive::unzip_to_dir(
        &archive_path,
        &extracted,
        archive::ExtractionLimits::standard(),
    )
    .map_err(|err| fail(err.into()))?;
    tracing::info!(files, "Archive extracted to {}", extracted.display());

    fs::create_dir_all(&options.data_dir)
        .map_err(|source| fail(io_cause("create", &options.data_dir, source)))?;
    if destination.exists() {
        tracing::info!("Dataset already present at {}", destination.display());
        return Ok(destination);
    }
    move_dir(&extracted, &destination)
        .map_err(|source| fail(io_cause("move dataset to", &destination, source)))?;
    tracing::info!("Dataset moved to {}", destination.display());
    Ok(destination)
}

fn download_archive(
    url: &Url,
    credentials: Option<&KaggleCredentials>,
    dest: &Path,
) -> Result<(), DownloadCause> {
    let file = File::create(dest).map_err(|source| io_cause("create", dest, source))?;
    let mut writer = BufWriter::new(file);
    let authorization = credentials.map(KaggleCredentials::authorization_header);
    http_client::download_to_writer(
        url.as_str(),
        authorization.as_deref(),
        &mut writer,
        MAX_ARCHIVE_BYTES,
    )?;
    writer
        .flush()
        .map_err(|source| io_cause("write", dest, source))?;
    Ok(())
}

fn io_cause(action: &'static str, path: &Path, source: std::io::Error) -> DownloadCause {
    DownloadCause::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// Rename when source and destination share a filesystem, otherwise copy then remove.
fn move_dir(src: &Path, dest: &Path) -> std::io::Result<()> {
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    copy_into_place(src, dest, copy_dir_all)?;
    fs::remove_dir_all(src)
}

/// Copy into a hidden sibling of `dest`, renaming it over only once `copy` succeeds.
/// A failed copy leaves no `dest` behind.
fn copy_into_place(
    src: &Path,
    dest: &Path,
    copy: impl FnOnce(&Path, &Path) -> std::io::Result<()>,
) -> std::io::Result<()> {
    let parent = dest.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", dest.display()),
        )
    })?;
    let partial = tempfile::Builder::new()
        .prefix(".partial-")
        .tempdir_in(parent)?;
    let staged = partial.path().join("dataset");
    copy(src, &staged)?;
    fs::rename(&staged, dest)
}

fn copy_dir_all(src: &Path, dest: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        let dest_path = dest.join(entry.file_name());
        if ty.is_dir() {
            copy_dir_all(&entry.path(), &dest_path)?;
        } else if ty.is_file() {
            fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use tempfile::tempdir;

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, body) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    /// Serve one response and hand the raw request head back to the test.
    fn serve_once(status: &str, body: Vec<u8>) -> (Url, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
                let header = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(&body);
            }
        });
        let base = Url::parse(&format!("http://{addr}/api/v1/datasets/download/")).unwrap();
        (base, rx)
    }

    fn options(root: &Path, base_url: Url) -> AcquireOptions {
        AcquireOptions {
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
            base_url,
            credentials: None,
        }
    }

    #[test]
    fn served_archive_is_extracted_and_moved() {
        let root = tempdir().unwrap();
        let csv = "order_id,price,freight_value\na,10.0,2.0\n";
        let (base, requests) = serve_once(
            "200 OK",
            zip_bytes(&[("olist_order_items_dataset.csv", csv)]),
        );
        let mut opts = options(root.path(), base);
        opts.credentials = Some(KaggleCredentials {
            username: "user".into(),
            key: "key".into(),
        });

        let path = download_and_move_dataset(DEFAULT_DATASET, &opts).unwrap();

        assert_eq!(path, root.path().join("data").join("brazilian-ecommerce"));
        assert_eq!(
            fs::read_to_string(path.join("olist_order_items_dataset.csv")).unwrap(),
            csv
        );
        let request = requests.recv().unwrap();
        assert!(
            request.starts_with("GET /api/v1/datasets/download/olistbr/brazilian-ecommerce ")
        );
        assert!(request.contains("Basic dXNlcjprZXk="));
        let leftovers = fs::read_dir(root.path().join("cache")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn existing_destination_skips_network() {
        let root = tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let base = Url::parse(&format!("http://{addr}/")).unwrap();
        let opts = options(root.path(), base);
        let existing = opts.data_dir.join("brazilian-ecommerce");
        fs::create_dir_all(&existing).unwrap();

        let path = download_and_move_dataset(DEFAULT_DATASET, &opts).unwrap();
        assert_eq!(path, existing);
    }

    #[test]
    fn not_found_is_an_http_error_and_leaves_no_destination() {
        let root = tempdir().unwrap();
        let body = b"{\"message\":\"Not Found\"}".to_vec();
        let (base, _requests) = serve_once("404 Not Found", body);
        let opts = options(root.path(), base);

        let err = download_and_move_dataset("someone/missing", &opts).unwrap_err();
        assert_eq!(err.kind(), DownloadErrorKind::Http);
        assert_eq!(err.dataset, "someone/missing");
        assert!(err.to_string().contains("someone/missing"));
        assert!(!opts.data_dir.join("missing").exists());
    }

    #[test]
    fn non_zip_payload_is_an_archive_error() {
        let root = tempdir().unwrap();
        let (base, _requests) = serve_once("200 OK", b"<html>sign in</html>".to_vec());
        let opts = options(root.path(), base);

        let err = download_and_move_dataset("owner/slug", &opts).unwrap_err();
        assert_eq!(err.kind(), DownloadErrorKind::Archive);
        assert!(!opts.data_dir.join("slug").exists());
    }

    #[test]
    fn malformed_name_is_rejected_before_any_io() {
        let root = tempdir().unwrap();
        let opts = options(root.path(), Url::parse(KAGGLE_DOWNLOAD_BASE).unwrap());
        let err = download_and_move_dataset("not-a-dataset", &opts).unwrap_err();
        assert_eq!(err.kind(), DownloadErrorKind::InvalidName);
        assert!(!opts.cache_dir.exists());
    }

    #[test]
    fn copy_fallback_moves_nested_trees() {
        let root = tempdir().unwrap();
        let src = root.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested").join("a.csv"), "x").unwrap();
        let data = root.path().join("data");
        fs::create_dir_all(&data).unwrap();
        let dest = data.join("slug");

        copy_into_place(&src, &dest, copy_dir_all).unwrap();

        assert_eq!(fs::read_to_string(dest.join("nested").join("a.csv")).unwrap(), "x");
        let entries: Vec<_> = fs::read_dir(&data).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn interrupted_copy_leaves_no_destination() {
        let root = tempdir().unwrap();
        let src = root.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("olist_order_items_dataset.csv"), "price\n1\n").unwrap();
        let data = root.path().join("data");
        fs::create_dir_all(&data).unwrap();
        let dest = data.join("slug");

        let err = copy_into_place(&src, &dest, |from, to| {
            fs::create_dir_all(to)?;
            fs::write(to.join("olist_order_items_dataset.csv"), "pri")?;
            Err(std::io::Error::other(format!("device full copying {}", from.display())))
        })
        .unwrap_err();

        assert!(err.to_string().contains("device full"));
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(&data).unwrap().count(), 0);
    }
}
