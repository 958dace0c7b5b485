use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL resolved but the origin answered with a non-success status.
    #[error("request for {url} failed with status {status} {reason}")]
    Status {
        url: String,
        status: u16,
        reason: String,
    },

    #[error("request for {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("invalid url {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
}

/// Byte source for session assets (engine asset probe, run-state files).
///
/// Paths are origin-relative (`/images/boot-state.bin`); each transport
/// resolves them against its own origin. Errors distinguish a non-success
/// status from a transport failure so callers can log the status text.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Existence probe for `path`. `Ok(())` means reachable.
    async fn head(&self, path: &str) -> Result<(), FetchError>;

    /// Fetch the full body at `path`.
    async fn get(&self, path: &str) -> Result<Vec<u8>, FetchError>;
}

/// HTTP origin backed by reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    origin: Url,
}

impl HttpTransport {
    /// `origin` is the base the root-relative asset paths resolve against,
    /// e.g. `http://127.0.0.1:8080/`.
    pub fn new(origin: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            origin,
        }
    }

    fn resolve(&self, path: &str) -> Result<Url, FetchError> {
        self.origin.join(path).map_err(|err| FetchError::InvalidUrl {
            url: path.to_string(),
            message: err.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn head(&self, path: &str) -> Result<(), FetchError> {
        let url = self.resolve(path)?;
        let resp = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|err| transport_error(&url, err))?;
        check_status(&url, resp.status())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.resolve(path)?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| transport_error(&url, err))?;
        check_status(&url, resp.status())?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| transport_error(&url, err))?;
        Ok(bytes.to_vec())
    }
}

fn transport_error(url: &Url, err: reqwest::Error) -> FetchError {
    FetchError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn check_status(url: &Url, status: reqwest::StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }
    Err(FetchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("").to_string(),
    })
}

/// Local-directory origin. Root-relative paths map to files under `root`;
/// a missing file reports status 404 so callers see the same error shape
/// as over HTTP.
pub struct FsTransport {
    root: PathBuf,
}

impl FsTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FetchError> {
        let rel = Path::new(path.trim_start_matches('/'));
        if rel
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(FetchError::InvalidUrl {
                url: path.to_string(),
                message: "parent traversal not allowed".to_string(),
            });
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait::async_trait]
impl Transport for FsTransport {
    async fn head(&self, path: &str) -> Result<(), FetchError> {
        let file = self.resolve(path)?;
        let meta = tokio::fs::metadata(&file)
            .await
            .map_err(|err| io_error(&file, err))?;
        if !meta.is_file() {
            return Err(not_found(&file));
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let file = self.resolve(path)?;
        tokio::fs::read(&file)
            .await
            .map_err(|err| io_error(&file, err))
    }
}

fn io_error(path: &Path, err: std::io::Error) -> FetchError {
    if err.kind() == ErrorKind::NotFound {
        not_found(path)
    } else {
        FetchError::Transport {
            url: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

fn not_found(path: &Path) -> FetchError {
    FetchError::Status {
        url: path.display().to_string(),
        status: 404,
        reason: "Not Found".to_string(),
    }
}
