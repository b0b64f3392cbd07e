use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::Digest as _;

use crate::foundation::error::{ScenecastError, ScenecastResult};

/// A source that has been made available on the local filesystem.
///
/// Downloaded copies are removed when the handle is dropped; local files are left alone.
#[derive(Debug)]
pub struct FetchedAsset {
    path: PathBuf,
    temporary: bool,
}

impl FetchedAsset {
    /// Wrap a file owned by someone else.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temporary: false,
        }
    }

    /// Wrap a file this handle owns and deletes on drop.
    pub fn temporary(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temporary: true,
        }
    }

    /// Local path of the asset.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` when the file is removed on drop.
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Move the file to `to`; on failure the handle is dropped and its file with it.
    fn rename_to(mut self, to: PathBuf) -> std::io::Result<Self> {
        std::fs::rename(&self.path, &to)?;
        self.path = to;
        Ok(self)
    }
}

impl Drop for FetchedAsset {
    fn drop(&mut self) {
        if self.temporary {
            match std::fs::remove_file(&self.path) {
                Ok(()) => tracing::debug!(path = %self.path.display(), "released temporary asset"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temporary asset")
                }
            }
        }
    }
}

/// Acquires element sources.
///
/// Implementations must be shareable across worker threads.
pub trait AssetFetcher: Send + Sync {
    /// Make `uri` available locally.
    fn fetch(&self, uri: &str) -> ScenecastResult<FetchedAsset>;
}

/// `true` for `http://` and `https://` URIs.
pub fn is_remote(uri: &str) -> bool {
    let lower = uri.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Resolves `file://` URIs and plain paths, optionally relative to a root directory.
#[derive(Clone, Debug, Default)]
pub struct LocalFetcher {
    root: Option<PathBuf>,
}

impl LocalFetcher {
    /// Fetcher that resolves relative paths against the process working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetcher that resolves relative paths against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, uri: &str) -> PathBuf {
        let raw = uri.strip_prefix("file://").unwrap_or(uri);
        let p = Path::new(raw);
        match &self.root {
            Some(root) if p.is_relative() => root.join(p),
            _ => p.to_path_buf(),
        }
    }
}

impl AssetFetcher for LocalFetcher {
    fn fetch(&self, uri: &str) -> ScenecastResult<FetchedAsset> {
        if is_remote(uri) {
            return Err(ScenecastError::fetch(format!(
                "remote source '{uri}' needs a downloading fetcher"
            )));
        }
        let path = self.resolve(uri);
        if !path.is_file() {
            return Err(ScenecastError::fetch(format!(
                "source '{}' does not exist",
                path.display()
            )));
        }
        Ok(FetchedAsset::local(path))
    }
}

/// Downloads remote sources with the `curl` binary into a work directory.
///
/// Every fetch gets its own file, even for a URI fetched before, so dropping one handle never
/// removes a file another element or job still uses.
#[derive(Clone, Debug)]
pub struct CurlFetcher {
    program: PathBuf,
    work_dir: PathBuf,
    timeout_secs: u64,
}

static DOWNLOAD_SEQ: AtomicU64 = AtomicU64::new(0);

impl CurlFetcher {
    /// Download into `work_dir` using `curl` from `PATH`.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("curl"),
            work_dir: work_dir.into(),
            timeout_secs: 120,
        }
    }

    /// Use a specific curl binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Per-download timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Local file name for the `n`th fetch: URI digest, process id and `n`, then the extension.
    pub fn download_name(uri: &str, n: u64) -> String {
        let digest = sha2::Sha256::digest(uri.as_bytes());
        let mut name = String::with_capacity(digest.len() * 2 + 32);
        for b in digest {
            name.push_str(&format!("{b:02x}"));
        }
        name.push_str(&format!("-{}-{n}", std::process::id()));
        if let Some(ext) = url_extension(uri) {
            name.push('.');
            name.push_str(&ext);
        }
        name
    }
}

fn url_extension(uri: &str) -> Option<String> {
    let path = uri.split(['?', '#']).next()?;
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

impl AssetFetcher for CurlFetcher {
    #[tracing::instrument(skip(self), fields(work_dir = %self.work_dir.display()))]
    fn fetch(&self, uri: &str) -> ScenecastResult<FetchedAsset> {
        std::fs::create_dir_all(&self.work_dir).map_err(|e| {
            ScenecastError::fetch(format!(
                "create work dir '{}': {e}",
                self.work_dir.display()
            ))
        })?;
        let name = Self::download_name(uri, DOWNLOAD_SEQ.fetch_add(1, Ordering::Relaxed));
        let dest = self.work_dir.join(&name);
        let partial = self.work_dir.join(format!("{name}.part"));
        let out = Command::new(&self.program)
            .args(["--fail", "--silent", "--show-error", "--location"])
            .arg("--max-time")
            .arg(self.timeout_secs.to_string())
            .arg("--output")
            .arg(&partial)
            .arg(uri)
            .output()
            .map_err(|e| ScenecastError::fetch(format!("failed to run curl: {e}")))?;
        // Owns only this fetch's partial file; removed on every early return.
        let partial = FetchedAsset::temporary(partial);
        if !out.status.success() {
            return Err(ScenecastError::fetch(format!(
                "download of '{uri}' failed ({}): {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        let asset = partial.rename_to(dest).map_err(|e| {
            ScenecastError::fetch(format!("finish download of '{uri}': {e}"))
        })?;
        tracing::debug!(path = %asset.path().display(), "downloaded asset");
        Ok(asset)
    }
}

/// Dispatches remote URIs to [`CurlFetcher`] and everything else to [`LocalFetcher`].
#[derive(Clone, Debug)]
pub struct DefaultFetcher {
    local: LocalFetcher,
    remote: CurlFetcher,
}

impl DefaultFetcher {
    /// Combine a local and a remote fetcher.
    pub fn new(local: LocalFetcher, remote: CurlFetcher) -> Self {
        Self { local, remote }
    }
}

impl AssetFetcher for DefaultFetcher {
    fn fetch(&self, uri: &str) -> ScenecastResult<FetchedAsset> {
        if is_remote(uri) {
            self.remote.fetch(uri)
        } else {
            self.local.fetch(uri)
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/fetch.rs"]
mod tests;
