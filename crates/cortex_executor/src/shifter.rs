//! Installing the proxy of a privileged ("shifter") identity before a task
//! runs.

use crate::error::{ProxyInstallError, ProxyInstallResult};
use anyhow::Context;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Environment variable through which grid tools find the proxy to use
pub const PROXY_ENV_VAR: &str = "X509_USER_PROXY";

/// Where proxy material comes from
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProxySource: Send + Sync {
    /// The PEM encoded proxy of `identity`
    async fn fetch_proxy(&self, identity: &str) -> anyhow::Result<Vec<u8>>;
}

/// Puts the proxy of an identity at a given location
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProxyInstaller: Send + Sync {
    /// Install the proxy of `identity` at `location`, replacing whatever is
    /// there.
    async fn install(&self, identity: &str, location: &Path) -> ProxyInstallResult<()>;
}

/// Reads proxies from `<dir>/<identity>`
pub struct DirectoryProxySource {
    dir: PathBuf,
}

impl DirectoryProxySource {
    /// Constructor
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl ProxySource for DirectoryProxySource {
    async fn fetch_proxy(&self, identity: &str) -> anyhow::Result<Vec<u8>> {
        let path = self.dir.join(identity);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))
    }
}

/// Writes proxies to disk, readable by the owner only.
///
/// The file is written next to its final location and renamed into place,
/// so readers never see a partial proxy. Installs of the same identity
/// are serialized; different identities don't wait for each other.
pub struct FileProxyInstaller {
    source: Arc<dyn ProxySource>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileProxyInstaller {
    /// Constructor
    pub fn new(source: Arc<dyn ProxySource>) -> Self {
        Self {
            source,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, identity: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(identity.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait::async_trait]
impl ProxyInstaller for FileProxyInstaller {
    async fn install(&self, identity: &str, location: &Path) -> ProxyInstallResult<()> {
        let lock = self.lock_for(identity);
        let _guard = lock.lock().await;

        let material =
            self.source
                .fetch_proxy(identity)
                .await
                .map_err(|err| ProxyInstallError::Fetch {
                    identity: identity.to_string(),
                    message: format!("{err:#}"),
                })?;

        let io_err = |source| ProxyInstallError::Io {
            identity: identity.to_string(),
            path: location.to_path_buf(),
            source,
        };
        if let Some(parent) = location.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp = tmp_path(location);
        let published = match write_private(&tmp, &material).await {
            Ok(()) => tokio::fs::rename(&tmp, location).await,
            Err(err) => Err(err),
        };
        if let Err(err) = published {
            discard(&tmp).await;
            return Err(io_err(err));
        }
        tracing::debug!(%identity, location = %location.display(), "installed shifter proxy");
        Ok(())
    }
}

fn tmp_path(location: &Path) -> PathBuf {
    let mut tmp = location.as_os_str().to_owned();
    tmp.push(".tmp");
    tmp.into()
}

/// Write `contents` to a new owner-only file. A leftover file at `path` is
/// removed first so its permissions are never reused.
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => return Err(err),
        _ => (),
    }
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), ?err, "cannot remove partial proxy");
        }
        _ => (),
    }
}
