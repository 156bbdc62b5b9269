//! File-system key-value backend.
//!
//! Each key maps to a file below the root directory. A record file starts
//! with its decimal version on the first line, followed by the raw value.
//! `put_if` takes a sibling `.lock` file with `create_new` around the
//! read-compare-write so separate processes on one host serialize, and
//! writes go through a temporary file and a rename.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use gantry_ports::{KvBackend, PortsError, Record};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::memory::check_expected;

const LOCK_SUFFIX: &str = ".lock";
const TMP_SUFFIX: &str = ".tmp";
const LOCK_RETRY: Duration = Duration::from_millis(10);
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
/// Locks older than this were left by a dead process.
const STALE_LOCK: Duration = Duration::from_secs(30);

/// A [`KvBackend`] storing one file per key.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Use `root` as the state directory, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, PortsError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        tracing::debug!(root = %root.display(), "opened file backend");
        Ok(Self { root })
    }

    /// The state directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PortsError> {
        let relative = Path::new(key.trim_start_matches('/'));
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
            && !key.ends_with(LOCK_SUFFIX)
            && !key.ends_with(TMP_SUFFIX);
        if !valid {
            return Err(PortsError::Unsupported(format!("invalid key `{key}`")));
        }
        Ok(self.root.join(relative))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(format!("/{}", parts.join("/")))
    }
}

async fn read_record(path: &Path) -> Result<Option<Record>, PortsError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| PortsError::Serialization(format!("{}: missing header", path.display())))?;
    let version = std::str::from_utf8(&bytes[..newline])
        .ok()
        .and_then(|header| header.trim().parse::<u64>().ok())
        .ok_or_else(|| PortsError::Serialization(format!("{}: bad version header", path.display())))?;
    Ok(Some(Record::new(version, bytes[newline + 1..].to_vec())))
}

async fn write_record(path: &Path, record: &Record) -> Result<(), PortsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = suffixed(path, TMP_SUFFIX);
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(format!("{}\n", record.version).as_bytes())
        .await?;
    file.write_all(&record.value).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&tmp, path).await?;
    Ok(())
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Exclusive lock file; removed on release.
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    async fn acquire(target: &Path) -> Result<Self, PortsError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        let path = suffixed(target, LOCK_SUFFIX);
        let deadline = tokio::time::Instant::now() + LOCK_TIMEOUT;
        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => return Ok(Self { path }),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path).await {
                        tracing::warn!(lock = %path.display(), "removing stale lock file");
                        let _ = fs::remove_file(&path).await;
                        continue;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(PortsError::timeout(
                            format!("lock {}", path.display()),
                            LOCK_TIMEOUT,
                        ));
                    }
                    tokio::time::sleep(LOCK_RETRY).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn release(self) {
        if let Err(err) = fs::remove_file(&self.path).await {
            tracing::warn!(lock = %self.path.display(), error = %err, "failed to remove lock file");
        }
    }
}

async fn is_stale(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path).await else {
        return false;
    };
    meta.modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK)
}

#[async_trait]
impl KvBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<Record>, PortsError> {
        read_record(&self.path_for(key)?).await
    }

    async fn put_if(
        &self,
        key: &str,
        expected: Option<u64>,
        record: Record,
    ) -> Result<(), PortsError> {
        let path = self.path_for(key)?;
        let lock = LockFile::acquire(&path).await?;
        let result = async {
            let current = read_record(&path).await?;
            check_expected(key, current.as_ref(), expected)?;
            write_record(&path, &record).await
        }
        .await;
        lock.release().await;
        result
    }

    async fn delete(&self, key: &str) -> Result<bool, PortsError> {
        match fs::remove_file(self.path_for(key)?).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, PortsError> {
        let mut keys = Vec::new();
        let mut dirs = vec![self.root.clone()];
        while let Some(dir) = dirs.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    dirs.push(path);
                    continue;
                }
                let Some(key) = self.key_for(&path) else {
                    continue;
                };
                if key.ends_with(LOCK_SUFFIX) || key.ends_with(TMP_SUFFIX) {
                    continue;
                }
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
