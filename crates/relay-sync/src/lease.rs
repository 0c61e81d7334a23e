//! Per-`(sync_type, tenant)` run leases.
//!
//! Two layers: an in-process async mutex per pair, and optionally a lock
//! file per pair so separate `rly` processes sharing a database also
//! serialize. The lock file holds the owner's pid; a file whose pid is no
//! longer running is stale and gets replaced. A pair's mutex is dropped from
//! the registry once no run holds or waits for it.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use relay_core::enums::SyncType;
use relay_core::errors::SyncError;
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;

const LOCK_RETRY_DELAY: Duration = Duration::from_millis(250);

type PairKey = (SyncType, String);
type PairMap = HashMap<PairKey, Arc<tokio::sync::Mutex<()>>>;

/// Held for the lifetime of one run. Dropping it releases the pair.
#[derive(Debug)]
pub struct Lease {
    _guard: OwnedMutexGuard<()>,
    _file: Option<LockFile>,
    pairs: Arc<Mutex<PairMap>>,
    key: PairKey,
}

impl Drop for Lease {
    fn drop(&mut self) {
        // The guard is still alive here, so it counts as one owner.
        forget_if_idle(&self.pairs, &self.key, 2);
    }
}

/// Remove `key` unless something beyond `owners` (the map's own handle plus
/// any guard the caller still holds) references its mutex.
fn forget_if_idle(pairs: &Mutex<PairMap>, key: &PairKey, owners: usize) {
    let mut pairs = pairs.lock().unwrap_or_else(PoisonError::into_inner);
    if pairs
        .get(key)
        .is_some_and(|mutex| Arc::strong_count(mutex) <= owners)
    {
        pairs.remove(key);
    }
}

#[derive(Debug)]
struct LockFile {
    path: PathBuf,
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[derive(Debug, Default)]
pub struct LeaseRegistry {
    pairs: Arc<Mutex<PairMap>>,
    lock_dir: Option<PathBuf>,
}

impl LeaseRegistry {
    /// Leases that only serialize runs within this process.
    #[must_use]
    pub fn in_process() -> Self {
        Self::default()
    }

    /// Leases that also take a lock file per pair under `dir`.
    #[must_use]
    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            pairs: Arc::default(),
            lock_dir: Some(dir.into()),
        }
    }

    /// Wait up to `wait` for the pair's lease.
    ///
    /// # Errors
    ///
    /// Returns a retryable `SyncError::SyncOperation` (`acquire_lease`) if
    /// another run still holds the pair when `wait` elapses.
    pub async fn acquire(
        &self,
        sync_type: SyncType,
        tenant: &str,
        wait: Duration,
    ) -> Result<Lease, SyncError> {
        let deadline = Instant::now() + wait;
        let key = (sync_type, tenant.to_string());
        let mutex = {
            let mut pairs = self.pairs.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(pairs.entry(key.clone()).or_default())
        };

        let acquired = tokio::time::timeout_at(deadline, mutex.lock_owned()).await;
        let Ok(guard) = acquired else {
            forget_if_idle(&self.pairs, &key, 1);
            return Err(busy(sync_type, tenant, "in this process"));
        };

        let file = match &self.lock_dir {
            Some(dir) => {
                let path = lock_path(dir, sync_type, tenant);
                match acquire_file(&path, deadline, sync_type, tenant).await {
                    Ok(file) => Some(file),
                    Err(e) => {
                        drop(guard);
                        forget_if_idle(&self.pairs, &key, 1);
                        return Err(e);
                    }
                }
            }
            None => None,
        };

        tracing::debug!(%sync_type, tenant, "lease acquired");
        Ok(Lease {
            _guard: guard,
            _file: file,
            pairs: Arc::clone(&self.pairs),
            key,
        })
    }

    #[cfg(test)]
    fn tracked_pairs(&self) -> usize {
        self.pairs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn busy(sync_type: SyncType, tenant: &str, holder: &str) -> SyncError {
    SyncError::sync_operation(
        "acquire_lease",
        format!("another {sync_type} run for tenant '{tenant}' is still in progress ({holder})"),
        true,
    )
}

/// `{dir}/{sync_type}-{tenant}.lock`, with the tenant reduced to a safe
/// file-name alphabet.
fn lock_path(dir: &Path, sync_type: SyncType, tenant: &str) -> PathBuf {
    let tenant: String = tenant
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(format!("{sync_type}-{tenant}.lock"))
}

async fn acquire_file(
    path: &Path,
    deadline: Instant,
    sync_type: SyncType,
    tenant: &str,
) -> Result<LockFile, SyncError> {
    loop {
        match try_acquire(path) {
            Ok(lock) => return Ok(lock),
            Err(LockState::Stale) if std::fs::remove_file(path).is_ok() => {
                tracing::warn!(path = %path.display(), "removed stale run lock");
            }
            Err(state) => {
                if Instant::now() >= deadline {
                    let holder = match state {
                        LockState::HeldBy(pid) => format!("pid {pid}"),
                        _ => format!("lock file {}", path.display()),
                    };
                    return Err(busy(sync_type, tenant, &holder));
                }
                tokio::time::sleep(LOCK_RETRY_DELAY).await;
            }
        }
    }
}

#[derive(Debug)]
enum LockState {
    HeldBy(u32),
    Stale,
    Unknown,
}

fn try_acquire(path: &Path) -> Result<LockFile, LockState> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    match OpenOptions::new().create_new(true).write(true).open(path) {
        Ok(mut file) => {
            let _ = writeln!(file, "{}", std::process::id());
            Ok(LockFile {
                path: path.to_path_buf(),
            })
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            let mut pid_buf = String::new();
            if OpenOptions::new()
                .read(true)
                .open(path)
                .and_then(|mut file| file.read_to_string(&mut pid_buf))
                .is_err()
            {
                return Err(LockState::Unknown);
            }
            match pid_buf.trim().parse::<u32>().ok() {
                Some(pid) if is_process_running(pid) => Err(LockState::HeldBy(pid)),
                Some(_) => Err(LockState::Stale),
                None => Err(LockState::Unknown),
            }
        }
        Err(_) => Err(LockState::Unknown),
    }
}

fn is_process_running(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .status()
        .is_ok_and(|status| status.success())
}
