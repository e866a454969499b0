//! Process-wide database handle.
//!
//! The first caller opens the database; every later caller, from any
//! thread, gets the same handle. [`close_db`] drops it and can be called
//! any number of times, which also lets tests start from a clean slate.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::storage::SqliteStorage;

/// Shared handle to the open database.
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

struct Slot {
    path: PathBuf,
    storage: SharedStorage,
}

static GLOBAL: Mutex<Option<Slot>> = Mutex::new(None);

fn lock_slot() -> Result<MutexGuard<'static, Option<Slot>>> {
    GLOBAL
        .lock()
        .map_err(|_| Error::Other("database handle lock poisoned".to_string()))
}

/// Get the shared database handle, opening `path` on first use.
///
/// Concurrent first calls are serialized; exactly one of them opens the
/// database. Once open, the handle is returned regardless of `path`
/// until [`close_db`] is called.
///
/// # Errors
///
/// Returns an error if the database cannot be opened.
pub fn get_or_open(path: &Path) -> Result<SharedStorage> {
    let mut slot = lock_slot()?;

    if let Some(existing) = slot.as_ref() {
        if existing.path != path {
            tracing::debug!(
                open = %existing.path.display(),
                requested = %path.display(),
                "Database already open; reusing handle"
            );
        }
        return Ok(Arc::clone(&existing.storage));
    }

    let storage = Arc::new(Mutex::new(SqliteStorage::open(path)?));
    tracing::debug!(path = %path.display(), "Opened database");
    *slot = Some(Slot {
        path: path.to_path_buf(),
        storage: Arc::clone(&storage),
    });
    Ok(storage)
}

/// Whether a handle is currently open.
#[must_use]
pub fn is_open() -> bool {
    GLOBAL.lock().is_ok_and(|slot| slot.is_some())
}

/// Drop the shared handle.
///
/// A no-op when nothing is open. Clones already handed out stay valid
/// until their holders drop them.
///
/// # Errors
///
/// Returns an error only if the handle lock is poisoned.
pub fn close_db() -> Result<()> {
    if lock_slot()?.take().is_some() {
        tracing::debug!("Closed database");
    }
    Ok(())
}

/// Lock a shared handle for use.
///
/// # Errors
///
/// Returns `Error::Other` if a previous holder panicked.
pub fn lock(storage: &SharedStorage) -> Result<MutexGuard<'_, SqliteStorage>> {
    storage
        .lock()
        .map_err(|_| Error::Other("database lock poisoned".to_string()))
}
