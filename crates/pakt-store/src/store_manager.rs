use pakt_constants::TEMP_PREFIX;
use pakt_error::{PackageManagerError, Result};
use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

use crate::extract::extract_tarball;
use crate::file_index::FileIndex;
use crate::integrity::Integrity;
use crate::path_resolver::PathResolver;

struct StoreEntry {
    path: PathBuf,
    refs: AtomicUsize,
}

/// Reference-counted access to one extracted store entry.
///
/// Dropping the handle releases the reference.
pub struct TreeHandle {
    entry: Arc<StoreEntry>,
    integrity: Integrity,
}

impl TreeHandle {
    #[must_use]
    pub fn integrity(&self) -> &Integrity {
        &self.integrity
    }

    /// Directory of the entry (holds `package/` and `index.json`).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.entry.path
    }

    #[must_use]
    pub fn package_dir(&self) -> PathBuf {
        PathResolver::get_package_directory(&self.entry.path)
    }
}

impl Clone for TreeHandle {
    fn clone(&self) -> Self {
        self.entry.refs.fetch_add(1, Ordering::AcqRel);
        Self {
            entry: Arc::clone(&self.entry),
            integrity: self.integrity.clone(),
        }
    }
}

impl Drop for TreeHandle {
    fn drop(&mut self) {
        self.entry.refs.fetch_sub(1, Ordering::AcqRel);
    }
}

type EntryCell = Arc<OnceCell<Arc<StoreEntry>>>;

/// Content-addressed package store.
///
/// Entries are write-once: an entry directory only appears through an atomic
/// rename of a fully extracted and indexed temp directory.
pub struct StoreManager {
    root: PathBuf,
    verify_integrity: bool,
    cells: Mutex<HashMap<Integrity, EntryCell>>,
    extractions: AtomicUsize,
}

impl StoreManager {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, verify_integrity: bool) -> Self {
        Self {
            root: root.into(),
            verify_integrity,
            cells: Mutex::new(HashMap::new()),
            extractions: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of extractions performed by this process.
    #[must_use]
    pub fn extractions(&self) -> usize {
        self.extractions.load(Ordering::Acquire)
    }

    /// Outstanding handles for `integrity` in this process.
    #[must_use]
    pub fn ref_count(&self, integrity: &Integrity) -> usize {
        self.cell(integrity)
            .get()
            .map_or(0, |entry| entry.refs.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn contains(&self, integrity: &Integrity) -> bool {
        let entry = PathResolver::entry_path(&self.root, integrity);
        PathResolver::get_index_path(&entry).is_file()
    }

    fn cell(&self, integrity: &Integrity) -> EntryCell {
        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cells.entry(integrity.clone()).or_default())
    }

    /// Returns a handle to the entry for `integrity`, creating it on first use.
    ///
    /// `fetch` is only called when the entry is not on disk; concurrent callers
    /// for the same integrity share one fetch and one extraction.
    pub async fn acquire<F, Fut>(&self, integrity: &Integrity, label: &str, fetch: F) -> Result<TreeHandle>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        let cell = self.cell(integrity);
        let entry = cell
            .get_or_try_init(|| self.materialize(integrity, label, fetch))
            .await?;

        entry.refs.fetch_add(1, Ordering::AcqRel);
        Ok(TreeHandle {
            entry: Arc::clone(entry),
            integrity: integrity.clone(),
        })
    }

    /// Releases a handle. Equivalent to dropping it.
    pub fn release(&self, handle: TreeHandle) {
        drop(handle);
    }

    async fn materialize<F, Fut>(&self, integrity: &Integrity, label: &str, fetch: F) -> Result<Arc<StoreEntry>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        let entry_path = PathResolver::entry_path(&self.root, integrity);

        if PathResolver::get_index_path(&entry_path).is_file() {
            if self.verify_integrity {
                let path = entry_path.clone();
                let integrity_text = integrity.to_string();
                tokio::task::spawn_blocking(move || verify_entry(&path, &integrity_text))
                    .await
                    .map_err(|e| PackageManagerError::StorageFailed(label.to_string(), e.to_string()))??;
            }
            return Ok(Arc::new(StoreEntry {
                path: entry_path,
                refs: AtomicUsize::new(0),
            }));
        }

        let bytes = fetch().await?;
        integrity.check(&bytes).map_err(|actual| {
            PackageManagerError::IntegrityMismatch(
                label.to_string(),
                integrity.to_string(),
                actual.to_string(),
            )
        })?;

        let root = self.root.clone();
        let path = entry_path.clone();
        let integrity_text = integrity.to_string();
        let name = label.to_string();
        tokio::task::spawn_blocking(move || write_entry(&root, &path, &bytes, &integrity_text))
            .await
            .map_err(|e| PackageManagerError::StorageFailed(name.clone(), e.to_string()))?
            .map_err(|e| PackageManagerError::StorageFailed(name, e.to_string()))?;

        self.extractions.fetch_add(1, Ordering::AcqRel);
        Ok(Arc::new(StoreEntry {
            path: entry_path,
            refs: AtomicUsize::new(0),
        }))
    }
}

fn verify_entry(entry_path: &Path, integrity: &str) -> Result<()> {
    let corrupted = |reason: String| {
        PackageManagerError::StoreCorruption(
            integrity.to_string(),
            entry_path.display().to_string(),
            reason,
        )
    };

    let index = FileIndex::load(&PathResolver::get_index_path(entry_path))
        .map_err(|e| corrupted(format!("unreadable index: {e}")))?;
    if index.integrity != integrity {
        return Err(corrupted(format!("index records {}", index.integrity)));
    }
    index
        .verify(&PathResolver::get_package_directory(entry_path))
        .map_err(corrupted)
}

fn write_entry(root: &Path, entry_path: &Path, bytes: &[u8], integrity: &str) -> std::io::Result<()> {
    let temp_root = PathResolver::temp_dir(root);
    fs::create_dir_all(&temp_root)?;
    let temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir_in(&temp_root)?;

    let package_dir = PathResolver::get_package_directory(temp.path());
    extract_tarball(bytes, &package_dir)?;
    FileIndex::build(&package_dir, integrity)?.save(&PathResolver::get_index_path(temp.path()))?;

    if let Some(parent) = entry_path.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(temp.path(), entry_path) {
        Ok(()) => Ok(()),
        // Another process published the same entry first.
        Err(_) if PathResolver::get_index_path(entry_path).is_file() => Ok(()),
        Err(e) => Err(e),
    }
}
