use pakt_constants::{STORE_INDEX_FILE, STORE_LAYOUT, STORE_PACKAGE_DIR};
use std::path::{Path, PathBuf};

use crate::integrity::Integrity;

pub struct PathResolver;

impl PathResolver {
    #[must_use]
    pub fn default_store_path() -> PathBuf {
        dirs::home_dir().map_or_else(
            || std::env::temp_dir().join("pakt-store"),
            |home| home.join(".pakt").join("store"),
        )
    }

    /// `<store>/v1/<algo>/<first two hex chars>/<remaining hex>`
    #[must_use]
    pub fn entry_path(store_base: &Path, integrity: &Integrity) -> PathBuf {
        let hex = integrity.hex_digest();
        let (head, tail) = hex.split_at(hex.len().min(2));
        store_base
            .join(STORE_LAYOUT)
            .join(integrity.algorithm().as_str())
            .join(head)
            .join(tail)
    }

    #[must_use]
    pub fn get_package_directory(entry_path: &Path) -> PathBuf {
        entry_path.join(STORE_PACKAGE_DIR)
    }

    #[must_use]
    pub fn get_index_path(entry_path: &Path) -> PathBuf {
        entry_path.join(STORE_INDEX_FILE)
    }

    /// Scratch space for extractions; same filesystem as the entries so renames are atomic.
    #[must_use]
    pub fn temp_dir(store_base: &Path) -> PathBuf {
        store_base.join(STORE_LAYOUT).join("tmp")
    }
}
