use pakt_constants::MODULES_STATE_FILE;
use pakt_hoist::LinkingStrategy;
use pakt_utils::{get_node_modules_path, write_if_changed};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What the linker last applied at one path.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AppliedEntry {
    Package { id: String, integrity: String },
    Link { target: String },
}

/// Contents of `node_modules/.pakt-state.json`. Paths are relative to the
/// workspace root with `/` separators.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModulesState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<LinkingStrategy>,
    #[serde(default)]
    pub entries: BTreeMap<String, AppliedEntry>,
}

impl ModulesState {
    #[must_use]
    pub fn path(root: &Path) -> PathBuf {
        get_node_modules_path(root).join(MODULES_STATE_FILE)
    }

    /// A missing or unreadable state file is an empty state; every entry is
    /// then checked against the disk.
    #[must_use]
    pub fn load(root: &Path) -> Self {
        fs::read_to_string(Self::path(root))
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, root: &Path) -> io::Result<bool> {
        let mut json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        json.push('\n');
        write_if_changed(&Self::path(root), json.as_bytes())
    }
}

/// State key of `path`: relative to `root` with `/` separators.
#[must_use]
pub fn state_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
