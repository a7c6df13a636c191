use pakt_constants::{BIN_DIR, LOCKFILE_NAME, MANIFEST_NAME, MODULES_DIR};
use std::path::{Component, Path, PathBuf};

#[must_use]
pub fn get_node_modules_path(project_dir: &Path) -> PathBuf {
    project_dir.join(MODULES_DIR)
}

#[must_use]
pub fn get_package_json_path(project_dir: &Path) -> PathBuf {
    project_dir.join(MANIFEST_NAME)
}

#[must_use]
pub fn get_lock_file_path(workspace_dir: &Path) -> PathBuf {
    workspace_dir.join(LOCKFILE_NAME)
}

#[must_use]
pub fn get_bin_dir(project_dir: &Path) -> PathBuf {
    get_node_modules_path(project_dir).join(BIN_DIR)
}

/// Handle scoped package names in file paths
#[must_use]
pub fn get_scoped_package_path(base_path: &Path, package_name: &str) -> PathBuf {
    match package_name.strip_prefix('@').and_then(|s| s.split_once('/')) {
        Some((scope, name)) => base_path.join(format!("@{scope}")).join(name),
        None => base_path.join(package_name),
    }
}

/// Where `name` is bound from `dir`: `<dir>/node_modules/<name>`.
#[must_use]
pub fn get_module_path(dir: &Path, name: &str) -> PathBuf {
    get_scoped_package_path(&get_node_modules_path(dir), name)
}

/// Lexically normalizes `.` and `..` without touching the filesystem.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Path of `target` relative to the directory `from_dir`, as used for symlink contents.
#[must_use]
pub fn relative_path(from_dir: &Path, target: &Path) -> PathBuf {
    let from = normalize_path(from_dir);
    let to = normalize_path(target);

    let from_parts: Vec<_> = from.components().collect();
    let to_parts: Vec<_> = to.components().collect();
    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..from_parts.len() {
        rel.push("..");
    }
    for part in to_parts.iter().skip(common) {
        rel.push(part.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

/// True when the last component of `path` is `node_modules`.
#[must_use]
pub fn is_node_modules_dir(path: &Path) -> bool {
    path.file_name().is_some_and(|n| n == MODULES_DIR)
}
