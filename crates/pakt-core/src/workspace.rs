use pakt_error::{PackageManagerError, Result};
use pakt_project::{PackageJson, read_package_json};
use pakt_resolver::ImporterManifest;
use pakt_utils::normalize_path;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Importer id of `root`: its path below the workspace with `/` separators,
/// `.` for the workspace itself.
pub fn importer_id(workspace_dir: &Path, root: &Path) -> Result<String> {
    let workspace = normalize_path(workspace_dir);
    let root = normalize_path(&workspace_dir.join(root));
    let rel = root.strip_prefix(&workspace).map_err(|_| {
        PackageManagerError::PackageJsonError(format!(
            "project {} is outside the workspace {}",
            root.display(),
            workspace.display()
        ))
    })?;

    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    })
}

/// Reads every project manifest. The workspace root comes first, the rest by id.
///
/// `workspace_dir` is expected to be canonical already.
pub fn load_importers(workspace_dir: &Path, roots: &[PathBuf]) -> Result<Vec<ImporterManifest>> {
    let mut by_id: BTreeMap<String, PathBuf> = BTreeMap::new();
    for root in roots {
        let root_dir = fs::canonicalize(workspace_dir.join(root)).map_err(|e| {
            PackageManagerError::PackageJsonError(format!("project {}: {e}", root.display()))
        })?;
        by_id.insert(importer_id(workspace_dir, &root_dir)?, root_dir);
    }

    let mut importers = Vec::with_capacity(by_id.len());
    for (id, root_dir) in by_id {
        let manifest = read_package_json(&root_dir)?;
        importers.push(ImporterManifest {
            id,
            root_dir,
            manifest,
        });
    }
    importers.sort_by_key(|importer| importer.id != ".");
    Ok(importers)
}

/// The manifest whose `"pakt"` object configures the install.
#[must_use]
pub fn root_manifest(importers: &[ImporterManifest]) -> Option<&PackageJson> {
    importers
        .iter()
        .find(|importer| importer.id == ".")
        .or_else(|| importers.first())
        .map(|importer| &importer.manifest)
}
