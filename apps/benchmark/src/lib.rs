//! Synthetic registries and workspaces shared by the benches.

use pakt_error::{PackageManagerError, Result};
use pakt_registry::{MemoryIndex, PublishSpec};
use pakt_resolver::ImporterManifest;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[must_use]
pub fn package_name(layer: usize, index: usize) -> String {
    format!("pkg-{layer}-{index}")
}

/// Publishes `layers` layers of `width` packages, each in versions 1.0.0 and
/// 2.0.0. Every package depends on three packages of the next layer with
/// alternating majors, so the hoister has conflicts to place.
pub fn layered_index(layers: usize, width: usize) -> Result<MemoryIndex> {
    let index = MemoryIndex::new();
    for layer in 0..layers {
        for i in 0..width {
            for major in [1, 2] {
                let mut spec = PublishSpec::new(&package_name(layer, i), &format!("{major}.0.0"));
                if layer + 1 < layers {
                    for offset in 0..3 {
                        let target = (i + offset) % width;
                        let range = if target % 2 == 0 { "^1.0.0" } else { "^2.0.0" };
                        spec = spec.dep(&package_name(layer + 1, target), range);
                    }
                }
                index.publish(spec)?;
            }
        }
    }
    Ok(index)
}

/// Root manifest depending on every package of the first layer.
#[must_use]
pub fn root_manifest(width: usize) -> String {
    let deps: serde_json::Map<String, serde_json::Value> = (0..width)
        .map(|i| (package_name(0, i), serde_json::Value::from("^1.0.0")))
        .collect();
    serde_json::json!({ "name": "bench", "dependencies": deps }).to_string()
}

pub fn importer(root: &Path, width: usize) -> Result<ImporterManifest> {
    let manifest = serde_json::from_str(&root_manifest(width))
        .map_err(|e| PackageManagerError::PackageJsonError(e.to_string()))?;
    Ok(ImporterManifest {
        id: ".".to_string(),
        root_dir: root.to_path_buf(),
        manifest,
    })
}

/// A scratch workspace holding `root_manifest(width)`.
pub fn workspace(width: usize) -> Result<TempDir> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("package.json"), root_manifest(width))?;
    Ok(dir)
}
