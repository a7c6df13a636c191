use pakt_utils::get_package_json_path;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::package_json::{DependencyType, PackageJson};

pub fn read_package_json(project_dir: &Path) -> anyhow::Result<PackageJson> {
    let path = get_package_json_path(project_dir);
    let content = fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let parsed: PackageJson = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
    Ok(parsed)
}

/// Writes the manifest back, keeping the key order of the file on disk.
///
/// Keys already present keep their position, new keys are appended and
/// dependency fields that became empty are dropped. Nothing is written when
/// the content is unchanged.
pub fn write_package_json(project_dir: &Path, package_json: &PackageJson) -> anyhow::Result<()> {
    let path = get_package_json_path(project_dir);
    let updated = match serde_json::to_value(package_json)? {
        Value::Object(map) => map,
        _ => anyhow::bail!("manifest did not serialize to an object"),
    };

    let existing = fs::read_to_string(&path).ok();
    let mut merged = existing
        .as_deref()
        .and_then(|s| serde_json::from_str::<Map<String, Value>>(s).ok())
        .unwrap_or_default();

    let is_dropped = |key: &str, value: Option<&Value>| match value {
        None => is_managed_key(key),
        Some(value) => is_dependency_key(key) && value.as_object().is_some_and(Map::is_empty),
    };
    merged.retain(|key, _| !is_dropped(key, updated.get(key)));
    for (key, value) in updated {
        if !is_dropped(&key, Some(&value)) {
            merged.insert(key, value);
        }
    }

    let mut content = serde_json::to_string_pretty(&Value::Object(merged))?;
    content.push('\n');
    if existing.as_deref() == Some(content.as_str()) {
        return Ok(());
    }
    fs::write(path, content)?;
    Ok(())
}

fn is_dependency_key(key: &str) -> bool {
    DependencyType::from_key(key).is_some()
}

fn is_managed_key(key: &str) -> bool {
    is_dependency_key(key) || matches!(key, "name" | "version" | "scripts" | "engines")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn write_keeps_existing_key_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies":{"a":"^1.0.0"},"name":"app","private":true}"#,
        )
        .unwrap();

        let mut manifest = read_package_json(dir.path()).unwrap();
        manifest
            .dev_dependencies
            .get_or_insert_with(IndexMap::new)
            .insert("b".into(), "^2.0.0".into());
        write_package_json(dir.path(), &manifest).unwrap();

        let written = fs::read_to_string(dir.path().join("package.json")).unwrap();
        let keys: Vec<String> = serde_json::from_str::<Map<String, Value>>(&written)
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["dependencies", "name", "private", "devDependencies"]);
        assert!(written.ends_with('\n'));
    }

    #[test]
    fn empty_dependency_fields_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"name":"app","dependencies":{"a":"^1.0.0"}}"#,
        )
        .unwrap();

        let mut manifest = read_package_json(dir.path()).unwrap();
        manifest.dependencies.as_mut().unwrap().shift_remove("a");
        write_package_json(dir.path(), &manifest).unwrap();

        let reread = read_package_json(dir.path()).unwrap();
        assert!(reread.dependencies.is_none());
        assert_eq!(reread.name.as_deref(), Some("app"));
    }
}
