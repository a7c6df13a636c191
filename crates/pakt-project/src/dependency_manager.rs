use crate::package_json::{DependencyType, PackageJson};
use indexmap::IndexMap;
use pakt_utils::format_version_string;

pub struct DependencyManager;

impl DependencyManager {
    /// Add a dependency to the package.json, moving it out of any other field.
    ///
    /// An entry already in `dep_type` keeps its position.
    pub fn add_dependency(
        package_json: &mut PackageJson,
        name: &str,
        specifier: &str,
        dep_type: DependencyType,
    ) {
        for other in [
            DependencyType::Dependencies,
            DependencyType::DevDependencies,
            DependencyType::OptionalDependencies,
        ] {
            if other != dep_type {
                Self::remove_from(package_json, name, other);
            }
        }

        package_json
            .field_mut(dep_type)
            .get_or_insert_with(IndexMap::new)
            .insert(name.to_string(), specifier.to_string());
    }

    /// Specifier to save for a resolved version: the user's own specifier when given.
    #[must_use]
    pub fn save_specifier(
        requested: Option<&str>,
        alias_target: Option<&str>,
        version: &str,
        save_exact: bool,
        save_prefix: &str,
    ) -> String {
        if let Some(requested) = requested {
            return requested.to_string();
        }
        let range = format_version_string(version, save_exact, save_prefix);
        match alias_target {
            Some(real) => format!("npm:{real}@{range}"),
            None => range,
        }
    }

    /// Remove a dependency from all installable dependency types
    ///
    /// Returns the fields it was removed from.
    pub fn remove_dependency(package_json: &mut PackageJson, name: &str) -> Vec<DependencyType> {
        DependencyType::INSTALLED
            .into_iter()
            .filter(|field| Self::remove_from(package_json, name, *field))
            .collect()
    }

    fn remove_from(package_json: &mut PackageJson, name: &str, dep_type: DependencyType) -> bool {
        let slot = package_json.field_mut(dep_type);
        let removed = slot
            .as_mut()
            .is_some_and(|deps| deps.shift_remove(name).is_some());
        if slot.as_ref().is_some_and(IndexMap::is_empty) {
            *slot = None;
        }
        removed
    }
}
