use indexmap::IndexMap;
use indexmap::map::Entry;
use pakt_error::{PackageManagerError, Result};
use pakt_project::DependencyType;
use pakt_utils::{is_valid_package_name, parse_npm_alias};

use crate::graph::{DependencySpec, VersionConstraint};
use crate::semver_range::VersionRange;

impl DependencySpec {
    /// Classifies a manifest entry `alias: raw`.
    pub fn parse(alias: &str, raw: &str, field: DependencyType) -> Result<Self> {
        let invalid = || PackageManagerError::InvalidPackageSpec(format!("{alias}@{raw}"));
        if !is_valid_package_name(alias) {
            return Err(invalid());
        }

        let trimmed = raw.trim();
        let (name, constraint) = if let Some(rest) = trimmed.strip_prefix("workspace:") {
            (alias.to_string(), VersionConstraint::Workspace(rest.trim().to_string()))
        } else if trimmed.starts_with("npm:") {
            let (real, range) = parse_npm_alias(trimmed).ok_or_else(invalid)?;
            if !is_valid_package_name(&real) {
                return Err(invalid());
            }
            (real, classify(&range).ok_or_else(invalid)?)
        } else {
            (alias.to_string(), classify(trimmed).ok_or_else(invalid)?)
        };

        Ok(Self {
            alias: alias.to_string(),
            name,
            constraint,
            raw: raw.to_string(),
            field,
        })
    }
}

fn classify(range: &str) -> Option<VersionConstraint> {
    if let Ok(parsed) = range.parse::<VersionRange>() {
        return Some(VersionConstraint::Range(parsed));
    }
    let is_tag = !range.is_empty()
        && range
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    is_tag.then(|| VersionConstraint::Tag(range.to_string()))
}

/// Merges `(field, alias, raw)` entries into one spec per alias, keeping first positions.
///
/// A later field overrides an earlier one for the same package; binding one
/// alias to two different real packages is an `AliasConflict` in `scope`.
pub fn merge_specs<'a, I>(scope: &str, entries: I) -> Result<Vec<DependencySpec>>
where
    I: IntoIterator<Item = (DependencyType, &'a str, &'a str)>,
{
    let mut merged: IndexMap<String, DependencySpec> = IndexMap::new();

    for (field, alias, raw) in entries {
        let spec = DependencySpec::parse(alias, raw, field)?;
        match merged.entry(spec.alias.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get().name != spec.name {
                    return Err(PackageManagerError::AliasConflict(
                        scope.to_string(),
                        spec.alias.clone(),
                        slot.get().name.clone(),
                        spec.name,
                    ));
                }
                slot.insert(spec);
            }
            Entry::Vacant(slot) => {
                slot.insert(spec);
            }
        }
    }

    Ok(merged.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ranges_tags_aliases_and_workspaces() {
        let range = DependencySpec::parse("bar", "^100.0.0", DependencyType::Dependencies).unwrap();
        assert!(matches!(range.constraint, VersionConstraint::Range(_)));
        assert!(!range.is_aliased());

        let tag = DependencySpec::parse("bar", "latest", DependencyType::Dependencies).unwrap();
        assert_eq!(tag.constraint, VersionConstraint::Tag("latest".into()));

        let alias = DependencySpec::parse(
            "dep",
            "npm:dep-of-pkg-with-1-dep@^100.0.0",
            DependencyType::Dependencies,
        )
        .unwrap();
        assert_eq!(alias.name, "dep-of-pkg-with-1-dep");
        assert!(alias.is_aliased());

        let ws = DependencySpec::parse("lib", "workspace:^", DependencyType::Dependencies).unwrap();
        assert_eq!(ws.constraint, VersionConstraint::Workspace("^".into()));

        let any = DependencySpec::parse("a", "", DependencyType::Dependencies).unwrap();
        assert!(matches!(any.constraint, VersionConstraint::Range(_)));
    }

    #[test]
    fn rejects_unsupported_specifiers() {
        assert!(DependencySpec::parse("a", "git+https://x/y.git", DependencyType::Dependencies).is_err());
        assert!(DependencySpec::parse("../a", "1.0.0", DependencyType::Dependencies).is_err());
        assert!(DependencySpec::parse("a", "npm:", DependencyType::Dependencies).is_err());
    }

    #[test]
    fn later_fields_override_in_place() {
        let specs = merge_specs(
            ".",
            [
                (DependencyType::Dependencies, "a", "^1.0.0"),
                (DependencyType::Dependencies, "b", "^1.0.0"),
                (DependencyType::DevDependencies, "a", "^2.0.0"),
            ],
        )
        .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].alias, "a");
        assert_eq!(specs[0].raw, "^2.0.0");
        assert_eq!(specs[0].field, DependencyType::DevDependencies);
    }

    #[test]
    fn alias_bound_to_two_packages_conflicts() {
        let err = merge_specs(
            "packages/app",
            [
                (DependencyType::Dependencies, "dep", "npm:one@1.0.0"),
                (DependencyType::DevDependencies, "dep", "npm:two@1.0.0"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, PackageManagerError::AliasConflict(..)));
        assert!(err.to_string().contains("packages/app"));
    }
}
