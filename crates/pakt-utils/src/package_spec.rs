use pakt_constants::DEFAULT_TAG;

/// Splits `name@version` at the version separator, skipping the leading `@` of a scope.
#[must_use]
pub fn split_name_version(spec: &str) -> (&str, Option<&str>) {
    let search_from = usize::from(spec.starts_with('@'));
    match spec.get(search_from..).and_then(|rest| rest.find('@')) {
        Some(at) => {
            let at = at + search_from;
            let name = spec.get(..at).unwrap_or(spec);
            let version = spec.get(at + 1..).unwrap_or_default();
            (name, Some(version))
        }
        None => (spec, None),
    }
}

/// Parses a command-line package argument into the name to save under and the
/// manifest specifier, if one was given.
///
/// `lodash`, `lodash@^4`, `@types/node@20` and `dep@npm:real@^1` are accepted.
#[must_use]
pub fn parse_package_spec(spec: &str) -> (String, Option<String>) {
    let (name, version) = split_name_version(spec.trim());
    let version = version.filter(|v| !v.is_empty()).map(str::to_string);
    (name.to_string(), version)
}

/// Reads an `npm:<name>@<range>` specifier; a missing range means the default tag.
#[must_use]
pub fn parse_npm_alias(specifier: &str) -> Option<(String, String)> {
    let target = specifier.strip_prefix("npm:")?;
    let (name, range) = split_name_version(target);
    if name.is_empty() {
        return None;
    }

    let range = match range {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => DEFAULT_TAG.to_string(),
    };
    Some((name.to_string(), range))
}

/// Checks the subset of npm naming rules that matter for laying out paths.
#[must_use]
pub fn is_valid_package_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') || name.contains('\\') {
        return false;
    }

    match name.strip_prefix('@') {
        Some(scoped) => match scoped.split_once('/') {
            Some((scope, rest)) => {
                !scope.is_empty() && !rest.is_empty() && !rest.contains('/') && !rest.starts_with('.')
            }
            None => false,
        },
        None => !name.contains('/'),
    }
}
