/// Builds the specifier written to a manifest for a freshly resolved version.
#[must_use]
pub fn format_version_string(version: &str, save_exact: bool, save_prefix: &str) -> String {
    if save_exact || version.starts_with('^') || version.starts_with('~') {
        version.to_string()
    } else {
        format!("{save_prefix}{version}")
    }
}
