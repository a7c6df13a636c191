use std::fmt;

#[derive(Debug)]
pub enum PackageManagerError {
    /// No version of `name` satisfies `constraint`.
    NotFound(String, String),
    /// Package, expected integrity, actual integrity.
    IntegrityMismatch(String, String, String),
    EngineIncompatible(String, String),
    /// Scope, alias, first real name, second real name.
    AliasConflict(String, String, String, String),
    LockfileDivergence(Vec<String>),
    /// Integrity, store path, reason.
    StoreCorruption(String, String, String),
    /// Package, target path, reason.
    LinkingFailed(String, String, String),
    StorageFailed(String, String),
    LockfileError(String),
    PackageJsonError(String),
    NetworkError(String),
    InvalidPackageSpec(String),
    IoError(String),
    Cancelled,
}

impl fmt::Display for PackageManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(name, constraint) => {
                write!(f, "No version of '{name}' satisfies '{constraint}'")
            }
            Self::IntegrityMismatch(package, expected, actual) => {
                write!(
                    f,
                    "Integrity mismatch for {package}: expected {expected}, got {actual}"
                )
            }
            Self::EngineIncompatible(package, reason) => {
                write!(f, "Unsupported engine for {package}: {reason}")
            }
            Self::AliasConflict(scope, alias, first, second) => {
                write!(
                    f,
                    "Alias '{alias}' in {scope} points to both '{first}' and '{second}'"
                )
            }
            Self::LockfileDivergence(reasons) => {
                write!(
                    f,
                    "Lockfile is not up to date with the manifests: {}",
                    reasons.join("; ")
                )
            }
            Self::StoreCorruption(integrity, path, reason) => {
                write!(
                    f,
                    "Store entry {integrity} at {path} is corrupted ({reason}); remove it and fetch again"
                )
            }
            Self::LinkingFailed(name, path, reason) => {
                write!(f, "Failed to link package '{name}' at {path}: {reason}")
            }
            Self::StorageFailed(name, reason) => {
                write!(f, "Failed to store {name}: {reason}")
            }
            Self::LockfileError(msg) => {
                write!(f, "Lockfile error: {msg}")
            }
            Self::PackageJsonError(msg) => {
                write!(f, "Package.json error: {msg}")
            }
            Self::NetworkError(msg) => {
                write!(f, "Network error: {msg}")
            }
            Self::InvalidPackageSpec(spec) => {
                write!(f, "Invalid package specification: {spec}")
            }
            Self::IoError(msg) => {
                write!(f, "IO error: {msg}")
            }
            Self::Cancelled => {
                write!(f, "Installation was cancelled")
            }
        }
    }
}

impl std::error::Error for PackageManagerError {}

impl From<anyhow::Error> for PackageManagerError {
    fn from(err: anyhow::Error) -> Self {
        Self::PackageJsonError(err.to_string())
    }
}

impl From<std::io::Error> for PackageManagerError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PackageManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divergence_lists_every_reason() {
        let err = PackageManagerError::LockfileDivergence(vec![
            "importer '.' adds 'a'".into(),
            "importer '.' removes 'b'".into(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("adds 'a'"));
        assert!(msg.contains("removes 'b'"));
    }
}
