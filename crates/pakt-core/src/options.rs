use pakt_constants::{DEFAULT_REGISTRY, DEFAULT_SAVE_PREFIX};
use pakt_error::{PackageManagerError, Result};
use pakt_hoist::LinkingStrategy;
use pakt_project::{DependencyType, Settings};
use pakt_store::{ImportMethod, PathResolver};
use pakt_symcap::ConcurrencyLimits;
use semver::Version;
use std::path::PathBuf;

/// Switches for one install run.
///
/// `None` fields fall back to the root manifest's `"pakt"` settings and then
/// to the built-in default.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Holds the lockfile and the shared `node_modules`.
    pub workspace_dir: PathBuf,
    /// Project roots to install, relative to `workspace_dir`; defaults to the
    /// workspace root alone.
    pub project_roots: Vec<PathBuf>,
    /// Project that `add`/`remove`/`update --latest` edit, relative to
    /// `workspace_dir`; defaults to the workspace root.
    pub target_project: Option<PathBuf>,
    pub strategy: Option<LinkingStrategy>,
    pub frozen_lockfile: bool,
    pub use_lockfile: bool,
    pub engine_strict: Option<bool>,
    pub node_version: Option<String>,
    /// Version of the runtime installed on this machine, used when neither
    /// `node_version` nor the manifest settings name one.
    pub detected_node_version: Option<String>,
    pub store_dir: Option<PathBuf>,
    pub registry: String,
    /// Field `add` writes to.
    pub dependency_type: DependencyType,
    pub production: bool,
    pub save_exact: Option<bool>,
    pub save_prefix: Option<String>,
    pub import_method: Option<ImportMethod>,
    pub verify_store_integrity: Option<bool>,
    pub concurrency: ConcurrencyLimits,
    pub debug: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("."),
            project_roots: Vec::new(),
            target_project: None,
            strategy: None,
            frozen_lockfile: false,
            use_lockfile: true,
            engine_strict: None,
            node_version: None,
            detected_node_version: None,
            store_dir: None,
            registry: DEFAULT_REGISTRY.to_string(),
            dependency_type: DependencyType::Dependencies,
            production: false,
            save_exact: None,
            save_prefix: None,
            import_method: None,
            verify_store_integrity: None,
            concurrency: ConcurrencyLimits::default(),
            debug: false,
        }
    }
}

impl InstallOptions {
    #[must_use]
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn roots(&self) -> Vec<PathBuf> {
        if self.project_roots.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.project_roots.clone()
        }
    }

    #[must_use]
    pub fn target(&self) -> PathBuf {
        self.target_project
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Layers these options over the manifest `settings`.
    pub fn effective(&self, settings: &Settings) -> Result<EffectiveConfig> {
        let strategy = match (self.strategy, settings.node_linker.as_deref()) {
            (Some(strategy), _) => strategy,
            (None, Some(raw)) => raw.parse()?,
            (None, None) => LinkingStrategy::default(),
        };

        let import_method = match (self.import_method, settings.package_import_method.as_deref()) {
            (Some(method), _) => method,
            (None, Some(raw)) => raw
                .parse()
                .map_err(|e: String| PackageManagerError::PackageJsonError(e))?,
            (None, None) => ImportMethod::default(),
        };

        let node_version = self
            .node_version
            .as_deref()
            .or(settings.node_version.as_deref())
            .or(self.detected_node_version.as_deref())
            .map(parse_runtime_version)
            .transpose()?;

        let store_dir = match (&self.store_dir, &settings.store_dir) {
            (Some(dir), _) => dir.clone(),
            (None, Some(dir)) => self.workspace_dir.join(dir),
            (None, None) => PathResolver::default_store_path(),
        };

        let mut limits = self.concurrency;
        if let Some(network) = settings.network_concurrency {
            limits.fetch = network;
        }

        Ok(EffectiveConfig {
            strategy,
            engine_strict: self
                .engine_strict
                .or(settings.engine_strict)
                .unwrap_or(false),
            node_version,
            store_dir,
            save_exact: self.save_exact.or(settings.save_exact).unwrap_or(false),
            save_prefix: self
                .save_prefix
                .clone()
                .or_else(|| settings.save_prefix.clone())
                .unwrap_or_else(|| DEFAULT_SAVE_PREFIX.to_string()),
            import_method,
            verify_store_integrity: self
                .verify_store_integrity
                .or(settings.verify_store_integrity)
                .unwrap_or(true),
            limits: limits.normalized(),
        })
    }
}

/// Options after settings and defaults were applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub strategy: LinkingStrategy,
    pub engine_strict: bool,
    pub node_version: Option<Version>,
    pub store_dir: PathBuf,
    pub save_exact: bool,
    pub save_prefix: String,
    pub import_method: ImportMethod,
    pub verify_store_integrity: bool,
    pub limits: ConcurrencyLimits,
}

fn parse_runtime_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    Version::parse(trimmed.strip_prefix('v').unwrap_or(trimmed))
        .map_err(|e| PackageManagerError::PackageJsonError(format!("invalid node version '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_options_win_over_settings() {
        let settings = Settings {
            node_linker: Some("hoisted".into()),
            engine_strict: Some(true),
            save_prefix: Some("~".into()),
            store_dir: Some(".store".into()),
            ..Settings::default()
        };
        let options = InstallOptions {
            strategy: Some(LinkingStrategy::Isolated),
            engine_strict: Some(false),
            ..InstallOptions::new("/ws")
        };

        let config = options.effective(&settings).unwrap();
        assert_eq!(config.strategy, LinkingStrategy::Isolated);
        assert!(!config.engine_strict);
        assert_eq!(config.save_prefix, "~");
        assert_eq!(config.store_dir, PathBuf::from("/ws/.store"));
    }

    #[test]
    fn defaults_apply_without_settings() {
        let config = InstallOptions::new("/ws")
            .effective(&Settings::default())
            .unwrap();
        assert_eq!(config.strategy, LinkingStrategy::Isolated);
        assert_eq!(config.save_prefix, "^");
        assert!(config.verify_store_integrity);
        assert!(config.node_version.is_none());
        assert_eq!(config.import_method, ImportMethod::Auto);
    }

    #[test]
    fn node_versions_accept_a_leading_v() {
        let options = InstallOptions {
            node_version: Some("v18.2.0".into()),
            ..InstallOptions::new("/ws")
        };
        let config = options.effective(&Settings::default()).unwrap();
        assert_eq!(config.node_version, Some(Version::new(18, 2, 0)));

        let bad = InstallOptions {
            node_version: Some("eighteen".into()),
            ..InstallOptions::new("/ws")
        };
        assert!(bad.effective(&Settings::default()).is_err());
    }

    #[test]
    fn detected_node_version_is_the_last_resort() {
        let detected = InstallOptions {
            detected_node_version: Some("20.1.0".into()),
            ..InstallOptions::new("/ws")
        };
        let config = detected.effective(&Settings::default()).unwrap();
        assert_eq!(config.node_version, Some(Version::new(20, 1, 0)));

        let settings = Settings {
            node_version: Some("18.0.0".into()),
            ..Settings::default()
        };
        let config = detected.effective(&settings).unwrap();
        assert_eq!(config.node_version, Some(Version::new(18, 0, 0)));
    }

    #[test]
    fn unknown_settings_values_are_rejected() {
        let settings = Settings {
            node_linker: Some("pnp".into()),
            ..Settings::default()
        };
        assert!(InstallOptions::new("/ws").effective(&settings).is_err());
    }
}
