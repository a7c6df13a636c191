use flate2::Compression;
use flate2::write::GzEncoder;
use indexmap::IndexMap;
use pakt_constants::DEFAULT_TAG;
use pakt_error::{PackageManagerError, Result};
use pakt_store::Integrity;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::client::IndexClient;
use crate::metadata::{Dist, PackageMetadata, PeerMeta, Tarball, VersionMetadata};

/// A package version to publish into a [`MemoryIndex`].
#[derive(Clone, Debug, Default)]
pub struct PublishSpec {
    name: String,
    version: String,
    dependencies: IndexMap<String, String>,
    optional_dependencies: IndexMap<String, String>,
    peer_dependencies: IndexMap<String, String>,
    optional_peers: Vec<String>,
    engines: IndexMap<String, String>,
    os: Vec<String>,
    cpu: Vec<String>,
    bin: IndexMap<String, String>,
    scripts: IndexMap<String, String>,
    files: Vec<(String, String)>,
}

impl PublishSpec {
    #[must_use]
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn dep(mut self, name: &str, range: &str) -> Self {
        self.dependencies.insert(name.to_string(), range.to_string());
        self
    }

    #[must_use]
    pub fn optional_dep(mut self, name: &str, range: &str) -> Self {
        self.optional_dependencies
            .insert(name.to_string(), range.to_string());
        self
    }

    #[must_use]
    pub fn peer(mut self, name: &str, range: &str) -> Self {
        self.peer_dependencies
            .insert(name.to_string(), range.to_string());
        self
    }

    #[must_use]
    pub fn optional_peer(mut self, name: &str, range: &str) -> Self {
        self.optional_peers.push(name.to_string());
        self.peer(name, range)
    }

    #[must_use]
    pub fn engine(mut self, engine: &str, range: &str) -> Self {
        self.engines.insert(engine.to_string(), range.to_string());
        self
    }

    #[must_use]
    pub fn os(mut self, os: &[&str]) -> Self {
        self.os = os.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn cpu(mut self, cpu: &[&str]) -> Self {
        self.cpu = cpu.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn bin(mut self, command: &str, path: &str) -> Self {
        self.bin.insert(command.to_string(), path.to_string());
        self.file(path, "#!/usr/bin/env node\n")
    }

    #[must_use]
    pub fn script(mut self, name: &str, command: &str) -> Self {
        self.scripts.insert(name.to_string(), command.to_string());
        self
    }

    #[must_use]
    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.to_string()));
        self
    }

    fn manifest(&self) -> Value {
        let mut manifest = json!({ "name": self.name, "version": self.version });
        let fields = [
            ("dependencies", &self.dependencies),
            ("optionalDependencies", &self.optional_dependencies),
            ("peerDependencies", &self.peer_dependencies),
            ("engines", &self.engines),
            ("bin", &self.bin),
            ("scripts", &self.scripts),
        ];
        if let Value::Object(map) = &mut manifest {
            for (key, values) in fields {
                if !values.is_empty() {
                    map.insert(key.to_string(), json!(values));
                }
            }
            if !self.os.is_empty() {
                map.insert("os".to_string(), json!(self.os));
            }
            if !self.cpu.is_empty() {
                map.insert("cpu".to_string(), json!(self.cpu));
            }
        }
        manifest
    }

    fn tarball(&self) -> Result<Vec<u8>> {
        let pack_err = |e: std::io::Error| {
            PackageManagerError::StorageFailed(format!("{}@{}", self.name, self.version), e.to_string())
        };
        let manifest = serde_json::to_string_pretty(&self.manifest())
            .map_err(|e| PackageManagerError::PackageJsonError(e.to_string()))?;

        let mut files = vec![
            ("package.json".to_string(), manifest),
            (
                "index.js".to_string(),
                format!("module.exports = \"{}@{}\";\n", self.name, self.version),
            ),
        ];
        files.extend(self.files.iter().cloned());

        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, content) in &files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("package/{path}"), content.as_bytes())
                .map_err(pack_err)?;
        }
        builder
            .into_inner()
            .and_then(GzEncoder::finish)
            .map_err(pack_err)
    }
}

struct MemoryPackage {
    metadata: PackageMetadata,
    tarballs: HashMap<String, Vec<u8>>,
}

/// In-process package index backed by real gzip tarballs.
///
/// Counts every request so callers can assert how often the index was hit.
#[derive(Default)]
pub struct MemoryIndex {
    packages: RwLock<BTreeMap<String, MemoryPackage>>,
    metadata_requests: AtomicUsize,
    tarball_requests: AtomicUsize,
}

impl MemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a version and moves `latest` to the highest stable version.
    pub fn publish(&self, spec: PublishSpec) -> Result<Integrity> {
        let bytes = spec.tarball()?;
        let integrity = Integrity::sha512(&bytes);

        let version_meta = VersionMetadata {
            name: spec.name.clone(),
            version: spec.version.clone(),
            dependencies: spec.dependencies.clone(),
            optional_dependencies: spec.optional_dependencies.clone(),
            peer_dependencies: spec.peer_dependencies.clone(),
            peer_dependencies_meta: spec
                .optional_peers
                .iter()
                .map(|name| (name.clone(), PeerMeta { optional: true }))
                .collect(),
            engines: spec.engines.clone(),
            os: spec.os.clone(),
            cpu: spec.cpu.clone(),
            bin: (!spec.bin.is_empty()).then(|| json!(spec.bin)),
            scripts: spec.scripts.clone(),
            has_install_script: None,
            dist: Dist {
                tarball: format!("memory://{}/-/{}.tgz", spec.name, spec.version),
                integrity: Some(integrity.to_string()),
                shasum: None,
            },
        };

        let mut packages = self.packages.write().unwrap_or_else(PoisonError::into_inner);
        let package = packages
            .entry(spec.name.clone())
            .or_insert_with(|| MemoryPackage {
                metadata: PackageMetadata {
                    name: spec.name.clone(),
                    ..PackageMetadata::default()
                },
                tarballs: HashMap::new(),
            });
        package
            .metadata
            .versions
            .insert(spec.version.clone(), version_meta);
        package.tarballs.insert(spec.version.clone(), bytes);

        let latest = package
            .metadata
            .versions
            .keys()
            .filter_map(|v| semver::Version::parse(v).ok())
            .filter(|v| v.pre.is_empty())
            .max();
        if let Some(latest) = latest {
            package
                .metadata
                .dist_tags
                .insert(DEFAULT_TAG.to_string(), latest.to_string());
        }

        Ok(integrity)
    }

    pub fn add_dist_tag(&self, name: &str, tag: &str, version: &str) {
        let mut packages = self.packages.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(package) = packages.get_mut(name) {
            package
                .metadata
                .dist_tags
                .insert(tag.to_string(), version.to_string());
        }
    }

    #[must_use]
    pub fn metadata_requests(&self) -> usize {
        self.metadata_requests.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn tarball_requests(&self) -> usize {
        self.tarball_requests.load(Ordering::SeqCst)
    }
}

impl IndexClient for MemoryIndex {
    async fn package_metadata(&self, name: &str) -> Result<PackageMetadata> {
        self.metadata_requests.fetch_add(1, Ordering::SeqCst);
        let packages = self.packages.read().unwrap_or_else(PoisonError::into_inner);
        packages
            .get(name)
            .map(|p| p.metadata.clone())
            .ok_or_else(|| PackageManagerError::NotFound(name.to_string(), "*".to_string()))
    }

    async fn fetch_tarball(&self, name: &str, version: &str, _url: &str) -> Result<Tarball> {
        self.tarball_requests.fetch_add(1, Ordering::SeqCst);
        let packages = self.packages.read().unwrap_or_else(PoisonError::into_inner);
        let package = packages
            .get(name)
            .ok_or_else(|| PackageManagerError::NotFound(name.to_string(), version.to_string()))?;
        let bytes = package
            .tarballs
            .get(version)
            .cloned()
            .ok_or_else(|| PackageManagerError::NotFound(name.to_string(), version.to_string()))?;
        let integrity = package
            .metadata
            .versions
            .get(version)
            .and_then(VersionMetadata::integrity);

        Ok(Tarball { bytes, integrity })
    }
}
