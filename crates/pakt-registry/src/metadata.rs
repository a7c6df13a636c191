use indexmap::IndexMap;
use pakt_constants::LIFECYCLE_SCRIPTS;
use pakt_store::{HashAlgorithm, Integrity};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Package document returned by the index (the abbreviated npm format is enough).
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct PackageMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: IndexMap<String, String>,
    #[serde(default)]
    pub versions: IndexMap<String, VersionMetadata>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, deserialize_with = "lenient_map", skip_serializing_if = "IndexMap::is_empty")]
    pub dependencies: IndexMap<String, String>,
    #[serde(default, deserialize_with = "lenient_map", skip_serializing_if = "IndexMap::is_empty")]
    pub optional_dependencies: IndexMap<String, String>,
    #[serde(default, deserialize_with = "lenient_map", skip_serializing_if = "IndexMap::is_empty")]
    pub peer_dependencies: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub peer_dependencies_meta: IndexMap<String, PeerMeta>,
    #[serde(default, deserialize_with = "lenient_map", skip_serializing_if = "IndexMap::is_empty")]
    pub engines: IndexMap<String, String>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub os: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub cpu: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<Value>,
    #[serde(default, deserialize_with = "lenient_map", skip_serializing_if = "IndexMap::is_empty")]
    pub scripts: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_install_script: Option<bool>,
    #[serde(default)]
    pub dist: Dist,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerMeta {
    #[serde(default)]
    pub optional: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Dist {
    #[serde(default)]
    pub tarball: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shasum: Option<String>,
}

/// Tarball bytes plus the integrity the index declared for them.
#[derive(Clone, Debug)]
pub struct Tarball {
    pub bytes: Vec<u8>,
    pub integrity: Option<Integrity>,
}

impl VersionMetadata {
    /// The declared integrity: `dist.integrity`, else the legacy hex `shasum`.
    #[must_use]
    pub fn integrity(&self) -> Option<Integrity> {
        if let Some(parsed) = self.dist.integrity.as_deref().and_then(|s| s.parse().ok()) {
            return Some(parsed);
        }
        let hex = self.dist.shasum.as_deref()?;
        Integrity::from_hex(HashAlgorithm::Sha1, hex)
    }

    /// Normalizes `bin` (a single path or a map) to command → path.
    #[must_use]
    pub fn bin_map(&self) -> IndexMap<String, String> {
        match &self.bin {
            Some(Value::String(path)) => {
                let command = self.name.rsplit('/').next().unwrap_or(&self.name);
                IndexMap::from([(command.to_string(), path.clone())])
            }
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|p| (k.clone(), p.to_string())))
                .collect(),
            _ => IndexMap::new(),
        }
    }

    /// The package runs install lifecycle scripts, i.e. writes into its own tree.
    #[must_use]
    pub fn requires_build(&self) -> bool {
        self.has_install_script.unwrap_or(false)
            || LIFECYCLE_SCRIPTS
                .iter()
                .any(|script| self.scripts.contains_key(*script))
    }
}

// Old publishes carry arrays or strings where objects are expected; treat those as empty.
fn lenient_map<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect(),
        _ => IndexMap::new(),
    })
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => vec![s],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    })
}
