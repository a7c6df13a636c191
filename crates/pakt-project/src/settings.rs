use serde::{Deserialize, Serialize};

/// Install settings kept in the root manifest under `"pakt"`.
///
/// Every field is optional; explicit install options take precedence.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_linker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_strict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_exact: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_import_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_store_integrity: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_concurrency: Option<usize>,
}
