use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Per-file checksums written next to every store entry as `index.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIndex {
    pub integrity: String,
    pub files: BTreeMap<String, FileEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub size: u64,
    pub sha256: String,
}

impl FileIndex {
    pub fn build(package_dir: &Path, integrity: &str) -> io::Result<Self> {
        let files = list_files(package_dir)?;
        let entries = files
            .par_iter()
            .map(|rel| {
                let bytes = fs::read(package_dir.join(rel))?;
                Ok((
                    rel_key(rel),
                    FileEntry {
                        size: bytes.len() as u64,
                        sha256: sha256_hex(&bytes),
                    },
                ))
            })
            .collect::<io::Result<BTreeMap<_, _>>>()?;

        Ok(Self {
            integrity: integrity.to_string(),
            files: entries,
        })
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let content = serde_json::to_vec_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }

    /// Re-hashes the tree; returns the first discrepancy found.
    pub fn verify(&self, package_dir: &Path) -> Result<(), String> {
        let on_disk = list_files(package_dir).map_err(|e| e.to_string())?;
        if on_disk.len() != self.files.len() {
            return Err(format!(
                "expected {} files, found {}",
                self.files.len(),
                on_disk.len()
            ));
        }

        self.files.par_iter().try_for_each(|(rel, entry)| {
            let bytes = fs::read(package_dir.join(rel)).map_err(|e| format!("{rel}: {e}"))?;
            if bytes.len() as u64 != entry.size || sha256_hex(&bytes) != entry.sha256 {
                return Err(format!("{rel} was modified"));
            }
            Ok(())
        })
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn rel_key(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn list_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(rel_dir) = pending.pop() {
        for entry in fs::read_dir(root.join(&rel_dir))? {
            let entry = entry?;
            let rel = rel_dir.join(entry.file_name());
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(rel);
            } else if file_type.is_file() {
                files.push(rel);
            }
        }
    }

    files.sort();
    Ok(files)
}
