use flate2::read::GzDecoder;
use pakt_constants::{STORE_PACKAGE_DIR, TEMP_PREFIX};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tar::Archive;

/// Unpacks a gzipped package tarball so that `dest` holds the package root.
///
/// Entries are unpacked into a temporary sibling of `dest` and the single
/// top-level directory of the archive is renamed into place. `dest` must not
/// exist yet.
pub fn extract_tarball(bytes: &[u8], dest: &Path) -> io::Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| io::Error::other("destination has no parent"))?;
    fs::create_dir_all(parent)?;

    let temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir_in(parent)?;
    unpack_sanitized(bytes, temp.path())?;

    let root = find_extracted_root(temp.path())?;
    fs::rename(&root, dest)?;
    Ok(())
}

fn unpack_sanitized(bytes: &[u8], dest: &Path) -> io::Result<()> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    let mut seen_entry = false;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        if path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("tarball entry escapes destination: {}", path.display()),
            ));
        }

        let dest_path = dest.join(&path);
        let kind = entry.header().entry_type();
        if kind.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else if kind.is_file() {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&dest_path)?;
            io::copy(&mut entry, &mut file)?;

            #[cfg(unix)]
            if let Ok(mode) = entry.header().mode() {
                use std::os::unix::fs::PermissionsExt;
                // Keep the exec bits, drop anything group/world writable.
                let _ = fs::set_permissions(&dest_path, fs::Permissions::from_mode((mode & 0o755) | 0o644));
            }
        }
        // Links and device entries are skipped.
        seen_entry = true;
    }

    if seen_entry {
        Ok(())
    } else {
        Err(io::Error::new(io::ErrorKind::InvalidData, "tarball is empty"))
    }
}

/// npm tarballs normally wrap everything in `package/`; some use another single directory.
fn find_extracted_root(temp_dir: &Path) -> io::Result<PathBuf> {
    let package_dir = temp_dir.join(STORE_PACKAGE_DIR);
    if package_dir.is_dir() {
        return Ok(package_dir);
    }

    let dirs: Vec<PathBuf> = fs::read_dir(temp_dir)?
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| e.path())
        .collect();

    match dirs.as_slice() {
        [only] => Ok(only.clone()),
        // Loose files at the top level: the whole archive is the package.
        _ => Ok(temp_dir.to_path_buf()),
    }
}

#[cfg(test)]
pub(crate) fn pack_for_tests(files: &[(&str, &str)]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}
