use pakt_utils::relative_path;
use std::fmt;
use std::str::FromStr;
use std::{fs, io, path::Path};

/// How package content is brought from the store into `node_modules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMethod {
    /// Hard link, falling back to a copy when linking fails (e.g. across devices).
    #[default]
    Auto,
    Hardlink,
    Copy,
}

impl FromStr for ImportMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "hardlink" => Ok(Self::Hardlink),
            "copy" => Ok(Self::Copy),
            other => Err(format!("unknown import method '{other}'")),
        }
    }
}

impl fmt::Display for ImportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Hardlink => "hardlink",
            Self::Copy => "copy",
        })
    }
}

pub struct PackageLinker;

impl PackageLinker {
    /// Populates `dest` (which must not exist) from the store directory `src`.
    ///
    /// Returns the method that was actually used.
    pub fn import_package(src: &Path, dest: &Path, method: ImportMethod) -> io::Result<ImportMethod> {
        match method {
            ImportMethod::Copy => {
                Self::copy_tree(src, dest)?;
                Ok(ImportMethod::Copy)
            }
            ImportMethod::Hardlink => {
                Self::hardlink_tree(src, dest)?;
                Ok(ImportMethod::Hardlink)
            }
            ImportMethod::Auto => match Self::hardlink_tree(src, dest) {
                Ok(()) => Ok(ImportMethod::Hardlink),
                Err(_) => {
                    Self::remove_path(dest)?;
                    Self::copy_tree(src, dest)?;
                    Ok(ImportMethod::Copy)
                }
            },
        }
    }

    fn hardlink_tree(src: &Path, dest: &Path) -> io::Result<()> {
        let mut pending = vec![(src.to_path_buf(), dest.to_path_buf())];
        while let Some((from, to)) = pending.pop() {
            fs::create_dir_all(&to)?;
            for entry in fs::read_dir(&from)? {
                let entry = entry?;
                let target = to.join(entry.file_name());
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    pending.push((entry.path(), target));
                } else if file_type.is_file() {
                    fs::hard_link(entry.path(), &target)?;
                }
            }
        }
        Ok(())
    }

    fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
        fs::create_dir_all(dest)?;
        fs_extra::dir::copy(
            src,
            dest,
            &fs_extra::dir::CopyOptions::new()
                .overwrite(true)
                .content_only(true),
        )
        .map_err(io::Error::other)?;
        Ok(())
    }

    /// Creates a directory symlink at `link` pointing to `target` by a relative path.
    pub fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
        let parent = link
            .parent()
            .ok_or_else(|| io::Error::other("symlink has no parent directory"))?;
        fs::create_dir_all(parent)?;
        let relative = relative_path(parent, target);

        #[cfg(target_family = "unix")]
        std::os::unix::fs::symlink(&relative, link)?;

        #[cfg(target_family = "windows")]
        std::os::windows::fs::symlink_dir(&relative, link)?;

        Ok(())
    }

    /// True when `link` is a symlink whose relative content points at `target`.
    #[must_use]
    pub fn symlink_points_to(link: &Path, target: &Path) -> bool {
        let Some(parent) = link.parent() else {
            return false;
        };
        fs::read_link(link).is_ok_and(|current| current == relative_path(parent, target))
    }

    /// Removes a file, a symlink (without following it) or a directory tree.
    pub fn remove_path(path: &Path) -> io::Result<()> {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path).or_else(|e| {
                // Windows directory symlinks need remove_dir.
                if path.is_dir() { fs::remove_dir(path) } else { Err(e) }
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
