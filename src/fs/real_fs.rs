//! `std::fs`-backed [`FileSystem`] implementation used by the CLI binary:
//! a thin, literal adapter from [`FileSystem`] onto `std::fs`, with errors
//! translated into the shared `FsError` taxonomy.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::types::*;

pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealFs {
    fn default() -> Self {
        Self::new()
    }
}

fn translate_io_error(err: std::io::Error, path: &str, operation: &str) -> FsError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::NotFound => FsError::NotFound {
            path: path.to_string(),
            operation: operation.to_string(),
        },
        ErrorKind::AlreadyExists => FsError::AlreadyExists {
            path: path.to_string(),
            operation: operation.to_string(),
        },
        ErrorKind::PermissionDenied => FsError::PermissionDenied {
            path: path.to_string(),
            operation: operation.to_string(),
        },
        _ => FsError::Other {
            message: format!("{operation} '{path}': {err}"),
        },
    }
}

impl FileSystem for RealFs {
    fn read_file(&self, path: &str) -> Result<String, FsError> {
        fs::read_to_string(path).map_err(|e| translate_io_error(e, path, "open"))
    }

    fn read_file_buffer(&self, path: &str) -> Result<Vec<u8>, FsError> {
        fs::read(path).map_err(|e| translate_io_error(e, path, "open"))
    }

    fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| translate_io_error(e, path, "write"))?;
            }
        }
        fs::write(path, content).map_err(|e| translate_io_error(e, path, "write"))
    }

    fn append_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        use std::io::Write;
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| translate_io_error(e, path, "append"))?;
            }
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| translate_io_error(e, path, "append"))?;
        file.write_all(content)
            .map_err(|e| translate_io_error(e, path, "append"))
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn stat(&self, path: &str) -> Result<FsStat, FsError> {
        let meta = fs::metadata(path).map_err(|e| translate_io_error(e, path, "stat"))?;
        Ok(metadata_to_stat(&meta))
    }

    fn lstat(&self, path: &str) -> Result<FsStat, FsError> {
        let meta = fs::symlink_metadata(path).map_err(|e| translate_io_error(e, path, "lstat"))?;
        Ok(metadata_to_stat(&meta))
    }

    fn mkdir(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError> {
        let result = if options.recursive {
            fs::create_dir_all(path)
        } else {
            fs::create_dir(path)
        };
        result.map_err(|e| translate_io_error(e, path, "mkdir"))
    }

    fn readdir(&self, path: &str) -> Result<Vec<String>, FsError> {
        let mut names: Vec<String> = fs::read_dir(path)
            .map_err(|e| translate_io_error(e, path, "readdir"))?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    fn readdir_with_file_types(&self, path: &str) -> Result<Vec<DirentEntry>, FsError> {
        let mut entries: Vec<DirentEntry> = fs::read_dir(path)
            .map_err(|e| translate_io_error(e, path, "readdir"))?
            .filter_map(|e| e.ok())
            .map(|e| {
                let file_type = e.file_type().ok();
                DirentEntry {
                    name: e.file_name().to_string_lossy().to_string(),
                    is_file: file_type.map(|t| t.is_file()).unwrap_or(false),
                    is_directory: file_type.map(|t| t.is_dir()).unwrap_or(false),
                    is_symlink: file_type.map(|t| t.is_symlink()).unwrap_or(false),
                }
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn rm(&self, path: &str, options: &RmOptions) -> Result<(), FsError> {
        let p = Path::new(path);
        if !p.exists() {
            return if options.force {
                Ok(())
            } else {
                Err(FsError::NotFound {
                    path: path.to_string(),
                    operation: "rm".to_string(),
                })
            };
        }
        let result = if p.is_dir() {
            if options.recursive {
                fs::remove_dir_all(p)
            } else {
                fs::remove_dir(p)
            }
        } else {
            fs::remove_file(p)
        };
        result.map_err(|e| translate_io_error(e, path, "rm"))
    }

    fn cp(&self, src: &str, dest: &str, options: &CpOptions) -> Result<(), FsError> {
        let src_path = Path::new(src);
        if src_path.is_dir() {
            if !options.recursive {
                return Err(FsError::IsDirectory {
                    path: src.to_string(),
                    operation: "cp".to_string(),
                });
            }
            copy_dir_recursive(src_path, Path::new(dest))
                .map_err(|e| translate_io_error(e, src, "cp"))
        } else {
            if let Some(parent) = Path::new(dest).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|e| translate_io_error(e, dest, "cp"))?;
                }
            }
            fs::copy(src, dest)
                .map(|_| ())
                .map_err(|e| translate_io_error(e, src, "cp"))
        }
    }

    fn mv(&self, src: &str, dest: &str) -> Result<(), FsError> {
        fs::rename(src, dest).map_err(|e| translate_io_error(e, src, "mv"))
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(mode);
            fs::set_permissions(path, perms).map_err(|e| translate_io_error(e, path, "chmod"))
        }
        #[cfg(not(unix))]
        {
            let _ = mode;
            Ok(())
        }
    }

    fn symlink(&self, target: &str, link_path: &str) -> Result<(), FsError> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link_path)
                .map_err(|e| translate_io_error(e, link_path, "symlink"))
        }
        #[cfg(not(unix))]
        {
            let _ = (target, link_path);
            Err(FsError::Other {
                message: "symlinks unsupported on this platform".to_string(),
            })
        }
    }

    fn readlink(&self, path: &str) -> Result<String, FsError> {
        fs::read_link(path)
            .map(|p| p.to_string_lossy().to_string())
            .map_err(|e| translate_io_error(e, path, "readlink"))
    }

    fn realpath(&self, path: &str) -> Result<String, FsError> {
        fs::canonicalize(path)
            .map(|p| p.to_string_lossy().to_string())
            .map_err(|e| translate_io_error(e, path, "realpath"))
    }

    fn resolve_path(&self, base: &str, path: &str) -> String {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_string_lossy().to_string()
        } else {
            Path::new(base).join(p).to_string_lossy().to_string()
        }
    }
}

fn metadata_to_stat(meta: &fs::Metadata) -> FsStat {
    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode()
    };
    #[cfg(not(unix))]
    let mode = if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    };

    FsStat {
        is_file: meta.is_file(),
        is_directory: meta.is_dir(),
        is_symlink: meta.file_type().is_symlink(),
        mode,
        size: meta.len(),
        mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to: PathBuf = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips_on_disk() {
        let tmp_dir = tempdir::TempDir::new("nobify_real_fs").unwrap();
        let fs = RealFs::new();
        let path = tmp_dir.path().join("out.txt");
        let path = path.to_str().unwrap();
        fs.write_file(path, b"hello").unwrap();
        assert_eq!(fs.read_file(path).unwrap(), "hello");
    }

    #[test]
    fn readdir_with_file_types_distinguishes_files_and_directories() {
        let tmp_dir = tempdir::TempDir::new("nobify_real_fs").unwrap();
        let fs = RealFs::new();
        let root = tmp_dir.path().to_str().unwrap().to_string();
        fs.write_file(&format!("{root}/a.txt"), b"x").unwrap();
        fs.mkdir(&format!("{root}/sub"), &MkdirOptions { recursive: true }).unwrap();

        let entries = fs.readdir_with_file_types(&root).unwrap();
        let file = entries.iter().find(|e| e.name == "a.txt").unwrap();
        let dir = entries.iter().find(|e| e.name == "sub").unwrap();
        assert!(file.is_file && !file.is_directory);
        assert!(dir.is_directory && !dir.is_file);
    }

    #[test]
    fn readdir_with_file_types_is_an_error_on_a_missing_directory() {
        let tmp_dir = tempdir::TempDir::new("nobify_real_fs").unwrap();
        let fs = RealFs::new();
        let missing = tmp_dir.path().join("does-not-exist");
        assert!(fs.readdir_with_file_types(missing.to_str().unwrap()).is_err());
    }

    #[test]
    fn mkdir_non_recursive_fails_without_a_parent() {
        let tmp_dir = tempdir::TempDir::new("nobify_real_fs").unwrap();
        let fs = RealFs::new();
        let nested = tmp_dir.path().join("a").join("b");
        assert!(fs
            .mkdir(nested.to_str().unwrap(), &MkdirOptions { recursive: false })
            .is_err());
    }
}
