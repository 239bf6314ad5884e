//! In-memory virtual file system, used by tests that exercise `file()`
//! and `include()`/`add_subdirectory()` without touching real disk.
//!
//! A plain synchronous `std::sync::RwLock`-backed store — the evaluator
//! has no suspension points, so there is nothing an async runtime would
//! schedule around here.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::SystemTime;

use super::types::*;

pub struct InMemoryFs {
    data: RwLock<HashMap<String, FsEntry>>,
}

impl InMemoryFs {
    pub fn new() -> Self {
        let mut data = HashMap::new();
        data.insert(
            "/".to_string(),
            FsEntry::Directory {
                mode: 0o755,
                mtime: SystemTime::now(),
            },
        );
        Self {
            data: RwLock::new(data),
        }
    }

    pub fn with_files(files: &InitialFiles) -> Self {
        let fs = Self::new();
        {
            let mut data = fs.data.write().unwrap();
            for (path, init) in files {
                let normalized = normalize_path(path);
                ensure_parent_dirs(&mut data, &normalized);
                let content = match &init.content {
                    FileContent::Text(s) => s.as_bytes().to_vec(),
                    FileContent::Binary(b) => b.clone(),
                };
                data.insert(
                    normalized,
                    FsEntry::File {
                        content,
                        mode: init.mode.unwrap_or(0o644),
                        mtime: init.mtime.unwrap_or_else(SystemTime::now),
                    },
                );
            }
        }
        fs
    }

    pub fn mkdir_sync(&self, path: &str) {
        let mut data = self.data.write().unwrap();
        let normalized = normalize_path(path);
        let parts: Vec<&str> = normalized.split('/').filter(|p| !p.is_empty()).collect();
        let mut current = String::new();
        for part in parts {
            current = format!("{}/{}", current, part);
            data.entry(current.clone()).or_insert(FsEntry::Directory {
                mode: 0o755,
                mtime: SystemTime::now(),
            });
        }
    }

    pub fn write_file_sync(&self, path: &str, content: &[u8]) {
        let mut data = self.data.write().unwrap();
        let normalized = normalize_path(path);
        ensure_parent_dirs(&mut data, &normalized);
        data.insert(
            normalized,
            FsEntry::File {
                content: content.to_vec(),
                mode: 0o644,
                mtime: SystemTime::now(),
            },
        );
    }
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }
    let mut normalized = path.to_string();
    if normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }
    if !normalized.starts_with('/') {
        normalized = format!("/{}", normalized);
    }
    let parts: Vec<&str> = normalized
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    let mut resolved: Vec<&str> = Vec::new();
    for part in parts {
        if part == ".." {
            resolved.pop();
        } else {
            resolved.push(part);
        }
    }
    if resolved.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", resolved.join("/"))
    }
}

fn dirname(path: &str) -> String {
    let normalized = normalize_path(path);
    if normalized == "/" {
        return "/".to_string();
    }
    match normalized.rfind('/') {
        Some(0) => "/".to_string(),
        Some(pos) => normalized[..pos].to_string(),
        None => "/".to_string(),
    }
}

fn ensure_parent_dirs(data: &mut HashMap<String, FsEntry>, path: &str) {
    let dir = dirname(path);
    if dir == "/" {
        return;
    }
    if !data.contains_key(&dir) {
        ensure_parent_dirs(data, &dir);
        data.insert(
            dir,
            FsEntry::Directory {
                mode: 0o755,
                mtime: SystemTime::now(),
            },
        );
    }
}

fn resolve_symlink_target(symlink_path: &str, target: &str) -> String {
    if target.starts_with('/') {
        normalize_path(target)
    } else {
        let dir = dirname(symlink_path);
        if dir == "/" {
            normalize_path(&format!("/{}", target))
        } else {
            normalize_path(&format!("{}/{}", dir, target))
        }
    }
}

fn resolve_path_with_symlinks(
    data: &HashMap<String, FsEntry>,
    path: &str,
    operation: &str,
) -> Result<String, FsError> {
    let normalized = normalize_path(path);
    if normalized == "/" {
        return Ok("/".to_string());
    }
    let parts: Vec<&str> = normalized[1..].split('/').collect();
    let mut resolved = String::new();
    let mut seen = HashSet::new();

    for part in parts {
        resolved = format!("{}/{}", resolved, part);
        let mut entry = data.get(&resolved);
        let mut loop_count = 0;
        const MAX_LOOPS: usize = 40;

        while let Some(FsEntry::Symlink { target, .. }) = entry {
            if loop_count >= MAX_LOOPS || seen.contains(&resolved) {
                return Err(FsError::SymlinkLoop {
                    path: path.to_string(),
                    operation: operation.to_string(),
                });
            }
            seen.insert(resolved.clone());
            resolved = resolve_symlink_target(&resolved, target);
            entry = data.get(&resolved);
            loop_count += 1;
        }
    }
    Ok(resolved)
}

impl FileSystem for InMemoryFs {
    fn read_file(&self, path: &str) -> Result<String, FsError> {
        let buf = self.read_file_buffer(path)?;
        Ok(String::from_utf8_lossy(&buf).to_string())
    }

    fn read_file_buffer(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let data = self.data.read().unwrap();
        let resolved = resolve_path_with_symlinks(&data, path, "open")?;
        match data.get(&resolved) {
            Some(FsEntry::File { content, .. }) => Ok(content.clone()),
            Some(FsEntry::Directory { .. }) => Err(FsError::IsDirectory {
                path: path.to_string(),
                operation: "read".to_string(),
            }),
            _ => Err(FsError::NotFound {
                path: path.to_string(),
                operation: "open".to_string(),
            }),
        }
    }

    fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        let mut data = self.data.write().unwrap();
        let normalized = normalize_path(path);
        if let Some(FsEntry::Directory { .. }) = data.get(&normalized) {
            return Err(FsError::IsDirectory {
                path: path.to_string(),
                operation: "write".to_string(),
            });
        }
        ensure_parent_dirs(&mut data, &normalized);
        data.insert(
            normalized,
            FsEntry::File {
                content: content.to_vec(),
                mode: 0o644,
                mtime: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn append_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        let mut data = self.data.write().unwrap();
        let normalized = normalize_path(path);
        ensure_parent_dirs(&mut data, &normalized);
        match data.get_mut(&normalized) {
            Some(FsEntry::File { content: existing, mtime, .. }) => {
                existing.extend_from_slice(content);
                *mtime = SystemTime::now();
                Ok(())
            }
            Some(FsEntry::Directory { .. }) => Err(FsError::IsDirectory {
                path: path.to_string(),
                operation: "append".to_string(),
            }),
            _ => {
                data.insert(
                    normalized,
                    FsEntry::File {
                        content: content.to_vec(),
                        mode: 0o644,
                        mtime: SystemTime::now(),
                    },
                );
                Ok(())
            }
        }
    }

    fn exists(&self, path: &str) -> bool {
        let data = self.data.read().unwrap();
        resolve_path_with_symlinks(&data, path, "exists")
            .map(|p| data.contains_key(&p))
            .unwrap_or(false)
    }

    fn stat(&self, path: &str) -> Result<FsStat, FsError> {
        let data = self.data.read().unwrap();
        let resolved = resolve_path_with_symlinks(&data, path, "stat")?;
        entry_to_stat(&data, &resolved, path)
    }

    fn lstat(&self, path: &str) -> Result<FsStat, FsError> {
        let data = self.data.read().unwrap();
        let normalized = normalize_path(path);
        entry_to_stat(&data, &normalized, path)
    }

    fn mkdir(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError> {
        let mut data = self.data.write().unwrap();
        let normalized = normalize_path(path);
        if data.contains_key(&normalized) {
            if options.recursive {
                return Ok(());
            }
            return Err(FsError::AlreadyExists {
                path: path.to_string(),
                operation: "mkdir".to_string(),
            });
        }
        if options.recursive {
            ensure_parent_dirs(&mut data, &format!("{}/.", normalized));
        } else {
            let parent = dirname(&normalized);
            if parent != "/" && !data.contains_key(&parent) {
                return Err(FsError::NotFound {
                    path: path.to_string(),
                    operation: "mkdir".to_string(),
                });
            }
        }
        data.insert(
            normalized,
            FsEntry::Directory {
                mode: 0o755,
                mtime: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn readdir(&self, path: &str) -> Result<Vec<String>, FsError> {
        Ok(self
            .readdir_with_file_types(path)?
            .into_iter()
            .map(|e| e.name)
            .collect())
    }

    fn readdir_with_file_types(&self, path: &str) -> Result<Vec<DirentEntry>, FsError> {
        let data = self.data.read().unwrap();
        let resolved = resolve_path_with_symlinks(&data, path, "readdir")?;
        match data.get(&resolved) {
            Some(FsEntry::Directory { .. }) => {}
            Some(_) => {
                return Err(FsError::NotDirectory {
                    path: path.to_string(),
                    operation: "readdir".to_string(),
                })
            }
            None => {
                return Err(FsError::NotFound {
                    path: path.to_string(),
                    operation: "readdir".to_string(),
                })
            }
        }
        let prefix = if resolved == "/" {
            "/".to_string()
        } else {
            format!("{}/", resolved)
        };
        let mut names = Vec::new();
        for key in data.keys() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                if !rest.is_empty() && !rest.contains('/') {
                    let entry = &data[key];
                    names.push(DirentEntry {
                        name: rest.to_string(),
                        is_file: entry.is_file(),
                        is_directory: entry.is_directory(),
                        is_symlink: entry.is_symlink(),
                    });
                }
            }
        }
        names.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(names)
    }

    fn rm(&self, path: &str, options: &RmOptions) -> Result<(), FsError> {
        let mut data = self.data.write().unwrap();
        let normalized = normalize_path(path);
        match data.get(&normalized) {
            None => {
                if options.force {
                    Ok(())
                } else {
                    Err(FsError::NotFound {
                        path: path.to_string(),
                        operation: "rm".to_string(),
                    })
                }
            }
            Some(FsEntry::Directory { .. }) => {
                let prefix = format!("{}/", normalized);
                let children: Vec<String> = data
                    .keys()
                    .filter(|k| k.starts_with(&prefix))
                    .cloned()
                    .collect();
                if !children.is_empty() && !options.recursive {
                    return Err(FsError::NotEmpty {
                        path: path.to_string(),
                        operation: "rm".to_string(),
                    });
                }
                for child in children {
                    data.remove(&child);
                }
                data.remove(&normalized);
                Ok(())
            }
            Some(_) => {
                data.remove(&normalized);
                Ok(())
            }
        }
    }

    fn cp(&self, src: &str, dest: &str, options: &CpOptions) -> Result<(), FsError> {
        let src_content = self.read_file_buffer(src);
        match src_content {
            Ok(content) => self.write_file(dest, &content),
            Err(FsError::IsDirectory { .. }) if options.recursive => {
                let mut data = self.data.write().unwrap();
                let src_norm = normalize_path(src);
                let dest_norm = normalize_path(dest);
                let prefix = format!("{}/", src_norm);
                let entries: Vec<(String, FsEntry)> = data
                    .iter()
                    .filter(|(k, _)| **k == src_norm || k.starts_with(&prefix))
                    .map(|(k, v)| (k.clone(), clone_entry(v)))
                    .collect();
                for (key, entry) in entries {
                    let rel = key.strip_prefix(&src_norm).unwrap_or("");
                    let new_key = format!("{}{}", dest_norm, rel);
                    ensure_parent_dirs(&mut data, &new_key);
                    data.insert(new_key, entry);
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn mv(&self, src: &str, dest: &str) -> Result<(), FsError> {
        self.cp(src, dest, &CpOptions { recursive: true })?;
        self.rm(src, &RmOptions { recursive: true, force: true })
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError> {
        let mut data = self.data.write().unwrap();
        let normalized = normalize_path(path);
        match data.get_mut(&normalized) {
            Some(FsEntry::File { mode: m, .. })
            | Some(FsEntry::Directory { mode: m, .. })
            | Some(FsEntry::Symlink { mode: m, .. }) => {
                *m = mode;
                Ok(())
            }
            None => Err(FsError::NotFound {
                path: path.to_string(),
                operation: "chmod".to_string(),
            }),
        }
    }

    fn symlink(&self, target: &str, link_path: &str) -> Result<(), FsError> {
        let mut data = self.data.write().unwrap();
        let normalized = normalize_path(link_path);
        ensure_parent_dirs(&mut data, &normalized);
        data.insert(
            normalized,
            FsEntry::Symlink {
                target: target.to_string(),
                mode: 0o777,
                mtime: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn readlink(&self, path: &str) -> Result<String, FsError> {
        let data = self.data.read().unwrap();
        let normalized = normalize_path(path);
        match data.get(&normalized) {
            Some(FsEntry::Symlink { target, .. }) => Ok(target.clone()),
            Some(_) => Err(FsError::InvalidArgument {
                path: path.to_string(),
                operation: "readlink".to_string(),
            }),
            None => Err(FsError::NotFound {
                path: path.to_string(),
                operation: "readlink".to_string(),
            }),
        }
    }

    fn realpath(&self, path: &str) -> Result<String, FsError> {
        let data = self.data.read().unwrap();
        let resolved = resolve_path_with_symlinks(&data, path, "realpath")?;
        if data.contains_key(&resolved) {
            Ok(resolved)
        } else {
            Err(FsError::NotFound {
                path: path.to_string(),
                operation: "realpath".to_string(),
            })
        }
    }

    fn resolve_path(&self, base: &str, path: &str) -> String {
        if path.starts_with('/') {
            normalize_path(path)
        } else {
            normalize_path(&format!("{}/{}", base.trim_end_matches('/'), path))
        }
    }
}

fn clone_entry(entry: &FsEntry) -> FsEntry {
    match entry {
        FsEntry::File { content, mode, mtime } => FsEntry::File {
            content: content.clone(),
            mode: *mode,
            mtime: *mtime,
        },
        FsEntry::Directory { mode, mtime } => FsEntry::Directory {
            mode: *mode,
            mtime: *mtime,
        },
        FsEntry::Symlink { target, mode, mtime } => FsEntry::Symlink {
            target: target.clone(),
            mode: *mode,
            mtime: *mtime,
        },
    }
}

fn entry_to_stat(
    data: &HashMap<String, FsEntry>,
    resolved: &str,
    orig_path: &str,
) -> Result<FsStat, FsError> {
    match data.get(resolved) {
        Some(entry @ FsEntry::File { content, .. }) => Ok(FsStat {
            is_file: true,
            is_directory: false,
            is_symlink: false,
            mode: entry.mode(),
            size: content.len() as u64,
            mtime: entry.mtime(),
        }),
        Some(entry @ FsEntry::Directory { .. }) => Ok(FsStat {
            is_file: false,
            is_directory: true,
            is_symlink: false,
            mode: entry.mode(),
            size: 0,
            mtime: entry.mtime(),
        }),
        Some(entry @ FsEntry::Symlink { .. }) => Ok(FsStat {
            is_file: false,
            is_directory: false,
            is_symlink: true,
            mode: entry.mode(),
            size: 0,
            mtime: entry.mtime(),
        }),
        None => Err(FsError::NotFound {
            path: orig_path.to_string(),
            operation: "stat".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let fs = InMemoryFs::new();
        fs.write_file("/a/b.txt", b"hello").unwrap();
        assert_eq!(fs.read_file("/a/b.txt").unwrap(), "hello");
    }

    #[test]
    fn reading_a_directory_is_an_error() {
        let fs = InMemoryFs::new();
        fs.mkdir("/a", &MkdirOptions { recursive: true }).unwrap();
        assert!(matches!(
            fs.read_file("/a"),
            Err(FsError::IsDirectory { .. })
        ));
    }

    #[test]
    fn rm_non_empty_dir_requires_recursive() {
        let fs = InMemoryFs::new();
        fs.write_file("/a/b.txt", b"x").unwrap();
        assert!(matches!(
            fs.rm("/a", &RmOptions::default()),
            Err(FsError::NotEmpty { .. })
        ));
        fs.rm("/a", &RmOptions { recursive: true, force: false })
            .unwrap();
        assert!(!fs.exists("/a"));
    }

    #[test]
    fn symlink_resolution_follows_target() {
        let fs = InMemoryFs::new();
        fs.write_file("/real.txt", b"content").unwrap();
        fs.symlink("/real.txt", "/link.txt").unwrap();
        assert_eq!(fs.read_file("/link.txt").unwrap(), "content");
    }

    #[test]
    fn readdir_lists_direct_children_only() {
        let fs = InMemoryFs::new();
        fs.write_file("/dir/a.txt", b"a").unwrap();
        fs.write_file("/dir/sub/b.txt", b"b").unwrap();
        let names = fs.readdir("/dir").unwrap();
        assert_eq!(names, vec!["a.txt".to_string(), "sub".to_string()]);
    }
}
