//! File System Types
//!
//! Core types and the synchronous [`FileSystem`] trait used by `file()`.
//! The evaluator is single-threaded with no suspension points, so this
//! trait is plain sync rather than `async_trait`-based.

use std::collections::HashMap;
use std::time::SystemTime;
use thiserror::Error;

/// File system errors
#[derive(Error, Debug, Clone)]
pub enum FsError {
    #[error("ENOENT: no such file or directory, {operation} '{path}'")]
    NotFound { path: String, operation: String },

    #[error("EEXIST: file already exists, {operation} '{path}'")]
    AlreadyExists { path: String, operation: String },

    #[error("EISDIR: illegal operation on a directory, {operation} '{path}'")]
    IsDirectory { path: String, operation: String },

    #[error("ENOTDIR: not a directory, {operation} '{path}'")]
    NotDirectory { path: String, operation: String },

    #[error("ENOTEMPTY: directory not empty, {operation} '{path}'")]
    NotEmpty { path: String, operation: String },

    #[error("EINVAL: invalid argument, {operation} '{path}'")]
    InvalidArgument { path: String, operation: String },

    #[error("ELOOP: too many levels of symbolic links, {operation} '{path}'")]
    SymlinkLoop { path: String, operation: String },

    #[error("EPERM: operation not permitted, {operation} '{path}'")]
    PermissionDenied { path: String, operation: String },

    #[error("EROFS: read-only file system, {operation}")]
    ReadOnly { operation: String },

    #[error("Security Violation: {message}")]
    SecurityViolation { message: String },

    #[error("{message}")]
    Other { message: String },
}

/// Supported buffer encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferEncoding {
    #[default]
    Utf8,
    Ascii,
    Binary,
    Hex,
    Latin1,
}

impl BufferEncoding {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "utf8" | "utf-8" => Some(Self::Utf8),
            "ascii" => Some(Self::Ascii),
            "binary" => Some(Self::Binary),
            "hex" => Some(Self::Hex),
            "latin1" => Some(Self::Latin1),
            _ => None,
        }
    }
}

/// File content type
#[derive(Debug, Clone)]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl From<String> for FileContent {
    fn from(s: String) -> Self {
        FileContent::Text(s)
    }
}

impl From<&str> for FileContent {
    fn from(s: &str) -> Self {
        FileContent::Text(s.to_string())
    }
}

impl From<Vec<u8>> for FileContent {
    fn from(v: Vec<u8>) -> Self {
        FileContent::Binary(v)
    }
}

/// File system entry types
#[derive(Debug, Clone)]
pub enum FsEntry {
    File {
        content: Vec<u8>,
        mode: u32,
        mtime: SystemTime,
    },
    Directory {
        mode: u32,
        mtime: SystemTime,
    },
    Symlink {
        target: String,
        mode: u32,
        mtime: SystemTime,
    },
}

impl FsEntry {
    pub fn is_file(&self) -> bool {
        matches!(self, FsEntry::File { .. })
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, FsEntry::Directory { .. })
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, FsEntry::Symlink { .. })
    }

    pub fn mode(&self) -> u32 {
        match self {
            FsEntry::File { mode, .. } => *mode,
            FsEntry::Directory { mode, .. } => *mode,
            FsEntry::Symlink { mode, .. } => *mode,
        }
    }

    pub fn mtime(&self) -> SystemTime {
        match self {
            FsEntry::File { mtime, .. } => *mtime,
            FsEntry::Directory { mtime, .. } => *mtime,
            FsEntry::Symlink { mtime, .. } => *mtime,
        }
    }
}

/// File status information
#[derive(Debug, Clone)]
pub struct FsStat {
    pub is_file: bool,
    pub is_directory: bool,
    pub is_symlink: bool,
    pub mode: u32,
    pub size: u64,
    pub mtime: SystemTime,
}

/// Directory entry with type information
#[derive(Debug, Clone)]
pub struct DirentEntry {
    pub name: String,
    pub is_file: bool,
    pub is_directory: bool,
    pub is_symlink: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MkdirOptions {
    pub recursive: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RmOptions {
    pub recursive: bool,
    pub force: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CpOptions {
    pub recursive: bool,
}

/// Initial file specification with optional metadata
#[derive(Debug, Clone)]
pub struct FileInit {
    pub content: FileContent,
    pub mode: Option<u32>,
    pub mtime: Option<SystemTime>,
}

impl From<String> for FileInit {
    fn from(s: String) -> Self {
        FileInit {
            content: FileContent::Text(s),
            mode: None,
            mtime: None,
        }
    }
}

impl From<&str> for FileInit {
    fn from(s: &str) -> Self {
        FileInit {
            content: FileContent::Text(s.to_string()),
            mode: None,
            mtime: None,
        }
    }
}

pub type InitialFiles = HashMap<String, FileInit>;

/// Abstract filesystem interface implemented by different backends
/// (in-memory for tests, real disk for the CLI). Synchronous: the
/// evaluator has no suspension points.
pub trait FileSystem {
    fn read_file(&self, path: &str) -> Result<String, FsError>;
    fn read_file_buffer(&self, path: &str) -> Result<Vec<u8>, FsError>;
    fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError>;
    fn append_file(&self, path: &str, content: &[u8]) -> Result<(), FsError>;
    fn exists(&self, path: &str) -> bool;
    fn stat(&self, path: &str) -> Result<FsStat, FsError>;
    fn lstat(&self, path: &str) -> Result<FsStat, FsError>;
    fn mkdir(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError>;
    fn readdir(&self, path: &str) -> Result<Vec<String>, FsError>;
    fn readdir_with_file_types(&self, path: &str) -> Result<Vec<DirentEntry>, FsError>;
    fn rm(&self, path: &str, options: &RmOptions) -> Result<(), FsError>;
    fn cp(&self, src: &str, dest: &str, options: &CpOptions) -> Result<(), FsError>;
    fn mv(&self, src: &str, dest: &str) -> Result<(), FsError>;
    fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError>;
    fn symlink(&self, target: &str, link_path: &str) -> Result<(), FsError>;
    fn readlink(&self, path: &str) -> Result<String, FsError>;
    fn realpath(&self, path: &str) -> Result<String, FsError>;
    fn resolve_path(&self, base: &str, path: &str) -> String;
}

/// Convert content to bytes with encoding
pub fn to_buffer(content: &FileContent, encoding: BufferEncoding) -> Vec<u8> {
    match content {
        FileContent::Binary(bytes) => bytes.clone(),
        FileContent::Text(text) => match encoding {
            BufferEncoding::Hex => hex::decode(text.trim()).unwrap_or_default(),
            BufferEncoding::Binary | BufferEncoding::Latin1 => {
                text.chars().map(|c| c as u8).collect()
            }
            BufferEncoding::Utf8 | BufferEncoding::Ascii => text.as_bytes().to_vec(),
        },
    }
}

/// Convert bytes to string with encoding
pub fn from_buffer(buffer: &[u8], encoding: BufferEncoding) -> String {
    match encoding {
        BufferEncoding::Hex => hex::encode(buffer),
        BufferEncoding::Binary | BufferEncoding::Latin1 => {
            buffer.iter().map(|&b| b as char).collect()
        }
        BufferEncoding::Utf8 | BufferEncoding::Ascii => String::from_utf8_lossy(buffer).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_encoding_from_str_is_case_insensitive() {
        assert_eq!(BufferEncoding::from_str("utf8"), Some(BufferEncoding::Utf8));
        assert_eq!(BufferEncoding::from_str("UTF-8"), Some(BufferEncoding::Utf8));
        assert_eq!(BufferEncoding::from_str("HEX"), Some(BufferEncoding::Hex));
        assert_eq!(BufferEncoding::from_str("invalid"), None);
    }

    #[test]
    fn hex_round_trip() {
        let data = b"Hello";
        let encoded = from_buffer(data, BufferEncoding::Hex);
        assert_eq!(encoded, "48656c6c6f");
        let decoded = to_buffer(&FileContent::Text(encoded), BufferEncoding::Hex);
        assert_eq!(decoded, data);
    }

    #[test]
    fn fs_entry_methods() {
        let file = FsEntry::File {
            content: vec![],
            mode: 0o644,
            mtime: SystemTime::now(),
        };
        assert!(file.is_file());
        assert!(!file.is_directory());
        assert_eq!(file.mode(), 0o644);
    }
}
