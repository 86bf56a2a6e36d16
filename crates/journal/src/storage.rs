//! Byte-oriented storage primitive
//!
//! The only durability contract the journal relies on: `write_file` and
//! `update_file` either leave the prior bytes intact or install the new
//! bytes entirely (temp file + rename on the same filesystem), and
//! `append_file` either extends the file by exactly the given bytes or
//! leaves it unchanged.

use crate::error::JournalError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Plain-file store rooted at a base directory
pub struct Storage {
    base_path: PathBuf,
}

impl Storage {
    /// Open a store rooted at the given directory, creating it if needed
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| JournalError::io(&base_path, e))?;
        Ok(Self { base_path })
    }

    /// Absolute path of a relative entry
    pub fn path(&self, relative: &str) -> PathBuf {
        self.base_path.join(relative)
    }

    /// Create a new file; fails if the path already exists
    pub fn write_file(&self, relative: &str, data: &[u8]) -> Result<(), JournalError> {
        let path = self.path(relative);
        if path.exists() {
            return Err(JournalError::AlreadyExists(path));
        }
        self.install(&path, data)
    }

    /// Overwrite a file, atomically replacing the previous bytes
    pub fn update_file(&self, relative: &str, data: &[u8]) -> Result<(), JournalError> {
        let path = self.path(relative);
        self.install(&path, data)
    }

    /// Append bytes in one write, creating the file when absent
    pub fn append_file(&self, relative: &str, data: &[u8]) -> Result<(), JournalError> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| JournalError::io(parent, e))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| JournalError::io(&path, e))?;
        file.write_all(data).map_err(|e| JournalError::io(&path, e))
    }

    /// Read the whole file; `None` when it does not exist
    pub fn read_file_fully(&self, relative: &str) -> Result<Option<Vec<u8>>, JournalError> {
        let path = self.path(relative);
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(JournalError::io(&path, e)),
        }
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// Remove a file; absent files are not an error
    pub fn remove_file(&self, relative: &str) -> Result<(), JournalError> {
        let path = self.path(relative);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(JournalError::io(&path, e)),
        }
    }

    /// File names directly under a relative directory
    pub fn list(&self, relative: &str) -> Result<Vec<String>, JournalError> {
        let path = self.path(relative);
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(JournalError::io(&path, e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| JournalError::io(&path, e))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn install(&self, path: &Path, data: &[u8]) -> Result<(), JournalError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| JournalError::io(parent, e))?;
        }
        // suffix rather than set_extension: entry names may contain dots
        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);
        fs::write(&temp, data).map_err(|e| JournalError::io(&temp, e))?;
        fs::rename(&temp, path).map_err(|e| JournalError::io(path, e))
    }
}
