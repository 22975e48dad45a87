//! RAM-backed [`FileStore`].
//!
//! Used by tests and by boards without flash, where buffered readings are
//! lost on reset.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::platform::{FileError, FileStore};

#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: BTreeMap<String, Vec<u8>>,
    mounted: bool,
    /// Total bytes across all files before appends fail with `NoSpace`
    capacity: Option<usize>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn set_capacity(&mut self, capacity: Option<usize>) {
        self.capacity = capacity;
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Raw bytes of `name`, regardless of mount state
    pub fn contents(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    fn used(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    fn check_mounted(&self) -> Result<(), FileError> {
        if self.mounted {
            Ok(())
        } else {
            Err(FileError::NotMounted)
        }
    }
}

impl FileStore for MemoryFileStore {
    fn mount(&mut self) -> Result<(), FileError> {
        self.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) -> Result<(), FileError> {
        self.mounted = false;
        Ok(())
    }

    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), FileError> {
        self.check_mounted()?;
        if let Some(capacity) = self.capacity {
            if self.used() + data.len() > capacity {
                return Err(FileError::NoSpace);
            }
        }
        self.files
            .entry(name.to_string())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn read(&mut self, name: &str, offset: usize, buf: &mut [u8]) -> Result<usize, FileError> {
        self.check_mounted()?;
        let file = self.files.get(name).ok_or(FileError::NotFound)?;
        if offset >= file.len() {
            return Ok(0);
        }
        let count = buf.len().min(file.len() - offset);
        buf[..count].copy_from_slice(&file[offset..offset + count]);
        Ok(count)
    }

    fn remove(&mut self, name: &str) -> Result<(), FileError> {
        self.check_mounted()?;
        self.files
            .remove(name)
            .map(|_| ())
            .ok_or(FileError::NotFound)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), FileError> {
        self.check_mounted()?;
        let data = self.files.remove(from).ok_or(FileError::NotFound)?;
        self.files.insert(to.to_string(), data);
        Ok(())
    }
}
