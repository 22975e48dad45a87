//! [`FileStore`] backed by a host directory, standing in for the flash file
//! system. Each file name maps to one file in the directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use climalog_core::platform::{FileError, FileStore};
use log::debug;

pub struct DirFileStore {
    root: PathBuf,
    mounted: bool,
}

impl DirFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mounted: false,
        }
    }

    fn path(&self, name: &str) -> Result<PathBuf, FileError> {
        if !self.mounted {
            return Err(FileError::NotMounted);
        }
        Ok(self.root.join(name))
    }
}

fn map_io(e: io::Error) -> FileError {
    match e.kind() {
        io::ErrorKind::NotFound => FileError::NotFound,
        io::ErrorKind::StorageFull => FileError::NoSpace,
        _ => FileError::Io,
    }
}

impl FileStore for DirFileStore {
    fn mount(&mut self) -> Result<(), FileError> {
        fs::create_dir_all(&self.root).map_err(map_io)?;
        debug!("Mounted {}", self.root.display());
        self.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) -> Result<(), FileError> {
        self.mounted = false;
        Ok(())
    }

    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), FileError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name)?)
            .map_err(map_io)?;
        file.write_all(data).map_err(map_io)?;
        file.sync_data().map_err(map_io)
    }

    fn read(&mut self, name: &str, offset: usize, buf: &mut [u8]) -> Result<usize, FileError> {
        let mut file = File::open(self.path(name)?).map_err(map_io)?;
        file.seek(SeekFrom::Start(offset as u64)).map_err(map_io)?;
        file.read(buf).map_err(map_io)
    }

    fn remove(&mut self, name: &str) -> Result<(), FileError> {
        fs::remove_file(self.path(name)?).map_err(map_io)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), FileError> {
        fs::rename(self.path(from)?, self.path(to)?).map_err(map_io)
    }
}
