use alloc::vec::Vec;

use log::{debug, error, info, warn};

use super::record::{self, LogScan};
use super::{LOG_FILE, REPAIR_FILE, Reading, StoreError};
use crate::platform::{FileError, FileStore};

/// Append-only buffer of readings taken since the last successful upload.
///
/// The store is the only writer of its log file. It tracks how many bytes of
/// the file are known-good so reads never look past a torn append.
///
/// ## Lifecycle
///
/// 1. [`open`](Self::open) mounts the file store and [`recover`](Self::recover)s
///    whatever the previous boot left behind.
/// 2. [`append`](Self::append) once per successful sample.
/// 3. [`drain`](Self::drain) to collect the readings for an upload (the log is
///    left untouched).
/// 4. [`clear`](Self::clear) only after the upload was acknowledged.
pub struct SampleStore<F: FileStore> {
    files: F,
    file_name: &'static str,
    max_records: Option<usize>,
    /// Records in the good prefix of the log
    len: usize,
    /// Bytes in the good prefix of the log
    valid_len: usize,
    /// An append failed and may have left a partial record behind
    needs_repair: bool,
}

impl<F: FileStore> SampleStore<F> {
    /// Mount `files` and recover the existing log.
    pub fn open(mut files: F, max_records: Option<usize>) -> Result<Self, StoreError> {
        files.mount().map_err(|e| {
            error!("Failed to mount file store: {}", e);
            StoreError::File(e)
        })?;

        let mut store = Self {
            files,
            file_name: LOG_FILE,
            max_records,
            len: 0,
            valid_len: 0,
            needs_repair: false,
        };
        // Left over from a repair interrupted by a reset
        match store.files.remove(REPAIR_FILE) {
            Ok(()) => info!("Removed stale {}", REPAIR_FILE),
            Err(FileError::NotFound) => {}
            Err(e) => warn!("Could not remove stale {}: {}", REPAIR_FILE, e),
        }
        let recovered = store.recover()?;
        info!("Sample store opened with {} buffered readings", recovered.len());
        Ok(store)
    }

    /// Number of buffered readings
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn files(&self) -> &F {
        &self.files
    }

    /// Rebuild the in-memory view from the persisted log.
    ///
    /// Records after the first corrupt or partially written one are dropped
    /// and the file is rewritten to hold only the good prefix. The original
    /// log is only replaced once the rewritten copy is complete, so a failed
    /// repair loses nothing and can be retried.
    pub fn recover(&mut self) -> Result<Vec<Reading>, StoreError> {
        let scan = record::scan(&mut self.files, self.file_name, None)?;

        if let Some(e) = scan.error {
            warn!(
                "Discarding {} bytes of {} after byte {}: {}",
                scan.scanned_len - scan.valid_len,
                self.file_name,
                scan.valid_len,
                e
            );
            self.rewrite(&scan)?;
        }

        self.len = scan.readings.len();
        self.valid_len = scan.valid_len;
        self.needs_repair = false;
        debug!("Recovered {} readings ({} bytes)", self.len, self.valid_len);
        Ok(scan.readings)
    }

    /// Persist one reading at the end of the log.
    pub fn append(&mut self, reading: &Reading) -> Result<(), StoreError> {
        if self.needs_repair {
            self.recover()?;
        }

        if let Some(capacity) = self.max_records {
            if self.len >= capacity {
                return Err(StoreError::Full { capacity });
            }
        }

        let line = record::encode(reading).map_err(|_| StoreError::Encode)?;
        if let Err(e) = self.files.append(self.file_name, line.as_bytes()) {
            self.needs_repair = true;
            return Err(e.into());
        }

        self.len += 1;
        self.valid_len += line.len();
        Ok(())
    }

    /// All buffered readings in insertion order. Does not modify the log
    /// unless a committed record went bad, in which case the log is cut back
    /// to the records before it.
    pub fn drain(&mut self) -> Result<Vec<Reading>, StoreError> {
        if self.needs_repair {
            self.recover()?;
        }

        let scan = record::scan(&mut self.files, self.file_name, Some(self.valid_len))?;
        if let Some(e) = scan.error {
            warn!(
                "Corrupt record inside committed log at byte {}: {}",
                scan.valid_len, e
            );
            return self.recover().inspect_err(|_| self.needs_repair = true);
        }
        if scan.readings.len() != self.len {
            warn!(
                "Log holds {} readings, expected {}",
                scan.readings.len(),
                self.len
            );
        }
        Ok(scan.readings)
    }

    /// Remove every buffered reading. Only call after a confirmed upload.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        match self.files.remove(self.file_name) {
            Ok(()) | Err(FileError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        self.len = 0;
        self.valid_len = 0;
        self.needs_repair = false;
        Ok(())
    }

    /// Unmount and hand back the file store.
    pub fn close(mut self) -> Result<F, StoreError> {
        self.files.unmount()?;
        Ok(self.files)
    }

    fn rewrite(&mut self, scan: &LogScan) -> Result<(), StoreError> {
        if scan.readings.is_empty() {
            return match self.files.remove(self.file_name) {
                Ok(()) | Err(FileError::NotFound) => Ok(()),
                Err(e) => Err(e.into()),
            };
        }

        match self.files.remove(REPAIR_FILE) {
            Ok(()) | Err(FileError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        let staged = self.stage(&scan.readings).and_then(|()| {
            self.files
                .rename(REPAIR_FILE, self.file_name)
                .map_err(StoreError::from)
        });
        if let Err(e) = staged {
            error!("Log repair failed, keeping {} as it was: {}", self.file_name, e);
            let _ = self.files.remove(REPAIR_FILE);
            return Err(e);
        }
        Ok(())
    }

    fn stage(&mut self, readings: &[Reading]) -> Result<(), StoreError> {
        for reading in readings {
            let line = record::encode(reading).map_err(|_| StoreError::Encode)?;
            self.files.append(REPAIR_FILE, line.as_bytes())?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn files_mut(&mut self) -> &mut F {
        &mut self.files
    }
}
