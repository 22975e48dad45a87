//! Pipeline counters
//!
//! Cumulative since the pipeline was built. Boards log or display them; the
//! pipeline itself never acts on them.

use crate::clock::SyncEvent;
use crate::sampling::SamplingOutcome;
use crate::upload::UploadOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineMetrics {
    pub ticks: u64,
    pub reconnect_attempts: u32,
    pub syncs_ok: u32,
    pub syncs_failed: u32,
    pub samples_stored: u32,
    pub sensor_failures: u32,
    pub store_failures: u32,
    pub uploads_ok: u32,
    pub uploads_failed: u32,
    pub readings_uploaded: u64,
}

impl PipelineMetrics {
    pub fn record_sync(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::Synced(_) => self.syncs_ok += 1,
            SyncEvent::Failed(_) => self.syncs_failed += 1,
            SyncEvent::Idle | SyncEvent::Requested | SyncEvent::Awaiting => {}
        }
    }

    pub fn record_sampling(&mut self, outcome: &SamplingOutcome) {
        match outcome {
            SamplingOutcome::Stored(_) => self.samples_stored += 1,
            SamplingOutcome::ReadFailed(_) => self.sensor_failures += 1,
            SamplingOutcome::StoreFailed(..) => self.store_failures += 1,
            _ => {}
        }
    }

    pub fn record_upload(&mut self, outcome: &UploadOutcome) {
        match outcome {
            UploadOutcome::Delivered { count, .. } => {
                self.uploads_ok += 1;
                self.readings_uploaded += *count as u64;
            }
            UploadOutcome::Rejected { .. } | UploadOutcome::Failed(_) | UploadOutcome::EncodeFailed => {
                self.uploads_failed += 1
            }
            UploadOutcome::StoreFailed(_) => self.store_failures += 1,
            UploadOutcome::ClearFailed(_) => {
                // Delivered, but the readings will go out again
                self.uploads_ok += 1;
                self.store_failures += 1;
            }
            UploadOutcome::NotDue | UploadOutcome::Deferred(_) | UploadOutcome::Empty => {}
        }
    }
}
