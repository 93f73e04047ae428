//! Statistics for lifecycle scans.

use std::time::Duration;

use crate::lifecycle::Verdict;

/// Statistics from one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    /// Buckets whose object listing was walked to the end.
    pub buckets_scanned: usize,

    /// Buckets skipped because their listing failed.
    pub bucket_errors: usize,

    /// Objects that produced a verdict.
    pub objects_evaluated: usize,

    /// Objects left alone by the policy.
    pub objects_skipped: usize,

    /// Objects skipped because their metadata or info could not be read.
    pub evaluation_errors: usize,

    /// Objects deleted.
    pub deleted: usize,

    /// Read-only transitions issued.
    pub made_read_only: usize,

    /// Side effects the backend rejected.
    pub apply_errors: usize,

    /// Messages for every error above, in the order they happened.
    pub errors: Vec<String>,

    /// Time taken for the scan.
    pub duration: Duration,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_verdict(&mut self, verdict: Verdict) {
        self.objects_evaluated += 1;
        if verdict == Verdict::Skip {
            self.objects_skipped += 1;
        }
    }

    /// Record a side effect the backend accepted.
    pub fn record_applied(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Delete => self.deleted += 1,
            Verdict::SetReadOnly => self.made_read_only += 1,
            Verdict::Skip => {}
        }
    }

    pub fn record_bucket_error(&mut self, error: String) {
        self.bucket_errors += 1;
        self.errors.push(error);
    }

    pub fn record_evaluation_error(&mut self, error: String) {
        self.evaluation_errors += 1;
        self.errors.push(error);
    }

    pub fn record_apply_error(&mut self, error: String) {
        self.apply_errors += 1;
        self.errors.push(error);
    }

    pub fn error_count(&self) -> usize {
        self.bucket_errors + self.evaluation_errors + self.apply_errors
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Buckets: {}, Evaluated: {}, Skipped: {}, Deleted: {}, Read-only: {}, Errors: {}, Duration: {:?}",
            self.buckets_scanned,
            self.objects_evaluated,
            self.objects_skipped,
            self.deleted,
            self.made_read_only,
            self.error_count(),
            self.duration
        )
    }
}
