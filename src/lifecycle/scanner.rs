//! Scan orchestration: buckets, then tagged objects, then one verdict each.

use std::io::Write;
use std::time::Instant;

use crate::backend::{self, Identity, StorageBackend};
use crate::clock::Clock;
use crate::lifecycle::{Enumeration, ObjectPages, ObjectPolicy, ScanStats, Verdict};
use crate::Result;

/// Values shared by every evaluation in one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanContext {
    identity: Identity,
    now: f64,
}

impl ScanContext {
    pub fn new(identity: Identity, now: f64) -> Self {
        Self { identity, now }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The single instant all objects in the scan are judged against.
    pub fn now(&self) -> f64 {
        self.now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    EnumeratingBuckets,
    EnumeratingObjects,
    EvaluatingObject,
    Done,
    Failed,
}

/// Applies one policy across a whole storage account.
///
/// Only failing to obtain a backend handle stops a run. A bucket whose
/// listing fails, or an object whose metadata cannot be read, is logged and
/// skipped; the next run picks it up again.
pub struct LifecycleScanner<P> {
    policy: P,
    identity: Identity,
    state: ScanState,
}

impl<P: ObjectPolicy> LifecycleScanner<P> {
    pub fn new(policy: P, identity: Identity) -> Self {
        Self {
            policy,
            identity,
            state: ScanState::Idle,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Connects to `uri`, samples `clock` once and scans.
    ///
    /// The backend handle is released when the scan ends.
    pub fn run(&mut self, uri: &str, clock: &dyn Clock, audit: &mut dyn Write) -> Result<ScanStats> {
        self.transition(ScanState::Idle);
        let now = clock.now();
        let backend = match backend::connect(uri) {
            Ok(backend) => backend,
            Err(err) => {
                self.transition(ScanState::Failed);
                return Err(err);
            }
        };
        Ok(self.scan(backend.as_ref(), now, audit))
    }

    /// Scans an open backend once, judging every object against `now`.
    ///
    /// Writes one diagnostic record per evaluated object to `audit`.
    pub fn scan(
        &mut self,
        backend: &dyn StorageBackend,
        now: f64,
        audit: &mut dyn Write,
    ) -> ScanStats {
        let start = Instant::now();
        let context = ScanContext::new(self.identity.clone(), now);
        let mut stats = ScanStats::new();
        log::info!(
            "{} scan started at {:.6} for key {}",
            self.policy.label(),
            now,
            self.policy.metadata_key()
        );

        self.transition(ScanState::EnumeratingBuckets);
        let buckets = match backend.list_buckets(context.identity()) {
            Ok(buckets) => buckets,
            Err(err) => {
                log::warn!("failed to list buckets: {err}");
                stats.record_bucket_error(format!("bucket listing: {err}"));
                Vec::new()
            }
        };

        for bucket in &buckets {
            self.scan_bucket(backend, &context, bucket, audit, &mut stats);
            self.transition(ScanState::EnumeratingBuckets);
        }

        self.transition(ScanState::Done);
        stats.duration = start.elapsed();
        log::info!("{} scan finished: {}", self.policy.label(), stats.summary());
        stats
    }

    fn scan_bucket(
        &mut self,
        backend: &dyn StorageBackend,
        context: &ScanContext,
        bucket: &str,
        audit: &mut dyn Write,
        stats: &mut ScanStats,
    ) {
        self.transition(ScanState::EnumeratingObjects);
        let key = self.policy.metadata_key().to_owned();
        let pages = ObjectPages::new(backend, context.identity(), bucket, &key);
        let batches: Box<dyn Iterator<Item = Result<Vec<String>>> + '_> =
            match self.policy.enumeration() {
                Enumeration::Batched => Box::new(pages),
                Enumeration::WholeBucket => Box::new(std::iter::once(pages.collect_names())),
            };

        for batch in batches {
            let objects = match batch {
                Ok(objects) => objects,
                Err(err) => {
                    log::warn!("skipping rest of bucket {bucket}: {err}");
                    stats.record_bucket_error(format!("{bucket}: {err}"));
                    return;
                }
            };
            for object in &objects {
                self.process_object(backend, context, bucket, object, audit, stats);
            }
            self.transition(ScanState::EnumeratingObjects);
        }

        stats.buckets_scanned += 1;
    }

    fn process_object(
        &mut self,
        backend: &dyn StorageBackend,
        context: &ScanContext,
        bucket: &str,
        object: &str,
        audit: &mut dyn Write,
        stats: &mut ScanStats,
    ) {
        self.transition(ScanState::EvaluatingObject);
        let evaluation = match self.policy.evaluate(backend, context, bucket, object) {
            Ok(evaluation) => evaluation,
            Err(err) => {
                log::warn!("skipping {bucket}/{object}: {err}");
                stats.record_evaluation_error(format!("{bucket}/{object}: {err}"));
                return;
            }
        };

        if let Err(err) = writeln!(
            audit,
            "Now : [{:.6}] ~ {} : [{:.6}]",
            context.now(),
            self.policy.label(),
            evaluation.threshold
        ) {
            log::warn!("failed to write diagnostic record: {err}");
        }

        let verdict = evaluation.verdict;
        stats.record_verdict(verdict);
        log::debug!("{bucket}/{object}: {verdict:?}");

        let applied = match verdict {
            Verdict::Skip => return,
            Verdict::Delete => backend.delete_object(context.identity(), bucket, object),
            Verdict::SetReadOnly => {
                backend.set_object_read_only(context.identity(), bucket, object)
            }
        };
        match applied {
            Ok(()) => stats.record_applied(verdict),
            Err(err) => {
                log::warn!("{verdict:?} failed for {bucket}/{object}: {err}");
                stats.record_apply_error(format!("{bucket}/{object}: {err}"));
            }
        }
    }

    fn transition(&mut self, next: ScanState) {
        if self.state != next {
            log::trace!("scan state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, ObjectRecord};
    use crate::clock::FixedClock;
    use crate::lifecycle::{encode_f64, ExpiresAt, ReadOnlyAfter, EXPIRES_AT_KEY, READ_ONLY_AFTER_KEY};
    use crate::Error;

    fn expiring(at: f64) -> ObjectRecord {
        ObjectRecord::new(0.0).with_metadata(EXPIRES_AT_KEY, encode_f64(at))
    }

    #[test]
    fn deletes_due_objects_across_buckets() {
        let backend = MemoryBackend::new().with_page_size(1);
        backend.put_object("b1", "old", expiring(10.0)).unwrap();
        backend.put_object("b1", "new", expiring(99.0)).unwrap();
        backend.put_object("b2", "edge", expiring(50.0)).unwrap();
        backend.put_object("b2", "untagged", ObjectRecord::new(0.0)).unwrap();

        let mut scanner = LifecycleScanner::new(ExpiresAt, Identity::default());
        let mut audit = Vec::new();
        let stats = scanner.scan(&backend, 50.0, &mut audit);

        assert_eq!(scanner.state(), ScanState::Done);
        assert_eq!(stats.buckets_scanned, 2);
        assert_eq!(stats.objects_evaluated, 3);
        assert_eq!(stats.deleted, 2);
        assert!(!backend.contains("b1", "old").unwrap());
        assert!(backend.contains("b1", "new").unwrap());
        assert!(!backend.contains("b2", "edge").unwrap());
        assert!(backend.contains("b2", "untagged").unwrap());

        let audit = String::from_utf8(audit).unwrap();
        assert_eq!(audit.lines().count(), 3);
        assert!(audit.contains("Now : [50.000000] ~ ExpiresAt : [10.000000]"));
    }

    #[test]
    fn deletes_due_objects_spanning_several_pages() {
        let backend = MemoryBackend::new().with_page_size(3);
        for i in 0..10 {
            backend.put_object("b", &format!("o{i}"), expiring(1.0)).unwrap();
        }

        let mut scanner = LifecycleScanner::new(ExpiresAt, Identity::default());
        let stats = scanner.scan(&backend, 5.0, &mut std::io::sink());

        assert_eq!(stats.objects_evaluated, 10);
        assert_eq!(stats.deleted, 10);
        assert!(!stats.has_errors());
        for i in 0..10 {
            assert!(!backend.contains("b", &format!("o{i}")).unwrap());
        }
    }

    #[test]
    fn read_only_records_threshold() {
        let backend = MemoryBackend::new();
        backend
            .put_object(
                "b",
                "o",
                ObjectRecord::new(100.0).with_metadata(READ_ONLY_AFTER_KEY, encode_f64(50.0)),
            )
            .unwrap();

        let mut scanner = LifecycleScanner::new(ReadOnlyAfter::new(), Identity::default());
        let mut audit = Vec::new();
        let stats = scanner.scan(&backend, 120.0, &mut audit);

        assert_eq!(stats.made_read_only, 1);
        assert!(backend.object("b", "o").unwrap().unwrap().read_only);
        assert_eq!(
            String::from_utf8(audit).unwrap(),
            "Now : [120.000000] ~ ReadOnlyTime : [150.000000]\n"
        );
    }

    #[test]
    fn unreadable_metadata_is_skipped() {
        let backend = MemoryBackend::new();
        backend
            .put_object(
                "b",
                "short",
                ObjectRecord::new(0.0).with_metadata(EXPIRES_AT_KEY, vec![1u8, 2]),
            )
            .unwrap();
        backend.put_object("b", "due", expiring(1.0)).unwrap();

        let mut scanner = LifecycleScanner::new(ExpiresAt, Identity::default());
        let stats = scanner.scan(&backend, 5.0, &mut std::io::sink());

        assert_eq!(stats.evaluation_errors, 1);
        assert_eq!(stats.deleted, 1);
        assert!(backend.contains("b", "short").unwrap());
    }

    #[test]
    fn rejected_delete_is_counted_not_fatal() {
        let backend = MemoryBackend::new();
        let mut locked = expiring(1.0);
        locked.read_only = true;
        backend.put_object("b", "locked", locked).unwrap();
        backend.put_object("b", "free", expiring(1.0)).unwrap();

        let mut scanner = LifecycleScanner::new(ExpiresAt, Identity::default());
        let stats = scanner.scan(&backend, 5.0, &mut std::io::sink());

        assert_eq!(stats.apply_errors, 1);
        assert_eq!(stats.deleted, 1);
        assert!(backend.contains("b", "locked").unwrap());
        assert_eq!(scanner.state(), ScanState::Done);
    }

    #[test]
    fn connection_failure_is_fatal() {
        let mut scanner = LifecycleScanner::new(ExpiresAt, Identity::default());
        let err = scanner
            .run("nosuch://anywhere", &FixedClock(0.0), &mut std::io::sink())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedUri(_)));
        assert_eq!(scanner.state(), ScanState::Failed);
    }

    #[test]
    fn scanner_starts_idle() {
        let scanner = LifecycleScanner::new(ExpiresAt, Identity::new(7));
        assert_eq!(scanner.state(), ScanState::Idle);
    }
}
