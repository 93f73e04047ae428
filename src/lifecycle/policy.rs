//! Per-object lifecycle policies.
//!
//! A policy names the metadata key that selects its candidates and turns one
//! candidate into a [`Verdict`]. Applying the verdict is the scanner's job.

use crate::backend::StorageBackend;
use crate::lifecycle::ScanContext;
use crate::{Error, Result};

pub const EXPIRES_AT_KEY: &str = "ExpiresAt";
pub const READ_ONLY_AFTER_KEY: &str = "ReadOnlyAfter";

const F64_SIZE: usize = std::mem::size_of::<f64>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Skip,
    Delete,
    SetReadOnly,
}

/// Outcome of evaluating one object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub verdict: Verdict,
    /// The instant the object was compared against `now`.
    pub threshold: f64,
}

/// How a bucket's candidates are fed to the policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Enumeration {
    /// Each listing page is evaluated before the next one is requested.
    #[default]
    Batched,
    /// The whole listing is taken before any object is evaluated. Required
    /// when verdicts remove objects, since removals shift offset cursors.
    WholeBucket,
}

pub trait ObjectPolicy {
    /// Metadata key an object must carry to be evaluated.
    fn metadata_key(&self) -> &str;

    fn enumeration(&self) -> Enumeration {
        Enumeration::Batched
    }

    /// Name printed in the per-object diagnostic record.
    fn label(&self) -> &str;

    fn evaluate(
        &self,
        backend: &dyn StorageBackend,
        context: &ScanContext,
        bucket: &str,
        object: &str,
    ) -> Result<Evaluation>;
}

/// Reads a metadata value as a native-endian `f64`.
///
/// Values shorter than eight bytes are rejected; trailing bytes are ignored.
pub fn decode_f64(value: &[u8]) -> Result<f64> {
    let bytes: [u8; F64_SIZE] = value
        .get(..F64_SIZE)
        .and_then(|head| head.try_into().ok())
        .ok_or(Error::MetadataTooShort { size: value.len() })?;
    Ok(f64::from_ne_bytes(bytes))
}

pub fn encode_f64(value: f64) -> Vec<u8> {
    value.to_ne_bytes().to_vec()
}

pub fn expiration_verdict(now: f64, expires_at: f64) -> Verdict {
    if now >= expires_at {
        Verdict::Delete
    } else {
        Verdict::Skip
    }
}

/// Deletes objects once `now` reaches their `ExpiresAt` timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpiresAt;

impl ExpiresAt {
    pub fn new() -> Self {
        Self
    }
}

impl ObjectPolicy for ExpiresAt {
    fn metadata_key(&self) -> &str {
        EXPIRES_AT_KEY
    }

    fn enumeration(&self) -> Enumeration {
        Enumeration::WholeBucket
    }

    fn label(&self) -> &str {
        "ExpiresAt"
    }

    fn evaluate(
        &self,
        backend: &dyn StorageBackend,
        context: &ScanContext,
        bucket: &str,
        object: &str,
    ) -> Result<Evaluation> {
        let raw = backend.read_object_metadata(context.identity(), bucket, object, EXPIRES_AT_KEY)?;
        let expires_at = decode_f64(&raw)?;
        Ok(Evaluation {
            verdict: expiration_verdict(context.now(), expires_at),
            threshold: expires_at,
        })
    }
}

/// Which side of the read-only threshold triggers the transition.
///
/// The established rule fires while the threshold
/// `last_modification + read_only_after` is still at or after `now`, which
/// is the opposite sense of the expiration rule. It stays the default;
/// `DeadlinePassed` fires once the threshold has been reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadOnlySense {
    /// `last_modification + read_only_after >= now`
    #[default]
    AsRecorded,
    /// `now >= last_modification + read_only_after`
    DeadlinePassed,
}

pub fn read_only_verdict(
    now: f64,
    last_modification: f64,
    read_only_after: f64,
    sense: ReadOnlySense,
) -> Verdict {
    let threshold = last_modification + read_only_after;
    let fire = match sense {
        ReadOnlySense::AsRecorded => threshold >= now,
        ReadOnlySense::DeadlinePassed => now >= threshold,
    };
    if fire {
        Verdict::SetReadOnly
    } else {
        Verdict::Skip
    }
}

/// Makes objects read-only relative to their last modification.
///
/// The transition is reissued on every scan in which the rule holds; the
/// backend treats a repeat as a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlyAfter {
    sense: ReadOnlySense,
}

impl ReadOnlyAfter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sense(sense: ReadOnlySense) -> Self {
        Self { sense }
    }

    pub fn sense(&self) -> ReadOnlySense {
        self.sense
    }
}

impl ObjectPolicy for ReadOnlyAfter {
    fn metadata_key(&self) -> &str {
        READ_ONLY_AFTER_KEY
    }

    fn label(&self) -> &str {
        "ReadOnlyTime"
    }

    fn evaluate(
        &self,
        backend: &dyn StorageBackend,
        context: &ScanContext,
        bucket: &str,
        object: &str,
    ) -> Result<Evaluation> {
        let raw =
            backend.read_object_metadata(context.identity(), bucket, object, READ_ONLY_AFTER_KEY)?;
        let read_only_after = decode_f64(&raw)?;
        let info = backend.object_info(context.identity(), bucket, object)?;
        Ok(Evaluation {
            verdict: read_only_verdict(
                context.now(),
                info.last_modification,
                read_only_after,
                self.sense,
            ),
            threshold: info.last_modification + read_only_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Identity, MemoryBackend, ObjectRecord};

    fn context(now: f64) -> ScanContext {
        ScanContext::new(Identity::default(), now)
    }

    #[test]
    fn decode_requires_eight_bytes() {
        assert_eq!(decode_f64(&encode_f64(1234.5)).unwrap(), 1234.5);
        assert!(matches!(
            decode_f64(&[1, 2, 3]),
            Err(Error::MetadataTooShort { size: 3 })
        ));
        assert!(decode_f64(&[]).is_err());

        let mut long = encode_f64(-2.25);
        long.extend_from_slice(&[0xff, 0xff]);
        assert_eq!(decode_f64(&long).unwrap(), -2.25);
    }

    #[test]
    fn expiration_boundary() {
        assert_eq!(expiration_verdict(1000.0, 1000.0), Verdict::Delete);
        assert_eq!(expiration_verdict(1000.5, 1000.0), Verdict::Delete);
        assert_eq!(expiration_verdict(999.999999, 1000.0), Verdict::Skip);
    }

    #[test]
    fn read_only_threshold_as_recorded() {
        let sense = ReadOnlySense::AsRecorded;
        assert_eq!(read_only_verdict(150.0, 100.0, 50.0, sense), Verdict::SetReadOnly);
        assert_eq!(read_only_verdict(120.0, 100.0, 50.0, sense), Verdict::SetReadOnly);
        assert_eq!(read_only_verdict(150.1, 100.0, 50.0, sense), Verdict::Skip);
    }

    #[test]
    fn read_only_threshold_deadline_passed() {
        let sense = ReadOnlySense::DeadlinePassed;
        assert_eq!(read_only_verdict(150.0, 100.0, 50.0, sense), Verdict::SetReadOnly);
        assert_eq!(read_only_verdict(150.1, 100.0, 50.0, sense), Verdict::SetReadOnly);
        assert_eq!(read_only_verdict(120.0, 100.0, 50.0, sense), Verdict::Skip);
    }

    #[test]
    fn expires_at_reads_metadata() {
        let backend = MemoryBackend::new();
        backend
            .put_object(
                "b",
                "o",
                ObjectRecord::new(0.0).with_metadata(EXPIRES_AT_KEY, encode_f64(1000.0)),
            )
            .unwrap();

        let due = ExpiresAt.evaluate(&backend, &context(1000.0), "b", "o").unwrap();
        assert_eq!(due.verdict, Verdict::Delete);
        assert_eq!(due.threshold, 1000.0);

        let early = ExpiresAt.evaluate(&backend, &context(999.0), "b", "o").unwrap();
        assert_eq!(early.verdict, Verdict::Skip);
    }

    #[test]
    fn read_only_after_uses_last_modification() {
        let backend = MemoryBackend::new();
        backend
            .put_object(
                "b",
                "o",
                ObjectRecord::new(100.0).with_metadata(READ_ONLY_AFTER_KEY, encode_f64(50.0)),
            )
            .unwrap();

        let eval = ReadOnlyAfter::new()
            .evaluate(&backend, &context(150.0), "b", "o")
            .unwrap();
        assert_eq!(eval.verdict, Verdict::SetReadOnly);
        assert_eq!(eval.threshold, 150.0);

        let eval = ReadOnlyAfter::with_sense(ReadOnlySense::DeadlinePassed)
            .evaluate(&backend, &context(149.0), "b", "o")
            .unwrap();
        assert_eq!(eval.verdict, Verdict::Skip);
    }

    #[test]
    fn only_deleting_policy_lists_whole_bucket() {
        assert_eq!(ExpiresAt.enumeration(), Enumeration::WholeBucket);
        assert_eq!(ReadOnlyAfter::new().enumeration(), Enumeration::Batched);
    }

    #[test]
    fn short_metadata_is_an_error() {
        let backend = MemoryBackend::new();
        backend
            .put_object(
                "b",
                "o",
                ObjectRecord::new(0.0).with_metadata(EXPIRES_AT_KEY, vec![0u8; 4]),
            )
            .unwrap();

        let err = ExpiresAt.evaluate(&backend, &context(0.0), "b", "o").unwrap_err();
        assert!(matches!(err, Error::MetadataTooShort { size: 4 }));
    }
}
