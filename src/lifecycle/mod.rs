//! Object lifecycle management.
//!
//! A scan walks every bucket, lists the objects carrying a policy's metadata
//! key page by page, and asks the policy for a verdict on each one:
//! - `ExpiresAt`: delete once the stored timestamp is reached
//! - `ReadOnlyAfter`: set the read-only attribute relative to the last modification
//!
//! # Example
//!
//! ```rust,ignore
//! use object_lifecycle::backend::{connect, Identity};
//! use object_lifecycle::clock::{Clock, SystemClock};
//! use object_lifecycle::lifecycle::{ExpiresAt, LifecycleScanner};
//!
//! let backend = connect("file:///var/lib/objects")?;
//! let mut scanner = LifecycleScanner::new(ExpiresAt, Identity::default());
//!
//! let stats = scanner.scan(backend.as_ref(), SystemClock.now(), &mut std::io::stdout());
//! println!("Deleted {} of {} objects", stats.deleted, stats.objects_evaluated);
//! ```

mod pager;
mod policy;
mod scanner;
mod stats;

pub use pager::ObjectPages;
pub use policy::{
    decode_f64, encode_f64, expiration_verdict, read_only_verdict, Enumeration, Evaluation,
    ExpiresAt, ObjectPolicy, ReadOnlyAfter, ReadOnlySense, Verdict, EXPIRES_AT_KEY,
    READ_ONLY_AFTER_KEY,
};
pub use scanner::{LifecycleScanner, ScanContext, ScanState};
pub use stats::ScanStats;
