//! Presence Report - Offline Member Summary
//!
//! Turns a snapshot of member presence records into the text report the
//! offline checker publishes. Everything in this crate is pure: the same
//! snapshot and the same `now` always produce the same report.
//!
//! # Usage
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use presence_report::{MemberRecord, ReportFormatter, Snapshot};
//!
//! let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
//! let snapshot = Snapshot::new(vec![
//!     MemberRecord::last_online("Alice", now - Duration::minutes(90)),
//!     MemberRecord::on_website("Bob"),
//! ]);
//!
//! let report = ReportFormatter::default().format(&snapshot, now);
//! assert_eq!(report.offline_count, 1);
//! assert_eq!(report.website_count, 1);
//! ```

pub mod format;
pub mod model;
pub mod snapshot;

pub use format::{
    MemberStatus, OfflineFor, Report, ReportFormatter, Thresholds, bucket, relative_timestamp,
    render_line,
};
pub use model::{MemberRecord, Presence, Snapshot};
pub use snapshot::{SnapshotError, parse_timestamp};
