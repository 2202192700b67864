//! Human-readable complaint codes.
//!
//! Codes look like `CC-20260115-000042`: the creation date followed by a
//! process-wide monotonic sequence, so lexical order matches creation order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

/// Prefix of every complaint code.
pub const CODE_PREFIX: &str = "CC";

/// Generator of unique complaint codes
pub trait IdGenerator: Send + Sync {
    /// Next unique, sortable code for a complaint created at `now`.
    fn next(&self, now: DateTime<Utc>) -> String;
}

/// Atomic sequence generator
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    last: AtomicU64,
}

impl SequentialIdGenerator {
    /// Start a fresh sequence at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Resume after the highest sequence already issued.
    #[must_use]
    pub const fn resume_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    /// Resume after the highest sequence found among existing codes.
    pub fn resume_from<'a, I: IntoIterator<Item = &'a str>>(codes: I) -> Self {
        let last = codes.into_iter().filter_map(sequence_of).max().unwrap_or(0);
        Self::resume_after(last)
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next(&self, now: DateTime<Utc>) -> String {
        let seq = self.last.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{CODE_PREFIX}-{}-{seq:06}", now.format("%Y%m%d"))
    }
}

#[allow(clippy::expect_used)]
fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^CC-(\d{8})-(\d{6,})$").expect("complaint code pattern"))
}

/// Whether `code` has the complaint-code shape.
#[must_use]
pub fn is_complaint_code(code: &str) -> bool {
    code_pattern().is_match(code)
}

/// Sequence number embedded in a complaint code.
#[must_use]
pub fn sequence_of(code: &str) -> Option<u64> {
    code_pattern()
        .captures(code)
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_codes_are_sequential_and_sortable() {
        let gen = SequentialIdGenerator::new();
        let day = Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap();
        let a = gen.next(day);
        let b = gen.next(day);
        assert_eq!(a, "CC-20260115-000001");
        assert_eq!(b, "CC-20260115-000002");
        assert!(a < b);
    }

    #[test]
    fn test_resume_from_existing_codes() {
        let gen = SequentialIdGenerator::resume_from(["CC-20260101-000007", "CC-20260102-000003"]);
        let day = Utc.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap();
        assert_eq!(gen.next(day), "CC-20260103-000008");
    }

    #[test]
    fn test_code_shape() {
        assert!(is_complaint_code("CC-20260115-000001"));
        assert!(!is_complaint_code("CC-2026-01"));
        assert_eq!(sequence_of("CC-20260115-000042"), Some(42));
    }
}
