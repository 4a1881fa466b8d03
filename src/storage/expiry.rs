//! Lazy Expiration Policy
//!
//! There is no background sweeper. A key's deadline is checked only when an
//! operation touches that key: if `deadline <= now` the entry is removed
//! before the operation runs and the key is treated as absent.
//!
//! A key written once with a TTL and never read again stays in memory until
//! something looks at it (or `FLUSHDB`).
//!
//! This module owns the pure parts of the policy: parsing `EX`/`PX` options,
//! turning them into deadlines, and deciding whether a deadline has passed.
//! The eviction itself happens in [`StorageEngine`](crate::storage::StorageEngine).

use crate::storage::engine::parse_i64;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors raised while parsing a TTL option.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryError {
    /// The duration is not a decimal integer
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// The duration is zero or negative
    #[error("invalid expire time")]
    InvalidExpire,
}

/// A relative time-to-live as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// `EX seconds`
    Seconds(u64),
    /// `PX milliseconds`
    Milliseconds(u64),
}

impl Expiry {
    /// Parses the duration that follows an `EX` (`millis == false`) or
    /// `PX` (`millis == true`) option.
    ///
    /// The numeric check runs before the sign check, so `EX abc` reports
    /// `NotAnInteger` and `EX -5` reports `InvalidExpire`. Numbers follow the
    /// same strict grammar as `INCR`: no sign other than a leading `-`.
    ///
    /// A duration whose deadline cannot be represented is `InvalidExpire`,
    /// so an accepted expiry always yields a deadline.
    pub fn parse(raw: &[u8], millis: bool) -> Result<Self, ExpiryError> {
        let amount = parse_i64(raw).ok_or(ExpiryError::NotAnInteger)?;

        if amount <= 0 {
            return Err(ExpiryError::InvalidExpire);
        }

        let amount = amount as u64;
        let expiry = if millis {
            Expiry::Milliseconds(amount)
        } else {
            Expiry::Seconds(amount)
        };

        if expiry.deadline_from(Instant::now()).is_none() {
            return Err(ExpiryError::InvalidExpire);
        }
        Ok(expiry)
    }

    pub fn duration(&self) -> Duration {
        match *self {
            Expiry::Seconds(s) => Duration::from_secs(s),
            Expiry::Milliseconds(ms) => Duration::from_millis(ms),
        }
    }

    /// Absolute deadline measured from `now`.
    ///
    /// `None` when the deadline is not representable. [`Expiry::parse`]
    /// rejects such durations.
    pub fn deadline_from(&self, now: Instant) -> Option<Instant> {
        now.checked_add(self.duration())
    }
}

/// True when `deadline` exists and is not in the future.
#[inline]
pub fn is_expired(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|at| at <= now)
}

/// Time left before `deadline`, or `None` when there is no deadline.
pub fn remaining(deadline: Option<Instant>, now: Instant) -> Option<Duration> {
    deadline.map(|at| at.saturating_duration_since(now))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds_and_millis() {
        assert_eq!(Expiry::parse(b"10", false), Ok(Expiry::Seconds(10)));
        assert_eq!(Expiry::parse(b"1500", true), Ok(Expiry::Milliseconds(1500)));
        assert_eq!(
            Expiry::Milliseconds(1500).duration(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_parse_rejects_non_integers() {
        assert_eq!(Expiry::parse(b"abc", false), Err(ExpiryError::NotAnInteger));
        assert_eq!(Expiry::parse(b"1.5", true), Err(ExpiryError::NotAnInteger));
        assert_eq!(Expiry::parse(b"", false), Err(ExpiryError::NotAnInteger));
        assert_eq!(Expiry::parse(b"+5", false), Err(ExpiryError::NotAnInteger));
        assert_eq!(Expiry::parse(b" 5", true), Err(ExpiryError::NotAnInteger));
    }

    #[test]
    fn test_parse_rejects_unrepresentable_deadline() {
        assert_eq!(
            Expiry::parse(b"9223372036854775807", false),
            Err(ExpiryError::InvalidExpire)
        );
        assert!(Expiry::parse(b"86400", false)
            .unwrap()
            .deadline_from(Instant::now())
            .is_some());
    }

    #[test]
    fn test_parse_rejects_non_positive() {
        assert_eq!(Expiry::parse(b"0", false), Err(ExpiryError::InvalidExpire));
        assert_eq!(Expiry::parse(b"-5", true), Err(ExpiryError::InvalidExpire));
    }

    #[test]
    fn test_deadline_boundary_is_expired() {
        let now = Instant::now();
        let deadline = Expiry::Seconds(1).deadline_from(now);

        assert!(!is_expired(deadline, now));
        assert!(is_expired(deadline, now + Duration::from_secs(1)));
        assert!(is_expired(deadline, now + Duration::from_secs(2)));
        assert!(!is_expired(None, now + Duration::from_secs(3600)));
    }

    #[test]
    fn test_remaining() {
        let now = Instant::now();
        let deadline = Expiry::Milliseconds(250).deadline_from(now);

        assert_eq!(remaining(deadline, now), Some(Duration::from_millis(250)));
        assert_eq!(
            remaining(deadline, now + Duration::from_secs(1)),
            Some(Duration::ZERO)
        );
        assert_eq!(remaining(None, now), None);
    }
}
