// src/auth/timestamp.rs
//! Freshness check for DIDWba credential timestamps.

use chrono::{DateTime, Duration, Utc};
use log::warn;

use crate::error::AuthError;

/// Validates a credential timestamp against `now`.
///
/// Accepts RFC 3339 / ISO-8601 timestamps with a `Z` or numeric offset. The
/// accepted range is `[now - window, now]`, inclusive at both ends. Future
/// timestamps are rejected regardless of how small the skew is.
///
/// # Errors
/// `TimestampInvalid` if the value does not parse, carries no offset, lies in
/// the future, or is older than `window`.
pub fn verify_timestamp(
    timestamp: &str,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<DateTime<Utc>, AuthError> {
    let signed_at = DateTime::parse_from_rfc3339(timestamp.trim())
        .map_err(|e| {
            warn!("Invalid timestamp format {:?}: {}", timestamp, e);
            AuthError::TimestampInvalid
        })?
        .with_timezone(&Utc);

    if signed_at > now {
        warn!("Timestamp is in the future: {}", signed_at);
        return Err(AuthError::TimestampInvalid);
    }

    let age = now - signed_at;
    if age > window {
        warn!("Timestamp expired. Age: {}s", age.num_seconds());
        return Err(AuthError::TimestampInvalid);
    }

    Ok(signed_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{SecondsFormat, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 5, 12, 0, 0).unwrap()
    }

    fn ts(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    #[test]
    fn test_accepts_window_bounds_inclusive() {
        let window = Duration::minutes(5);
        assert!(verify_timestamp(&ts(now()), now(), window).is_ok());
        assert!(verify_timestamp(&ts(now() - window), now(), window).is_ok());
        assert!(verify_timestamp(&ts(now() - Duration::seconds(150)), now(), window).is_ok());
    }

    #[test]
    fn test_rejects_expired_and_future() {
        let window = Duration::minutes(5);
        let expired = ts(now() - window - Duration::seconds(1));
        assert_eq!(
            verify_timestamp(&expired, now(), window),
            Err(AuthError::TimestampInvalid)
        );

        let future = ts(now() + Duration::seconds(1));
        assert_eq!(
            verify_timestamp(&future, now(), window),
            Err(AuthError::TimestampInvalid)
        );
    }

    #[test]
    fn test_offset_suffix_accepted() {
        // 13:58 at +02:00 is 11:58Z, two minutes old
        let result = verify_timestamp("2024-12-05T13:58:00+02:00", now(), Duration::minutes(5));
        assert_eq!(
            result.unwrap(),
            Utc.with_ymd_and_hms(2024, 12, 5, 11, 58, 0).unwrap()
        );
    }

    #[test]
    fn test_rejects_unparseable_or_naive() {
        let window = Duration::minutes(5);
        for value in ["yesterday", "2024-12-05T12:00:00", "", "2024-13-05T12:00:00Z"] {
            assert_eq!(
                verify_timestamp(value, now(), window),
                Err(AuthError::TimestampInvalid),
                "{value}"
            );
        }
    }
}
