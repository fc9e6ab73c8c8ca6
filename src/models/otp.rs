use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Latest one-time token for a user. One row per user, upserted on reissue.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OneTimeToken {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub token: i64,
    pub expires_at: DateTime,
    pub created_at: DateTime,
}

#[derive(Debug, PartialEq, Eq)]
pub enum OtpOutcome {
    Match,
    Mismatch,
    Expired,
}

impl OneTimeToken {
    pub const VALIDITY_MINUTES: i64 = 15;

    /// Expiry is checked before the token value: an expired token is always
    /// rejected as expired, even when the digits happen to match.
    pub fn check(&self, entered: i64, now: DateTime) -> OtpOutcome {
        if self.expires_at <= now {
            OtpOutcome::Expired
        } else if self.token != entered {
            OtpOutcome::Mismatch
        } else {
            OtpOutcome::Match
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_expiring_in(ms: i64) -> OneTimeToken {
        let now = DateTime::now();
        OneTimeToken {
            id: None,
            user_id: ObjectId::new(),
            token: 123456,
            expires_at: DateTime::from_millis(now.timestamp_millis() + ms),
            created_at: now,
        }
    }

    #[test]
    fn live_token_matches() {
        let otp = token_expiring_in(60_000);
        assert_eq!(otp.check(123456, DateTime::now()), OtpOutcome::Match);
    }

    #[test]
    fn repeat_check_after_a_match_still_matches() {
        // The verify route's only side effect is re-setting is_verified,
        // so a second successful attempt changes nothing.
        let otp = token_expiring_in(60_000);
        assert_eq!(otp.check(123456, DateTime::now()), OtpOutcome::Match);
        assert_eq!(otp.check(123456, DateTime::now()), OtpOutcome::Match);
    }

    #[test]
    fn wrong_digits_mismatch() {
        let otp = token_expiring_in(60_000);
        assert_eq!(otp.check(654321, DateTime::now()), OtpOutcome::Mismatch);
    }

    #[test]
    fn expired_token_is_expired_even_when_digits_match() {
        let otp = token_expiring_in(-1_000);
        assert_eq!(otp.check(123456, DateTime::now()), OtpOutcome::Expired);
    }
}
