//! Temporal validity of sessions and tokens.

use std::time::Duration;

use crate::error::{ValidationError, ValidationResult};

/// Leeway applied when none (or zero) is configured.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(10);

/// Lifespan of a session. Timestamps are Unix seconds; `0` means unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionLifespan {
    /// Whether the session is active at all
    pub active: bool,
    /// Issued at
    pub issued_at: i64,
    /// Not before
    pub not_before: i64,
    /// Expires at
    pub expires_at: i64,
    /// Allowed clock skew. Zero selects [`DEFAULT_LEEWAY`].
    pub leeway: Duration,
}

impl SessionLifespan {
    /// Assert validity against the current time.
    pub fn assert(&self) -> ValidationResult {
        self.assert_at(chrono::Utc::now().timestamp())
    }

    /// Assert validity against `now` (Unix seconds). First failing check wins.
    pub fn assert_at(&self, now: i64) -> ValidationResult {
        if !self.active {
            return Err(ValidationError::NotActive);
        }

        let leeway = self.effective_leeway();

        if self.not_before > 0 && now.saturating_add(leeway) < self.not_before {
            return Err(ValidationError::NotYetValid);
        }

        if self.expires_at > 0 && now.saturating_sub(leeway) >= self.expires_at {
            return Err(ValidationError::Expired);
        }

        if self.issued_at > 0 && now.saturating_add(leeway) < self.issued_at {
            return Err(ValidationError::IssuedInFuture);
        }

        Ok(())
    }

    fn effective_leeway(&self) -> i64 {
        let leeway = if self.leeway.is_zero() {
            DEFAULT_LEEWAY
        } else {
            self.leeway
        };
        i64::try_from(leeway.as_secs()).unwrap_or(i64::MAX)
    }
}
