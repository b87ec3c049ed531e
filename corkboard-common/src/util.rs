use thiserror::Error;
use time::{Duration, OffsetDateTime};

/// A strictly positive span of time, such as a session lifetime.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    pub const WEEK: Self = Self(Duration::WEEK);

    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    #[must_use]
    pub fn days(days: u16) -> Option<Self> {
        Self::new(Duration::days(i64::from(days)))
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

/// The current UTC time, truncated to the microsecond precision that
/// PostgreSQL keeps, so a freshly created value equals its stored form.
#[must_use]
pub fn now_utc_micros() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_microsecond(now.microsecond()).unwrap_or(now)
}
