//! Store timestamps (seconds + nanos since the Unix epoch) and their
//! conversion to and from `SystemTime`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: i32 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampError {
    /// `nanos` must be in `0..1_000_000_000`.
    NanosOutOfRange(i32),
    /// Not representable as a `SystemTime` on this platform.
    OutOfRange,
}

impl std::fmt::Display for TimestampError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimestampError::NanosOutOfRange(n) => write!(f, "nanos out of range: {}", n),
            TimestampError::OutOfRange => write!(f, "timestamp out of range"),
        }
    }
}

impl std::error::Error for TimestampError {}

/// Seconds and non-negative nanos since the Unix epoch. Instants before the
/// epoch have negative `seconds` and still count `nanos` forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Result<Self, TimestampError> {
        if !(0..NANOS_PER_SEC).contains(&nanos) {
            return Err(TimestampError::NanosOutOfRange(nanos));
        }
        Ok(Self { seconds, nanos })
    }

    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    pub fn to_system_time(self) -> Result<SystemTime, TimestampError> {
        if !(0..NANOS_PER_SEC).contains(&self.nanos) {
            return Err(TimestampError::NanosOutOfRange(self.nanos));
        }
        let nanos = Duration::from_nanos(self.nanos as u64);
        let base = if self.seconds >= 0 {
            UNIX_EPOCH.checked_add(Duration::from_secs(self.seconds as u64))
        } else {
            UNIX_EPOCH.checked_sub(Duration::from_secs(self.seconds.unsigned_abs()))
        };
        base.and_then(|t| t.checked_add(nanos))
            .ok_or(TimestampError::OutOfRange)
    }
}

impl From<SystemTime> for Timestamp {
    fn from(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Self {
                seconds: d.as_secs() as i64,
                nanos: d.subsec_nanos() as i32,
            },
            Err(e) => {
                let before = e.duration();
                let mut seconds = -(before.as_secs() as i64);
                let mut nanos = before.subsec_nanos() as i32;
                if nanos > 0 {
                    seconds -= 1;
                    nanos = NANOS_PER_SEC - nanos;
                }
                Self { seconds, nanos }
            }
        }
    }
}

impl TryFrom<Timestamp> for SystemTime {
    type Error = TimestampError;

    fn try_from(ts: Timestamp) -> Result<Self, Self::Error> {
        ts.to_system_time()
    }
}
