use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// UTC timestamp represented as nanoseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampUtc {
    unix_nanos: i128,
}

impl TimestampUtc {
    pub const UNIX_EPOCH: Self = Self { unix_nanos: 0 };

    /// Wall-clock time at the moment of the call; used to stamp pushed chat entries.
    #[must_use]
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    #[must_use]
    pub const fn from_unix_seconds(seconds: i64) -> Self {
        Self {
            unix_nanos: (seconds as i128) * NANOS_PER_SECOND,
        }
    }

    pub fn from_unix_seconds_nanos(seconds: i64, nanoseconds: u32) -> Result<Self, TimestampError> {
        if nanoseconds >= NANOS_PER_SECOND as u32 {
            return Err(TimestampError::InvalidNanoseconds { nanoseconds });
        }

        let unix_nanos = (seconds as i128) * NANOS_PER_SECOND + (nanoseconds as i128);
        Ok(Self { unix_nanos })
    }

    #[must_use]
    pub fn from_system_time(value: SystemTime) -> Self {
        match value.duration_since(UNIX_EPOCH) {
            Ok(delta) => Self {
                unix_nanos: duration_to_nanos(delta),
            },
            Err(err) => Self {
                unix_nanos: -duration_to_nanos(err.duration()),
            },
        }
    }

    #[must_use]
    pub const fn unix_nanos(self) -> i128 {
        self.unix_nanos
    }

    #[must_use]
    pub const fn unix_seconds(self) -> i128 {
        self.unix_nanos.div_euclid(NANOS_PER_SECOND)
    }

    #[must_use]
    pub const fn subsec_nanos(self) -> u32 {
        self.unix_nanos.rem_euclid(NANOS_PER_SECOND) as u32
    }

    /// Parses server-side timestamps.
    ///
    /// Accepts RFC 3339 text as well as the naive `YYYY-MM-DD HH:MM:SS` form the
    /// message store writes, which is always UTC.
    #[cfg(feature = "chrono")]
    pub fn parse_server_text(text: &str) -> Result<Self, TimestampError> {
        let text = text.trim();
        if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(text) {
            return Ok(Self::from(parsed.with_timezone(&chrono::Utc)));
        }

        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, format) {
                return Ok(Self::from(naive.and_utc()));
            }
        }

        Err(TimestampError::Unparseable {
            text: text.to_owned(),
        })
    }
}

impl Default for TimestampUtc {
    fn default() -> Self {
        Self::UNIX_EPOCH
    }
}

impl fmt::Display for TimestampUtc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.unix_seconds();
        let of_day = seconds.rem_euclid(86_400);
        write!(
            f,
            "{:02}:{:02}:{:02}Z",
            of_day / 3_600,
            (of_day % 3_600) / 60,
            of_day % 60
        )
    }
}

#[cfg(feature = "chrono")]
impl From<chrono::DateTime<chrono::Utc>> for TimestampUtc {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            unix_nanos: (value.timestamp() as i128) * NANOS_PER_SECOND
                + (value.timestamp_subsec_nanos() as i128),
        }
    }
}

#[cfg(feature = "chrono")]
impl TryFrom<TimestampUtc> for chrono::DateTime<chrono::Utc> {
    type Error = TimestampError;

    fn try_from(value: TimestampUtc) -> Result<Self, Self::Error> {
        use chrono::TimeZone;

        let seconds = i64::try_from(value.unix_seconds()).map_err(|_| {
            TimestampError::OutOfRangeForChrono {
                unix_nanos: value.unix_nanos,
            }
        })?;

        chrono::Utc
            .timestamp_opt(seconds, value.subsec_nanos())
            .single()
            .ok_or(TimestampError::OutOfRangeForChrono {
                unix_nanos: value.unix_nanos,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    InvalidNanoseconds { nanoseconds: u32 },
    OutOfRangeForChrono { unix_nanos: i128 },
    Unparseable { text: String },
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNanoseconds { nanoseconds } => {
                write!(f, "nanoseconds must be < 1_000_000_000, got {nanoseconds}")
            }
            Self::OutOfRangeForChrono { unix_nanos } => {
                write!(
                    f,
                    "timestamp {unix_nanos}ns is out of range for chrono::DateTime<Utc>"
                )
            }
            Self::Unparseable { text } => write!(f, "unrecognised timestamp `{text}`"),
        }
    }
}

impl std::error::Error for TimestampError {}

fn duration_to_nanos(delta: Duration) -> i128 {
    (delta.as_secs() as i128) * NANOS_PER_SECOND + (delta.subsec_nanos() as i128)
}
