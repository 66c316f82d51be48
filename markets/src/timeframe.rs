// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Duration of one aggregation bucket, in whole seconds.
///
/// Ticks are grouped into buckets by flooring their timestamp to a multiple
/// of the frame duration (Unix epoch origin).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeFrame {
    secs: u32,
}

impl TimeFrame {
    pub fn from_secs(secs: u32) -> Self {
        Self { secs: secs.max(1) }
    }

    pub fn from_minutes(minutes: u32) -> Self {
        Self::from_secs(minutes * 60)
    }

    pub fn as_secs(&self) -> u32 {
        self.secs
    }

    /// Start of the bucket containing `time`.
    pub fn bucket(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let secs = i64::from(self.secs);
        let floored = time.timestamp().div_euclid(secs) * secs;
        Utc.timestamp_opt(floored, 0).unwrap()
    }
}

impl Default for TimeFrame {
    /// One-minute bars.
    fn default() -> Self {
        Self::from_minutes(1)
    }
}

impl Display for TimeFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.secs)
    }
}
