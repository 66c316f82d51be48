// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.

use crate::point::Point;
use arara_integration::stream::StreamAction;
use arara_markets::{InstrumentName, TimeFrame};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregate of all points falling into one [`TimeFrame`] bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointGroup {
    pub instrument: InstrumentName,
    /// Start of the bucket.
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Top-of-book as of the latest point in the bucket.
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

/// Append-only log of [`PointGroup`]s derived from a point series.
///
/// Points arrive in non-decreasing time order, so only the latest group is
/// ever mutated; earlier groups are final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointGroups {
    time_frame: TimeFrame,
    groups: Vec<PointGroup>,
}

impl PointGroups {
    pub fn new(time_frame: TimeFrame) -> Self {
        Self {
            time_frame,
            groups: Vec::new(),
        }
    }

    /// Fold `point` into the bucket it belongs to.
    ///
    /// Returns whether a group was created or updated, `None` for points
    /// without a usable `last` price.
    pub fn apply(&mut self, point: &Point) -> Option<StreamAction> {
        let last = point.last?;
        let bucket = self.time_frame.bucket(point.time);

        match self.groups.last_mut() {
            Some(group) if group.time == bucket => {
                group.high = group.high.max(last);
                group.low = group.low.min(last);
                group.close = last;
                group.bid = point.bid;
                group.ask = point.ask;
                Some(StreamAction::Update)
            }
            _ => {
                self.groups.push(PointGroup {
                    instrument: point.instrument.clone(),
                    time: bucket,
                    open: last,
                    high: last,
                    low: last,
                    close: last,
                    bid: point.bid,
                    ask: point.ask,
                });
                Some(StreamAction::Create)
            }
        }
    }

    pub fn last(&self) -> Option<&PointGroup> {
        self.groups.last()
    }

    pub fn as_slice(&self) -> &[PointGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
