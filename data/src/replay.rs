// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.

use crate::{error::DataError, merge::TickMerge, point::Point, source::TickSource};
use arara_markets::InstrumentName;
use std::fmt;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Virtual clock over a [`TickMerge`]: one point per `speed` period.
///
/// [`Replay::next_point`] awaits the next timer period before pulling the
/// merge, so callers that `select!` over it interleave commands between
/// emissions. The await is cancel-safe; a cancelled period emits nothing.
/// Dropping the replay releases every source handle.
pub struct Replay {
    speed: Duration,
    clock: Interval,
    merge: TickMerge,
}

impl fmt::Debug for Replay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replay")
            .field("speed", &self.speed)
            .field("sources", &self.merge.len())
            .finish()
    }
}

impl Replay {
    pub fn new(speed: Duration) -> Self {
        // tokio intervals reject a zero period.
        let speed = speed.max(Duration::from_millis(1));
        let mut clock = interval(speed);
        clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            speed,
            clock,
            merge: TickMerge::new(),
        }
    }

    pub fn speed(&self) -> Duration {
        self.speed
    }

    pub fn attach(&mut self, source: &dyn TickSource) -> Result<(), DataError> {
        self.merge.attach(source)
    }

    pub fn detach(&mut self, instrument: &InstrumentName) -> bool {
        self.merge.detach(instrument)
    }

    /// Await the next timer period and emit one merged point.
    ///
    /// Returns `None` once every attached source is exhausted.
    pub async fn next_point(&mut self) -> Option<Point> {
        self.clock.tick().await;
        self.merge.next()
    }
}
