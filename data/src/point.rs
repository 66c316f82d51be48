// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.

use crate::error::DataError;
use arara_markets::InstrumentName;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One observation of top-of-book bid/ask for one instrument at one instant.
///
/// Points reference their instrument by name; the owning account resolves
/// the descriptor when it needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub instrument: InstrumentName,
    pub time: DateTime<Utc>,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    /// Derived: `ask` while ask size is positive, otherwise `bid`.
    pub last: Option<Decimal>,
    pub bid_size: Decimal,
    pub ask_size: Decimal,
}

impl Point {
    pub fn new(
        instrument: InstrumentName,
        time: DateTime<Utc>,
        bid: Option<Decimal>,
        bid_size: Decimal,
        ask: Option<Decimal>,
        ask_size: Decimal,
    ) -> Self {
        if let (Some(bid), Some(ask)) = (bid, ask) {
            debug_assert!(bid <= ask, "crossed top-of-book: bid {bid} > ask {ask}");
        }
        let last = match ask {
            Some(ask) if ask_size > Decimal::ZERO => Some(ask),
            _ => bid,
        };
        Self {
            instrument,
            time,
            bid,
            ask,
            last,
            bid_size,
            ask_size,
        }
    }

    /// Parse one tick-file line: `<unixSeconds> <bid> <bidSize> <ask> <askSize>`.
    pub fn parse_line(instrument: &InstrumentName, line: &str) -> Result<Self, DataError> {
        let mut fields = line.split_whitespace();
        let mut next = |field: &str| {
            fields
                .next()
                .ok_or_else(|| DataError::Parse(format!("missing {field}: {line:?}")))
        };

        let epoch = next("unixSeconds")?
            .parse::<i64>()
            .map_err(|error| DataError::Parse(format!("unixSeconds: {error}")))?;
        let time = Utc
            .timestamp_opt(epoch, 0)
            .single()
            .ok_or_else(|| DataError::Parse(format!("unixSeconds out of range: {epoch}")))?;

        let decimal = |raw: &str, field: &str| {
            raw.parse::<Decimal>()
                .map_err(|error| DataError::Parse(format!("{field}: {error}")))
        };
        let bid = decimal(next("bid")?, "bid")?;
        let bid_size = decimal(next("bidSize")?, "bidSize")?;
        let ask = decimal(next("ask")?, "ask")?;
        let ask_size = decimal(next("askSize")?, "askSize")?;

        Ok(Self::new(
            instrument.clone(),
            time,
            Some(bid),
            bid_size,
            Some(ask),
            ask_size,
        ))
    }

    /// Format `self` in the tick-file line format accepted by [`Self::parse_line`].
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.time.timestamp(),
            self.bid.unwrap_or_default(),
            self.bid_size,
            self.ask.unwrap_or_default(),
            self.ask_size,
        )
    }
}
