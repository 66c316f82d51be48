// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.

use crate::{
    error::DataError,
    point::Point,
    source::{PointIter, TickSource},
};
use arara_markets::InstrumentName;
use std::fmt;

struct SourceHead {
    instrument: InstrumentName,
    /// One-element look-ahead; `None` once the source is exhausted.
    head: Option<Point>,
    iter: PointIter,
}

impl fmt::Debug for SourceHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHead")
            .field("instrument", &self.instrument)
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

/// K-way merge over per-instrument tick sources.
///
/// Emits the point with the minimum `(time, instrument)` pair and advances
/// only the emitted source. Sources are kept sorted by instrument name so
/// that time ties resolve to the lexicographically smallest name.
#[derive(Debug, Default)]
pub struct TickMerge {
    sources: Vec<SourceHead>,
}

impl TickMerge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `source` and add it to the merge, priming its look-ahead.
    ///
    /// Attaching an instrument that is already present restarts it.
    pub fn attach(&mut self, source: &dyn TickSource) -> Result<(), DataError> {
        let mut iter = source.open()?;
        let head = iter.next();
        let instrument = source.instrument().clone();

        self.detach(&instrument);
        let at = self
            .sources
            .partition_point(|existing| existing.instrument < instrument);
        self.sources.insert(
            at,
            SourceHead {
                instrument,
                head,
                iter,
            },
        );
        Ok(())
    }

    /// Remove one instrument's source, releasing its handle.
    pub fn detach(&mut self, instrument: &InstrumentName) -> bool {
        let before = self.sources.len();
        self.sources.retain(|source| source.instrument != *instrument);
        self.sources.len() != before
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Iterator for TickMerge {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        // Sources are name-sorted, so the first minimum wins time ties.
        let best = self
            .sources
            .iter()
            .enumerate()
            .filter_map(|(index, source)| source.head.as_ref().map(|point| (index, point.time)))
            .min_by_key(|(index, time)| (*time, *index))
            .map(|(index, _)| index)?;

        let source = &mut self.sources[best];
        let point = source.head.take();
        source.head = source.iter.next();
        point
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::VecTickSource;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn point(instrument: &str, secs: i64) -> Point {
        Point::new(
            InstrumentName::from(instrument),
            Utc.timestamp_opt(secs, 0).unwrap(),
            Some(dec!(100)),
            dec!(1),
            Some(dec!(101)),
            dec!(1),
        )
    }

    fn source(instrument: &str, times: &[i64]) -> VecTickSource {
        VecTickSource::new(
            InstrumentName::from(instrument),
            times.iter().map(|secs| point(instrument, *secs)).collect(),
        )
    }

    fn collect(merge: TickMerge) -> Vec<(String, i64)> {
        merge
            .map(|point| (point.instrument.to_string(), point.time.timestamp()))
            .collect()
    }

    #[test]
    fn test_output_is_non_decreasing_in_time() {
        let mut merge = TickMerge::new();
        merge.attach(&source("ES", &[0, 2, 4])).unwrap();
        merge.attach(&source("NQ", &[1, 3, 5])).unwrap();

        let times: Vec<_> = collect(merge).into_iter().map(|(_, time)| time).collect();
        assert_eq!(times, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_time_tie_breaks_to_smallest_name() {
        let mut merge = TickMerge::new();
        // Attach in reverse name order; the merge still emits AAA first.
        merge.attach(&source("BBB", &[5])).unwrap();
        merge.attach(&source("AAA", &[5])).unwrap();

        assert_eq!(
            collect(merge),
            vec![("AAA".to_string(), 5), ("BBB".to_string(), 5)]
        );
    }

    #[test]
    fn test_per_source_subsequence_equals_source() {
        let mut merge = TickMerge::new();
        merge.attach(&source("ES", &[0, 0, 1, 7])).unwrap();
        merge.attach(&source("NQ", &[0, 2, 2, 3])).unwrap();

        let merged = collect(merge);
        let es: Vec<_> = merged
            .iter()
            .filter(|(name, _)| name == "ES")
            .map(|(_, time)| *time)
            .collect();
        assert_eq!(es, vec![0, 0, 1, 7]);
        let nq: Vec<_> = merged
            .iter()
            .filter(|(name, _)| name == "NQ")
            .map(|(_, time)| *time)
            .collect();
        assert_eq!(nq, vec![0, 2, 2, 3]);
    }

    #[test]
    fn test_detach_removes_source_mid_merge() {
        let mut merge = TickMerge::new();
        merge.attach(&source("ES", &[0, 10])).unwrap();
        merge.attach(&source("NQ", &[1])).unwrap();

        assert_eq!(merge.next().unwrap().time.timestamp(), 0);
        assert!(merge.detach(&InstrumentName::from("ES")));
        assert_eq!(merge.next().unwrap().instrument.as_str(), "NQ");
        assert_eq!(merge.next(), None);
    }

    #[test]
    fn test_reattach_restarts_source() {
        let mut merge = TickMerge::new();
        let es = source("ES", &[0, 1]);
        merge.attach(&es).unwrap();
        assert_eq!(merge.next().unwrap().time.timestamp(), 0);

        merge.attach(&es).unwrap();
        let times: Vec<_> = collect(merge).into_iter().map(|(_, time)| time).collect();
        assert_eq!(times, vec![0, 1]);
    }
}
