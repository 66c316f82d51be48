// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.

use crate::{error::DataError, point::Point};
use arara_markets::InstrumentName;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};
use tracing::warn;

/// Boxed lazy iterator of points, time-ordered within one source.
pub type PointIter = Box<dyn Iterator<Item = Point> + Send>;

/// A lazy, restartable sequence of ticks for one instrument.
///
/// `open` may be called repeatedly; each call restarts the sequence from the
/// beginning. Dropping the returned iterator releases the source handle.
pub trait TickSource: Send {
    fn instrument(&self) -> &InstrumentName;

    fn open(&self) -> Result<PointIter, DataError>;
}

/// Tick file under a source directory; the filename equals the instrument name.
///
/// One tick per line, `<unixSeconds> <bid> <bidSize> <ask> <askSize>`.
/// Malformed lines are skipped with a warning and processing continues.
#[derive(Debug, Clone)]
pub struct FileTickSource {
    instrument: InstrumentName,
    path: PathBuf,
}

impl FileTickSource {
    pub fn new(source_dir: &Path, instrument: InstrumentName) -> Self {
        let path = source_dir.join(instrument.as_str());
        Self { instrument, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TickSource for FileTickSource {
    fn instrument(&self) -> &InstrumentName {
        &self.instrument
    }

    fn open(&self) -> Result<PointIter, DataError> {
        let file = File::open(&self.path).map_err(|error| {
            DataError::Io(format!("{}: {error}", self.path.display()))
        })?;
        let instrument = self.instrument.clone();
        let path = self.path.clone();

        let points = BufReader::new(file).lines().filter_map(move |line| {
            let line = match line {
                Ok(line) => line,
                Err(error) => {
                    warn!(path = %path.display(), %error, "unreadable tick line skipped");
                    return None;
                }
            };
            if line.trim().is_empty() {
                return None;
            }
            match Point::parse_line(&instrument, &line) {
                Ok(point) => Some(point),
                Err(error) => {
                    warn!(%instrument, %error, %line, "malformed tick line skipped");
                    None
                }
            }
        });

        Ok(Box::new(points))
    }
}

/// In-memory tick source, mainly for tests and synthetic backtests.
#[derive(Debug, Clone)]
pub struct VecTickSource {
    instrument: InstrumentName,
    points: Vec<Point>,
}

impl VecTickSource {
    pub fn new(instrument: InstrumentName, points: Vec<Point>) -> Self {
        Self { instrument, points }
    }
}

impl TickSource for VecTickSource {
    fn instrument(&self) -> &InstrumentName {
        &self.instrument
    }

    fn open(&self) -> Result<PointIter, DataError> {
        Ok(Box::new(self.points.clone().into_iter()))
    }
}
