//! Sorting and rendering of a finished aggregate.

use std::fmt;

use crate::aggregate::Aggregate;
use crate::record::Temperature;
use crate::stats::StationStats;

/// How a [`Report`] is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `station: min/mean/max`, one station per line.
    #[default]
    Lines,
    /// `{station=min/mean/max, ...}` on a single line.
    Braces,
}

/// Final figures for one station, each rounded to one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationSummary {
    pub min: Temperature,
    pub mean: Temperature,
    pub max: Temperature,
    pub count: u64,
}

impl StationSummary {
    /// `None` for a statistic that never saw a record.
    pub fn from_stats(stats: &StationStats) -> Option<Self> {
        Some(StationSummary {
            min: stats.min()?,
            mean: stats.rounded_mean()?,
            max: stats.max()?,
            count: stats.count(),
        })
    }
}

impl fmt::Display for StationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.min, self.mean, self.max)
    }
}

/// Stations in ascending byte order with their summaries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Report {
    entries: Vec<(Box<[u8]>, StationSummary)>,
}

impl Report {
    pub fn from_aggregate(aggregate: Aggregate) -> Self {
        let mut entries: Vec<_> = aggregate
            .into_iter()
            .filter_map(|(station, stats)| {
                StationSummary::from_stats(&stats).map(|summary| (station, summary))
            })
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        Report { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(Box<[u8]>, StationSummary)] {
        &self.entries
    }

    pub fn get(&self, station: &[u8]) -> Option<&StationSummary> {
        self.entries
            .binary_search_by(|(name, _)| (**name).cmp(station))
            .ok()
            .map(|i| &self.entries[i].1)
    }

    pub fn display(&self, format: OutputFormat) -> Rendered<'_> {
        Rendered {
            report: self,
            format,
        }
    }
}

/// Renders a [`Report`] in a chosen [`OutputFormat`].
pub struct Rendered<'a> {
    report: &'a Report,
    format: OutputFormat,
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.report.entries.iter();
        match self.format {
            OutputFormat::Lines => {
                for (station, summary) in entries {
                    writeln!(f, "{}: {}", String::from_utf8_lossy(station), summary)?;
                }
                Ok(())
            }
            OutputFormat::Braces => {
                f.write_str("{")?;
                for (i, (station, summary)) in entries.enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", String::from_utf8_lossy(station), summary)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.display(OutputFormat::Lines), f)
    }
}
