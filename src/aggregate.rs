//! Per-chunk aggregation and the merge that combines chunks.

use std::collections::hash_map::{self, HashMap};

use ahash::RandomState;

use crate::chunk::Chunk;
use crate::error::{AggregateError, Result};
use crate::record::{parse_record, Temperature};
use crate::stats::StationStats;

/// Station name to running statistic.
///
/// Used both for the partial result of one chunk and for the merged result
/// of a whole run. A station is present only if it was observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    stations: HashMap<Box<[u8]>, StationStats, RandomState>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, station: &[u8]) -> Option<&StationStats> {
        self.stations.get(station)
    }

    /// Number of records folded into this aggregate.
    pub fn records(&self) -> u64 {
        self.stations.values().map(StationStats::count).sum()
    }

    pub fn record(&mut self, station: &[u8], temperature: Temperature) {
        match self.stations.get_mut(station) {
            Some(stats) => stats.record(temperature),
            None => {
                self.stations
                    .insert(Box::from(station), StationStats::new(temperature));
            }
        }
    }

    /// Folds `other` into `self`. Stations only `other` knows are moved over
    /// unchanged.
    pub fn merge(&mut self, other: Aggregate) {
        for (station, stats) in other.stations {
            self.stations
                .entry(station)
                .and_modify(|existing| existing.merge(&stats))
                .or_insert(stats);
        }
    }

    /// Merges two aggregates, folding the smaller into the larger.
    pub fn merged(self, other: Aggregate) -> Aggregate {
        let (mut large, small) = if self.len() >= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        large.merge(small);
        large
    }
}

impl IntoIterator for Aggregate {
    type Item = (Box<[u8]>, StationStats);
    type IntoIter = hash_map::IntoIter<Box<[u8]>, StationStats>;

    fn into_iter(self) -> Self::IntoIter {
        self.stations.into_iter()
    }
}

impl FromIterator<Aggregate> for Aggregate {
    fn from_iter<I: IntoIterator<Item = Aggregate>>(iter: I) -> Self {
        iter.into_iter().fold(Aggregate::new(), Aggregate::merged)
    }
}

/// Builds the partial aggregate of one chunk.
///
/// The first line that fails to parse fails the whole chunk; nothing is
/// skipped.
pub fn aggregate_chunk(chunk: &Chunk<'_>, delimiter: u8) -> Result<Aggregate> {
    let mut aggregate = Aggregate::new();
    for (pos, line) in chunk.lines() {
        let record = parse_record(line, delimiter).map_err(|reason| {
            AggregateError::malformed(chunk.index, chunk.offset + pos as u64, line, reason)
        })?;
        aggregate.record(record.station, record.temperature);
    }
    Ok(aggregate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ParseError;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn t(tenths: i32) -> Temperature {
        Temperature::from_tenths(tenths)
    }

    fn aggregate_of(input: &[u8]) -> Aggregate {
        aggregate_chunk(&Chunk::borrowed(0, 0, input), b';').unwrap()
    }

    #[test]
    fn aggregates_repeated_station() {
        let aggregate = aggregate_of(b"Oslo;5.0\nOslo;15.0\nOslo;10.0\n");
        assert_eq!(aggregate.len(), 1);
        let oslo = aggregate.get(b"Oslo").unwrap();
        assert_eq!(oslo.count(), 3);
        assert_eq!(oslo.min(), Some(t(50)));
        assert_eq!(oslo.max(), Some(t(150)));
        assert_eq!(oslo.rounded_mean(), Some(t(100)));
        assert_eq!(aggregate.records(), 3);
    }

    #[test]
    fn absent_station_has_no_entry() {
        let aggregate = aggregate_of(b"Oslo;5.0\n");
        assert!(aggregate.get(b"Bergen").is_none());
        assert!(aggregate_of(b"").is_empty());
    }

    #[test]
    fn stations_differing_in_whitespace_stay_apart() {
        let aggregate = aggregate_of(b"Oslo;1.0\nOslo ;2.0\n");
        assert_eq!(aggregate.len(), 2);
    }

    #[test]
    fn malformed_line_reports_chunk_offset_and_line() {
        let chunk = Chunk::borrowed(4, 1000, b"Oslo;5.0\nBergen\nOslo;1.0\n");
        match aggregate_chunk(&chunk, b';') {
            Err(AggregateError::MalformedRecord {
                chunk,
                offset,
                line,
                reason,
            }) => {
                assert_eq!(chunk, 4);
                assert_eq!(offset, 1009);
                assert_eq!(line, "Bergen");
                assert_eq!(reason, ParseError::MissingDelimiter);
            }
            other => panic!("expected a malformed record, got {other:?}"),
        }
    }

    #[test]
    fn empty_line_is_malformed() {
        let chunk = Chunk::borrowed(0, 0, b"Oslo;5.0\n\nOslo;1.0\n");
        assert!(matches!(
            aggregate_chunk(&chunk, b';'),
            Err(AggregateError::MalformedRecord { offset: 9, .. })
        ));
    }

    #[test]
    fn merge_copies_and_combines() {
        let mut left = aggregate_of(b"Cairo;36.0\n");
        let right = aggregate_of("Tromsø;-4.0\nCairo;40.0\n".as_bytes());
        left.merge(right);
        assert_eq!(left.len(), 2);
        let cairo = left.get(b"Cairo").unwrap();
        assert_eq!(cairo.rounded_mean(), Some(t(380)));
        assert_eq!(cairo.count(), 2);
        let tromso = left.get("Tromsø".as_bytes()).unwrap();
        assert_eq!(tromso.min(), Some(t(-40)));
        assert_eq!(tromso.max(), Some(t(-40)));
    }

    #[test]
    fn mean_is_not_a_mean_of_means() {
        // averaging the chunk means would give 20.0
        let left = aggregate_of(b"A;10.0\nA;10.0\nA;10.0\n");
        let right = aggregate_of(b"A;30.0\n");
        let merged = left.merged(right);
        assert_eq!(merged.get(b"A").unwrap().rounded_mean(), Some(t(150)));
    }

    #[test]
    fn any_partition_and_merge_order_gives_the_same_result() {
        let mut rng = StdRng::seed_from_u64(42);
        let stations = ["Abha", "Accra", "Oslo", "Tromsø", "Zürich", "Ürümqi"];
        let lines: Vec<String> = (0..2_000)
            .map(|_| {
                let name = stations[rng.random_range(0..stations.len())];
                let tenths: i32 = rng.random_range(-999..=999);
                format!("{};{}", name, t(tenths))
            })
            .collect();
        let expected = aggregate_of(format!("{}\n", lines.join("\n")).as_bytes());

        for _ in 0..25 {
            let pieces = rng.random_range(1..=40);
            let mut cuts: Vec<usize> = (0..pieces - 1)
                .map(|_| rng.random_range(0..=lines.len()))
                .collect();
            cuts.push(0);
            cuts.push(lines.len());
            cuts.sort_unstable();

            let mut partials: Vec<Aggregate> = cuts
                .windows(2)
                .map(|w| {
                    let text: String = lines[w[0]..w[1]].iter().map(|l| format!("{l}\n")).collect();
                    aggregate_of(text.as_bytes())
                })
                .collect();
            partials.shuffle(&mut rng);

            // random grouping: repeatedly merge two random partials
            while partials.len() > 1 {
                let a = partials.swap_remove(rng.random_range(0..partials.len()));
                let b = partials.swap_remove(rng.random_range(0..partials.len()));
                partials.push(a.merged(b));
            }
            assert_eq!(partials.pop().unwrap(), expected);
        }
    }

    #[test]
    fn collects_from_partials() {
        let total: Aggregate = vec![
            aggregate_of(b"A;1.0\n"),
            aggregate_of(b"B;2.0\n"),
            aggregate_of(b"A;3.0\n"),
        ]
        .into_iter()
        .collect();
        assert_eq!(total.len(), 2);
        assert_eq!(total.get(b"A").unwrap().sum_tenths(), 40);
    }
}
