use std::fs;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use one_brc::{
    aggregate_chunk, AggregateError, Chunk, Config, Executor, OutputFormat, Report, Strategy,
    Temperature,
};

/// A file in the temp dir that is removed when dropped.
struct TempInput(PathBuf);

impl TempInput {
    fn new(name: &str, contents: &[u8]) -> Self {
        let path = std::env::temp_dir().join(format!(
            "one-brc-{}-{}.txt",
            std::process::id(),
            name
        ));
        fs::write(&path, contents).unwrap();
        TempInput(path)
    }
}

impl Drop for TempInput {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

fn config(strategy: Strategy, chunk_size: usize, workers: usize) -> Config {
    Config::default()
        .with_strategy(strategy)
        .with_chunk_size(chunk_size)
        .with_workers(workers)
        .with_queue_depth(workers)
}

fn run(contents: &[u8], name: &str, config: Config) -> Result<Report, AggregateError> {
    let input = TempInput::new(name, contents);
    let aggregate = Executor::new(config)?.aggregate_file(&input.0)?;
    Ok(Report::from_aggregate(aggregate))
}

fn measurements(seed: u64, lines: usize) -> Vec<u8> {
    let stations = [
        "Abha", "Abidjan", "Accra", "Cairo", "Hamburg", "Oslo", "St. John's", "Tromsø",
        "Ürümqi", "Yaoundé",
    ];
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = String::new();
    for _ in 0..lines {
        let station = stations[rng.random_range(0..stations.len())];
        let temperature = Temperature::from_tenths(rng.random_range(-999..=999));
        out.push_str(&format!("{station};{temperature}\n"));
    }
    out.into_bytes()
}

#[test]
fn oslo_file() {
    for strategy in [Strategy::Stream, Strategy::Mmap] {
        let report = run(
            b"Oslo;5.0\nOslo;15.0\nOslo;10.0\n",
            &format!("oslo-{strategy:?}"),
            config(strategy, 4, 2),
        )
        .unwrap();
        assert_eq!(report.to_string(), "Oslo: 5.0/10.0/15.0\n");
    }
}

#[test]
fn cairo_and_tromso_from_two_chunks() {
    let input = "Cairo;36.0\nTromsø;-4.0\nCairo;40.0\n".as_bytes();
    let first = Chunk::borrowed(0, 0, &input[..11]);
    let second = Chunk::borrowed(1, 11, &input[11..]);
    assert_eq!(first.lines().count(), 1);
    assert_eq!(second.lines().count(), 2);

    let mut a = aggregate_chunk(&first, b';').unwrap();
    let b = aggregate_chunk(&second, b';').unwrap();
    let mut swapped = b.clone();
    swapped.merge(a.clone());
    a.merge(b);
    assert_eq!(a, swapped);

    assert_eq!(
        Report::from_aggregate(a).to_string(),
        "Cairo: 36.0/38.0/40.0\nTromsø: -4.0/-4.0/-4.0\n"
    );
}

#[test]
fn strategies_chunk_sizes_and_workers_agree() {
    let contents = measurements(2024, 20_000);
    let expected = run(&contents, "baseline", config(Strategy::Stream, 1 << 30, 1)).unwrap();
    assert_eq!(expected.entries().iter().map(|(_, s)| s.count).sum::<u64>(), 20_000);

    for (i, (chunk_size, workers)) in [(1, 3), (97, 2), (4096, 4), (65_536, 8)].into_iter().enumerate() {
        for strategy in [Strategy::Stream, Strategy::Mmap] {
            let report = run(
                &contents,
                &format!("agree-{i}-{strategy:?}"),
                config(strategy, chunk_size, workers),
            )
            .unwrap();
            assert_eq!(report, expected, "{strategy:?} chunk={chunk_size} workers={workers}");
        }
    }
}

#[test]
fn braces_output() {
    let report = run(b"b;1.0\na;2.0\n", "braces", config(Strategy::Mmap, 8, 1)).unwrap();
    assert_eq!(
        report.display(OutputFormat::Braces).to_string(),
        "{a=2.0/2.0/2.0, b=1.0/1.0/1.0}"
    );
}

#[test]
fn missing_delimiter_aborts_without_output() {
    let mut contents = measurements(7, 1_000);
    contents.extend_from_slice(b"Bergen 12.0\n");
    contents.extend_from_slice(&measurements(8, 1_000));
    for strategy in [Strategy::Stream, Strategy::Mmap] {
        let result = run(&contents, &format!("malformed-{strategy:?}"), config(strategy, 128, 4));
        match result {
            Err(AggregateError::MalformedRecord { line, .. }) => assert_eq!(line, "Bergen 12.0"),
            other => panic!("expected a malformed record, got {other:?}"),
        }
    }
}

#[test]
fn empty_file() {
    for strategy in [Strategy::Stream, Strategy::Mmap] {
        let report = run(b"", &format!("empty-{strategy:?}"), config(strategy, 16, 2)).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.to_string(), "");
    }
}

#[test]
fn missing_file_is_reported() {
    let executor = Executor::new(config(Strategy::Stream, 16, 1)).unwrap();
    let path = std::env::temp_dir().join("one-brc-does-not-exist.txt");
    assert!(matches!(
        executor.aggregate_file(&path),
        Err(AggregateError::Open { .. })
    ));
}

#[test]
fn custom_delimiter() {
    let report = run(
        b"Oslo,1.0\nOslo,3.0\n",
        "comma",
        config(Strategy::Stream, 8, 1).with_delimiter(b','),
    )
    .unwrap();
    assert_eq!(report.to_string(), "Oslo: 1.0/2.0/3.0\n");
}
