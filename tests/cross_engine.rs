// Cross-engine properties of the join engines

use mini_join_engine::execution::operators::{
    HashJoinOperator, RadixJoinOperator, SortMergeConfig, SortMergeJoinOperator,
    TrieJoinOperator,
};
use mini_join_engine::types::{prefix_matches, sort_cast_relation, sort_title_relation};
use mini_join_engine::{combine, CastRow, JoinOperator, ResultRow, TitleRow};
use std::mem::size_of;

const PARALLELISM: [usize; 3] = [1, 2, 8];

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_cast(rng: &mut fastrand::Rng, rows: usize, keys: i32) -> Vec<CastRow> {
    (0..rows)
        .map(|i| CastRow::new(rng.i32(-keys..keys), format!("cast-{}", i)))
        .collect()
}

fn random_title(rng: &mut fastrand::Rng, rows: usize, keys: i32) -> Vec<TitleRow> {
    (0..rows)
        .map(|i| TitleRow::new(rng.i32(-keys..keys), format!("title-{}", i)))
        .collect()
}

fn random_text(rng: &mut fastrand::Rng, max_len: usize) -> String {
    const ALPHABET: &[char] = &['a', 'B', 'b', 'c', '1', ' ', '-', 'é'];
    let len = rng.usize(0..=max_len);
    (0..len).map(|_| ALPHABET[rng.usize(..ALPHABET.len())]).collect()
}

fn nested_loop(cast: &[CastRow], title: &[TitleRow]) -> Vec<ResultRow> {
    let mut rows = Vec::new();
    for c in cast {
        for t in title {
            if c.movie_id == t.title_id {
                rows.push(combine(c, t));
            }
        }
    }
    rows.sort();
    rows
}

fn sorted(mut rows: Vec<ResultRow>) -> Vec<ResultRow> {
    rows.sort();
    rows
}

fn small_chunk_sort_merge() -> SortMergeJoinOperator {
    SortMergeJoinOperator::new(SortMergeConfig {
        cache_budget_bytes: 16 * size_of::<CastRow>(),
        ..SortMergeConfig::default()
    })
    .unwrap()
}

#[test]
fn test_equality_engines_agree() {
    init_logging();
    let mut rng = fastrand::Rng::with_seed(7);
    let cast = random_cast(&mut rng, 2_000, 300);
    let title = random_title(&mut rng, 700, 300);
    let expected = nested_loop(&cast, &title);
    assert!(!expected.is_empty());

    let cast_sorted = sort_cast_relation(&cast);
    let title_sorted = sort_title_relation(&title);

    for workers in PARALLELISM {
        let partitioned = HashJoinOperator::partitioned()
            .join(&cast, &title, workers)
            .unwrap();
        assert_eq!(sorted(partitioned), expected, "hash-partitioned/{}", workers);

        let radix = RadixJoinOperator::default()
            .join(&cast, &title, workers)
            .unwrap();
        assert_eq!(sorted(radix), expected, "radix/{}", workers);

        let merge = small_chunk_sort_merge()
            .join(&cast_sorted, &title_sorted, workers)
            .unwrap();
        assert_eq!(sorted(merge), expected, "sort-merge/{}", workers);

        let merge_default = SortMergeJoinOperator::default()
            .join(&cast_sorted, &title_sorted, workers)
            .unwrap();
        assert_eq!(sorted(merge_default), expected, "sort-merge-default/{}", workers);
    }
}

#[test]
fn test_shared_hash_agrees_on_unique_title_keys() {
    let mut rng = fastrand::Rng::with_seed(11);
    let cast = random_cast(&mut rng, 1_500, 200);
    let mut title: Vec<TitleRow> = (-200..200)
        .filter(|_| rng.bool())
        .map(|k| TitleRow::new(k, format!("title-{}", k)))
        .collect();
    rng.shuffle(&mut title);
    let expected = nested_loop(&cast, &title);

    for workers in PARALLELISM {
        let rows = HashJoinOperator::shared()
            .join(&cast, &title, workers)
            .unwrap();
        assert_eq!(sorted(rows), expected, "workers={}", workers);
    }
}

#[test]
fn test_precise_offset_engines_keep_cast_order() {
    let mut rng = fastrand::Rng::with_seed(3);
    let cast = random_cast(&mut rng, 1_000, 50);
    let title = random_title(&mut rng, 200, 50);

    let baseline = HashJoinOperator::partitioned().join(&cast, &title, 1).unwrap();
    // driving-relation order: cast row index never decreases
    let positions: Vec<usize> = baseline
        .iter()
        .map(|r| r.note["cast-".len()..].parse::<usize>().unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] <= w[1]));

    for workers in [2, 8] {
        let rows = HashJoinOperator::partitioned()
            .join(&cast, &title, workers)
            .unwrap();
        assert_eq!(rows, baseline, "workers={}", workers);
    }
}

#[test]
fn test_results_identical_across_parallelism() {
    let mut rng = fastrand::Rng::with_seed(5);
    let cast = random_cast(&mut rng, 800, 100);
    let title = random_title(&mut rng, 800, 100);
    let cast_sorted = sort_cast_relation(&cast);
    let title_sorted = sort_title_relation(&title);

    let engines: Vec<(Box<dyn JoinOperator>, bool)> = vec![
        (Box::new(HashJoinOperator::shared()), false),
        (Box::new(HashJoinOperator::partitioned()), false),
        (Box::new(RadixJoinOperator::default()), false),
        (Box::new(small_chunk_sort_merge()), true),
    ];
    for (engine, needs_sorted) in &engines {
        let (c, t) = if *needs_sorted {
            (&cast_sorted[..], &title_sorted[..])
        } else {
            (&cast[..], &title[..])
        };
        let reference = sorted(engine.join(c, t, 1).unwrap());
        for workers in [2, 8] {
            let rows = sorted(engine.join(c, t, workers).unwrap());
            assert_eq!(rows, reference, "{}/{}", engine.name(), workers);
        }
    }
}

#[test]
fn test_empty_input_law() {
    let cast = vec![CastRow::new(1, "a")];
    let title = vec![TitleRow::new(1, "a")];
    let engines: Vec<Box<dyn JoinOperator>> = vec![
        Box::new(HashJoinOperator::shared()),
        Box::new(HashJoinOperator::partitioned()),
        Box::new(SortMergeJoinOperator::default()),
        Box::new(RadixJoinOperator::default()),
        Box::new(TrieJoinOperator::default()),
    ];
    for engine in &engines {
        for workers in PARALLELISM {
            assert!(engine.join(&[], &title, workers).unwrap().is_empty());
            assert!(engine.join(&cast, &[], workers).unwrap().is_empty());
            assert!(engine.join(&[], &[], workers).unwrap().is_empty());
        }
    }
}

#[test]
fn test_radix_matches_nested_loop() {
    let mut rng = fastrand::Rng::with_seed(99);
    for bits in [1, 8, 10] {
        let cast = random_cast(&mut rng, 1_200, 5_000);
        let title = random_title(&mut rng, 1_200, 5_000);
        let expected = nested_loop(&cast, &title);
        let op = RadixJoinOperator::with_bits(bits).unwrap();
        for workers in PARALLELISM {
            let rows = sorted(op.join(&cast, &title, workers).unwrap());
            assert_eq!(rows, expected, "bits={} workers={}", bits, workers);
        }
    }
}

#[test]
fn test_trie_matches_brute_force_prefix() {
    let mut rng = fastrand::Rng::with_seed(42);
    let cast: Vec<CastRow> = (0..400)
        .map(|i| CastRow::new(i, random_text(&mut rng, 3)))
        .collect();
    let title: Vec<TitleRow> = (0..300)
        .map(|i| TitleRow::new(i, random_text(&mut rng, 6)))
        .collect();

    let mut expected = Vec::new();
    for t in &title {
        for c in &cast {
            if prefix_matches(&c.note, &t.title) {
                expected.push(combine(c, t));
            }
        }
    }
    expected.sort();
    assert!(!expected.is_empty());

    for workers in PARALLELISM {
        let rows = sorted(TrieJoinOperator::default().join(&cast, &title, workers).unwrap());
        assert_eq!(rows, expected, "workers={}", workers);
    }
}

#[test]
fn test_equality_scenario() {
    let cast = vec![
        CastRow::new(1, "one"),
        CastRow::new(2, "two-a"),
        CastRow::new(2, "two-b"),
    ];
    let title = vec![TitleRow::new(2, "Two")];
    let engines: Vec<Box<dyn JoinOperator>> = vec![
        Box::new(HashJoinOperator::shared()),
        Box::new(HashJoinOperator::partitioned()),
        Box::new(SortMergeJoinOperator::default()),
        Box::new(RadixJoinOperator::default()),
    ];
    for engine in &engines {
        let rows = sorted(engine.join(&cast, &title, 2).unwrap());
        let notes: Vec<&str> = rows.iter().map(|r| r.note.as_str()).collect();
        assert_eq!(notes, vec!["two-a", "two-b"], "{}", engine.name());
        assert!(rows.iter().all(|r| r.title_id == 2));
    }
}

#[test]
fn test_prefix_scenario() {
    let cast = vec![CastRow::new(1, "ab"), CastRow::new(2, "xy")];
    let title = vec![TitleRow::new(1, "abc"), TitleRow::new(2, "zz")];
    let rows = TrieJoinOperator::default().join(&cast, &title, 2).unwrap();
    assert_eq!(rows, vec![combine(&cast[0], &title[0])]);
}

#[test]
fn test_sort_merge_group_integrity() {
    let cast: Vec<CastRow> = [5, 5, 5, 7].iter().map(|&k| CastRow::new(k, "c")).collect();
    let title: Vec<TitleRow> = [5, 7, 7].iter().map(|&k| TitleRow::new(k, "t")).collect();
    // two-row chunks would split the group of 5s
    let op = SortMergeJoinOperator::new(SortMergeConfig {
        cache_budget_bytes: 2 * size_of::<CastRow>(),
        ..SortMergeConfig::default()
    })
    .unwrap();
    for workers in PARALLELISM {
        let rows = op.join(&cast, &title, workers).unwrap();
        assert_eq!(rows.iter().filter(|r| r.movie_id == 5).count(), 3);
        assert_eq!(rows.iter().filter(|r| r.movie_id == 7).count(), 2);
        assert_eq!(rows.len(), 5);
    }
}
