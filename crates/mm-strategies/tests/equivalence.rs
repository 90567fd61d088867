use approx::assert_relative_eq;
use mm_core::verify::compare;
use mm_core::{self_test, MatmulError, Matrix, MultiplyStrategy, NaiveStrategy, Validation};
use mm_strategies::{EngineConfig, PipelineStrategy, Registry, TiledForkJoinStrategy};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn all_strategies() -> Vec<Box<dyn MultiplyStrategy>> {
    let config = EngineConfig {
        threads: 4,
        ..EngineConfig::default()
    };
    Registry::builtin().instantiate(&config)
}

#[test]
fn two_by_two_every_strategy() {
    let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    let b = Matrix::from_rows(vec![vec![5.0, 6.0], vec![7.0, 8.0]]).unwrap();
    let expected = Matrix::from_rows(vec![vec![19.0, 22.0], vec![43.0, 50.0]]).unwrap();

    for strategy in all_strategies() {
        let c = strategy.multiply(&a, &b).unwrap();
        assert_eq!(c, expected, "{}", strategy.name());
    }
}

#[test]
fn zero_vectors_give_exact_zero() {
    let a = Matrix::zeros(1, 37);
    let b = Matrix::zeros(37, 1);

    for strategy in all_strategies() {
        let c = strategy.multiply(&a, &b).unwrap();
        assert_eq!(c.data(), &[0.0], "{}", strategy.name());
        let report = self_test(strategy.as_ref(), &a, &b).unwrap();
        assert_eq!(report.max_error_pct, 0.0, "{}", strategy.name());
    }
}

#[test]
fn mismatch_rejected_by_every_strategy() {
    let a = Matrix::zeros(2, 3);
    let b = Matrix::zeros(4, 2);

    for strategy in all_strategies() {
        assert!(!strategy.validate(&a, &b), "{}", strategy.name());
        let err = strategy.multiply(&a, &b).unwrap_err();
        assert!(
            matches!(
                err,
                MatmulError::DimensionMismatch {
                    a_cols: 3,
                    b_rows: 4,
                    ..
                }
            ),
            "{}: {err}",
            strategy.name()
        );
    }
}

#[test]
fn rectangular_shapes_agree_with_reference() {
    let mut rng = StdRng::seed_from_u64(42);
    let reference = NaiveStrategy::new();
    for (m, n, p) in [(1, 1, 1), (1, 9, 17), (17, 9, 1), (65, 3, 130), (70, 71, 72)] {
        let a = Matrix::random(m, n, &mut rng);
        let b = Matrix::random(n, p, &mut rng);
        let expected = reference.multiply(&a, &b).unwrap();

        for strategy in all_strategies() {
            let c = strategy.multiply(&a, &b).unwrap();
            assert_eq!(c.dims(), (m, p), "{}", strategy.name());
            let report = compare(&expected, &c).unwrap();
            assert!(
                report.passes(),
                "{} at {m}x{n}x{p}: {report:?}",
                strategy.name()
            );
        }
    }
}

#[test]
fn debug_only_validation_computes_compatible_operands() {
    let config = EngineConfig {
        threads: 3,
        validation: Validation::DebugOnly,
        ..EngineConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(11);
    let a = Matrix::random(9, 7, &mut rng);
    let b = Matrix::random(7, 11, &mut rng);
    let expected = NaiveStrategy::new().multiply(&a, &b).unwrap();

    for strategy in Registry::builtin().instantiate(&config) {
        let c = strategy.multiply(&a, &b).unwrap();
        let report = compare(&expected, &c).unwrap();
        assert!(report.passes(), "{}: {report:?}", strategy.name());
    }
}

/// Without the up-front check, incompatible operands make the workers index
/// past their rows. Every parallel strategy must turn that into an error.
/// Debug builds stop earlier, at the `debug_assert!` in `Validation::check`.
#[cfg(not(debug_assertions))]
#[test]
fn worker_panic_returned_as_error() {
    let config = EngineConfig {
        threads: 4,
        validation: Validation::DebugOnly,
        ..EngineConfig::default()
    };
    let registry = Registry::builtin();
    let a = Matrix::zeros(2, 3);
    let b = Matrix::zeros(2, 2);

    for name in [
        "per-cell",
        "per-row",
        "row-stealing",
        "row-ranges-simd",
        "parallel-rows-simd",
        "fork-join",
        "fork-join-simd-tiled",
        "pipeline",
    ] {
        let strategy = registry.find(name, &config).unwrap();
        let err = strategy.multiply(&a, &b).unwrap_err();
        assert!(
            matches!(err, MatmulError::WorkerPanicked { .. }),
            "{name}: {err}"
        );
    }
}

#[test]
fn tiled_129_square() {
    let mut rng = StdRng::seed_from_u64(129);
    let a = Matrix::random(129, 129, &mut rng);
    let b = Matrix::random(129, 129, &mut rng);
    let expected = NaiveStrategy::new().multiply(&a, &b).unwrap();

    let c = TiledForkJoinStrategy::new(64).multiply(&a, &b).unwrap();
    for (x, y) in c.data().iter().zip(expected.data()) {
        assert_relative_eq!(*x, *y, max_relative = 1e-10);
    }
}

#[test]
fn pipeline_three_strips_reconstruct_product() {
    let mut rng = StdRng::seed_from_u64(250);
    let a = Matrix::random(20, 40, &mut rng);
    let b = Matrix::random(40, 250, &mut rng);
    let strategy = PipelineStrategy::new().with_strip_width(100).with_workers(2);

    let (c, report) = strategy.multiply_with_report(&a, &b).unwrap();
    assert_eq!(c, NaiveStrategy::new().multiply(&a, &b).unwrap());
    assert_eq!(report.strips_loaded, 3);
    assert_eq!(report.blocks_written, 3);
    assert_eq!(report.strips_per_worker.iter().sum::<usize>(), 3);
}

#[test]
fn config_from_lookup_reaches_strategies() {
    let config = EngineConfig::from_lookup(|key| match key {
        "MM_THREADS" => Some("3".to_string()),
        "MM_STRIP_WIDTH" => Some("7".to_string()),
        _ => None,
    })
    .unwrap();
    let strategy = Registry::builtin().find("pipeline", &config).unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let a = Matrix::random(5, 6, &mut rng);
    let b = Matrix::random(6, 30, &mut rng);
    self_test(strategy.as_ref(), &a, &b).unwrap();
}
