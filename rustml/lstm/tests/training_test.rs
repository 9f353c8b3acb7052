use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use rustml_lstm::*;

fn base_config(dir: &Path) -> TrainingConfig {
    TrainingConfig {
        layers: 1,
        neurons: 4,
        mini_batch_size: 4,
        learning_rate: 0.01,
        loss_moving_avg: 0.1,
        iterations: 400,
        print_progress: false,
        store_progress_every: 0,
        store_network_every: 0,
        seed: Some(7),
        ..TrainingConfig::default()
    }
    .with_save_dir(dir)
}

fn run(config: TrainingConfig, text: &[u8], zero_init: bool) -> (TrainingOutcome, LayerStack) {
    let mut symbols = SymbolTable::new();
    let corpus = Corpus::encode(text, &mut symbols).unwrap();
    let mut trainer = Trainer::new(config.clone()).unwrap();
    let mut stack = LayerStack::new(
        symbols.features(),
        config.neurons,
        config.layers,
        zero_init,
        trainer.rng_mut(),
    )
    .unwrap();
    let outcome = trainer.train(&mut stack, &symbols, &corpus).unwrap();
    (outcome, stack)
}

/// Loss of the very first mini-batch for the same seed and shape.
fn initial_loss(config: &TrainingConfig, text: &[u8], zero_init: bool) -> f64 {
    let config = TrainingConfig {
        iterations: 1,
        ..config.clone()
    };
    run(config, text, zero_init).0.loss
}

#[test]
fn test_zero_initialized_loss_never_rises() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        iterations: 50,
        ..base_config(dir.path())
    };
    let start = initial_loss(&config, b"abab", true);

    let mut previous = start;
    for iterations in [10, 20, 30, 40, 50] {
        let (outcome, _) = run(
            TrainingConfig {
                iterations,
                ..config.clone()
            },
            b"abab",
            true,
        );
        assert!(
            outcome.loss <= previous + 1e-12,
            "moving-average loss rose from {previous} to {} by iteration {iterations}",
            outcome.loss
        );
        previous = outcome.loss;
    }
}

#[test]
fn test_adam_learns_alternation() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(dir.path());
    let start = initial_loss(&config, b"abab", false);
    let (outcome, _) = run(config, b"abab", false);

    assert_eq!(outcome.iterations, 400);
    assert!(!outcome.interrupted);
    assert!(
        outcome.loss < 0.5 * start,
        "Adam did not converge: start={start}, end={}",
        outcome.loss
    );
    assert!(outcome.record_loss <= outcome.loss + 1e-12);
}

#[test]
fn test_gradient_descent_reduces_loss() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        optimizer: OptimizerKind::GradientDescent,
        learning_rate: 0.3,
        momentum: 0.5,
        ..base_config(dir.path())
    };
    let start = initial_loss(&config, b"abab", false);
    let (outcome, _) = run(config, b"abab", false);
    assert!(
        outcome.loss < start,
        "gradient descent did not reduce loss: start={start}, end={}",
        outcome.loss
    );
}

#[test]
fn test_stateless_training_also_learns() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        stateful: false,
        ..base_config(dir.path())
    };
    let start = initial_loss(&config, b"abab", false);
    let (outcome, _) = run(config, b"abab", false);
    assert!(
        outcome.loss < start,
        "stateless run did not learn: start={start}, end={}",
        outcome.loss
    );
}

#[test]
fn test_stacked_sigmoid_interlayer_trains() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        layers: 2,
        neurons: 6,
        interlayer: Interlayer::Sigmoid,
        regularize: true,
        lambda: 1e-4,
        decrease_lr: true,
        learning_rate_decrease: 1000.0,
        ..base_config(dir.path())
    };
    let start = initial_loss(&config, b"abcabc", false);
    let (outcome, stack) = run(config, b"abcabc", false);
    assert!(outcome.loss < start);
    assert!(
        stack
            .layers()
            .iter()
            .all(|l| l.params().buffers().iter().all(|b| b.iter().all(|v| v.is_finite())))
    );
}

#[test]
fn test_epoch_bound_stops_training() {
    let dir = tempfile::tempdir().unwrap();
    // 10 symbols in windows of 4: offsets 0, 4, 8 make one epoch.
    let config = TrainingConfig {
        epochs: 3,
        iterations: 1_000,
        ..base_config(dir.path())
    };
    let (outcome, _) = run(config, b"abcdeabcde", false);
    assert_eq!(outcome.epochs, 3);
    assert_eq!(outcome.iterations, 9);
}

#[test]
fn test_raised_stop_flag_stores_and_returns() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        store_network_every: 8000,
        ..base_config(dir.path())
    };
    let mut symbols = SymbolTable::new();
    let corpus = Corpus::encode(b"hello world", &mut symbols).unwrap();
    let stop = Arc::new(AtomicBool::new(true));
    let mut trainer = Trainer::new(config.clone()).unwrap().with_stop_flag(stop);
    let mut stack = LayerStack::new(symbols.features(), 4, 1, false, trainer.rng_mut()).unwrap();

    let outcome = trainer.train(&mut stack, &symbols, &corpus).unwrap();
    assert!(outcome.interrupted);
    assert_eq!(outcome.iterations, 0);
    assert!(config.network_raw_path.exists());
    assert!(config.network_json_path.exists());

    let loaded = load_network(&config.network_raw_path).unwrap();
    assert_eq!(loaded.symbols, symbols);
}

#[test]
fn test_network_stored_after_training_without_cadence() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        iterations: 3,
        ..base_config(dir.path())
    };
    let (_, stack) = run(config.clone(), b"abcab", false);

    let loaded = load_network(&config.network_raw_path).unwrap();
    for (a, b) in loaded.stack.layers().iter().zip(stack.layers()) {
        assert_eq!(a.params(), b.params());
    }
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&config.network_json_path).unwrap()).unwrap();
    assert_eq!(json["LSTM layers"], 1);
}

#[test]
fn test_progress_and_sample_files() {
    let dir = tempfile::tempdir().unwrap();
    let samples = dir.path().join("samples.txt");
    let config = TrainingConfig {
        iterations: 3,
        store_progress_every: 1,
        progress_file: dir.path().join("progress.csv"),
        print_progress: true,
        print_every: 2,
        print_sample_output: false,
        sample_output_chars: 10,
        sample_output_file: Some(samples.clone()),
        ..base_config(dir.path())
    };
    run(config.clone(), b"abcab", false);

    let progress = fs::read_to_string(&config.progress_file).unwrap();
    let lines: Vec<&str> = progress.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("0,"));
    assert!(lines[2].starts_with("2,"));

    let written = fs::read_to_string(&samples).unwrap();
    assert!(written.contains("====== Iteration: 0, loss: "));
    assert!(written.contains("====== Iteration: 2, loss: "));
    assert!(!written.contains("Iteration: 1,"));
}

#[test]
fn test_mismatched_vocabulary_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut symbols = SymbolTable::new();
    let corpus = Corpus::encode(b"abc", &mut symbols).unwrap();
    let mut trainer = Trainer::new(base_config(dir.path())).unwrap();
    let mut stack = LayerStack::new(5, 4, 1, false, trainer.rng_mut()).unwrap();

    let err = trainer.train(&mut stack, &symbols, &corpus).unwrap_err();
    assert!(matches!(err, LstmError::ShapeMismatch { .. }));
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = TrainingConfig {
        layers: MAX_LAYERS + 1,
        ..TrainingConfig::default()
    };
    assert!(matches!(
        Trainer::new(config),
        Err(LstmError::InvalidConfig(_))
    ));
}
