use std::fs;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rustml_lstm::*;

fn train_small(text: &[u8], layers: usize, dir: &std::path::Path) -> (LayerStack, SymbolTable, TrainingConfig) {
    let config = TrainingConfig {
        layers,
        neurons: 5,
        mini_batch_size: 3,
        iterations: 20,
        print_progress: false,
        store_progress_every: 0,
        store_network_every: 0,
        seed: Some(11),
        ..TrainingConfig::default()
    }
    .with_save_dir(dir);
    let mut symbols = SymbolTable::new();
    let corpus = Corpus::encode(text, &mut symbols).unwrap();
    let mut trainer = Trainer::new(config.clone()).unwrap();
    let mut stack =
        LayerStack::new(symbols.features(), config.neurons, layers, false, trainer.rng_mut()).unwrap();
    trainer.train(&mut stack, &symbols, &corpus).unwrap();
    (stack, symbols, config)
}

/// Output distributions while feeding `sequence` from a zero state.
fn distributions(stack: &mut LayerStack, sequence: &[usize]) -> Vec<Vec<f64>> {
    let mut rings = stack.cache_rings(2);
    let mut input = vec![0.0; stack.features()];
    let mut out = Vec::new();
    for (t, &idx) in sequence.iter().enumerate() {
        input.fill(0.0);
        input[idx] = 1.0;
        stack.forward_step(&input, &mut rings, t % 2, (t + 1) % 2, ForwardOptions::default());
        out.push(rings[0][(t + 1) % 2].probs.clone());
    }
    out
}

#[test]
fn test_reloaded_two_layer_network_predicts_identically() {
    let dir = tempfile::tempdir().unwrap();
    let (mut stack, symbols, config) = train_small(b"the cat sat on the mat", 2, dir.path());

    let mut loaded = load_network(&config.network_raw_path).unwrap();
    assert_eq!(loaded.symbols, symbols);
    assert_eq!(loaded.stack.len(), 2);

    let seq = [0, 1, 2, 3, 4, 0, 5];
    assert_eq!(distributions(&mut stack, &seq), distributions(&mut loaded.stack, &seq));

    let mut rng_a = StdRng::seed_from_u64(3);
    let mut rng_b = StdRng::seed_from_u64(3);
    let a = Generator::new(&mut stack, &symbols).generate_from_seed(b"the ", 30, &mut rng_a);
    let b = Generator::new(&mut loaded.stack, &loaded.symbols).generate_from_seed(b"the ", 30, &mut rng_b);
    assert_eq!(a, b);
    assert_eq!(a.len(), 4 + 1 + 30);
    assert!(a.starts_with(b"the "));
}

#[test]
fn test_vocabulary_expansion_keeps_learned_block() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, config) = train_small(b"abcabcab", 2, dir.path());

    let loaded = load_network(&config.network_raw_path).unwrap();
    let before = loaded.stack.clone();
    let mut symbols = loaded.symbols;
    let mut stack = loaded.stack;
    let fa = symbols.features();

    let corpus_b = dir.path().join("b.txt");
    fs::write(&corpus_b, b"abcxyzab").unwrap();
    Corpus::from_file(&corpus_b, &mut symbols).unwrap();
    let fb = symbols.features();
    assert_eq!((fa, fb), (3, 6));
    assert_eq!(&symbols.symbols()[..3], b"abc");

    let mut rng = StdRng::seed_from_u64(9);
    assert!(stack.expand_vocabulary(fb, &mut rng).unwrap());
    assert!(!stack.expand_vocabulary(fb, &mut rng).unwrap());
    assert_eq!(stack.features(), fb);
    assert_eq!(stack.classes(), fb);

    let n = 5;
    let input_old = before.input_layer().params();
    let input_new = stack.input_layer().params();
    let (old_s, new_s) = (n + fa, n + fb);
    for (old, new) in [
        (&input_old.wf, &input_new.wf),
        (&input_old.wi, &input_new.wi),
        (&input_old.wc, &input_new.wc),
        (&input_old.wo, &input_new.wo),
    ] {
        for row in 0..n {
            assert_eq!(&new[row * new_s..row * new_s + old_s], &old[row * old_s..(row + 1) * old_s]);
        }
        let fresh: Vec<f64> = (0..n)
            .flat_map(|row| new[row * new_s + old_s..(row + 1) * new_s].to_vec())
            .collect();
        assert!(fresh.iter().all(|v| v.is_finite()));
        assert!(fresh.iter().any(|&v| v != 0.0));
    }
    assert_eq!(input_new.wy, input_old.wy);

    let output_old = before.output_layer().params();
    let output_new = stack.output_layer().params();
    assert_eq!(&output_new.wy[..fa * n], &output_old.wy[..]);
    assert!(output_new.wy[fa * n..].iter().all(|v| v.is_finite()));
    assert!(output_new.wy[fa * n..].iter().any(|&v| v != 0.0));
    assert_eq!(&output_new.by[..fa], &output_old.by[..]);
    assert_eq!(output_new.wf, output_old.wf);
}

#[test]
fn test_json_export_layout() {
    let dir = tempfile::tempdir().unwrap();
    let (stack, symbols, config) = train_small(b"abcab", 2, dir.path());

    let text = fs::read_to_string(&config.network_json_path).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["Feature mapping"]["0"], "97");
    assert_eq!(doc["Feature mapping"]["2"], "99");
    assert_eq!(doc["LSTM layers"], 2);

    let layer = &doc["Layer 1"];
    let wy = layer["Wy"].as_array().unwrap();
    assert_eq!(wy.len(), symbols.features());
    assert_eq!(wy[0].as_array().unwrap().len(), 5);
    let wf = doc["Layer 2"]["Wf"].as_array().unwrap();
    assert_eq!(wf.len(), 5);
    assert_eq!(wf[0].as_array().unwrap().len(), 5 + symbols.features());

    let stored = wy[0][0].as_f64().unwrap();
    let exact = stack.output_layer().params().wy[0];
    assert!((stored - exact).abs() < 1e-14);

    let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["Feature mapping", "LSTM layers", "Layer 1", "Layer 2"]);
}

#[test]
fn test_raw_image_round_trips_in_memory() {
    let mut rng = StdRng::seed_from_u64(21);
    let stack = LayerStack::new(4, 3, 3, false, &mut rng).unwrap();
    let symbols = SymbolTable::from_symbols(b"wxyz").unwrap();

    let image = encode_network(&stack, &symbols);
    assert!(image.starts_with(b"1\r\n4\r\n3\r\n"));
    let decoded = decode_network(&image).unwrap();
    for (a, b) in decoded.stack.layers().iter().zip(stack.layers()) {
        assert_eq!(a.params(), b.params());
    }
}

#[test]
fn test_malformed_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.net");

    fs::write(&path, b"not a network").unwrap();
    assert!(matches!(load_network(&path), Err(LstmError::Format(_))));

    let mut rng = StdRng::seed_from_u64(22);
    let stack = LayerStack::new(2, 2, 1, false, &mut rng).unwrap();
    let symbols = SymbolTable::from_symbols(b"ab").unwrap();
    let image = encode_network(&stack, &symbols);
    fs::write(&path, &image[..image.len() - 3]).unwrap();
    assert!(matches!(load_network(&path), Err(LstmError::Format(_))));

    let missing = dir.path().join("missing.net");
    assert!(matches!(load_network(&missing), Err(LstmError::Io(_))));
}

#[test]
fn test_header_dimensions_are_checked_before_allocation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.net");

    fs::write(&path, b"1\r\n1\r\n1\r\n1\r\n2305843009213693952\r\n1\r\n97\r\n").unwrap();
    assert!(matches!(load_network(&path), Err(LstmError::Format(_))));

    let mut data = b"1\r\n1\r\n1\r\n4\r\n50000000\r\n1\r\n97\r\n".to_vec();
    data.extend_from_slice(&[0u8; 256]);
    fs::write(&path, &data).unwrap();
    assert!(matches!(load_network(&path), Err(LstmError::Format(_))));
}

#[test]
fn test_output_width_mismatch_fails_to_load() {
    // One layer with X=1, N=1, Y=3 but a single listed symbol.
    let mut data = b"1\r\n1\r\n1\r\n1\r\n1\r\n3\r\n97\r\n".to_vec();
    data.extend(std::iter::repeat_n(0u8, ParamSet::zeros(1, 1, 3).len() * 8));
    assert!(matches!(decode_network(&data), Err(LstmError::Format(_))));

    let mut rng = StdRng::seed_from_u64(24);
    let mut stack = LayerStack::from_layers(vec![LstmLayer::zeros(1, 1, 3)]).unwrap();
    assert!(matches!(
        stack.expand_vocabulary(2, &mut rng),
        Err(LstmError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_feature_count_must_match_symbol_list() {
    let mut rng = StdRng::seed_from_u64(23);
    let stack = LayerStack::new(3, 2, 1, false, &mut rng).unwrap();
    let symbols = SymbolTable::from_symbols(b"ab").unwrap();
    let image = encode_network(&stack, &symbols);
    assert!(decode_network(&image).is_err());
}
