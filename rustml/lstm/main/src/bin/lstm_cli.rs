use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use clap::Parser;

use rustml_lstm::{
    Corpus, Generator, LayerStack, MAX_LAYERS, OptimizerKind, SamplingStrategy, SymbolTable,
    Trainer, TrainingConfig, load_network, network_summary,
};

/// Symbols printed after a seed string in generate-only mode.
const SEED_OUTPUT_LENGTH: usize = 256;

/// Train a character-level LSTM on a data file, or generate text from a
/// trained network.
#[derive(Parser)]
#[command(name = "rustml-lstm", version, about)]
struct Cli {
    /// Training data file (read byte-wise).
    data_file: PathBuf,

    /// Continue from a previously stored raw network file.
    #[arg(short = 'r', long)]
    read: Option<PathBuf>,

    /// JSON configuration file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Learning rate.
    #[arg(long)]
    lr: Option<f64>,

    /// Number of training iterations (not epochs).
    #[arg(long)]
    iterations: Option<u64>,

    /// Number of epochs; 0 means unbounded.
    #[arg(long)]
    epochs: Option<u64>,

    /// Mini-batch size (truncated BPTT window).
    #[arg(long)]
    mini_batch: Option<usize>,

    /// Decay the learning rate as lr0 / (1 + n / VALUE).
    #[arg(long)]
    decay: Option<f64>,

    /// Iterations between network stores; 0 stores once after training.
    #[arg(long)]
    store_every: Option<u64>,

    /// Print this many symbols from a loaded network and exit.
    #[arg(long, requires = "read")]
    out: Option<usize>,

    /// Number of stacked layers.
    #[arg(short = 'L', long)]
    layers: Option<usize>,

    /// Neurons in every layer.
    #[arg(short = 'N', long)]
    neurons: Option<usize>,

    /// 0 silences progress reports during training.
    #[arg(long, default_value_t = 1)]
    verbosity: u8,

    /// Skip training and generate text primed with this seed.
    #[arg(short = 'c', long)]
    seed: Option<String>,

    /// Directory for the stored raw and JSON networks.
    #[arg(short = 's', long)]
    save_dir: Option<PathBuf>,

    /// Optimizer: adam or sgd.
    #[arg(long)]
    optimizer: Option<String>,

    /// Always pick the most probable symbol when generating.
    #[arg(long)]
    greedy: bool,

    /// Append training samples to this file.
    #[arg(long)]
    sample_file: Option<PathBuf>,

    /// Seed for the random number generator.
    #[arg(long)]
    rng_seed: Option<u64>,
}

fn build_config(cli: &Cli) -> Result<TrainingConfig> {
    let mut config = match &cli.config {
        Some(path) => TrainingConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TrainingConfig::default(),
    };

    if let Some(lr) = cli.lr {
        if lr <= 0.0 {
            bail!("--lr must be > 0, got {}", lr);
        }
        config.learning_rate = lr;
    }
    if let Some(it) = cli.iterations {
        if it == 0 {
            bail!("--iterations must be > 0");
        }
        config.iterations = it;
    }
    if let Some(ep) = cli.epochs {
        config.epochs = ep;
    }
    if let Some(mb) = cli.mini_batch {
        if mb == 0 {
            bail!("--mini-batch must be > 0");
        }
        config.mini_batch_size = mb;
    }
    if let Some(k) = cli.decay {
        if k == 0.0 {
            bail!("--decay must be non-zero");
        }
        config.decrease_lr = true;
        config.learning_rate_decrease = k;
    }
    if let Some(st) = cli.store_every {
        config.store_network_every = st;
    }
    if let Some(l) = cli.layers {
        if l == 0 || l > MAX_LAYERS {
            bail!("--layers must be in 1..={}, got {}", MAX_LAYERS, l);
        }
        config.layers = l;
    }
    if let Some(n) = cli.neurons {
        config.neurons = n;
    }
    if let Some(name) = &cli.optimizer {
        config.optimizer = name.parse::<OptimizerKind>()?;
    }
    if cli.verbosity == 0 {
        config.print_progress = false;
    }
    if cli.greedy {
        config.sampling = SamplingStrategy::Greedy;
    }
    if let Some(path) = &cli.sample_file {
        config.sample_output_file = Some(path.clone());
    }
    if let Some(seed) = cli.rng_seed {
        config.seed = Some(seed);
    }
    if let Some(dir) = &cli.save_dir {
        config = config.with_save_dir(dir);
    }

    config.validate()?;
    Ok(config)
}

fn write_stdout(bytes: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(bytes)?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let mut trainer = Trainer::new(config.clone())?;

    let (mut stack, mut symbols) = match &cli.read {
        Some(path) => {
            let loaded = load_network(path)
                .with_context(|| format!("Failed to load network {}", path.display()))?;
            log::info!("Loaded the net: {}", path.display());
            (Some(loaded.stack), loaded.symbols)
        }
        None => (None, SymbolTable::new()),
    };

    if let (Some(count), Some(stack)) = (cli.out, stack.as_mut()) {
        let text = Generator::new(stack, &symbols)
            .with_options(trainer.forward_options())
            .with_strategy(config.sampling)
            .generate_from_index(0, count, trainer.rng_mut());
        return write_stdout(&text);
    }

    // A seed with a loaded network ignores the data file.
    let corpus = if cli.seed.is_some() && stack.is_some() {
        None
    } else {
        let loaded_features = symbols.features();
        let corpus = Corpus::from_file(&cli.data_file, &mut symbols)
            .with_context(|| format!("Failed to read data file {}", cli.data_file.display()))?;
        if let Some(stack) = stack.as_mut() {
            if stack.expand_vocabulary(symbols.features(), trainer.rng_mut())? {
                log::info!(
                    "New features detected in the data file: the loaded network had {}, now {}. Expanded the input and output layers.",
                    loaded_features,
                    symbols.features()
                );
            }
        }
        Some(corpus)
    };

    let mut stack = match stack {
        Some(stack) => stack,
        None => LayerStack::new(
            symbols.features(),
            config.neurons,
            config.layers,
            false,
            trainer.rng_mut(),
        )?,
    };

    if let Some(seed) = &cli.seed {
        let text = Generator::new(&mut stack, &symbols)
            .with_options(trainer.forward_options())
            .with_strategy(config.sampling)
            .generate_from_seed(seed.as_bytes(), SEED_OUTPUT_LENGTH, trainer.rng_mut());
        return write_stdout(&text);
    }

    let Some(corpus) = corpus else {
        bail!("No training data available");
    };

    log::info!("LSTM network: {}", network_summary(&stack));
    log::info!(
        "Training parameters: Backprop Through Time: {}, LR: {}, Mo: {}, LA: {}, LR-decrease: {}, optimizer: {}",
        config.mini_batch_size,
        config.learning_rate,
        config.momentum,
        config.lambda,
        config.learning_rate_decrease,
        config.optimizer,
    );

    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))
        .context("Failed to install the interrupt handler")?;
    let mut trainer = trainer.with_stop_flag(stop);

    let outcome = trainer.train(&mut stack, &symbols, &corpus)?;
    if outcome.interrupted {
        log::info!(
            "Interrupted after {} iterations. The raw network can be reloaded with --read {}",
            outcome.iterations,
            config.network_raw_path.display()
        );
    }
    println!("Loss after training: {:.6}", outcome.loss);
    Ok(())
}
