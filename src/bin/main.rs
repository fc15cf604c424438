//! KMSD Command Line Interface
//!
//! Trains a kernel matched subspace detector on a labeled CSV library and
//! scores, evaluates or summarizes it.

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use kmsd::api::{TrainedDetector, KMSD};
use kmsd::core::{DetectorConfig, KMSDError, Result};
use kmsd::{load_observations, CSVDataset, Dataset, Detection};
use log::{error, info};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "kmsd")]
#[command(about = "Kernel matched subspace detector for two-class target detection")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on a labeled library and score observations
    Detect(DetectArgs),
    /// Train on one labeled file and measure detection quality on another
    Evaluate(EvaluateArgs),
    /// Train and display model information
    Info(InfoArgs),
}

/// Detector parameters shared by every subcommand
#[derive(Args, Debug)]
struct DetectorArgs {
    /// JSON file with detector parameters; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// RBF kernel width
    #[arg(short, long)]
    sigma: Option<f64>,

    /// Spectral energy fraction kept by each subspace basis
    #[arg(long)]
    energy_threshold: Option<f64>,

    /// Maximum number of observations scored at once
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Smallest accepted reciprocal condition number of Gamma (0 disables the check)
    #[arg(long)]
    rcond: Option<f64>,

    /// Score chunks sequentially instead of in parallel
    #[arg(long)]
    sequential: bool,
}

impl DetectorArgs {
    fn resolve(&self) -> Result<DetectorConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => DetectorConfig::default(),
        };

        if let Some(sigma) = self.sigma {
            config.sigma = sigma;
        }
        if let Some(energy_threshold) = self.energy_threshold {
            config.energy_threshold = energy_threshold;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(rcond) = self.rcond {
            config.rcond = rcond;
        }
        if self.sequential {
            config.parallel = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Args)]
struct DetectArgs {
    /// Labeled training CSV (last column: 1 = target, 0 = background)
    #[arg(long)]
    train: PathBuf,

    /// Observations to score
    #[arg(long)]
    data: PathBuf,

    /// The observation file carries a trailing label column to ignore
    #[arg(long)]
    labeled: bool,

    /// Declare rows with statistic >= threshold as targets
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Output file (optional, prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a JSON array instead of text lines
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    detector: DetectorArgs,
}

#[derive(Args)]
struct EvaluateArgs {
    /// Labeled training CSV
    #[arg(long)]
    train: PathBuf,

    /// Labeled test CSV
    #[arg(long)]
    test: PathBuf,

    /// Also report confusion metrics at this threshold
    #[arg(short, long)]
    threshold: Option<f64>,

    #[command(flatten)]
    detector: DetectorArgs,
}

#[derive(Args)]
struct InfoArgs {
    /// Labeled training CSV
    #[arg(long)]
    train: PathBuf,

    /// Print the model summary as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    detector: DetectorArgs,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Detect(args) => detect_command(args),
        Commands::Evaluate(args) => evaluate_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

/// One `detect --json` row; the decision is present only with a threshold
#[derive(Serialize)]
#[serde(untagged)]
enum ScoreRow {
    Decided {
        index: usize,
        #[serde(flatten)]
        detection: Detection,
    },
    Scored {
        index: usize,
        statistic: f64,
    },
}

fn load_config(path: &Path) -> Result<DetectorConfig> {
    let file = File::open(path).map_err(KMSDError::IoError)?;
    serde_json::from_reader(io::BufReader::new(file)).map_err(|e| {
        KMSDError::SerializationError(format!("Invalid config file {}: {e}", path.display()))
    })
}

fn train_detector(train: &Path, args: &DetectorArgs) -> Result<TrainedDetector> {
    let config = args.resolve()?;
    info!("Training detector on {train:?}");
    info!(
        "Parameters: sigma={}, energy_threshold={}, chunk_size={}, rcond={:e}, parallel={}",
        config.sigma, config.energy_threshold, config.chunk_size, config.rcond, config.parallel
    );

    let dataset = CSVDataset::from_file(train)?;
    info!(
        "Loaded {} samples with {} dimensions",
        dataset.len(),
        dataset.dim()
    );

    let detector = KMSD::with_config(config).train(&dataset)?;
    let model_info = detector.info();
    info!(
        "Basis sizes: delta={}, tau={}, beta={}",
        model_info.delta_columns, model_info.tau_columns, model_info.beta_columns
    );
    Ok(detector)
}

fn detect_command(args: DetectArgs) -> Result<()> {
    let detector = train_detector(&args.train, &args.detector)?;

    info!("Scoring observations from {:?}", args.data);
    let observations = load_observations(&args.data, args.labeled)?;
    let scores = detector.score(&observations)?;
    info!("Scored {} observations", scores.len());

    let detections: Option<Vec<Detection>> = args.threshold.map(|threshold| {
        scores
            .iter()
            .map(|&statistic| Detection::new(statistic, threshold))
            .collect()
    });

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).map_err(KMSDError::IoError)?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    if args.json {
        let rows: Vec<ScoreRow> = scores
            .iter()
            .enumerate()
            .map(|(index, &statistic)| match &detections {
                Some(d) => ScoreRow::Decided {
                    index,
                    detection: d[index],
                },
                None => ScoreRow::Scored { index, statistic },
            })
            .collect();
        serde_json::to_writer_pretty(&mut writer, &rows)
            .map_err(|e| KMSDError::SerializationError(e.to_string()))?;
        writeln!(writer).map_err(KMSDError::IoError)?;
    } else {
        writeln!(writer, "# Statistics for {} observations", scores.len())
            .map_err(KMSDError::IoError)?;
        writeln!(
            writer,
            "# Format: index statistic{}",
            if detections.is_some() { " decision" } else { "" }
        )
        .map_err(KMSDError::IoError)?;

        for (i, &statistic) in scores.iter().enumerate() {
            let line = match &detections {
                Some(d) => writeln!(writer, "{i} {statistic:.6} {}", d[i].label().as_index()),
                None => writeln!(writer, "{i} {statistic:.6}"),
            };
            line.map_err(KMSDError::IoError)?;
        }
    }
    writer.flush().map_err(KMSDError::IoError)?;

    if let Some(path) = &args.output {
        info!("Statistics saved to: {path:?}");
    }
    Ok(())
}

fn evaluate_command(args: EvaluateArgs) -> Result<()> {
    let detector = train_detector(&args.train, &args.detector)?;

    info!("Loading test data from: {:?}", args.test);
    let test = CSVDataset::from_file(&args.test)?;
    let metrics = detector.evaluate(&test)?;

    println!("=== Detector Evaluation ===");
    println!("Training file: {:?}", args.train);
    println!("Test file: {:?}", args.test);
    println!("Test samples: {}", test.len());
    println!("AUC: {:.4}", metrics.auc());

    if let Some(threshold) = args.threshold {
        let confusion = metrics.at_threshold(threshold);
        println!("\nMetrics at threshold {threshold}:");
        println!("  True Positives:   {}", confusion.true_positives);
        println!("  True Negatives:   {}", confusion.true_negatives);
        println!("  False Positives:  {}", confusion.false_positives);
        println!("  False Negatives:  {}", confusion.false_negatives);
        println!("  Accuracy:         {:.4}", confusion.accuracy());
        println!("  Precision:        {:.4}", confusion.precision());
        println!("  Recall:           {:.4}", confusion.recall());
        println!("  F1 Score:         {:.4}", confusion.f1_score());
        println!("  Specificity:      {:.4}", confusion.specificity());
    }

    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    let detector = train_detector(&args.train, &args.detector)?;
    let model_info = detector.info();

    if args.json {
        let text = serde_json::to_string_pretty(&model_info)
            .map_err(|e| KMSDError::SerializationError(e.to_string()))?;
        println!("{text}");
        return Ok(());
    }

    println!("=== Model Information ===");
    println!("Target samples:     {}", model_info.n_target);
    println!("Background samples: {}", model_info.n_background);
    println!("Dimensions:         {}", model_info.dim);
    println!("Sigma:              {}", model_info.sigma);
    println!("Energy threshold:   {}", model_info.energy_threshold);
    println!("\nSubspace bases:");
    println!("  Delta (joint):      {}", model_info.delta_columns);
    println!("  Tau (target):       {}", model_info.tau_columns);
    println!("  Beta (background):  {}", model_info.beta_columns);
    println!("\nGamma: {0}x{0}", model_info.gamma_size);
    match model_info.gamma_rcond {
        Some(rcond) => println!("  Reciprocal condition: {rcond:.3e}"),
        None => println!("  Reciprocal condition: unavailable"),
    }

    Ok(())
}
