use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use mnist_detect::detection::inference::load_model;
use mnist_detect::detection::{
    DatasetConfig, IdxDataset, Normalization, PreprocessOptions, RtenLoader, dataset_pipeline,
    evaluate, image_pipeline, inference_pipeline,
};
use mnist_detect::{Command, DetectionResult, Invocation, cli};

/// Width of a 100% bar in the probability chart
const BAR_WIDTH: f32 = 40.0;

fn main() -> anyhow::Result<()> {
    let args = Invocation::parse_from(std::env::args_os());
    init_logging(args.verbose);

    match args.command {
        Command::Help => print!("{}", cli::help_text()),
        Command::DetectFromImage {
            image_path,
            model_path,
            invert,
            normalize,
        } => {
            let options = PreprocessOptions {
                invert,
                normalization: normalize.then(Normalization::mnist),
            };
            detect_from_image(&image_path, &model_path, options)?
        }
        Command::DetectFromDataset {
            model_path,
            sample_count,
            data_dir,
            mirror,
        } => {
            let mut dataset = IdxDataset::new(&data_dir);
            if let Some(mirror) = mirror {
                dataset = dataset.with_mirror(mirror);
            }
            detect_from_dataset(&model_path, sample_count, dataset)?
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn detect_from_image(
    image_path: &Path,
    model_path: &Path,
    options: PreprocessOptions,
) -> anyhow::Result<()> {
    println!("Loading model: {}", model_path.display());
    println!("Processing image: {}", image_path.display());
    if options.invert {
        println!("(inverting colors)");
    }
    if options.normalization.is_some() {
        println!("(normalizing with MNIST mean/std)");
    }
    println!();

    let images = image_pipeline(options);
    let model = load_model(model_path, &RtenLoader)?;
    let detect = images.then(&inference_pipeline(model));

    tracing::debug!(pipeline = detect.name(), "running");
    let result = detect.execute(image_path.to_path_buf())?;

    print_result(&result);
    Ok(())
}

fn detect_from_dataset(
    model_path: &Path,
    sample_count: usize,
    dataset: IdxDataset,
) -> anyhow::Result<()> {
    println!("Loading model: {}", model_path.display());
    println!("Running on {} MNIST test samples", sample_count);
    println!();

    let dir = dataset.dir().to_path_buf();
    let samples = dataset_pipeline(Arc::new(dataset)).execute(DatasetConfig { sample_count })?;
    tracing::info!(loaded = samples.len(), dir = %dir.display(), "loaded test samples");

    let model = load_model(model_path, &RtenLoader)?;
    let evaluation = evaluate(&samples, &inference_pipeline(model))?;

    for outcome in &evaluation.outcomes {
        println!(
            "  Sample {:3}: label={}  predicted={}  confidence={:.1}%  {}",
            outcome.index,
            outcome.label,
            outcome.result.predicted_digit,
            outcome.result.confidence * 100.0,
            if outcome.is_correct() { "OK" } else { "MISS" }
        );
    }

    println!();
    println!(
        "Accuracy: {}/{} ({:.1}%)",
        evaluation.correct(),
        evaluation.total(),
        evaluation.accuracy() * 100.0
    );

    Ok(())
}

fn print_result(result: &DetectionResult) {
    println!("Predicted digit: {}", result.predicted_digit);
    println!("Confidence: {:.1}%\n", result.confidence * 100.0);
    println!("Probability distribution:");

    for (digit, prob) in result.probabilities.iter().enumerate() {
        let bar = "#".repeat((prob * BAR_WIDTH).round() as usize);
        let marker = if digit == result.predicted_digit as usize { " <--" } else { "" };
        println!("  [{}] {:5.1}% {}{}", digit, prob * 100.0, bar, marker);
    }
}
