use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::detection::dataset::{DEFAULT_MIRROR, default_data_dir};

/// Default number of test samples
pub const DEFAULT_SAMPLE_COUNT: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "mnist-detect")]
#[command(about = "Classify handwritten digits with a pretrained CNN")]
#[command(disable_help_subcommand = true)]
#[command(after_help = "Examples:\n  \
    mnist-detect detect --model mnist.rten digit.png\n  \
    mnist-detect detect --model mnist.rten --invert --normalize photo.jpg\n  \
    mnist-detect test --model mnist.rten --count 20\n  \
    mnist-detect test --model mnist.rten --offline --data-dir ./mnist")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Detect digit from image file
    Detect {
        /// Path to the model file
        #[arg(long, value_name = "PATH")]
        model: PathBuf,

        /// Invert image colors (dark digit on light background)
        #[arg(long)]
        invert: bool,

        /// Normalize with the MNIST mean and standard deviation
        #[arg(long)]
        normalize: bool,

        /// Path to input image file
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },

    /// Run on MNIST test dataset samples
    Test {
        /// Path to the model file
        #[arg(long, value_name = "PATH")]
        model: PathBuf,

        /// Number of test samples
        #[arg(long, value_name = "N", default_value_t = DEFAULT_SAMPLE_COUNT)]
        count: usize,

        /// Directory holding the IDX test files [default: ~/.cache/mnist]
        #[arg(long, value_name = "DIR", env = "MNIST_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Base URL missing test files are downloaded from
        #[arg(long, value_name = "URL", env = "MNIST_MIRROR", default_value = DEFAULT_MIRROR)]
        mirror: String,

        /// Never download, only use files already in the data directory
        #[arg(long)]
        offline: bool,
    },
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    DetectFromImage {
        image_path: PathBuf,
        model_path: PathBuf,
        invert: bool,
        normalize: bool,
    },
    DetectFromDataset {
        model_path: PathBuf,
        sample_count: usize,
        data_dir: PathBuf,
        /// Where missing files are fetched from; `None` when offline
        mirror: Option<String>,
    },
}

/// Parsed command line: one command plus global flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub verbose: bool,
}

impl Invocation {
    /// Parse `args` (including the program name).
    ///
    /// Never fails: missing or malformed arguments print the parse error to
    /// stderr and fall back to [`Command::Help`].
    pub fn parse_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = match Cli::try_parse_from(args) {
            Ok(cli) => cli,
            Err(e) => {
                if !matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                    eprintln!("{}", e.render());
                }
                return Self::help();
            }
        };

        let command = match cli.command {
            None => Command::Help,
            Some(CliCommand::Detect {
                model,
                invert,
                normalize,
                image,
            }) => Command::DetectFromImage {
                image_path: image,
                model_path: model,
                invert,
                normalize,
            },
            Some(CliCommand::Test {
                model,
                count,
                data_dir,
                mirror,
                offline,
            }) => Command::DetectFromDataset {
                model_path: model,
                sample_count: count,
                data_dir: data_dir.unwrap_or_else(default_data_dir),
                mirror: (!offline).then_some(mirror),
            },
        };

        Self {
            command,
            verbose: cli.verbose,
        }
    }

    fn help() -> Self {
        Self {
            command: Command::Help,
            verbose: false,
        }
    }
}

/// Rendered usage text
pub fn help_text() -> String {
    Cli::command().render_long_help().to_string()
}
