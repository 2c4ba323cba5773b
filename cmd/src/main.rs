use std::io::stderr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use apxdf::{apxdf_to_csv, Apx3Hit, Apx4Hit, ApxdfReader, ChipVersion, Hit};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the header and hit count of an AstroPix data file
    Info {
        /// Input data file
        input: PathBuf,

        /// Chip version the file was recorded with (3 or 4)
        #[arg(short = 'V', long, default_value = "4")]
        chip_version: ChipVersion,
    },
    /// Convert an AstroPix data file to CSV, one row per hit
    Convert {
        /// Input data file
        input: PathBuf,

        /// Output file path; defaults to the input path with a .csv extension
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Chip version the file was recorded with (3 or 4)
        #[arg(short = 'V', long, default_value = "4")]
        chip_version: ChipVersion,
    },
}

fn info<H: Hit>(input: &Path) -> Result<()> {
    let reader = ApxdfReader::<H, _>::open(input)
        .with_context(|| format!("failed to open {}", input.display()))?;
    println!("{}", serde_json::to_string_pretty(reader.header().info())?);
    let mut num_hits = 0usize;
    for hit in reader {
        hit.with_context(|| format!("failed to decode hit {num_hits}"))?;
        num_hits += 1;
    }
    println!("{num_hits} hits");
    Ok(())
}

fn convert<H: Hit>(input: &Path, output: Option<PathBuf>) -> Result<()> {
    let output = apxdf_to_csv::<H>(input, output)
        .with_context(|| format!("failed to convert {}", input.display()))?;
    println!("{}", output.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("APXDF_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Info {
            input,
            chip_version,
        } => match chip_version {
            ChipVersion::V3 => info::<Apx3Hit>(&input),
            ChipVersion::V4 => info::<Apx4Hit>(&input),
        },
        Commands::Convert {
            input,
            output,
            chip_version,
        } => match chip_version {
            ChipVersion::V3 => convert::<Apx3Hit>(&input, output),
            ChipVersion::V4 => convert::<Apx4Hit>(&input, output),
        },
    }
}
