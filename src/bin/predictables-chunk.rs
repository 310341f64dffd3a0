#![cfg(not(tarpaulin_include))]

//! Command line access to the chunk planner and chunk store.

use clap::{Parser, Subcommand};
use env_logger::Env;
use predictables::chunk::{ChunkStore, DEFAULT_DATASET_NAME, WriteOutcome};
use predictables::loader::{SampleStore, load_dataset};
use predictables::{Dataset, Settings, plan_chunk_count, serialize_chunks};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Plan, write and inspect JSON chunks of a dataset
#[derive(Parser)]
#[command(name = "predictables-chunk", version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file to read instead of ./predictables.{toml,yaml,json}
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print how many chunks a dataset would be split into
    Plan {
        /// Path to a CSV/JSON file, or the name of a dataset in the data directory
        dataset: String,
    },
    /// Split a dataset into chunk files
    Chunk {
        dataset: String,
        /// Name used in chunk file names (defaults to the dataset name)
        #[arg(long)]
        name: Option<String>,
        /// Number of chunks (defaults to the planned count)
        #[arg(long)]
        chunks: Option<usize>,
        /// Serialize without writing and print chunk sizes
        #[arg(long)]
        dry_run: bool,
    },
    /// Print one stored chunk (1-based index)
    Show {
        name: String,
        index: usize,
        total: usize,
    },
    /// POST every chunk of a dataset to a URL
    Send {
        dataset: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        chunks: Option<usize>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::new()?,
    };

    match cli.command {
        Commands::Plan { dataset } => {
            let (_, data) = open_dataset(&settings, &dataset)?;
            println!("{}", plan_chunk_count(data.len()));
        }
        Commands::Chunk {
            dataset,
            name,
            chunks,
            dry_run,
        } => {
            let (default_name, data) = open_dataset(&settings, &dataset)?;
            let name = name.unwrap_or(default_name);
            let count = chunks.unwrap_or_else(|| plan_chunk_count(data.len()));

            if dry_run {
                for (i, chunk) in serialize_chunks(&data, count)?.iter().enumerate() {
                    println!("chunk {:>3}: {} bytes", i + 1, chunk.len());
                }
                return Ok(());
            }

            let store = ChunkStore::new(&settings.chunk_dir);
            match store.write_chunks(&data, count, &name, true)? {
                WriteOutcome::Written { chunks } => {
                    println!("wrote {} chunks to {}", chunks.len(), store.root().display());
                }
                WriteOutcome::Skipped { files } => {
                    println!("{} chunk files already present, nothing to do", files.len());
                }
            }
        }
        Commands::Show { name, index, total } => {
            if index == 0 {
                return Err("chunk index starts at 1".into());
            }
            let store = ChunkStore::new(&settings.chunk_dir);
            println!("{}", store.read_chunk(&name, index - 1, total)?);
        }
        #[cfg(not(feature = "web"))]
        Commands::Send { .. } => {
            return Err("sending chunks needs the `web` feature".into());
        }
        #[cfg(feature = "web")]
        Commands::Send {
            dataset,
            url,
            chunks,
        } => {
            let (_, data) = open_dataset(&settings, &dataset)?;
            let count = chunks.unwrap_or_else(|| plan_chunk_count(data.len()));
            let runtime = tokio::runtime::Runtime::new()?;
            let client = reqwest::Client::new();
            let report = runtime.block_on(predictables::dispatch::split_and_send(
                &client, &data, &url, count,
            ))?;

            for delivery in &report.deliveries {
                match &delivery.outcome {
                    Ok(_) => println!("chunk {:>3}: ok", delivery.index + 1),
                    Err(e) => println!("chunk {:>3}: failed ({e})", delivery.index + 1),
                }
            }
            if !report.all_ok() {
                return Err(format!("{} of {} chunks failed", report.failed(), report.len()).into());
            }
        }
    }

    Ok(())
}

// A file path wins over a dataset name of the same spelling
fn open_dataset(
    settings: &Settings,
    dataset: &str,
) -> Result<(String, Dataset), Box<dyn std::error::Error>> {
    let path = Path::new(dataset);
    if path.is_file() {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(DEFAULT_DATASET_NAME)
            .replace('-', "_");
        return Ok((name, load_dataset(path)?));
    }

    let samples = SampleStore::new(&settings.data_dir);
    let name = SampleStore::normalize_name(dataset)?;
    let data = samples.load(&name)?;
    Ok((name, data))
}
