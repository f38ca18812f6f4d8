//! blobpack - Convert between JSON and the blob binary format
//!
//! Encodes JSON documents into blobs, renders blobs back to JSON, dumps their
//! field layout and checks them against signatures.

use anyhow::{bail, Context, Result};
use blobpack_core::{dump, validate, Blob, BlobConfig, Signature, DEFAULT_MAX_SIZE};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, trace, Level};
use tracing_subscriber::EnvFilter;

/// Convert between JSON and the blob binary format
#[derive(Parser, Debug)]
#[command(name = "blobpack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Largest blob to build or accept, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_SIZE, global = true)]
    max_size: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a JSON document into a blob
    Encode {
        /// JSON input file
        input: PathBuf,

        /// Output file (defaults to the input path with a .blob extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Render a blob as JSON
    Decode {
        /// Blob input file
        input: PathBuf,

        /// Indent the output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the field layout of a blob
    Dump {
        /// Blob input file
        input: PathBuf,
    },

    /// Check a blob against a signature such as "s{si}[f]"
    Validate {
        /// Blob input file
        input: PathBuf,

        /// Signature the root's children must match
        signature: String,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = BlobConfig::new().max_size(cli.max_size);

    match cli.command {
        Command::Encode {
            input,
            output,
            force,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension("blob"));
            let written = encode_file(&input, &output, force, config)?;
            info!("Wrote {} bytes to {}", written, output.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Decode { input, pretty } => {
            let blob = load_blob(&input, config)?;
            println!("{}", render(&blob, pretty));
            Ok(ExitCode::SUCCESS)
        }
        Command::Dump { input } => {
            let blob = load_blob(&input, config)?;
            print!("{}", dump::dump_blob(&blob));
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { input, signature } => {
            let blob = load_blob(&input, config)?;
            if check_signature(&blob, &signature)? {
                println!("ok");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("mismatch");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Encode a JSON file and write the blob, returning the number of bytes
/// written
fn encode_file(input: &Path, output: &Path, force: bool, config: BlobConfig) -> Result<usize> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;

    let blob = Blob::from_json_with_config(&text, config)
        .with_context(|| format!("Failed to encode JSON from {}", input.display()))?;
    blob.log_dump();

    let bytes = blob.into_bytes();
    write_output(output, &bytes, force)?;
    Ok(bytes.len())
}

/// Read and adopt a serialized blob
fn load_blob(path: &Path, config: BlobConfig) -> Result<Blob> {
    trace!("Reading {}", path.display());
    let data =
        fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))?;
    debug!("Read {} bytes from {}", data.len(), path.display());

    Blob::from_bytes_with_config(&data, config)
        .with_context(|| format!("Not a valid blob: {}", path.display()))
}

/// JSON rendering of the whole blob
fn render(blob: &Blob, pretty: bool) -> String {
    if pretty {
        blob.to_json_pretty()
    } else {
        blob.to_json()
    }
}

/// Validate the root's children, rejecting malformed signatures up front
fn check_signature(blob: &Blob, signature: &str) -> Result<bool> {
    Signature::parse(signature).context("Invalid signature")?;
    Ok(validate(blob.head(), signature))
}

/// Write the encoded blob to disk
fn write_output(output_path: &Path, content: &[u8], force: bool) -> Result<()> {
    // Create parent directories
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    if output_path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            output_path.display()
        );
    }

    let mut file = fs::File::create(output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;

    file.write_all(content)
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(())
}
