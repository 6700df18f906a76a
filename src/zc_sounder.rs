//! Command line front end. `estimate` turns capture files into a JSON report of channel
//! estimates; `tx-waveform` writes the burst the transmitter should play, as an sc16 file.

use clap::{Parser, Subcommand};
use failure::{err_msg, Error};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use zc_channel_est::{
    build_configured_burst, init_logging, write_capture, CaptureSource, ChannelEstConfig,
    Experiment, SampleFormat,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level when RUST_LOG isn't set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the channel from one capture file per receiver channel
    Estimate {
        /// JSON config. Defaults are used if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Where to write the report. Defaults to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Capture files; replace the ones listed in the config
        captures: Vec<PathBuf>,
    },
    /// Write the transmitter burst as interleaved int16
    TxWaveform {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        /// Burst length; overrides `num_samples` from the config
        #[arg(long)]
        num_samples: Option<usize>,
    },
}

fn load_config(path: Option<&Path>) -> Result<ChannelEstConfig, Error> {
    match path {
        Some(path) => {
            info!("Reading config from {}", path.display());
            ChannelEstConfig::from_json_file(path)
        }
        None => Ok(ChannelEstConfig::default()),
    }
}

fn estimate(
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    captures: Vec<PathBuf>,
) -> Result<(), Error> {
    let mut config = load_config(config.as_deref())?;
    if !captures.is_empty() {
        config.captures = captures.into_iter().map(CaptureSource::from_path).collect();
    }
    if config.captures.is_empty() {
        return Err(err_msg("no capture files given"));
    }

    let experiment = Experiment::new(&config)?;
    let report = experiment.run_files(&config.captures, config.format, config.sample_rate);

    match output {
        Some(path) => {
            serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), &report)?;
            info!("Report written to {}", path.display());
        }
        None => serde_json::to_writer_pretty(std::io::stdout(), &report)?,
    }
    Ok(())
}

fn tx_waveform(
    config: Option<PathBuf>,
    output: PathBuf,
    num_samples: Option<usize>,
) -> Result<(), Error> {
    let mut config = load_config(config.as_deref())?;
    if let Some(n) = num_samples {
        config.num_samples = n;
    }
    let burst = build_configured_burst(&config.reference()?, &config.tx)?;
    write_capture(&output, &burst, SampleFormat::Sc16)?;
    info!(
        "Wrote {}-sample burst (u = {}, N = {}, q = {}) to {}",
        burst.len(),
        config.zc.root,
        config.zc.length,
        config.zc.shift,
        output.display()
    );
    Ok(())
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Estimate {
            config,
            output,
            captures,
        } => estimate(config, output, captures),
        Commands::TxWaveform {
            config,
            output,
            num_samples,
        } => tx_waveform(config, output, num_samples),
    }
}
