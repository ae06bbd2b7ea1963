use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{eyre, Context};
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use beamline::deck::{csv_header, csv_row, Deck};
use beamline::optics::QuadKernel;
use beamline::tracker::UpdatePolicy;

/// Propagate a probe through the lattice of a deck and print its trajectory as CSV
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Deck file (JSON)
    deck: PathBuf,

    /// Quadrupole kernel
    #[arg(long, value_enum)]
    kernel: Option<QuadKernel>,

    /// Maximum slice length [m]
    #[arg(long)]
    step_size: Option<f64>,

    /// When states are recorded
    #[arg(long, value_enum)]
    policy: Option<UpdatePolicy>,

    /// Disable sub-stepping
    #[arg(long)]
    no_sub_stepping: bool,

    /// Write the CSV table to this file instead of stdout
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let file = File::open(&args.deck)
        .wrap_err_with(|| format!("Failed to open deck {}", args.deck.display()))?;
    let mut deck: Deck = serde_json::from_reader(io::BufReader::new(file))
        .wrap_err_with(|| format!("Invalid deck {}", args.deck.display()))?;

    if let Some(kernel) = args.kernel {
        deck.tracker.quad_kernel = kernel;
    }
    if let Some(step_size) = args.step_size {
        deck.tracker.step_size = step_size;
    }
    if let Some(policy) = args.policy {
        deck.tracker.update_policy = policy;
    }
    if args.no_sub_stepping {
        deck.tracker.sub_stepping = false;
    }

    let (trajectory, failure) = match deck.track() {
        Ok(trajectory) => (trajectory, None),
        Err((err, partial)) => (partial, Some(err)),
    };

    let mut out: Box<dyn Write> = match &args.csv {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).wrap_err("Failed to create output file")?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    writeln!(out, "{}", csv_header(deck.probe.data.kind()))?;
    for state in &trajectory {
        writeln!(out, "{}", csv_row(state))?;
    }
    out.flush()?;

    match failure {
        Some(err) => Err(eyre!(err).wrap_err(format!(
            "Propagation stopped after {} states",
            trajectory.len()
        ))),
        None => Ok(()),
    }
}
