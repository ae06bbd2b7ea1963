use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};

use color_eyre::eyre::{eyre, Context};
use color_eyre::Result;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use beamline::deck::{csv_header, csv_row, Deck};
use beamline::probe::ProbeState;
use beamline::trajectory::Trajectory;

fn print_state(index: usize, state: &ProbeState) {
    println!(
        "{index:>6} {:>14.9} {:<12} {:<12} {:>14.6e}",
        state.position, state.element_id, state.element_type, state.kinetic_energy
    );
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut deck: Option<Deck> = None;
    let mut trajectory: Option<Trajectory> = None;

    for line in io::stdin().lock().lines() {
        let line = line?;

        for command in line.split(';') {
            let args: Vec<&str> = command.split_whitespace().collect();
            let Some(&name) = args.first() else {
                continue;
            };
            let arg = |i: usize| {
                args.get(i)
                    .copied()
                    .ok_or_else(|| eyre!("Command '{name}' expects argument {i}"))
            };

            match name {
                "load" => {
                    let path = arg(1)?;
                    let file = File::open(path).wrap_err_with(|| format!("Failed to open {path}"))?;
                    deck = Some(
                        serde_json::from_reader(io::BufReader::new(file))
                            .wrap_err_with(|| format!("Invalid deck {path}"))?,
                    );
                    trajectory = None;
                }
                "track" => {
                    let deck = deck.as_ref().ok_or_else(|| eyre!("No deck loaded"))?;
                    trajectory = Some(match deck.track() {
                        Ok(traj) => traj,
                        Err((err, partial)) => {
                            warn!(%err, states = partial.len(), "keeping partial trajectory");
                            partial
                        }
                    });
                }
                "states" => {
                    let traj = trajectory.as_ref().ok_or_else(|| eyre!("Nothing tracked"))?;
                    let id = arg(1)?;
                    for index in traj.indices_for_element(id) {
                        print_state(index, traj.state_with_index(index)?);
                    }
                }
                "range" => {
                    let traj = trajectory.as_ref().ok_or_else(|| eyre!("Nothing tracked"))?;
                    let low: f64 = arg(1)?.parse()?;
                    let high: f64 = arg(2)?.parse()?;
                    let first = traj.states().partition_point(|s| s.position < low);
                    let states = traj.states_in_position_range(low, high)?;
                    for (offset, state) in states.iter().enumerate() {
                        print_state(first + offset, state);
                    }
                }
                "index" => {
                    let traj = trajectory.as_ref().ok_or_else(|| eyre!("Nothing tracked"))?;
                    let index: usize = arg(1)?.parse()?;
                    print_state(index, traj.state_with_index(index)?);
                }
                "between" => {
                    let traj = trajectory.as_ref().ok_or_else(|| eyre!("Nothing tracked"))?;
                    let from: usize = arg(1)?.parse()?;
                    let to: usize = arg(2)?.parse()?;
                    println!("{}", traj.transfer_between(from, to)?);
                }
                "dump" => {
                    let traj = trajectory.as_ref().ok_or_else(|| eyre!("Nothing tracked"))?;
                    let path = arg(1)?;
                    let mut out = BufWriter::new(
                        File::create(path).wrap_err_with(|| format!("Failed to create {path}"))?,
                    );
                    if let Some(first) = traj.initial_state() {
                        writeln!(out, "{}", csv_header(first.kind()))?;
                    }
                    for state in traj {
                        writeln!(out, "{}", csv_row(state))?;
                    }
                    out.flush()?;
                }
                other => return Err(eyre!("Unknown command '{other}'")),
            }
        }
    }

    Ok(())
}
