//! openetran: lightning-surge transient simulator for distribution lines.
//!
//! Two run modes:
//!   openetran plot {none|csv|tab|elt} input.dat
//!   openetran icrit FIRST LAST W1 [W2 ...] input.dat
//!
//! The process exit code is the engine's stable error code on failure.

mod logger;
mod output;
mod report;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use openetran_parser::parse_deck;
use openetran_solver::{find_critical_currents, IcritRequest, SampleSink, Simulation, MAX_WIRES_HIT};

use output::{EltSink, TextSink};

#[derive(Parser)]
#[command(name = "openetran", version, about = "Lightning-surge transient simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one transient and write a plot file next to the input
    Plot {
        #[arg(value_enum)]
        format: PlotFormat,
        /// Input deck (.dat)
        file: PathBuf,
    },
    /// Find critical flashover currents: FIRST LAST W1 [W2 ...] FILE
    Icrit {
        /// first_pole last_pole wire_flags... input.dat
        #[arg(num_args = 4.., value_name = "ARG")]
        args: Vec<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PlotFormat {
    None,
    Csv,
    Tab,
    Elt,
}

fn main() -> ExitCode {
    logger::init("openetran.log");
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // engine and deck errors carry stable numeric exit codes
            if let Some(err) = e.downcast_ref::<openetran_core::Error>() {
                eprintln!("OpenETran Error: {}", err.kind());
                log::info!("exiting with code {}: {}", err.code(), err);
                return ExitCode::from(err.code() as u8);
            }
            if let Some(err) = e.downcast_ref::<openetran_parser::Error>() {
                eprintln!("OpenETran Error: {}", err.kind());
                log::info!("exiting with code {}: {}", err.code(), err);
                return ExitCode::from(err.code() as u8);
            }
            eprintln!("{e:#}");
            log::info!("exiting with failure: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Plot { format, file } => run_plot(format, &file),
        Command::Icrit { args } => run_icrit(&args),
    }
}

fn load(file: &Path) -> Result<Simulation> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to open input file {}", file.display()))?;
    let deck = parse_deck(&text)?;
    Ok(Simulation::build(&deck)?)
}

fn run_plot(format: PlotFormat, file: &Path) -> Result<()> {
    let mut sim = load(file)?;

    let plot_path = |ext: &str| file.with_extension(ext);
    let open = |ext: &str| -> Result<File> {
        let path = plot_path(ext);
        File::create(&path).with_context(|| format!("failed to open plot file {}", path.display()))
    };
    match format {
        PlotFormat::None => {
            let answers = sim.run(None)?;
            report::print_run_report(&sim, &answers);
        }
        PlotFormat::Csv => {
            let mut sink = TextSink::csv(open("csv")?);
            let answers = sim.run(Some(&mut sink as &mut dyn SampleSink))?;
            sink.into_status().context("plot write failed")?;
            report::print_run_report(&sim, &answers);
        }
        PlotFormat::Tab => {
            let mut sink = TextSink::tab(open("txt")?);
            let answers = sim.run(Some(&mut sink as &mut dyn SampleSink))?;
            sink.into_status().context("plot write failed")?;
            report::print_run_report(&sim, &answers);
        }
        PlotFormat::Elt => {
            let mut sink = EltSink::new(open("elt")?);
            let answers = sim.run(Some(&mut sink as &mut dyn SampleSink))?;
            sink.into_status().context("plot write failed")?;
            report::print_run_report(&sim, &answers);
        }
    }
    Ok(())
}

fn run_icrit(args: &[String]) -> Result<()> {
    // trailing argument is the input file, the rest are numbers
    let file = PathBuf::from(args.last().expect("clap enforces arity"));
    let first_pole: usize = args[0]
        .parse()
        .with_context(|| format!("bad first pole '{}'", args[0]))?;
    let last_pole: usize = args[1]
        .parse()
        .with_context(|| format!("bad last pole '{}'", args[1]))?;
    let mut wire_struck = vec![false; MAX_WIRES_HIT];
    for (i, flag) in args[2..args.len() - 1].iter().enumerate() {
        if i < MAX_WIRES_HIT {
            wire_struck[i] = flag.parse::<i64>().unwrap_or(0) > 0;
        }
    }

    let mut sim = load(&file)?;
    if first_pole < 1 || last_pole < first_pole || last_pole > sim.num_poles {
        bail!(openetran_core::Error::BadPole(last_pole as i64));
    }
    sim.flash_halt_enabled = true;

    let req = IcritRequest {
        first_pole,
        last_pole,
        wire_struck,
    };
    let icritical = find_critical_currents(&mut sim, &req)?;

    println!("Average Critical Currents, Poles {first_pole} to {last_pole}");
    for (idx, i_crit) in icritical.iter().enumerate() {
        if req.wire_struck[idx] {
            println!("wire {:2}: {:e}", idx + 1, i_crit);
        }
    }
    Ok(())
}
