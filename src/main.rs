mod io;
mod kernel;

use anyhow::Result;
use clap::Parser;

use kernel::Driver;

/// A cooperative multitasking process-manager simulator.
///
/// A small virtual machine executes per-process programs of simple
/// instructions under a round-driven scheduler: each Q command advances one
/// quantum, U unblocks the head of the blocked queue, P prints a state
/// snapshot, and T prints the final report and stops. Time is a logical
/// counter; quanta are explicitly requested, never implicit.
#[derive(Debug, Parser)]
struct Opts {
    /// Program resource for the initial process.
    #[clap(default_value = "data/init")]
    init_program: String,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    init_logging(opts.verbose)?;

    let driver = Driver::new(&opts.init_program)?;
    driver.start()
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };

    let mut config = simplelog::ConfigBuilder::new();
    config
        .set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);

    simplelog::TermLogger::init(
        level,
        config.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;
    Ok(())
}
