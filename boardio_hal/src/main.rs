//! # boardio HAL Binary
//!
//! Loads a board description, starts a driver and polls it until
//! interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Run with simulation driver
//! boardio_hal --board config/uno.toml --simulate
//!
//! # Print the pin table as JSON and exit
//! boardio_hal --board config/uno.toml --dump-pins
//!
//! # Verbose logging
//! boardio_hal --board config/uno.toml -s -v
//! ```

#![deny(warnings)]

use boardio_common::hal::consts::DEFAULT_CONFIG_PATH;
use boardio_common::hal::events::IoEvent;
use boardio_common::hal::types::Mode;
use boardio_hal::core::IoCore;
use boardio_hal::driver_registry::DriverRegistry;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// boardio HAL - board IO runtime with pluggable drivers
#[derive(Parser, Debug)]
#[command(name = "boardio_hal")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Board IO runtime with pluggable drivers")]
#[command(long_about = None)]
struct Args {
    /// Path to the board description (board.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    board: PathBuf,

    /// Force simulation driver
    #[arg(short = 's', long)]
    simulate: bool,

    /// Driver to load
    #[arg(short, long, default_value = "simulation")]
    driver: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// List registered drivers and exit
    #[arg(long)]
    list_drivers: bool,

    /// Print the initialized pin table as JSON and exit
    #[arg(long)]
    dump_pins: bool,
}

/// Pin table entry as printed by `--dump-pins`.
#[derive(Serialize)]
struct PinReport<'a> {
    index: usize,
    aliases: Vec<&'a str>,
    supported_modes: Vec<Mode>,
    mode: Mode,
    value: u32,
    reporting: bool,
    analog_channel: Option<u8>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("boardio startup failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    setup_tracing(&args);

    let registry = DriverRegistry::with_builtin();
    if args.list_drivers {
        for name in registry.list_drivers() {
            println!("{name}");
        }
        return Ok(());
    }

    info!("boardio HAL v{} starting...", env!("CARGO_PKG_VERSION"));

    let driver_name = if args.simulate {
        info!("Simulation mode enabled");
        "simulation"
    } else {
        args.driver.as_str()
    };

    let config = IoCore::load_config(&args.board)?;
    let mut core = IoCore::new(config, registry)?;

    let driver = core.init(driver_name)?;
    {
        let driver = driver.lock();
        driver.events().subscribe(Box::new(log_event));
        info!(
            "Driver '{}' ready={}, default LED {}",
            driver.name(),
            driver.is_ready(),
            driver.default_led()
        );
    }

    if args.dump_pins {
        let names = core.config().pin_names()?;
        let json = {
            let driver = driver.lock();
            let report: Vec<PinReport> = driver
                .pins()
                .iter()
                .enumerate()
                .map(|(index, pin)| PinReport {
                    index,
                    aliases: names.aliases_of(index),
                    supported_modes: pin.supported_modes.modes().collect(),
                    mode: pin.mode,
                    value: pin.value,
                    reporting: pin.reporting,
                    analog_channel: pin.analog_channel,
                })
                .collect();
            serde_json::to_string_pretty(&report)?
        };
        println!("{json}");
        core.shutdown()?;
        return Ok(());
    }

    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    if let Err(e) = core.run() {
        error!("Polling loop error: {}", e);
    }

    let stats = core.stats();
    info!(
        "{} cycles, avg={}us, max={}us, violations={}",
        stats.cycle_count,
        stats.avg_cycle_time_us(),
        stats.max_cycle_time_us,
        stats.timing_violations
    );

    core.shutdown()?;
    info!("boardio HAL shutdown complete");
    Ok(())
}

fn log_event(event: &IoEvent) {
    match event {
        IoEvent::Ready { driver } => info!("Driver '{}' ready", driver),
        IoEvent::Info(msg) => info!("{}", msg),
        IoEvent::Error(err) => warn!("Driver error: {}", err),
    }
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
