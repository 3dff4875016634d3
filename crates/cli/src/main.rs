//! Firmware-in-the-loop co-simulation CLI.
//!
//! This binary drives a live flight-controller firmware against a host-side plant. It performs:
//! 1. **Run:** Resolve the symbol feed, connect to the probe or emulator console, run the
//!    synchronization loop and stream one JSON line per step.
//! 2. **Symbols:** Resolve a symbol feed and print the resulting address book, as a table
//!    with units or as JSON.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cosim_core::common::{RunError, SinkError};
use cosim_core::config::{Backend, Config, ImuInjection};
use cosim_core::monitor::{EmulatorSession, Monitor, ProbeSession};
use cosim_core::sim::{
    FirmwareBridge, FirmwareMap, JsonLinesSink, StartupFlags, StaticPlant, SyncLoop, SyncSettings,
    TelemetrySink, pass_self_test,
};
use cosim_core::stats::{self, RunStats, STATS_SECTIONS};
use cosim_core::symbols::{self, AddressBook, ExpansionTable, ScaleHint};

#[derive(Parser, Debug)]
#[command(
    name = "cosim",
    author,
    version,
    about = "Firmware-in-the-loop co-simulation over a debug monitor",
    long_about = "Keep a host-side plant in tick lock-step with a live flight-controller firmware, on hardware through OpenOCD or in Renode.\n\nExamples:\n  cosim run --feed build/symbols.txt\n  cosim run --config sitl.json --backend emulator --output flight.jsonl\n  cosim symbols build/symbols.txt --strip-offset-digit"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the synchronization loop against a live firmware.
    Run {
        /// JSON configuration file; flags below override its fields.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Symbol feed (`name address` per line).
        #[arg(short, long)]
        feed: Option<PathBuf>,

        /// Monitor dialect: `probe` (OpenOCD) or `emulator` (Renode).
        #[arg(short, long, value_parser = parse_backend)]
        backend: Option<Backend>,

        /// Monitor host.
        #[arg(long)]
        host: Option<String>,

        /// Monitor port.
        #[arg(short, long)]
        port: Option<u16>,

        /// Simulated run length in seconds.
        #[arg(short, long)]
        duration: Option<f64>,

        /// Explicit step budget; overrides the duration.
        #[arg(long)]
        steps: Option<u64>,

        /// Sensor noise gain.
        #[arg(long)]
        noise: Option<f64>,

        /// Noise seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Drop the memory-region digit from feed addresses.
        #[arg(long)]
        strip_offset_digit: bool,

        /// Breakpoint address to use instead of the computed sensor-task entry.
        #[arg(long, value_parser = parse_hex_arg)]
        entry: Option<u64>,

        /// Feed IMU samples through the emulated sensor peripherals.
        #[arg(long)]
        peripheral_imu: bool,

        /// Skip the emulator's firmware self-test pass.
        #[arg(long)]
        skip_startup: bool,

        /// Height of the resting plant above the ground, in meters.
        #[arg(long, default_value_t = 0.0)]
        height: f64,

        /// Write flight records here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Statistics sections to print (`summary`, `sync`, `startup`); all by default.
        #[arg(long, value_delimiter = ',', value_parser = parse_stats_section)]
        stats: Vec<String>,
    },

    /// Resolve a symbol feed and print the address book.
    Symbols {
        /// Symbol feed to resolve.
        feed: PathBuf,

        /// Column holding the address.
        #[arg(long, default_value_t = 1)]
        column: usize,

        /// Drop the memory-region digit from feed addresses.
        #[arg(long)]
        strip_offset_digit: bool,

        /// Print the address book as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            feed,
            backend,
            host,
            port,
            duration,
            steps,
            noise,
            seed,
            strip_offset_digit,
            entry,
            peripheral_imu,
            skip_startup,
            height,
            output,
            stats,
        } => {
            let mut config = match config {
                Some(path) => Config::load(&path).unwrap_or_else(|e| {
                    fatal(&format!("reading config {}: {e}", path.display()))
                }),
                None => Config::default(),
            };
            if feed.is_some() {
                config.symbols.feed = feed;
            }
            if let Some(backend) = backend {
                config.monitor.backend = backend;
            }
            if let Some(host) = host {
                config.monitor.host = host;
            }
            if let Some(port) = port {
                config.monitor.port = port;
            }
            if let Some(duration) = duration {
                config.run.duration_s = duration;
            }
            if steps.is_some() {
                config.run.steps = steps;
            }
            if let Some(noise) = noise {
                config.run.noise = noise;
            }
            if let Some(seed) = seed {
                config.run.seed = seed;
            }
            if strip_offset_digit {
                config.symbols.strip_leading_offset_digit = true;
            }
            if entry.is_some() {
                config.symbols.entry_override = entry;
            }
            if peripheral_imu {
                config.firmware.imu_injection = ImuInjection::PeripheralFeed;
            }
            if skip_startup {
                config.emulator.startup.enabled = false;
            }

            match cmd_run(&config, height, output) {
                Ok(run_stats) => run_stats.print_sections(&stats),
                Err(e) => fatal(&e.to_string()),
            }
        }
        Commands::Symbols {
            feed,
            column,
            strip_offset_digit,
            json,
        } => cmd_symbols(&feed, column, strip_offset_digit, json),
    }
}

/// Installs the `RUST_LOG`-driven subscriber; logs go to stderr so stdout stays JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn fatal(message: &str) -> ! {
    eprintln!("\n[!] FATAL: {message}");
    process::exit(1);
}

fn parse_backend(value: &str) -> Result<Backend, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown backend `{value}` (expected probe or emulator)"))
}

fn parse_stats_section(value: &str) -> Result<String, String> {
    stats::stats_section(value).map(str::to_string).ok_or_else(|| {
        format!(
            "unknown stats section `{value}` (expected one of {})",
            STATS_SECTIONS.join(", ")
        )
    })
}

fn parse_hex_arg(value: &str) -> Result<u64, String> {
    symbols::parse_address(value, false).ok_or_else(|| format!("`{value}` is not a hex address"))
}

/// Resolves symbols, opens the configured session and runs the loop to completion.
///
/// # Arguments
///
/// * `config` - Fully merged configuration.
/// * `height` - Height of the resting plant.
/// * `output` - Flight log path; stdout when `None`.
///
/// # Returns
///
/// The run's statistics, or the first error; resolution and connection errors occur
/// before any monitor traffic that changes firmware state.
fn cmd_run(config: &Config, height: f64, output: Option<PathBuf>) -> Result<RunStats, RunError> {
    let book = symbols::load(&config.symbols)?;
    let map = FirmwareMap::resolve(&book)?;
    info!(entries = book.len(), entry = %map.entry, "symbols resolved");

    let sink: Box<dyn TelemetrySink> = match output {
        Some(path) => {
            let file = File::create(&path).map_err(SinkError::from)?;
            Box::new(JsonLinesSink::new(BufWriter::new(file)))
        }
        None => Box::new(JsonLinesSink::new(io::stdout().lock())),
    };
    let plant = StaticPlant::new(height, config.run.seed);
    let bridge = FirmwareBridge::new(map, config.firmware.clone());
    let settings = SyncSettings::from_config(config, map.entry);

    match config.monitor.backend {
        Backend::Probe => {
            let session = ProbeSession::connect(&config.monitor)?;
            run_loop(session, plant, sink, bridge, settings, 0)
        }
        Backend::Emulator => {
            let mut session = EmulatorSession::connect(&config.monitor, config.emulator.clone())?;
            session.bootstrap()?;
            let attempts = if config.emulator.startup.enabled {
                let flags = StartupFlags::resolve(&book)?;
                pass_self_test(&mut session, flags, &config.emulator.startup)?
            } else {
                0
            };
            run_loop(session, plant, sink, bridge, settings, attempts)
        }
    }
}

fn run_loop<M: Monitor>(
    monitor: M,
    plant: StaticPlant,
    sink: Box<dyn TelemetrySink>,
    bridge: FirmwareBridge,
    settings: SyncSettings,
    startup_attempts: u32,
) -> Result<RunStats, RunError> {
    let mut sync = SyncLoop::new(monitor, plant, sink, bridge, settings);
    sync.stats_mut().startup_attempts = startup_attempts;
    sync.run().cloned()
}

/// Prints every address-book entry as `name address unit`, in name order.
///
/// The unit column is blank for entries that come straight from the feed. With `json`
/// the book is printed as one JSON document instead.
fn cmd_symbols(feed: &Path, column: usize, strip_offset_digit: bool, json: bool) {
    let raw = symbols::read_feed(feed, column).unwrap_or_else(|e| fatal(&e.to_string()));
    let table = ExpansionTable::firmware();
    let book = AddressBook::resolve(&raw, strip_offset_digit, &table)
        .unwrap_or_else(|e| fatal(&e.to_string()));
    if json {
        match serde_json::to_string_pretty(&book) {
            Ok(text) => println!("{text}"),
            Err(e) => fatal(&format!("serializing address book: {e}")),
        }
        return;
    }
    for (name, addr) in book.iter() {
        let unit = table
            .field(name)
            .and_then(|field| field.scale)
            .map_or("", ScaleHint::unit);
        println!("{name:<28} {:<12} {unit}", addr.label());
    }
    println!("\n[*] {} entries from {} symbols", book.len(), raw.len());
}
