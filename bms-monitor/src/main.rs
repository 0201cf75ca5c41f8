//! BMS Monitor CLI Application
//!
//! Command-line consumer of the bms-telemetry core: starts a receiver on a
//! SocketCAN channel and periodically prints snapshot summaries. It is the
//! application-layer stand-in for the charting/logging front ends, which
//! consume the same snapshot interface.

use anyhow::Result;
use clap::Parser;
use std::thread;
use std::time::{Duration, Instant};

use bms_telemetry::{ReceiverConfig, ReceiverEngine, SeriesSnapshot};

/// BMS Monitor - Live battery telemetry over CAN
#[derive(Parser, Debug)]
#[command(name = "bms-monitor")]
#[command(about = "Receive and display live BMS telemetry from a CAN bus", long_about = None)]
#[command(version)]
struct Args {
    /// SocketCAN channel to listen on
    #[arg(short, long, default_value = "can0")]
    channel: String,

    /// Bus bitrate in bits per second (informational; set via `ip link`)
    #[arg(long, default_value_t = 500_000)]
    bitrate: u32,

    /// Board id of the BMS device on the bus
    #[arg(short, long, default_value_t = 1)]
    board_id: u32,

    /// Maximum samples retained per signal
    #[arg(long, default_value_t = 5000)]
    max_points: usize,

    /// Seconds between snapshot printouts
    #[arg(short, long, default_value_t = 1.0)]
    interval: f64,

    /// Stop after this many seconds (default: run until killed)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Send a full-recharge notice to the BMS after starting
    #[arg(long)]
    notify_full: bool,

    /// Print full snapshots as JSON instead of latest-value summaries
    #[arg(long)]
    json: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("BMS Monitor v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using telemetry library v{}", bms_telemetry::VERSION);

    let config = ReceiverConfig::new()
        .with_channel(args.channel.as_str())
        .with_bitrate(args.bitrate)
        .with_board_id(args.board_id)
        .with_max_points(args.max_points);

    let engine = ReceiverEngine::new(config);
    engine.start()?;

    if args.notify_full {
        log::info!("Sending full-recharge notice");
        engine.send_full_recharge_notice();
    }

    let started = Instant::now();
    let interval = Duration::from_secs_f64(args.interval.max(0.1));

    loop {
        thread::sleep(interval);

        let snapshot = engine.snapshot();
        if args.json {
            print_json(&snapshot)?;
        } else {
            print_summary(&snapshot);
        }

        if let Some(duration) = args.duration {
            if started.elapsed() >= Duration::from_secs_f64(duration) {
                break;
            }
        }
    }

    engine.stop();
    Ok(())
}

/// Print the latest value per signal, keys in first-seen order
fn print_summary(snapshot: &SeriesSnapshot) {
    if snapshot.is_empty() {
        println!("(no telemetry yet)");
        return;
    }

    for (key, samples) in snapshot {
        if let Some(latest) = samples.last() {
            println!("{:<22} = {:>10}  (n={})", key.to_string(), latest.value.to_string(), samples.len());
        }
    }
    println!("---");
}

/// Print the full snapshot as one JSON document per interval
fn print_json(snapshot: &SeriesSnapshot) -> Result<()> {
    let series: Vec<serde_json::Value> = snapshot
        .iter()
        .map(|(key, samples)| {
            serde_json::json!({
                "signal": key.to_string(),
                "samples": samples,
            })
        })
        .collect();

    println!("{}", serde_json::to_string(&series)?);
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
