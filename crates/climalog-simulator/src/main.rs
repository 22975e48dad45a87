//! Desktop simulator for the climalog sensor node.
//!
//! Runs the real [`Pipeline`] from `climalog-core` against host stand-ins for
//! the board: a UDP socket for SNTP, `ureq` for the upload POST, a directory
//! for the flash file system, a synthetic DHT22 and a Wi-Fi link that drops
//! out periodically.
//!
//! ```text
//! climalog-simulator [CONFIG_JSON] [--volatile] [--stable] [--duration-secs N]
//! ```
//!
//! | Option              | Effect                                           |
//! |---------------------|--------------------------------------------------|
//! | `CONFIG_JSON`       | Node configuration (defaults when omitted)       |
//! | `--volatile`        | Keep readings in RAM instead of `data/`          |
//! | `--stable`          | Never drop the simulated Wi-Fi link              |
//! | `--duration-secs N` | Exit after N seconds instead of running forever  |
//!
//! `CLIMALOG_ENDPOINT` and `CLIMALOG_NTP_SERVER` (environment or `.env`)
//! override the upload endpoint and the NTP server. `RUST_LOG` sets verbosity.

mod board;
mod dir_store;

use std::process::ExitCode;
use std::time::Duration;

use climalog_core::config::Config;
use climalog_core::pipeline::{Pipeline, TickReport};
use climalog_core::platform::{Board, FileStore};
use climalog_core::sampling::SamplingOutcome;
use climalog_core::storage::{MemoryFileStore, SampleStore, StoreError};
use embassy_time::Instant;
use log::{error, info};

use board::{HttpTransport, MockDht, SimulatedWifi, UdpTimeSource};
use dir_store::DirFileStore;

/// Pause between pipeline ticks.
const TICK_PERIOD: Duration = Duration::from_millis(100);

const DEFAULT_NTP_SERVER: &str = "pool.ntp.org:123";
const DATA_DIR: &str = "data";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Simulated link: 20 s outage at the end of every 3 minutes
const WIFI_PERIOD: Duration = Duration::from_secs(180);
const WIFI_OUTAGE: Duration = Duration::from_secs(20);

/// Every n-th DHT read returns NaN
const DHT_GLITCH_EVERY: u32 = 17;

type SimPipeline<F> = Pipeline<SimulatedWifi, UdpTimeSource, MockDht, HttpTransport, F>;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Options {
    config_path: Option<String>,
    volatile: bool,
    stable: bool,
    duration: Option<Duration>,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut options = Options::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--volatile" => options.volatile = true,
                "--stable" => options.stable = true,
                "--duration-secs" => {
                    let value = args
                        .next()
                        .ok_or("--duration-secs needs a value")?
                        .parse::<u64>()
                        .map_err(|e| format!("invalid --duration-secs: {e}"))?;
                    options.duration = Some(Duration::from_secs(value));
                }
                flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
                path if options.config_path.is_none() => options.config_path = Some(path.to_string()),
                extra => return Err(format!("unexpected argument {extra}")),
            }
        }
        Ok(options)
    }
}

// ---------------------------------------------------------------------------
// Pipeline lifecycle
// ---------------------------------------------------------------------------

fn build_board(config: &Config<'_>, options: &Options) -> Board<SimulatedWifi, UdpTimeSource, MockDht, HttpTransport> {
    let ntp_server = std::env::var("CLIMALOG_NTP_SERVER").unwrap_or_else(|_| DEFAULT_NTP_SERVER.to_string());
    info!("NTP server: {}", ntp_server);

    let connectivity = if options.stable {
        SimulatedWifi::stable(&config.internet)
    } else {
        SimulatedWifi::flaky(&config.internet, WIFI_PERIOD, WIFI_OUTAGE)
    };

    Board {
        connectivity,
        time_source: UdpTimeSource::new(&ntp_server),
        sensor: MockDht::new(DHT_GLITCH_EVERY),
        transport: HttpTransport::new(HTTP_TIMEOUT),
    }
}

/// Tear the pipeline down and bring it back up from what is on the file
/// store, the way the board reboots.
fn restart<F: FileStore>(config: &Config<'_>, pipeline: SimPipeline<F>) -> Result<SimPipeline<F>, StoreError> {
    let (board, store) = pipeline.into_parts();
    let files = store.close()?;
    let store = SampleStore::open(files, config.storage.max_records)?;
    Ok(Pipeline::new(config, board, store, Instant::now()))
}

fn log_report(report: &TickReport) {
    if let SamplingOutcome::Stored(reading) = &report.sampling {
        info!(
            "Reading @{}: {:.2} °C, {:.2} %RH",
            reading.timestamp, reading.temperature, reading.humidity
        );
    }
}

fn run<F: FileStore>(config: &Config<'_>, options: &Options, files: F) -> ExitCode {
    let store = match SampleStore::open(files, config.storage.max_records) {
        Ok(store) => store,
        Err(e) => {
            error!("Cannot open sample store: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if !store.is_empty() {
        info!("{} readings waiting from a previous run", store.len());
    }

    let board = build_board(config, options);
    let mut pipeline = Pipeline::new(config, board, store, Instant::now());
    let started = std::time::Instant::now();

    loop {
        if options.duration.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }

        match pipeline.tick(Instant::now()) {
            Ok(report) => log_report(&report),
            Err(e) => {
                error!("{}, restarting", e);
                pipeline = match restart(config, pipeline) {
                    Ok(pipeline) => pipeline,
                    Err(e) => {
                        error!("Restart failed: {}", e);
                        return ExitCode::FAILURE;
                    }
                };
            }
        }

        std::thread::sleep(TICK_PERIOD);
    }

    let metrics = *pipeline.metrics();
    info!(
        "Stopped after {} ticks: {} stored, {} sensor failures, {} uploads ok, {} failed, {} readings sent",
        metrics.ticks,
        metrics.samples_stored,
        metrics.sensor_failures,
        metrics.uploads_ok,
        metrics.uploads_failed,
        metrics.readings_uploaded
    );

    let (_, store) = pipeline.into_parts();
    let pending = store.len();
    if let Err(e) = store.close() {
        error!("Failed to close sample store: {}", e);
        return ExitCode::FAILURE;
    }
    info!("{} readings left buffered", pending);
    ExitCode::SUCCESS
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::init();
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    let options = match Options::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let text = match &options.config_path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                error!("Cannot read {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => String::new(),
    };
    let endpoint_override = std::env::var("CLIMALOG_ENDPOINT").ok();

    let mut config: Config = if text.is_empty() {
        Config::default()
    } else {
        match serde_json::from_str(&text) {
            Ok(config) => config,
            Err(e) => {
                error!("Invalid configuration: {}", e);
                return ExitCode::FAILURE;
            }
        }
    };
    if let Some(endpoint) = &endpoint_override {
        config.upload.endpoint = endpoint;
    }
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting climalog simulator");
    info!(
        "Sampling every {} ms, uploading every {} ms to {}",
        config.sampling.interval_ms, config.upload.interval_ms, config.upload.endpoint
    );

    if options.volatile {
        run(&config, &options, MemoryFileStore::new())
    } else {
        run(&config, &options, DirFileStore::new(DATA_DIR))
    }
}
