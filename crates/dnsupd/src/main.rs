// # dnsupd - dynamic DNS update daemon
//
// Thin integration layer: reads environment and configuration file,
// builds the adapters and the public address fetcher, then drives the
// per-record tickers on a fixed period until SIGTERM or SIGINT. All
// update logic lives in dnsup-core and dnsup-providers.
//
// ## Configuration
//
// Environment variables:
// - `DNSUP_CONFIG`: path to the JSON configuration file (default
//   `config.json`)
// - `DNSUP_PERIOD`: seconds between update rounds (default 300)
// - `DNSUP_LOG_LEVEL`: trace, debug, info, warn or error (default info)
//
// The configuration file holds the managed records:
//
// ```json
// {
//   "settings": [
//     {"provider": "duckdns", "domain": "duckdns.org",
//      "host": "mysub", "token": "..."}
//   ]
// }
// ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use dnsup_core::{RecordTicker, TickOutcome, TickOutcomeKind};
use dnsup_publicip::Fetcher;
use dnsup_providers::new_updater;

/// Exit codes following systemd conventions:
/// - 0: clean shutdown
/// - 1: configuration or startup error
/// - 2: runtime error
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

struct Config {
    config_path: PathBuf,
    period: Duration,
    log_level: String,
}

impl Config {
    fn from_env() -> Result<Self> {
        let period_secs: u64 = match env::var("DNSUP_PERIOD") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("DNSUP_PERIOD is not a number: {raw:?}"))?,
            Err(_) => 300,
        };
        Ok(Self {
            config_path: env::var("DNSUP_CONFIG")
                .unwrap_or_else(|_| "config.json".to_string())
                .into(),
            period: Duration::from_secs(period_secs),
            log_level: env::var("DNSUP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.period < Duration::from_secs(10) {
            anyhow::bail!(
                "DNSUP_PERIOD must be at least 10 seconds, got {}",
                self.period.as_secs()
            );
        }
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => anyhow::bail!(
                "DNSUP_LOG_LEVEL {other:?} is not valid. \
                Valid levels: trace, debug, info, warn, error"
            ),
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn load_records(path: &PathBuf) -> Result<dnsup_core::Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration file {}", path.display()))?;
    let config: dnsup_core::Config = serde_json::from_str(&text)
        .with_context(|| format!("parsing configuration file {}", path.display()))?;
    if config.settings.is_empty() {
        anyhow::bail!(
            "configuration file {} has no records under \"settings\"",
            path.display()
        );
    }
    Ok(config)
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration error: {err:#}");
            return DaemonExitCode::ConfigError.into();
        }
    };
    if let Err(err) = config.validate() {
        eprintln!("Configuration validation error: {err:#}");
        return DaemonExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level())
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {err}");
        return DaemonExitCode::ConfigError.into();
    }

    let records = match load_records(&config.config_path) {
        Ok(records) => records,
        Err(err) => {
            error!("{err:#}");
            return DaemonExitCode::ConfigError.into();
        }
    };

    info!(
        "Starting dnsupd with {} record(s), period {}s",
        records.settings.len(),
        config.period.as_secs()
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to create tokio runtime: {err}");
            return DaemonExitCode::RuntimeError.into();
        }
    };

    runtime
        .block_on(async {
            match run_daemon(config, records).await {
                Ok(()) => DaemonExitCode::CleanShutdown,
                Err(err) => {
                    error!("Daemon error: {err:#}");
                    DaemonExitCode::RuntimeError
                }
            }
        })
        .into()
}

async fn run_daemon(config: Config, records: dnsup_core::Config) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("building HTTP client")?;
    let fetcher = Fetcher::all_services();

    let (events_tx, events_rx) = mpsc::channel::<TickOutcome>(64);
    let mut tickers = Vec::with_capacity(records.settings.len());
    for record in &records.settings {
        let updater = new_updater(record).with_context(|| {
            format!(
                "building adapter for {} record of domain {}",
                record.provider, record.domain
            )
        })?;
        info!("Managing record: {updater}");
        tickers.push(RecordTicker::new(updater).with_events(events_tx.clone()));
    }
    drop(events_tx);

    tokio::spawn(log_outcomes(events_rx));

    let mut interval = tokio::time::interval(config.period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let deadline = config.period.min(Duration::from_secs(60));

    let mut shutdown = Shutdown::new()?;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                for ticker in &mut tickers {
                    ticker.tick(&client, &fetcher, deadline).await;
                }
            }
            name = shutdown.recv() => {
                info!("Received {name}, shutting down");
                return Ok(());
            }
        }
    }
}

async fn log_outcomes(events: mpsc::Receiver<TickOutcome>) {
    let mut stream = ReceiverStream::new(events);
    while let Some(outcome) = stream.next().await {
        match outcome.kind {
            TickOutcomeKind::Updated => {
                info!(
                    domain = %outcome.domain, host = %outcome.host,
                    ip = ?outcome.ip, "record updated"
                );
            }
            TickOutcomeKind::UpToDate => {}
            TickOutcomeKind::Failed(message) => {
                warn!(
                    domain = %outcome.domain, host = %outcome.host,
                    "tick failed: {message}"
                );
            }
        }
    }
}

#[cfg(unix)]
struct Shutdown {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Shutdown {
    fn new() -> Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate()).context("setting up SIGTERM handler")?,
            sigint: signal(SignalKind::interrupt()).context("setting up SIGINT handler")?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

#[cfg(not(unix))]
struct Shutdown;

#[cfg(not(unix))]
impl Shutdown {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        "SIGINT"
    }
}
