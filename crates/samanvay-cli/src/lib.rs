use std::fs;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use futures::future;
use samanvay::SamanvayError;
use samanvay_config::SamanvayConfig;
use samanvay_core::{ConvoyRoute, Coordinate, Severity};
use samanvay_geo::{distance_km, initial_bearing_degrees, route_exposure, ZoneExposure};
use samanvay_io::{DetectionReport, DetectionRequest, DetectionService, ScenarioService};
use samanvay_server::BackendClient;
use samanvay_sync::{ActiveRouteController, Notification, Notifier, SyncError};
use thiserror::Error;
use tracing::info;

mod live;
mod logging;

pub use logging::init_logging;

use live::{describe, LiveRuntime, TerminalConfirmation};

#[derive(Debug, Parser)]
#[command(
    name = "samanvay",
    version,
    about = "Operator tools for the Samanvay situational client"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Loads a config file and runs the startup checks.
    ValidateConfig(ValidateConfigArgs),
    /// Prints the effective config with secrets redacted.
    PrintConfig(ConfigArgs),
    /// Prints the JSON schema of the config file.
    Schema,
    /// Great-circle distance and bearing between two points.
    Distance(DistanceArgs),
    /// Requests a convoy route and reports threat-zone exposure.
    Plan(PlanArgs),
    /// Re-seeds the scenario around a point and summarizes it.
    Scenario(ScenarioArgs),
    /// Follows the live channel and prints notifications until interrupted.
    Watch(WatchArgs),
    /// Sends one chat message over the live channel.
    Chat(ChatArgs),
    /// Broadcasts an SOS after confirmation on the terminal.
    Sos(SosArgs),
    /// Uploads a video for threat analysis.
    Detect(DetectArgs),
}

#[derive(Debug, Args)]
pub struct ValidateConfigArgs {
    #[arg(long, help = "Path to the samanvay YAML config")]
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long, help = "Optional path to samanvay YAML config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DistanceArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub from_lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub from_lng: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub to_lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub to_lng: f64,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long, allow_hyphen_values = true)]
    pub start_lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub start_lng: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub end_lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub end_lng: f64,
    #[arg(long, help = "Optional path to samanvay YAML config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ScenarioArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,
    #[arg(long, help = "Optional path to samanvay YAML config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[arg(long, allow_hyphen_values = true, requires = "lng", help = "Re-seed the scenario around this latitude")]
    pub lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lng: Option<f64>,
    #[arg(long, help = "Load the message history before following")]
    pub history: bool,
    #[arg(long, help = "Optional path to samanvay YAML config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    #[arg(long)]
    pub text: String,
    #[arg(long, default_value_t = 10, help = "Seconds to wait for the live channel")]
    pub wait_secs: u64,
    #[arg(long, help = "Optional path to samanvay YAML config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SosArgs {
    #[arg(long, allow_hyphen_values = true, requires = "lng", help = "Operator latitude; defaults to session.operator_location")]
    pub lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lng: Option<f64>,
    #[arg(long, default_value_t = 10, help = "Seconds to wait for the live channel")]
    pub wait_secs: u64,
    #[arg(long, help = "Optional path to samanvay YAML config")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    #[arg(long)]
    pub video: PathBuf,
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,
    #[arg(long, help = "Optional path to samanvay YAML config")]
    pub config: Option<PathBuf>,
}

pub fn run(cli: Cli) -> Result<(), CliError> {
    execute_command(cli.command)
}

fn execute_command(command: Command) -> Result<(), CliError> {
    match command {
        Command::ValidateConfig(args) => {
            let config = prepare_config(Some(&args.input))?;
            info!(endpoint = %config.server.endpoint, live_addr = %config.transport.live_addr, "config is valid");
            emit(&format!("{}: ok\n", args.input.display()))
        }
        Command::PrintConfig(args) => {
            let config = prepare_config(args.config.as_deref())?;
            let rendered = config.to_redacted_yaml().map_err(SamanvayError::from)?;
            emit(&rendered)
        }
        Command::Schema => {
            let schema = serde_json::to_string_pretty(&samanvay_config::json_schema())
                .map_err(CliError::Schema)?;
            emit(&format!("{schema}\n"))
        }
        Command::Distance(args) => {
            init_logging(None);
            emit(&render_distance(&args)?)
        }
        Command::Plan(args) => {
            let config = prepare_config(args.config.as_deref())?;
            let rendered = block_on(run_plan(config, args))??;
            emit(&rendered)
        }
        Command::Scenario(args) => {
            let config = prepare_config(args.config.as_deref())?;
            let rendered = block_on(run_scenario(config, args))??;
            emit(&rendered)
        }
        Command::Watch(args) => {
            let config = prepare_config(args.config.as_deref())?;
            block_on(run_watch(config, args))?
        }
        Command::Chat(args) => {
            let config = prepare_config(args.config.as_deref())?;
            block_on(run_chat(config, args))??;
            emit("message sent\n")
        }
        Command::Sos(args) => {
            let config = prepare_config(args.config.as_deref())?;
            block_on(run_sos(config, args))??;
            emit("SOS broadcast sent\n")
        }
        Command::Detect(args) => {
            let config = prepare_config(args.config.as_deref())?;
            let rendered = block_on(run_detect(config, args))??;
            emit(&rendered)
        }
    }
}

/// Loads `path` (or the defaults), runs the startup checks and installs the
/// configured logging.
fn prepare_config(path: Option<&Path>) -> Result<SamanvayConfig, CliError> {
    let config = match path {
        Some(path) => SamanvayConfig::load(path).map_err(SamanvayError::from)?,
        None => SamanvayConfig::default(),
    };
    config.validate_startup().map_err(SamanvayError::from)?;
    init_logging(config.logging.as_ref());
    Ok(config)
}

fn block_on<F: Future>(work: F) -> Result<F::Output, CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|source| CliError::Runtime { source })?;
    Ok(runtime.block_on(work))
}

fn coordinate(latitude: f64, longitude: f64) -> Result<Coordinate, CliError> {
    Ok(Coordinate::new(latitude, longitude).map_err(SamanvayError::from)?)
}

fn render_distance(args: &DistanceArgs) -> Result<String, CliError> {
    let from = coordinate(args.from_lat, args.from_lng)?;
    let to = coordinate(args.to_lat, args.to_lng)?;
    Ok(format!(
        "{:.3} km, initial bearing {:.1}°\n",
        distance_km(&from, &to),
        initial_bearing_degrees(&from, &to)
    ))
}

/// Logs notifications raised outside a running session.
struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        info!(notification = %describe(&notification), "notification");
    }
}

async fn run_plan(config: SamanvayConfig, args: PlanArgs) -> Result<String, CliError> {
    let start = coordinate(args.start_lat, args.start_lng)?;
    let end = coordinate(args.end_lat, args.end_lng)?;
    let backend = BackendClient::new(config.server).map_err(SamanvayError::from)?;

    let mut controller = ActiveRouteController::new(std::sync::Arc::new(TracingNotifier));
    let outcome = controller
        .plan_route(&backend, &args.name, start, end)
        .await
        .map_err(SamanvayError::from)?;
    let Some(route) = outcome.into_route() else {
        return Ok("no route planned\n".to_owned());
    };

    let zones = backend
        .fetch_threat_zones()
        .await
        .map_err(SamanvayError::from)?;
    let exposure = route_exposure(
        route.path(),
        &zones,
        config.session.exposure_samples_per_leg,
    )
    .map_err(SamanvayError::from)?;

    Ok(render_route(&route, &exposure))
}

fn render_route(route: &ConvoyRoute, exposure: &[ZoneExposure]) -> String {
    let length_km: f64 = route
        .path()
        .windows(2)
        .map(|leg| distance_km(&leg[0], &leg[1]))
        .sum();

    let mut rendered = format!(
        "convoy {} \"{}\": {} points, {:.2} km\n",
        route.convoy_id(),
        route.name(),
        route.path().len(),
        length_km
    );
    for point in route.path() {
        rendered.push_str(&format!("  {point}\n"));
    }
    if exposure.is_empty() {
        rendered.push_str("no threat zones on route\n");
    }
    for zone in exposure {
        rendered.push_str(&format!(
            "threat zone {} (score {:.1}) within {:.0} m of the route\n",
            zone.zone_id, zone.threat_score, zone.closest_approach_m
        ));
    }
    rendered
}

async fn run_scenario(config: SamanvayConfig, args: ScenarioArgs) -> Result<String, CliError> {
    let center = coordinate(args.lat, args.lng)?;
    let backend = BackendClient::new(config.server).map_err(SamanvayError::from)?;

    backend
        .initialize_scenario(center)
        .await
        .map_err(SamanvayError::from)?;
    let (incidents, zones) =
        future::try_join(backend.fetch_incidents(), backend.fetch_threat_zones())
            .await
            .map_err(SamanvayError::from)?;

    let mut rendered = format!(
        "scenario around {center}: {} incidents, {} threat zones\n",
        incidents.len(),
        zones.len()
    );
    for severity in [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ] {
        let count = incidents
            .iter()
            .filter(|incident| incident.severity == severity)
            .count();
        rendered.push_str(&format!("  {severity}: {count}\n"));
    }
    Ok(rendered)
}

async fn run_watch(config: SamanvayConfig, args: WatchArgs) -> Result<(), CliError> {
    let center = match (args.lat, args.lng) {
        (Some(lat), Some(lng)) => Some(coordinate(lat, lng)?),
        _ => None,
    };

    let mut runtime = LiveRuntime::start(&config)?;
    let outcome = follow(&mut runtime, center, args.history).await;
    runtime.shutdown().await;
    outcome
}

async fn follow(
    runtime: &mut LiveRuntime,
    center: Option<Coordinate>,
    history: bool,
) -> Result<(), CliError> {
    if history {
        let loaded = runtime
            .handle
            .load_history()
            .await
            .map_err(SamanvayError::from)?;
        emit(&format!("loaded {loaded} messages\n"))?;
    }
    if let Some(center) = center {
        let summary = runtime
            .handle
            .initialize_scenario(center)
            .await
            .map_err(SamanvayError::from)?;
        emit(&format!(
            "scenario seeded: {} incidents, {} threat zones\n",
            summary.incidents, summary.threat_zones
        ))?;
    }

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            biased;
            result = &mut interrupt => {
                result.map_err(|source| CliError::Runtime { source })?;
                return Ok(());
            }
            notification = runtime.notifications.recv() => match notification {
                Some(notification) => emit(&format!("{}\n", describe(&notification)))?,
                None => return Ok(()),
            },
        }
    }
}

async fn run_chat(config: SamanvayConfig, args: ChatArgs) -> Result<(), CliError> {
    let runtime = LiveRuntime::start(&config)?;
    let outcome = async {
        runtime
            .wait_connected(Duration::from_secs(args.wait_secs))
            .await?;
        runtime
            .handle
            .send_message(args.text)
            .await
            .map_err(SamanvayError::from)?;
        Ok(())
    }
    .await;
    runtime.shutdown().await;
    outcome
}

async fn run_sos(config: SamanvayConfig, args: SosArgs) -> Result<(), CliError> {
    let location = match (args.lat, args.lng) {
        (Some(lat), Some(lng)) => Some(coordinate(lat, lng)?),
        _ => None,
    };

    let runtime = LiveRuntime::start(&config)?;
    let outcome = async {
        if let Some(location) = location {
            runtime
                .handle
                .set_operator_location(location)
                .await
                .map_err(SamanvayError::from)?;
        }
        runtime
            .wait_connected(Duration::from_secs(args.wait_secs))
            .await?;
        runtime
            .handle
            .send_sos(std::sync::Arc::new(TerminalConfirmation))
            .await
            .map_err(SamanvayError::from)?;
        Ok(())
    }
    .await;
    runtime.shutdown().await;
    outcome
}

async fn run_detect(config: SamanvayConfig, args: DetectArgs) -> Result<String, CliError> {
    let location = coordinate(args.lat, args.lng)?;
    let video = fs::read(&args.video).map_err(|source| CliError::InputRead {
        path: args.video.display().to_string(),
        source,
    })?;
    let file_name = args
        .video
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.mp4".to_owned());

    let backend = BackendClient::new(config.server).map_err(SamanvayError::from)?;
    let report = backend
        .detect(DetectionRequest {
            video: Bytes::from(video),
            file_name,
            location,
        })
        .await
        .map_err(SamanvayError::from)?;

    Ok(render_detection(&report))
}

fn render_detection(report: &DetectionReport) -> String {
    let mut rendered = format!("{}\n", report.message);
    for (class, count) in &report.detection_summary {
        rendered.push_str(&format!("  {class}: {count}\n"));
    }
    rendered.push_str(if report.threat_detected {
        "threat detected\n"
    } else {
        "no threat detected\n"
    });
    rendered
}

fn emit(text: &str) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|source| CliError::StdoutWrite { source })
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Facade(#[from] SamanvayError),

    #[error("failed to start async runtime: {source}")]
    Runtime { source: io::Error },

    #[error("live channel did not connect within {waited:?}")]
    NotConnected { waited: Duration },

    #[error("failed to render config schema: {0}")]
    Schema(#[source] serde_json::Error),

    #[error("failed to read input file `{path}`: {source}")]
    InputRead { path: String, source: io::Error },

    #[error("failed to write stdout: {source}")]
    StdoutWrite { source: io::Error },
}

impl CliError {
    /// 2 for bad input or config, 3 when the operator declined, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Facade(SamanvayError::Config(_) | SamanvayError::Core(_))
            | Self::Facade(SamanvayError::Sync(SyncError::Validation(_)))
            | Self::InputRead { .. } => 2,
            Self::Facade(SamanvayError::Sync(SyncError::SosDeclined)) => 3,
            _ => 1,
        }
    }
}
