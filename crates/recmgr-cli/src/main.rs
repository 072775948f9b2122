//! recmgr - browse channels and manage recordings on a P2P TV proxy.

/// Application configuration (TOML).
mod config;
/// Proxy-facing record manager.
mod manager;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDateTime, TimeDelta};
use clap::{Parser, Subcommand};
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AppConfig, resolve_config_path};
use crate::manager::{Flash, RecordManager};
use recmgr_api::proxy::{ProxyAddress, ProxyClient, ScheduleRequest};

/// Input format for `--start` / `--end`.
const FORM_TIME_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Display format for recording times.
const DISPLAY_TIME_FORMAT: &str = "%d.%m.%Y %H:%M";

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Proxy host (overrides config).
    #[arg(short = 'a', long, global = true)]
    p2pproxy_address: Option<String>,

    /// Proxy port (overrides config).
    #[arg(short = 'p', long, global = true)]
    p2pproxy_port: Option<u16>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Check whether the proxy is reachable.
    Status,
    /// List channels with their categories.
    Channels,
    /// Manage recordings.
    Records(RecordsCommand),
    /// Show the program guide of a channel.
    Epg(EpgArgs),
    /// Show the effective settings.
    Settings(SettingsArgs),
}

/// Arguments for the `records` subcommand.
#[derive(clap::Args)]
struct RecordsCommand {
    /// Records subcommand to run.
    #[command(subcommand)]
    command: RecordsSubcommands,
}

/// Available records subcommands.
#[derive(Subcommand)]
enum RecordsSubcommands {
    /// List recordings.
    List,
    /// Schedule a recording.
    Add(AddArgs),
    /// Stop and delete a recording.
    Delete(DeleteArgs),
}

/// Arguments for the `records add` subcommand.
#[derive(clap::Args)]
struct AddArgs {
    /// Channel ID (see `channels`).
    #[arg(long, required = true)]
    channel_id: String,
    /// Start time, "DD-MM-YYYY HH:MM".
    #[arg(long, required = true)]
    start: String,
    /// End time, "DD-MM-YYYY HH:MM".
    #[arg(long, required = true)]
    end: String,
}

/// Arguments for the `records delete` subcommand.
#[derive(clap::Args)]
struct DeleteArgs {
    /// Recording ID (see `records list`).
    #[arg(long, required = true)]
    id: String,
}

/// Arguments for the `epg` subcommand.
#[derive(clap::Args)]
struct EpgArgs {
    /// Channel ID (see `channels`).
    #[arg(long, required = true)]
    channel_id: String,
}

/// Arguments for the `settings` subcommand.
#[derive(clap::Args)]
struct SettingsArgs {
    /// Write the effective settings (including overrides) to the config file.
    #[arg(long)]
    save: bool,
}

/// Loads the config file and applies command-line overrides.
///
/// # Errors
///
/// Returns an error if the config path cannot be resolved or the file
/// cannot be parsed.
fn load_settings(cli: &Cli) -> Result<AppConfig> {
    let config_path = resolve_config_path(cli.dir.as_ref())?;
    let mut config = AppConfig::load(&config_path)?;
    apply_overrides(
        &mut config,
        cli.p2pproxy_address.as_deref(),
        cli.p2pproxy_port,
    );
    Ok(config)
}

/// Replaces config values with the ones given on the command line.
fn apply_overrides(config: &mut AppConfig, address: Option<&str>, port: Option<u16>) {
    if let Some(address) = address {
        config.proxy.address = address.to_owned();
    }
    if let Some(port) = port {
        config.proxy.port = port;
    }
}

/// Builds the proxy client from the effective settings.
///
/// # Errors
///
/// Returns an error if the address or timeout is invalid.
fn build_proxy_client(config: &AppConfig) -> Result<ProxyClient> {
    let address = ProxyAddress::new(&config.proxy.address, config.proxy.port)?;
    ProxyClient::builder()
        .address(address)
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .timeout(config.proxy.timeout()?)
        .build()
        .context("failed to build proxy client")
}

/// Builds a manager for one command invocation.
///
/// # Errors
///
/// Returns an error if settings cannot be loaded or the client cannot be built.
fn build_manager(cli: &Cli) -> Result<RecordManager<ProxyClient>> {
    let config = load_settings(cli)?;
    let client = build_proxy_client(&config)?;
    Ok(RecordManager::new(client, config.records.dir))
}

/// Parses a `--start` / `--end` value.
///
/// # Errors
///
/// Returns an error with an example value if the input does not match
/// `DD-MM-YYYY HH:MM`.
fn parse_form_datetime(flag: &str, value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), FORM_TIME_FORMAT).with_context(|| {
        let example = (Local::now() + TimeDelta::hours(2)).format(FORM_TIME_FORMAT);
        format!("invalid --{flag} \"{value}\", expected e.g. \"{example}\"")
    })
}

/// Logs a flash message at a level matching its outcome.
///
/// # Errors
///
/// Returns the flash message as an error when it reports a failure, so the
/// process exits non-zero.
fn report_flash(flash: &Flash) -> Result<()> {
    if flash.is_success() {
        tracing::info!("{}", flash.message);
        Ok(())
    } else {
        tracing::warn!("{}", flash.message);
        bail!("{}", flash.message)
    }
}

/// Runs the `status` subcommand.
///
/// # Errors
///
/// Returns an error if the manager cannot be built.
#[instrument(skip_all)]
async fn run_status(cli: &Cli) -> Result<()> {
    let config = load_settings(cli)?;
    let client = build_proxy_client(&config)?;
    let target = format!("{}:{}", config.proxy.address, config.proxy.port);
    let manager = RecordManager::new(client, config.records.dir);

    let status = manager.status().await;
    if status.reachable {
        tracing::info!("Proxy {target} is reachable");
    } else {
        let disabled: Vec<String> = status.disabled.iter().map(ToString::to_string).collect();
        tracing::info!(
            "Proxy {target} unavailable; disabled: {}",
            disabled.join(", ")
        );
    }
    Ok(())
}

/// Runs the `channels` subcommand.
///
/// # Errors
///
/// Returns an error if the listing cannot be fetched.
#[instrument(skip_all)]
async fn run_channels(cli: &Cli) -> Result<()> {
    let manager = build_manager(cli)?;
    let listing = manager.channels().await?;

    tracing::info!("ID\tGroup\t\tAdult\tName");
    for ch in &listing.channels {
        tracing::info!(
            "{}\t{}\t\t{}\t{}",
            ch.id,
            ch.group,
            if ch.adult { "yes" } else { "-" },
            ch.name
        );
    }
    tracing::info!(
        "Total: {} channels in {} groups",
        listing.len(),
        listing.groups.len()
    );
    Ok(())
}

/// Runs the `records list` subcommand.
///
/// # Errors
///
/// Returns an error if the recordings cannot be fetched.
#[instrument(skip_all)]
async fn run_records_list(cli: &Cli) -> Result<()> {
    let manager = build_manager(cli)?;
    let records = manager.records().await?;

    tracing::info!("ID\tStart\t\t\tEnd\t\t\tStatus\t\tChannel");
    for rec in &records {
        tracing::info!(
            "{}\t{}\t{}\t{}\t{}",
            rec.id,
            rec.start.format(DISPLAY_TIME_FORMAT),
            rec.end.format(DISPLAY_TIME_FORMAT),
            rec.status,
            rec.channel_name
        );
    }
    tracing::info!("Total: {} recordings", records.len());
    Ok(())
}

/// Runs the `records add` subcommand.
///
/// Times are validated before any request is made.
///
/// # Errors
///
/// Returns an error if a time is invalid, the channel listing cannot be
/// fetched, or the proxy rejects the schedule.
#[instrument(skip_all)]
async fn run_records_add(cli: &Cli, args: &AddArgs) -> Result<()> {
    let start = parse_form_datetime("start", &args.start)?;
    let end = parse_form_datetime("end", &args.end)?;
    if end <= start {
        bail!("--end must be after --start");
    }

    let manager = build_manager(cli)?;
    let request = ScheduleRequest {
        channel_id: args.channel_id.clone(),
        start,
        end,
    };
    let flash = manager.schedule(&request).await?;
    report_flash(&flash)
}

/// Runs the `records delete` subcommand.
///
/// # Errors
///
/// Returns an error if the manager cannot be built or the deletion fails.
#[instrument(skip_all)]
async fn run_records_delete(cli: &Cli, args: &DeleteArgs) -> Result<()> {
    let manager = build_manager(cli)?;
    let flash = manager.delete(&args.id).await;
    report_flash(&flash)
}

/// Runs the `epg` subcommand.
///
/// # Errors
///
/// Returns an error if the channel is unknown or a fetch fails.
#[instrument(skip_all)]
async fn run_epg(cli: &Cli, args: &EpgArgs) -> Result<()> {
    let manager = build_manager(cli)?;
    let (channel, telecasts) = manager.epg(&args.channel_id).await?;

    tracing::info!("EPG for {} ({})", channel.name, channel.id);
    tracing::info!("Start\t\t\tEnd\t\t\tName");
    for tc in &telecasts {
        tracing::info!(
            "{}\t{}\t{}",
            tc.start.with_timezone(&Local).format(DISPLAY_TIME_FORMAT),
            tc.end.with_timezone(&Local).format(DISPLAY_TIME_FORMAT),
            tc.name
        );
    }
    tracing::info!("Total: {} telecasts", telecasts.len());
    Ok(())
}

/// Runs the `settings` subcommand.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or saved.
fn run_settings(cli: &Cli, args: &SettingsArgs) -> Result<()> {
    let config_path = resolve_config_path(cli.dir.as_ref())?;
    let config = load_settings(cli)?;

    tracing::info!("Config file: {}", config_path.display());
    tracing::info!("Proxy address: {}", config.proxy.address);
    tracing::info!("Proxy port: {}", config.proxy.port);
    tracing::info!("Timeout: {}s", config.proxy.timeout_secs);
    tracing::info!(
        "Records dir: {}",
        config
            .records
            .dir
            .as_deref()
            .map_or_else(|| String::from("-"), |d| d.display().to_string())
    );

    if args.save {
        config.save(&config_path)?;
        tracing::info!("Saved settings to {}", config_path.display());
    }
    Ok(())
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

        // Export spans only when a collector is configured.
        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    let cli = Cli::parse();
    match &cli.command {
        Commands::Status => run_status(&cli).await,
        Commands::Channels => run_channels(&cli).await,
        Commands::Records(records) => match &records.command {
            RecordsSubcommands::List => run_records_list(&cli).await,
            RecordsSubcommands::Add(args) => run_records_add(&cli, args).await,
            RecordsSubcommands::Delete(args) => run_records_delete(&cli, args).await,
        },
        Commands::Epg(args) => run_epg(&cli, args).await,
        Commands::Settings(args) => run_settings(&cli, args),
    }
}
