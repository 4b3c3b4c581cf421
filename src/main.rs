use std::io::Write;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use serde::Serialize;

use aidot::config;
use aidot::error::AidotResult;
use aidot::model::light::{ColorMode, DeviceInfo, LightCapabilities};

/// Show the lights of a stored AiDot config entry, and how they will be driven
/// on the local network.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: Utf8PathBuf,

    /// Also list devices that cannot be controlled over the LAN
    #[arg(short, long)]
    all: bool,
}

#[derive(Serialize)]
struct InventoryItem {
    #[serde(flatten)]
    device: DeviceInfo,
    lan_control: bool,
    color_mode: ColorMode,
    supported_color_modes: Vec<ColorMode>,
    cct_range: Option<(u32, u32)>,
}

/*
 * Formatter function to output in syslog format. This makes sense when running
 * as a service (where output might go to a log file, or the system journal)
 */
#[allow(clippy::match_same_arms)]
fn syslog_format(
    buf: &mut pretty_env_logger::env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    writeln!(
        buf,
        "<{}>{}: {}",
        match record.level() {
            log::Level::Error => 3,
            log::Level::Warn => 4,
            log::Level::Info => 6,
            log::Level::Debug => 7,
            log::Level::Trace => 7,
        },
        record.target(),
        record.args()
    )
}

fn init_logging() -> AidotResult<()> {
    /* Try to provide reasonable default filters, when RUST_LOG is not specified */
    const DEFAULT_LOG_FILTERS: &[&str] = &["info", "aidot=debug"];

    let log_filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTERS.join(","));

    /* Detect if we need syslog or human-readable formatting */
    if std::env::var("SYSTEMD_EXEC_PID").is_ok_and(|pid| pid == std::process::id().to_string()) {
        Ok(pretty_env_logger::env_logger::builder()
            .format(syslog_format)
            .parse_filters(&log_filters)
            .try_init()?)
    } else {
        Ok(pretty_env_logger::formatted_timed_builder()
            .parse_filters(&log_filters)
            .try_init()?)
    }
}

fn run(args: &Args) -> AidotResult<()> {
    init_logging()?;

    let config = config::parse(&args.config)?;
    log::debug!("Configuration loaded successfully");
    log::debug!(
        "Status reads retry after {:?}, cloud refresh every {:?}",
        config.session.read_retry(),
        config.coordinator.refresh_interval()
    );

    let entry = config::load_entry(&config.aidot.entry_file)?;
    log::info!(
        "Loaded entry {:?} with {} device(s)",
        entry.title(),
        entry.device_list.len()
    );

    let items: Vec<InventoryItem> = entry
        .devices_with_products()
        .iter()
        .filter(|dev| args.all || dev.is_light())
        .map(|dev| {
            let caps = LightCapabilities::from_product(dev.product.as_ref());
            if dev.is_light() && !dev.is_lan_controllable_light() {
                log::warn!("[{}] No key material, skipping LAN control", dev.name);
            }
            InventoryItem {
                device: DeviceInfo::from_device(dev),
                lan_control: dev.is_lan_controllable_light(),
                color_mode: caps.color_mode,
                cct_range: caps
                    .supports(ColorMode::ColorTemp)
                    .then_some((caps.cct_min, caps.cct_max)),
                supported_color_modes: caps.supported_color_modes.into_iter().collect(),
            }
        })
        .collect();

    if items.is_empty() {
        log::warn!("No lights found in {}", config.aidot.entry_file);
        return Ok(());
    }

    print!("{}", serde_yml::to_string(&items)?);
    let _ = std::io::stdout().flush();

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = run(&args) {
        log::error!("AiDot error: {err}");
        log::error!("Fatal error encountered, cannot continue.");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
