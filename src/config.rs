use std::fs::File;

use camino::Utf8Path;
use config::{Config, ConfigError};

use aidot_api::entry::ConfigEntryData;

use crate::error::AidotResult;

pub use aidot_api::config::*;

pub fn parse(filename: &Utf8Path) -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        .set_default("aidot.entry_file", "entry.yaml")?
        .set_default(
            "session.read_retry_secs",
            SessionConfig::DEFAULT_READ_RETRY_SECS,
        )?
        .set_default("session.initial_request", true)?
        .set_default(
            "coordinator.refresh_interval_secs",
            CoordinatorConfig::DEFAULT_REFRESH_INTERVAL_SECS,
        )?
        .add_source(config::File::with_name(filename.as_str()).required(false))
        .add_source(config::Environment::with_prefix("AIDOT").separator("__"))
        .build()?;

    settings.try_deserialize()
}

/// Load a stored config entry. `.json` files are read as JSON, anything else
/// as YAML.
pub fn load_entry(filename: &Utf8Path) -> AidotResult<ConfigEntryData> {
    let fd = File::open(filename)?;
    let entry = if filename.extension() == Some("json") {
        serde_json::from_reader(fd)?
    } else {
        serde_yml::from_reader(fd)?
    };
    Ok(entry)
}
