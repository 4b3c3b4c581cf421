pub mod session;

use std::fmt::{self, Display};
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use aidot_api::entry::DeviceRecord;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Connection lost")]
    Disconnected,

    #[error("Link has been closed")]
    Closed,

    #[error("Login rejected: {0}")]
    LoginRejected(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type LinkResult<T> = Result<T, LinkError>;

/// One decoded status frame, as reported by the bulb.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub on: bool,
    pub dimming: u8,
    pub cct: u32,
    pub rgbw: [u8; 4],
    pub online: bool,
}

/// Control actions understood by the device link.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceAction {
    /// Ask the device to report all attributes (`getDevAttrReq`)
    RequestAttributes,
    TurnOn,
    TurnOff,
    SetBrightness(u8),
    SetColorTemperature(u32),
    SetRgbw([u8; 4]),
}

impl Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestAttributes => write!(f, "getDevAttrReq"),
            Self::TurnOn => write!(f, "turn on"),
            Self::TurnOff => write!(f, "turn off"),
            Self::SetBrightness(bri) => write!(f, "brightness {bri}"),
            Self::SetColorTemperature(cct) => write!(f, "color temperature {cct}K"),
            Self::SetRgbw([r, g, b, w]) => write!(f, "rgbw ({r}, {g}, {b}, {w})"),
        }
    }
}

/// LAN presence resolution.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Suspends until the device has been seen on the local network. Has no
    /// timeout of its own; callers cancel by dropping the future.
    async fn wait_until_discovered(&self, device_id: &str) -> LinkResult<IpAddr>;
}

/// Persistent connection to a single device.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    async fn login(&self) -> LinkResult<()>;

    fn is_logged_in(&self) -> bool;

    /// Blocks until the next status frame arrives.
    async fn read_status(&self) -> LinkResult<StatusSnapshot>;

    async fn send_action(&self, action: DeviceAction) -> LinkResult<()>;

    /// Must be idempotent.
    async fn close(&self);
}

/// Entry point of the LAN client library: one discovery service shared by
/// all devices of a config entry, one link per device.
pub trait LanClient: Send + Sync {
    fn start_discovery(&self);

    fn discovery(&self) -> Arc<dyn Discovery>;

    fn device_link(&self, device: &DeviceRecord) -> Arc<dyn DeviceLink>;
}
