use thiserror::Error;

use crate::lan::LinkError;

#[derive(Error, Debug)]
pub enum AidotError {
    /* mapped errors */
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    SerdeYaml(#[from] serde_yml::Error),

    #[error(transparent)]
    ConfigError(#[from] config::ConfigError),

    #[error(transparent)]
    SetLoggerError(#[from] log::SetLoggerError),

    #[error(transparent)]
    Link(#[from] LinkError),

    /* session errors */
    #[error("[{0}] Discovery was cancelled before the device was found")]
    DiscoveryNotFound(String),

    #[error("[{device}] Login failed: {source}")]
    AuthenticationFailed {
        device: String,
        #[source]
        source: LinkError,
    },

    #[error("[{device}] Status read failed: {source}")]
    TransientReadFailure {
        device: String,
        #[source]
        source: LinkError,
    },

    #[error("[{0}] The device is not logged in or may not be on the local area network")]
    NotConnected(String),

    #[error("Invalid command parameter: {0}")]
    InvalidCommandParameter(String),

    /* cloud errors */
    #[error("Cloud authentication failed: {0}")]
    CloudAuthFailed(String),

    #[error("Error communicating with AiDot API: {0}")]
    UpdateFailed(String),
}

impl AidotError {
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidCommandParameter(msg.into())
    }

    /// Errors a user caused (and can fix) by issuing a command
    #[must_use]
    pub const fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::NotConnected(_) | Self::InvalidCommandParameter(_) | Self::Link(_)
        )
    }
}

pub type AidotResult<T> = Result<T, AidotError>;
