pub mod coordinator;
pub mod flow;

use async_trait::async_trait;
use thiserror::Error;

use aidot_api::entry::{DeviceRecord, House, LoginResponse, ProductRecord};

use crate::error::AidotError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl From<CloudError> for AidotError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::AuthFailed(msg) => Self::CloudAuthFailed(msg),
            CloudError::Request(msg) => Self::UpdateFailed(msg),
        }
    }
}

pub type CloudResult<T> = Result<T, CloudError>;

/// Account level operations of the AiDot cloud service.
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn login(&self, country: &str, username: &str, password: &str)
    -> CloudResult<LoginResponse>;

    async fn houses(&self) -> CloudResult<Vec<House>>;

    async fn devices(&self, house_id: &str) -> CloudResult<Vec<DeviceRecord>>;

    /// `product_ids` is a comma separated list.
    async fn products(&self, product_ids: &str) -> CloudResult<Vec<ProductRecord>>;
}
