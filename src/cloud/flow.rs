use std::collections::BTreeSet;
use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use aidot_api::entry::{ConfigEntryData, DeviceRecord, House, LoginResponse, ProductRecord};

use crate::cloud::CloudApi;
use crate::error::AidotResult;

pub const DEFAULT_COUNTRY: &str = "United States";

pub const ERROR_CANNOT_CONNECT: &str = "cannot_connect";
pub const ABORT_ALREADY_CONFIGURED: &str = "already_configured";
pub const ABORT_NOT_LOGGED_IN: &str = "not_logged_in";

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct UserInput {
    #[serde(default = "UserInput::default_country")]
    pub country: String,
    pub username: String,
    pub password: String,
}

impl UserInput {
    fn default_country() -> String {
        DEFAULT_COUNTRY.to_string()
    }
}

/// What the user should see next.
#[derive(Clone, Debug, PartialEq)]
pub enum FlowStep {
    UserForm {
        default_country: String,
        error: Option<&'static str>,
    },
    ChooseHouseForm {
        houses: Vec<String>,
        default_house: Option<String>,
        error: Option<&'static str>,
    },
    CreateEntry {
        unique_id: String,
        title: String,
        data: ConfigEntryData,
    },
    Abort {
        reason: &'static str,
    },
}

/// Two step account setup: log in, then pick a house. Produces the stored
/// config entry for that account and house.
pub struct ConfigFlow {
    cloud: Arc<dyn CloudApi>,
    configured: BTreeSet<String>,
    login: Option<LoginResponse>,
    houses: Vec<House>,
}

impl ConfigFlow {
    pub fn new(cloud: Arc<dyn CloudApi>, configured: impl IntoIterator<Item = String>) -> Self {
        Self {
            cloud,
            configured: configured.into_iter().collect(),
            login: None,
            houses: vec![],
        }
    }

    fn user_form(error: Option<&'static str>) -> FlowStep {
        FlowStep::UserForm {
            default_country: DEFAULT_COUNTRY.to_string(),
            error,
        }
    }

    fn choose_house_form(&self, error: Option<&'static str>) -> FlowStep {
        let default_house = self
            .houses
            .iter()
            .find(|house| house.is_default)
            .or_else(|| self.houses.first())
            .map(|house| house.name.clone());

        FlowStep::ChooseHouseForm {
            houses: self.houses.iter().map(|house| house.name.clone()).collect(),
            default_house,
            error,
        }
    }

    async fn login(&mut self, input: &UserInput) -> AidotResult<()> {
        let login = self
            .cloud
            .login(&input.country, &input.username, &input.password)
            .await?;
        self.houses = self.cloud.houses().await?;
        self.login = Some(login);
        Ok(())
    }

    async fn fetch_house(
        &self,
        house: &House,
    ) -> AidotResult<(Vec<DeviceRecord>, Vec<ProductRecord>)> {
        let devices = self.cloud.devices(&house.id).await?;
        let product_ids = devices
            .iter()
            .filter_map(|dev| dev.product_id.as_deref())
            .join(",");
        let products = if product_ids.is_empty() {
            vec![]
        } else {
            self.cloud.products(&product_ids).await?
        };
        Ok((devices, products))
    }

    pub async fn step_user(&mut self, input: Option<UserInput>) -> FlowStep {
        let Some(input) = input else {
            return Self::user_form(None);
        };

        match self.login(&input).await {
            Ok(()) => self.choose_house_form(None),
            Err(err) => {
                log::error!("Login for {} failed: {err}", input.username);
                Self::user_form(Some(ERROR_CANNOT_CONNECT))
            }
        }
    }

    pub async fn step_choose_house(&mut self, selected_house: Option<&str>) -> FlowStep {
        let Some(login) = self.login.clone() else {
            return FlowStep::Abort {
                reason: ABORT_NOT_LOGGED_IN,
            };
        };

        let Some(name) = selected_house else {
            return self.choose_house_form(None);
        };

        let Some(house) = self.houses.iter().find(|house| house.name == name).cloned() else {
            log::error!("Selected house {name:?} is not in the account");
            return self.choose_house_form(Some(ERROR_CANNOT_CONNECT));
        };

        let (device_list, product_list) = match self.fetch_house(&house).await {
            Ok(res) => res,
            Err(err) => {
                log::error!("Error getting devices or products: {err}");
                return self.choose_house_form(Some(ERROR_CANNOT_CONNECT));
            }
        };

        let data = ConfigEntryData {
            login_response: login,
            selected_house: house,
            device_list,
            product_list,
        };

        let unique_id = data.unique_id();
        if self.configured.contains(&unique_id) {
            return FlowStep::Abort {
                reason: ABORT_ALREADY_CONFIGURED,
            };
        }

        FlowStep::CreateEntry {
            unique_id,
            title: data.title(),
            data,
        }
    }
}
