use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEVICE_TYPE_LIGHT: &str = "light";

pub const SERVICE_RGBW: &str = "control.light.rgbw";
pub const SERVICE_CCT: &str = "control.light.cct";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub username: String,
    /// Tokens and account metadata, handed back to the LAN client untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct House {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProperty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<Value>,
}

/// Cloud values arrive either as JSON numbers or as numeric strings.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn value_as_u32(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(num)) => num
            .as_u64()
            .or_else(|| num.as_f64().map(|x| x.max(0.0) as u64))
            .and_then(|x| u32::try_from(x).ok())
            .unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

impl ServiceProperty {
    #[must_use]
    pub fn min(&self) -> u32 {
        value_as_u32(self.min_value.as_ref())
    }

    #[must_use]
    pub fn max(&self) -> u32 {
        value_as_u32(self.max_value.as_ref())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceModule {
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub properties: Vec<ServiceProperty>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    #[serde(default)]
    pub service_modules: Vec<ServiceModule>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aes_key: Option<Vec<Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductRecord>,
}

impl DeviceRecord {
    /// Key material used by the LAN protocol. Devices without it cannot be
    /// addressed locally.
    #[must_use]
    pub fn aes_key(&self) -> Option<&str> {
        self.aes_key
            .as_ref()
            .and_then(|keys| keys.first())
            .and_then(Option::as_deref)
    }

    #[must_use]
    pub fn is_light(&self) -> bool {
        self.kind == DEVICE_TYPE_LIGHT
    }

    #[must_use]
    pub fn is_lan_controllable_light(&self) -> bool {
        self.is_light() && self.aes_key().is_some()
    }
}

/// Everything the cloud setup step stores for one account + house.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConfigEntryData {
    pub login_response: LoginResponse,
    pub selected_house: House,
    #[serde(default)]
    pub device_list: Vec<DeviceRecord>,
    #[serde(default)]
    pub product_list: Vec<ProductRecord>,
}

/// Attach each product descriptor to the devices that reference it.
pub fn attach_products(devices: &mut [DeviceRecord], products: &[ProductRecord]) {
    for product in products {
        for device in devices
            .iter_mut()
            .filter(|dev| dev.product_id.as_deref() == Some(product.id.as_str()))
        {
            device.product = Some(product.clone());
        }
    }
}

impl ConfigEntryData {
    #[must_use]
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.login_response.username, self.selected_house.id)
    }

    #[must_use]
    pub fn title(&self) -> String {
        format!("{} {}", self.login_response.username, self.selected_house.name)
    }

    /// Devices with their product descriptors attached.
    #[must_use]
    pub fn devices_with_products(&self) -> Vec<DeviceRecord> {
        let mut devices = self.device_list.clone();
        attach_products(&mut devices, &self.product_list);
        devices
    }
}
