use std::collections::BTreeSet;
use std::str::FromStr;

use itertools::Itertools;
use mac_address::MacAddress;
use serde::{Deserialize, Serialize};

use aidot_api::entry::{DeviceRecord, ProductRecord, SERVICE_CCT, SERVICE_RGBW};

pub const DEFAULT_MANUFACTURER: &str = "AiDot";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Brightness,
    ColorTemp,
    Rgbw,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct LightCapabilities {
    pub color_mode: ColorMode,
    pub supported_color_modes: BTreeSet<ColorMode>,
    pub cct_min: u32,
    pub cct_max: u32,
}

impl Default for LightCapabilities {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::Brightness,
            supported_color_modes: BTreeSet::from([ColorMode::Brightness]),
            cct_min: 0,
            cct_max: 0,
        }
    }
}

impl LightCapabilities {
    #[must_use]
    pub fn from_product(product: Option<&ProductRecord>) -> Self {
        let mut rgbw = false;
        let mut cct = false;
        let mut cct_min = 0;
        let mut cct_max = 0;

        for service in product.iter().flat_map(|p| &p.service_modules) {
            match service.identity.as_str() {
                SERVICE_RGBW => rgbw = true,
                SERVICE_CCT => {
                    if let Some(prop) = service.properties.first() {
                        cct_min = prop.min();
                        cct_max = prop.max();
                    }
                    cct = true;
                }
                _ => {}
            }
        }

        let (color_mode, supported_color_modes) = if rgbw {
            (
                ColorMode::Rgbw,
                BTreeSet::from([ColorMode::Rgbw, ColorMode::ColorTemp]),
            )
        } else if cct {
            (ColorMode::ColorTemp, BTreeSet::from([ColorMode::ColorTemp]))
        } else {
            (ColorMode::Brightness, BTreeSet::from([ColorMode::Brightness]))
        };

        Self {
            color_mode,
            supported_color_modes,
            cct_min,
            cct_max,
        }
    }

    #[must_use]
    pub fn supports(&self, mode: ColorMode) -> bool {
        self.supported_color_modes.contains(&mode)
    }

    #[must_use]
    pub const fn cct_in_range(&self, kelvin: u32) -> bool {
        kelvin >= self.cct_min && kelvin <= self.cct_max
    }
}

/// Normalize a MAC address to lower-case, colon separated form.
///
/// Accepts `:` or `-` separated input as well as 12 bare hex digits. Anything
/// else is returned unchanged.
#[must_use]
pub fn format_mac(mac: &str) -> String {
    let mac = mac.trim();
    let parsed = MacAddress::from_str(mac).ok().or_else(|| {
        if mac.len() != 12 {
            return None;
        }
        let bytes: [u8; 6] = hex::decode(mac).ok()?.try_into().ok()?;
        Some(MacAddress::new(bytes))
    });

    parsed.map_or_else(
        || mac.to_string(),
        |addr| addr.bytes().iter().map(|b| format!("{b:02x}")).join(":"),
    )
}

/// Registry metadata for one physical device.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw_version: Option<String>,
}

impl DeviceInfo {
    /// `modelId` is `<manufacturer>.<model>`; without a dot the whole id is the
    /// model.
    #[must_use]
    pub fn from_device(device: &DeviceRecord) -> Self {
        let (manufacturer, model) = match device.model_id.split_once('.') {
            Some((manufacturer, model)) => (manufacturer.to_string(), model.to_string()),
            None => (DEFAULT_MANUFACTURER.to_string(), device.model_id.clone()),
        };

        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            manufacturer,
            model,
            mac: device
                .mac
                .as_deref()
                .filter(|mac| !mac.is_empty())
                .map(format_mac),
            hw_version: device.hardware_version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use aidot_api::entry::{DeviceRecord, ProductRecord};

    use crate::model::light::{ColorMode, DeviceInfo, LightCapabilities, format_mac};

    fn product(value: serde_json::Value) -> ProductRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn rgbw_product_supports_rgbw_and_color_temp() {
        let prod = product(json!({
            "id": "p1",
            "serviceModules": [
                {"identity": "control.light.rgbw"},
                {"identity": "control.light.cct", "properties": [{"minValue": 2700, "maxValue": 6500}]},
            ],
        }));
        let caps = LightCapabilities::from_product(Some(&prod));

        assert_eq!(caps.color_mode, ColorMode::Rgbw);
        assert!(caps.supports(ColorMode::Rgbw));
        assert!(caps.supports(ColorMode::ColorTemp));
        assert!(!caps.supports(ColorMode::Brightness));
        assert_eq!((caps.cct_min, caps.cct_max), (2700, 6500));
    }

    #[test]
    fn cct_only_product() {
        let prod = product(json!({
            "id": "p2",
            "serviceModules": [
                {"identity": "control.light.cct", "properties": [{"minValue": "1800", "maxValue": "5000"}]},
            ],
        }));
        let caps = LightCapabilities::from_product(Some(&prod));

        assert_eq!(caps.color_mode, ColorMode::ColorTemp);
        assert_eq!(caps.supported_color_modes.len(), 1);
        assert!(caps.cct_in_range(1800));
        assert!(caps.cct_in_range(5000));
        assert!(!caps.cct_in_range(5001));
    }

    #[test]
    fn missing_product_is_dimmable_only() {
        let caps = LightCapabilities::from_product(None);
        assert_eq!(caps, LightCapabilities::default());
        assert!(!caps.cct_in_range(2700));
    }

    #[test]
    fn format_mac_variants() {
        assert_eq!(format_mac("AA:BB:CC:DD:EE:0F"), "aa:bb:cc:dd:ee:0f");
        assert_eq!(format_mac("aa-bb-cc-dd-ee-0f"), "aa:bb:cc:dd:ee:0f");
        assert_eq!(format_mac("AABBCCDDEE0F"), "aa:bb:cc:dd:ee:0f");
        assert_eq!(format_mac("not-a-mac"), "not-a-mac");
    }

    #[test]
    fn device_info_splits_model_id() {
        let dev: DeviceRecord = serde_json::from_value(json!({
            "id": "d1",
            "name": "Desk",
            "type": "light",
            "modelId": "Linkind.A19RGBTW",
            "mac": "AABBCCDDEE0F",
            "hardwareVersion": "1.2",
        }))
        .unwrap();
        let info = DeviceInfo::from_device(&dev);

        assert_eq!(info.manufacturer, "Linkind");
        assert_eq!(info.model, "A19RGBTW");
        assert_eq!(info.mac.as_deref(), Some("aa:bb:cc:dd:ee:0f"));
        assert_eq!(info.hw_version.as_deref(), Some("1.2"));

        let plain = DeviceRecord {
            model_id: "BULB1".to_string(),
            mac: Some(String::new()),
            ..dev
        };
        let info = DeviceInfo::from_device(&plain);
        assert_eq!(info.manufacturer, "AiDot");
        assert_eq!(info.model, "BULB1");
        assert!(info.mac.is_none());
    }
}
