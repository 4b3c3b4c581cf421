use std::collections::BTreeMap;

use crate::model::light::DeviceInfo;

/// Devices known to one config entry, keyed by cloud device id.
#[derive(Clone, Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, DeviceInfo>,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, info: DeviceInfo) {
        if let Some(old) = self.devices.insert(info.id.clone(), info) {
            log::debug!("Updated registry entry for device {}", old.id);
        }
    }

    pub fn remove(&mut self, device_id: &str) -> Option<DeviceInfo> {
        let res = self.devices.remove(device_id);
        if res.is_some() {
            log::info!("Removed device {device_id} from registry");
        }
        res
    }

    #[must_use]
    pub fn get(&self, device_id: &str) -> Option<&DeviceInfo> {
        self.devices.get(device_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        for id in self.devices.keys() {
            log::debug!("Dropping registry entry for device {id}");
        }
        self.devices.clear();
    }
}
