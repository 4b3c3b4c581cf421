use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use aidot_api::config::CoordinatorConfig;
use aidot_api::entry::{ConfigEntryData, DeviceRecord, ProductRecord, attach_products};

use crate::cloud::CloudApi;
use crate::error::AidotResult;
use crate::model::registry::DeviceRegistry;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RefreshResult {
    pub device_list: Vec<DeviceRecord>,
    pub product_list: Vec<ProductRecord>,
    pub new_devices: Vec<String>,
    pub removed_devices: Vec<String>,
}

/// Periodically re-reads the device list of the selected house and keeps
/// the device registry in sync with it.
pub struct Coordinator {
    cloud: Arc<dyn CloudApi>,
    house_id: String,
    known: BTreeSet<String>,
    registry: Arc<Mutex<DeviceRegistry>>,
    interval: Duration,
}

impl Coordinator {
    pub fn new(
        cloud: Arc<dyn CloudApi>,
        entry: &ConfigEntryData,
        registry: Arc<Mutex<DeviceRegistry>>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            cloud,
            house_id: entry.selected_house.id.clone(),
            known: entry.device_list.iter().map(|dev| dev.id.clone()).collect(),
            registry,
            interval: config.refresh_interval(),
        }
    }

    #[must_use]
    pub const fn known_devices(&self) -> &BTreeSet<String> {
        &self.known
    }

    pub async fn refresh(&mut self) -> AidotResult<RefreshResult> {
        let mut device_list = self.cloud.devices(&self.house_id).await?;

        let product_ids = device_list
            .iter()
            .filter_map(|dev| dev.product_id.as_deref())
            .join(",");

        let product_list = if product_ids.is_empty() {
            vec![]
        } else {
            self.cloud.products(&product_ids).await?
        };

        attach_products(&mut device_list, &product_list);

        let current: BTreeSet<String> = device_list.iter().map(|dev| dev.id.clone()).collect();
        let new_devices: Vec<String> = current.difference(&self.known).cloned().collect();
        let removed_devices: Vec<String> = self.known.difference(&current).cloned().collect();

        if !new_devices.is_empty() {
            log::info!(
                "Found {} new device(s): {}",
                new_devices.len(),
                new_devices.join(", ")
            );
        }

        if !removed_devices.is_empty() {
            log::info!(
                "Removed {} device(s): {}",
                removed_devices.len(),
                removed_devices.join(", ")
            );
            let mut registry = self.registry.lock().await;
            for id in &removed_devices {
                registry.remove(id);
            }
        }

        self.known = current;

        Ok(RefreshResult {
            device_list,
            product_list,
            new_devices,
            removed_devices,
        })
    }

    /// Refresh on every interval tick until cancelled. Results are sent to
    /// `updates`; the loop also ends when nobody listens anymore.
    pub async fn run(mut self, cancel: CancellationToken, updates: UnboundedSender<RefreshResult>) {
        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // the first tick fires immediately, but the entry data is fresh
        tick.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = tick.tick() => {
                    match self.refresh().await {
                        Ok(res) => {
                            if updates.send(res).is_err() {
                                break;
                            }
                        }
                        Err(err) => log::error!("Device refresh failed: {err}"),
                    }
                }
            }
        }

        log::debug!("Coordinator for house {} stopped", self.house_id);
    }
}
