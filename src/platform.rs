use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;

use aidot_api::config::SessionConfig;
use aidot_api::entry::{ConfigEntryData, DeviceRecord};

use crate::cloud::coordinator::RefreshResult;
use crate::lan::LanClient;
use crate::lan::session::{DeviceSession, SessionObserver};
use crate::light::AidotLight;
use crate::model::light::{DeviceInfo, LightCapabilities};
use crate::model::registry::DeviceRegistry;

/// Lights that can be driven over the LAN: type `light` with key material.
#[must_use]
pub fn lan_lights(entry: &ConfigEntryData) -> Vec<DeviceRecord> {
    entry
        .devices_with_products()
        .into_iter()
        .filter(DeviceRecord::is_lan_controllable_light)
        .collect()
}

/// The light platform of one config entry. Owns the LAN client, every light
/// (and with it every session), and the entry's device registry.
pub struct AidotPlatform {
    lan: Arc<dyn LanClient>,
    settings: SessionConfig,
    observer: Arc<dyn SessionObserver>,
    lights: Vec<AidotLight>,
    registry: Arc<Mutex<DeviceRegistry>>,
}

impl AidotPlatform {
    pub async fn setup(
        entry: &ConfigEntryData,
        lan: Arc<dyn LanClient>,
        settings: SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        lan.start_discovery();

        let mut platform = Self {
            lan,
            settings,
            observer,
            lights: vec![],
            registry: Arc::new(Mutex::new(DeviceRegistry::new())),
        };

        for device in lan_lights(entry) {
            platform.add_light(&device).await;
        }

        log::info!(
            "[{}] Set up {} light(s)",
            entry.title(),
            platform.lights.len()
        );

        platform
    }

    async fn add_light(&mut self, device: &DeviceRecord) {
        let capabilities = LightCapabilities::from_product(device.product.as_ref());
        let session = DeviceSession::new(
            device,
            capabilities,
            self.lan.device_link(device),
            self.lan.discovery(),
            self.settings.clone(),
            self.observer.clone(),
        );
        let light = AidotLight::new(device, session);

        self.registry
            .lock()
            .await
            .register(DeviceInfo::from_device(device));
        light.added().await;
        self.lights.push(light);
    }

    #[must_use]
    pub fn lights(&self) -> &[AidotLight] {
        &self.lights
    }

    #[must_use]
    pub fn light(&self, device_id: &str) -> Option<&AidotLight> {
        self.lights.iter().find(|light| light.unique_id() == device_id)
    }

    #[must_use]
    pub fn registry(&self) -> Arc<Mutex<DeviceRegistry>> {
        self.registry.clone()
    }

    /// Apply a cloud refresh: lights of removed devices are detached and
    /// dropped. New devices are only reported; they are picked up when the
    /// entry is set up again.
    pub async fn apply_refresh(&mut self, refresh: &RefreshResult) {
        if !refresh.removed_devices.is_empty() {
            let (removed, kept) = std::mem::take(&mut self.lights)
                .into_iter()
                .partition::<Vec<_>, _>(|light| {
                    refresh.removed_devices.iter().any(|id| id == light.unique_id())
                });
            self.lights = kept;

            join_all(removed.iter().map(|light| light.will_remove())).await;
        }

        for id in &refresh.new_devices {
            log::info!("New device {id} available, reload the entry to add it");
        }
    }

    /// Tear down every session and forget all devices.
    pub async fn unload(&mut self) {
        join_all(self.lights.iter().map(|light| light.will_remove())).await;
        self.lights.clear();
        self.registry.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use aidot_api::config::SessionConfig;
    use aidot_api::entry::{ConfigEntryData, DeviceRecord};

    use crate::cloud::coordinator::RefreshResult;
    use crate::lan::session::tests::{MockDiscovery, MockLink};
    use crate::lan::session::{ChannelObserver, SessionPhase};
    use crate::lan::{DeviceLink, Discovery, LanClient};
    use crate::model::light::ColorMode;
    use crate::platform::{AidotPlatform, lan_lights};

    struct MockLan {
        discovery: Arc<MockDiscovery>,
        links: std::sync::Mutex<HashMap<String, Arc<MockLink>>>,
        started: AtomicUsize,
    }

    impl MockLan {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                discovery: MockDiscovery::new(),
                links: std::sync::Mutex::new(HashMap::new()),
                started: AtomicUsize::new(0),
            })
        }

        fn link(&self, id: &str) -> Arc<MockLink> {
            self.links.lock().unwrap()[id].clone()
        }
    }

    impl LanClient for MockLan {
        fn start_discovery(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn discovery(&self) -> Arc<dyn Discovery> {
            self.discovery.clone()
        }

        fn device_link(&self, device: &DeviceRecord) -> Arc<dyn DeviceLink> {
            let (link, _frames) = MockLink::new();
            self.links
                .lock()
                .unwrap()
                .insert(device.id.clone(), link.clone());
            link
        }
    }

    fn entry() -> ConfigEntryData {
        serde_json::from_value(json!({
            "login_response": {"username": "alice"},
            "selected_house": {"id": "h1", "name": "Home"},
            "device_list": [
                {"id": "a", "name": "Desk", "type": "light", "productId": "p1", "aesKey": ["k1"], "modelId": "AiDot.A19"},
                {"id": "b", "name": "Hall", "type": "light", "productId": "p2", "aesKey": ["k2"]},
                {"id": "c", "name": "Nokey", "type": "light", "productId": "p1", "aesKey": [null]},
                {"id": "d", "name": "Plug", "type": "socket", "aesKey": ["k4"]},
            ],
            "product_list": [
                {"id": "p1", "serviceModules": [
                    {"identity": "control.light.rgbw"},
                    {"identity": "control.light.cct", "properties": [{"minValue": 2700, "maxValue": 6500}]},
                ]},
            ],
        }))
        .unwrap()
    }

    #[test]
    fn only_keyed_lights_are_selected() {
        let ids: Vec<_> = lan_lights(&entry()).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn setup_attaches_every_light() {
        let lan = MockLan::new();
        let (observer, _events) = ChannelObserver::channel();
        let mut platform =
            AidotPlatform::setup(&entry(), lan.clone(), SessionConfig::default(), observer).await;

        assert_eq!(lan.started.load(Ordering::SeqCst), 1);
        assert_eq!(platform.lights().len(), 2);
        assert_eq!(platform.registry().lock().await.len(), 2);

        let desk = platform.light("a").unwrap();
        assert_eq!(desk.color_mode(), ColorMode::Rgbw);
        assert_eq!(desk.max_color_temp_kelvin(), 6500);
        assert_eq!(platform.light("b").unwrap().color_mode(), ColorMode::Brightness);

        lan.discovery.announce();
        let mut phase = platform.light("a").unwrap().session().subscribe_phase();
        phase
            .wait_for(|p| *p == SessionPhase::Streaming)
            .await
            .unwrap();

        platform.unload().await;
        assert!(platform.lights().is_empty());
        assert!(platform.registry().lock().await.is_empty());
        assert_eq!(lan.link("a").closes.load(Ordering::SeqCst), 1);
        assert_eq!(lan.link("b").closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_drops_removed_lights() {
        let lan = MockLan::new();
        let (observer, _events) = ChannelObserver::channel();
        let mut platform =
            AidotPlatform::setup(&entry(), lan.clone(), SessionConfig::default(), observer).await;

        let refresh = RefreshResult {
            device_list: vec![],
            product_list: vec![],
            new_devices: vec!["z".to_string()],
            removed_devices: vec!["b".to_string()],
        };
        platform.apply_refresh(&refresh).await;

        assert!(platform.light("a").is_some());
        assert!(platform.light("b").is_none());
        assert_eq!(lan.link("b").closes.load(Ordering::SeqCst), 1);
        assert_eq!(lan.link("a").closes.load(Ordering::SeqCst), 0);

        platform.unload().await;
    }
}
