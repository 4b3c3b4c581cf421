use serde::{Deserialize, Serialize};

use aidot_api::entry::DeviceRecord;

use crate::error::AidotResult;
use crate::lan::StatusSnapshot;
use crate::lan::session::{DeviceSession, LightCommand};
use crate::model::light::{ColorMode, DeviceInfo, LightCapabilities};

/// Parameters of a turn-on request. All fields are optional; an empty request
/// simply switches the light on.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct TurnOnParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temp_kelvin: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgbw_color: Option<Vec<u8>>,
}

impl TurnOnParams {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.brightness.is_none() && self.color_temp_kelvin.is_none() && self.rgbw_color.is_none()
    }

    fn into_commands(self) -> Vec<LightCommand> {
        if self.is_empty() {
            return vec![LightCommand::TurnOn];
        }

        let mut cmds = vec![];
        if let Some(bri) = self.brightness {
            cmds.push(LightCommand::SetBrightness(bri));
        }
        if let Some(kelvin) = self.color_temp_kelvin {
            cmds.push(LightCommand::SetColorTemperature(kelvin));
        }
        if let Some(rgbw) = self.rgbw_color {
            cmds.push(LightCommand::SetRgbw(rgbw));
        }
        cmds
    }
}

/// One AiDot light as presented to the host: static device metadata plus a
/// live view of its session.
pub struct AidotLight {
    info: DeviceInfo,
    session: DeviceSession,
}

impl AidotLight {
    #[must_use]
    pub fn new(device: &DeviceRecord, session: DeviceSession) -> Self {
        Self {
            info: DeviceInfo::from_device(device),
            session,
        }
    }

    #[must_use]
    pub fn unique_id(&self) -> &str {
        self.session.device_id()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.session.name()
    }

    #[must_use]
    pub const fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    #[must_use]
    pub const fn session(&self) -> &DeviceSession {
        &self.session
    }

    #[must_use]
    pub fn capabilities(&self) -> &LightCapabilities {
        self.session.capabilities()
    }

    fn status(&self) -> Option<StatusSnapshot> {
        self.session.current_status()
    }

    #[must_use]
    pub fn available(&self) -> bool {
        self.session.is_available()
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.status().is_some_and(|st| st.on)
    }

    /// `None` while unknown, and also when the device reports zero dimming.
    #[must_use]
    pub fn brightness(&self) -> Option<u8> {
        self.status().map(|st| st.dimming).filter(|dim| *dim != 0)
    }

    #[must_use]
    pub fn color_temp_kelvin(&self) -> Option<u32> {
        self.status().map(|st| st.cct)
    }

    #[must_use]
    pub fn rgbw_color(&self) -> Option<[u8; 4]> {
        self.status().map(|st| st.rgbw)
    }

    #[must_use]
    pub fn min_color_temp_kelvin(&self) -> u32 {
        self.capabilities().cct_min
    }

    #[must_use]
    pub fn max_color_temp_kelvin(&self) -> u32 {
        self.capabilities().cct_max
    }

    #[must_use]
    pub fn color_mode(&self) -> ColorMode {
        self.capabilities().color_mode
    }

    pub async fn turn_on(&self, params: TurnOnParams) -> AidotResult<()> {
        self.session.submit_commands(&params.into_commands()).await
    }

    pub async fn turn_off(&self) -> AidotResult<()> {
        self.session.submit_command(LightCommand::TurnOff).await
    }

    pub async fn added(&self) {
        self.session.attach().await;
    }

    pub async fn will_remove(&self) {
        self.session.detach().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use aidot_api::config::SessionConfig;

    use crate::error::AidotError;
    use crate::lan::DeviceAction;
    use crate::lan::session::tests::{MockDiscovery, MockLink, light_device, rgbw_caps, status};
    use crate::lan::session::{ChannelObserver, DeviceSession, SessionPhase};
    use crate::light::{AidotLight, TurnOnParams};
    use crate::model::light::ColorMode;

    fn light() -> (AidotLight, Arc<MockLink>) {
        let (link, _frames) = MockLink::new();
        let (observer, _events) = ChannelObserver::channel();
        let device = light_device("lamp");
        let session = DeviceSession::new(
            &device,
            rgbw_caps(),
            link.clone(),
            MockDiscovery::new(),
            SessionConfig::default(),
            observer,
        );
        (AidotLight::new(&device, session), link)
    }

    #[test]
    fn properties_before_first_frame() {
        let (light, _link) = light();

        assert_eq!(light.unique_id(), "lamp");
        assert_eq!(light.name(), "Lamp lamp");
        assert_eq!(light.device_info().manufacturer, "AiDot");
        assert!(!light.available());
        assert!(!light.is_on());
        assert_eq!(light.brightness(), None);
        assert_eq!(light.color_temp_kelvin(), None);
        assert_eq!(light.rgbw_color(), None);
        assert_eq!(light.color_mode(), ColorMode::Rgbw);
        assert_eq!(
            (light.min_color_temp_kelvin(), light.max_color_temp_kelvin()),
            (2700, 6500)
        );
    }

    #[tokio::test]
    async fn empty_turn_on_switches_on() {
        let (light, link) = light();
        link.force_login();

        light.turn_on(TurnOnParams::default()).await.unwrap();
        light.turn_off().await.unwrap();

        assert_eq!(link.sent(), vec![DeviceAction::TurnOn, DeviceAction::TurnOff]);
    }

    #[tokio::test]
    async fn turn_on_forwards_each_parameter() {
        let (light, link) = light();
        link.force_login();

        let params = TurnOnParams {
            brightness: Some(200),
            color_temp_kelvin: Some(4000),
            rgbw_color: Some(vec![100, 150, 200, 255]),
        };
        light.turn_on(params).await.unwrap();

        assert_eq!(
            link.sent(),
            vec![
                DeviceAction::SetBrightness(200),
                DeviceAction::SetColorTemperature(4000),
                DeviceAction::SetRgbw([100, 150, 200, 255]),
            ]
        );
    }

    #[tokio::test]
    async fn invalid_parameter_sends_nothing() {
        let (light, link) = light();
        link.force_login();

        let params: TurnOnParams =
            serde_json::from_str(r#"{"brightness": 10, "rgbw_color": [1, 2, 3]}"#).unwrap();
        let err = light.turn_on(params).await.unwrap_err();

        assert!(matches!(err, AidotError::InvalidCommandParameter(_)));
        assert!(err.is_user_visible());
        assert!(link.sent().is_empty());
    }

    #[tokio::test]
    async fn commands_fail_when_not_logged_in() {
        let (light, link) = light();

        let err = light.turn_off().await.unwrap_err();
        assert!(matches!(err, AidotError::NotConnected(_)));
        assert!(link.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_hooks_drive_session() {
        let (link, frames) = MockLink::new();
        let discovery = MockDiscovery::new();
        let (observer, mut events) = ChannelObserver::channel();
        let device = light_device("lamp");
        let session = DeviceSession::new(
            &device,
            rgbw_caps(),
            link.clone(),
            discovery.clone(),
            SessionConfig::default(),
            observer,
        );
        let light = AidotLight::new(&device, session);

        light.added().await;
        discovery.announce();

        let mut dimmed = status(0, true);
        dimmed.on = false;
        frames.send(Ok(dimmed)).unwrap();
        events.recv().await.unwrap();

        assert!(light.available());
        assert!(!light.is_on());
        assert_eq!(light.brightness(), None);
        assert_eq!(light.rgbw_color(), Some([1, 2, 3, 4]));

        light.will_remove().await;
        assert_eq!(light.session().phase(), SessionPhase::Closed);
        assert!(!light.available());
    }
}
