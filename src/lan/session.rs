use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use aidot_api::config::SessionConfig;
use aidot_api::entry::DeviceRecord;

use crate::error::{AidotError, AidotResult};
use crate::lan::{DeviceAction, DeviceLink, Discovery, LinkError, StatusSnapshot};
use crate::model::light::LightCapabilities;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionPhase {
    AwaitingDiscovery,
    Connecting,
    Streaming,
    Degraded,
    Closed,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LightCommand {
    TurnOn,
    TurnOff,
    SetBrightness(u8),
    SetColorTemperature(u32),
    SetRgbw(Vec<u8>),
}

enum ReadOutcome {
    FrameReceived(StatusSnapshot),
    TransientError(LinkError),
    Cancelled,
}

/// Receives every status frame, in arrival order, exactly once.
pub trait SessionObserver: Send + Sync {
    fn status_updated(&self, device_id: &str, status: &StatusSnapshot);
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StatusEvent {
    pub device_id: String,
    pub status: StatusSnapshot,
}

/// Forwards status updates into an unbounded channel.
pub struct ChannelObserver {
    tx: UnboundedSender<StatusEvent>,
}

impl ChannelObserver {
    #[must_use]
    pub fn channel() -> (Arc<Self>, UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl SessionObserver for ChannelObserver {
    fn status_updated(&self, device_id: &str, status: &StatusSnapshot) {
        let event = StatusEvent {
            device_id: device_id.to_string(),
            status: *status,
        };
        if self.tx.send(event).is_err() {
            log::trace!("[{device_id}] Status listener gone, dropping update");
        }
    }
}

#[derive(Default)]
struct SessionTasks {
    discovery: Option<JoinHandle<()>>,
    read: Option<JoinHandle<()>>,
}

impl SessionTasks {
    fn is_running(&self) -> bool {
        [&self.discovery, &self.read]
            .into_iter()
            .flatten()
            .any(|task| !task.is_finished())
    }
}

struct SessionInner {
    device_id: String,
    name: String,
    capabilities: LightCapabilities,
    settings: SessionConfig,
    link: Arc<dyn DeviceLink>,
    discovery: Arc<dyn Discovery>,
    observer: Arc<dyn SessionObserver>,
    phase: watch::Sender<SessionPhase>,
    status: watch::Sender<Option<StatusSnapshot>>,
    address: watch::Sender<Option<IpAddr>>,
    cancel: CancellationToken,
    tasks: Mutex<SessionTasks>,
    link_closed: AtomicBool,
}

impl SessionInner {
    /// `Closed` is terminal; late transitions from winding-down tasks are
    /// ignored.
    fn set_phase(&self, next: SessionPhase) {
        let changed = self.phase.send_if_modified(|phase| {
            if *phase == SessionPhase::Closed || *phase == next {
                return false;
            }
            *phase = next;
            true
        });
        if changed {
            log::debug!("[{}] Session is now {next:?}", self.name);
        }
    }

    async fn next_frame(&self) -> ReadOutcome {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => ReadOutcome::Cancelled,
            res = self.link.read_status() => match res {
                Ok(status) => ReadOutcome::FrameReceived(status),
                Err(err) => ReadOutcome::TransientError(err),
            },
        }
    }

    fn publish(&self, status: StatusSnapshot) {
        log::debug!("[{}] Status updated: {status:?}", self.name);
        self.status.send_replace(Some(status));
        self.set_phase(SessionPhase::Streaming);
        self.observer.status_updated(&self.device_id, &status);
    }

    async fn join(&self, what: &str, handle: JoinHandle<()>) {
        if let Err(err) = handle.await {
            if err.is_panic() {
                log::error!("[{}] {what} task panicked: {err}", self.name);
            }
        }
    }
}

/// Lifecycle of one light on the local network: waits for discovery, logs
/// in, then streams status frames until detached.
///
/// The session exclusively owns its [`DeviceLink`]. Background work runs on
/// two tasks (discovery wait, read loop) which are both cancelled and joined
/// by [`DeviceSession::detach`].
pub struct DeviceSession {
    inner: Arc<SessionInner>,
}

impl DeviceSession {
    #[must_use]
    pub fn new(
        device: &DeviceRecord,
        capabilities: LightCapabilities,
        link: Arc<dyn DeviceLink>,
        discovery: Arc<dyn Discovery>,
        settings: SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let (phase, _) = watch::channel(SessionPhase::AwaitingDiscovery);
        let (status, _) = watch::channel(None);
        let (address, _) = watch::channel(None);

        Self {
            inner: Arc::new(SessionInner {
                device_id: device.id.clone(),
                name: device.name.clone(),
                capabilities,
                settings,
                link,
                discovery,
                observer,
                phase,
                status,
                address,
                cancel: CancellationToken::new(),
                tasks: Mutex::new(SessionTasks::default()),
                link_closed: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn capabilities(&self) -> &LightCapabilities {
        &self.inner.capabilities
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        *self.inner.phase.borrow()
    }

    #[must_use]
    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.inner.phase.subscribe()
    }

    #[must_use]
    pub fn current_status(&self) -> Option<StatusSnapshot> {
        *self.inner.status.borrow()
    }

    /// Address reported by discovery, once found.
    #[must_use]
    pub fn address(&self) -> Option<IpAddr> {
        *self.inner.address.borrow()
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.phase() != SessionPhase::Closed
            && self.inner.link.is_logged_in()
            && self.current_status().is_some_and(|st| st.online)
    }

    /// Start waiting for the device in the background. Returns immediately.
    pub async fn attach(&self) {
        let inner = &self.inner;
        let mut tasks = inner.tasks.lock().await;

        if inner.cancel.is_cancelled() {
            log::warn!("[{}] Session already closed, not attaching", inner.name);
            return;
        }

        if tasks.is_running() {
            log::debug!("[{}] Session already attached", inner.name);
            return;
        }

        inner.set_phase(SessionPhase::AwaitingDiscovery);
        log::debug!("[{}] Starting aidot_discovery_{}", inner.name, inner.device_id);
        tasks.discovery = Some(tokio::spawn(Self::discovery_task(inner.clone())));
    }

    /// Cancel all background work and close the link. Safe to call any
    /// number of times.
    pub async fn detach(&self) {
        let inner = &self.inner;
        inner.cancel.cancel();
        inner.set_phase(SessionPhase::Closed);

        // handles are taken out of the lock first, since the discovery task
        // needs the same lock to register the read loop
        let discovery = inner.tasks.lock().await.discovery.take();
        if let Some(handle) = discovery {
            inner.join("discovery", handle).await;
        }

        let read = inner.tasks.lock().await.read.take();
        if let Some(handle) = read {
            inner.join("read", handle).await;
        }

        if !inner.link_closed.swap(true, Ordering::SeqCst) {
            inner.link.close().await;
            log::info!("[{}] Removed, link closed", inner.name);
        }
    }

    async fn discovery_task(inner: Arc<SessionInner>) {
        let found = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => {
                log::debug!("{}", AidotError::DiscoveryNotFound(inner.name.clone()));
                return;
            }
            res = inner.discovery.wait_until_discovered(&inner.device_id) => res,
        };

        let addr = match found {
            Ok(addr) => addr,
            Err(err) => {
                log::error!("[{}] Discovery failed: {err}", inner.name);
                return;
            }
        };

        log::info!("[{}] Discovered at {addr}", inner.name);
        inner.address.send_replace(Some(addr));
        inner.set_phase(SessionPhase::Connecting);

        let login = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => return,
            res = inner.link.login() => res,
        };

        if let Err(source) = login {
            let err = AidotError::AuthenticationFailed {
                device: inner.name.clone(),
                source,
            };
            log::error!("{err}");
            inner.set_phase(SessionPhase::AwaitingDiscovery);
            return;
        }

        if inner.settings.initial_request {
            let res = tokio::select! {
                biased;
                () = inner.cancel.cancelled() => return,
                res = inner.link.send_action(DeviceAction::RequestAttributes) => res,
            };
            if let Err(err) = res {
                log::warn!("[{}] Initial state request failed: {err}", inner.name);
            }
        }

        let mut tasks = inner.tasks.lock().await;
        if inner.cancel.is_cancelled() {
            return;
        }

        inner.set_phase(SessionPhase::Streaming);
        log::debug!("[{}] Starting aidot_recv_{}", inner.name, inner.device_id);
        tasks.read = Some(tokio::spawn(Self::read_loop(inner.clone())));
    }

    async fn read_loop(inner: Arc<SessionInner>) {
        loop {
            match inner.next_frame().await {
                ReadOutcome::FrameReceived(status) => inner.publish(status),
                ReadOutcome::TransientError(source) => {
                    let err = AidotError::TransientReadFailure {
                        device: inner.name.clone(),
                        source,
                    };
                    log::error!("{err}");
                    inner.set_phase(SessionPhase::Degraded);

                    tokio::select! {
                        biased;
                        () = inner.cancel.cancelled() => break,
                        () = sleep(inner.settings.read_retry()) => {}
                    }
                }
                ReadOutcome::Cancelled => break,
            }
        }
        log::debug!("[{}] Read loop cancelled", inner.name);
    }

    fn validate(&self, command: &LightCommand) -> AidotResult<DeviceAction> {
        let inner = &self.inner;
        if self.phase() == SessionPhase::Closed || !inner.link.is_logged_in() {
            return Err(AidotError::NotConnected(inner.name.clone()));
        }

        let action = match command {
            LightCommand::TurnOn => DeviceAction::TurnOn,
            LightCommand::TurnOff => DeviceAction::TurnOff,
            LightCommand::SetBrightness(bri) => DeviceAction::SetBrightness(*bri),
            LightCommand::SetColorTemperature(kelvin) => {
                let caps = &inner.capabilities;
                if !caps.cct_in_range(*kelvin) {
                    return Err(AidotError::invalid_parameter(format!(
                        "Color temperature {kelvin} is out of range ({}-{})",
                        caps.cct_min, caps.cct_max
                    )));
                }
                DeviceAction::SetColorTemperature(*kelvin)
            }
            LightCommand::SetRgbw(values) => {
                let rgbw: [u8; 4] = values.as_slice().try_into().map_err(|_| {
                    AidotError::invalid_parameter(format!(
                        "RGBW color must have 4 channels, got {}",
                        values.len()
                    ))
                })?;
                DeviceAction::SetRgbw(rgbw)
            }
        };

        Ok(action)
    }

    /// Validate every command, then send them in order. Nothing reaches the
    /// link if any command is rejected.
    pub async fn submit_commands(&self, commands: &[LightCommand]) -> AidotResult<()> {
        let actions = commands
            .iter()
            .map(|cmd| self.validate(cmd))
            .collect::<AidotResult<Vec<_>>>()?;

        for action in actions {
            log::debug!("[{}] Sending {action}", self.inner.name);
            self.inner.link.send_action(action).await?;
        }

        Ok(())
    }

    pub async fn submit_command(&self, command: LightCommand) -> AidotResult<()> {
        self.submit_commands(&[command]).await
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        // stops the background tasks even if detach() was never awaited
        self.inner.cancel.cancel();
        if !self.inner.link_closed.load(Ordering::SeqCst) {
            log::warn!(
                "[{}] Session dropped without detach, link left open",
                self.inner.name
            );
        }
    }
}
