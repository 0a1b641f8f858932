use super::types::{ComponentState, ShutdownReason};
use crate::actuation::{panel_from_config, speech_from_config, LedPanel, SpeechEngine};
use crate::arbiter::{ArbiterSnapshot, CancelToken};
use crate::config::StationConfig;
use crate::error::Result;
use crate::events::{EventBus, EventReceiver};
use crate::geometry::{AllowList, ZoneSet};
use crate::keyboard_input::KeyboardInputHandler;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Owns the station's components and their lifecycle
pub struct StationOrchestrator {
    pub(super) config: StationConfig,
    pub(super) event_bus: EventBus,
    pub(super) event_receiver: Option<EventReceiver>,
    pub(super) zones: Arc<ZoneSet>,
    pub(super) allow: Arc<AllowList>,
    pub(super) panel: Arc<dyn LedPanel>,
    pub(super) speech: Arc<dyn SpeechEngine>,
    pub(super) alert_cancel: CancelToken,

    // Components
    pub(super) tasks: HashMap<String, JoinHandle<()>>,
    pub(super) snapshot: Option<Arc<parking_lot::Mutex<ArbiterSnapshot>>>,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_enabled: bool,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) user_shutdown_sender: mpsc::UnboundedSender<String>,
    pub(super) user_shutdown_receiver: Option<mpsc::UnboundedReceiver<String>>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) actuation_token: CancellationToken,
}

impl StationOrchestrator {
    /// Load geometry and open output hardware. Any failure here is fatal.
    pub async fn new(config: StationConfig) -> Result<Self> {
        let mut zones = ZoneSet::load(&config.zones.zones_path, &config.zones.table_zone)?;
        if let (Some(width), Some(height)) = (config.zones.frame_width, config.zones.frame_height)
        {
            if zones.frame_size().is_some() {
                info!("Rescaling zones to {}x{}", width, height);
                zones = zones.rescaled(width, height);
            }
        }

        let allow = AllowList::load(
            &config.zones.allow_path,
            config.zones.default_allowed.clone(),
        )?;
        let panel = panel_from_config(&config.actuation)?;
        let speech = speech_from_config(&config.actuation);

        Ok(Self::with_components(config, zones, allow, panel, speech))
    }

    /// Assemble an orchestrator from already loaded parts
    pub fn with_components(
        config: StationConfig,
        zones: ZoneSet,
        allow: AllowList,
        panel: Arc<dyn LedPanel>,
        speech: Arc<dyn SpeechEngine>,
    ) -> Self {
        let (event_bus, event_receiver) = EventBus::channel();
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let (user_shutdown_sender, user_shutdown_receiver) = mpsc::unbounded_channel();

        // Keyboard simulator is opt-in
        let keyboard_handler = Some(KeyboardInputHandler::new(event_bus.clone()));

        Self {
            config,
            event_bus,
            event_receiver: Some(event_receiver),
            zones: Arc::new(zones),
            allow: Arc::new(allow),
            panel,
            speech,
            alert_cancel: CancelToken::new(),
            tasks: HashMap::new(),
            snapshot: None,
            keyboard_handler,
            keyboard_enabled: false,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            user_shutdown_sender,
            user_shutdown_receiver: Some(user_shutdown_receiver),
            cancellation_token: CancellationToken::new(),
            actuation_token: CancellationToken::new(),
        }
    }

    /// Enable or disable the keyboard simulator
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    /// Publisher handle for in-process producers
    pub fn event_bus(&self) -> EventBus {
        self.event_bus.clone()
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    /// Latest arbiter state, once the arbiter has been started
    pub fn snapshot(&self) -> Option<ArbiterSnapshot> {
        self.snapshot.as_ref().map(|s| s.lock().clone())
    }
}
