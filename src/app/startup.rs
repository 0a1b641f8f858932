use super::{ComponentState, StationOrchestrator};
use crate::actuation::ActuationWorker;
use crate::arbiter::ArbiterService;
use crate::error::{Result, StationError};
use crate::transport::EventListener;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

impl StationOrchestrator {
    /// Register every component as stopped
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing station components");

        let mut states = self.component_states.lock().await;
        states.insert("actuation".to_string(), ComponentState::Stopped);
        states.insert("arbiter".to_string(), ComponentState::Stopped);
        states.insert("transport".to_string(), ComponentState::Stopped);

        // Only register keyboard component if enabled
        if self.keyboard_enabled {
            states.insert("keyboard".to_string(), ComponentState::Stopped);
        }

        drop(states);

        info!(
            "Station ready: {} regions, table boundary {}, panel {}, speech {}",
            self.zones.region_count(),
            if self.zones.table().is_some() { "set" } else { "unset" },
            self.panel.panel_name(),
            self.speech.engine_name()
        );
        Ok(())
    }

    /// Start components, consumers before producers
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting station");

        let events = self
            .event_receiver
            .take()
            .ok_or_else(|| StationError::system("Station already started"))?;

        // Actuation worker first so no command is ever queued without a consumer
        self.set_component_state("actuation", ComponentState::Starting)
            .await;
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let worker = ActuationWorker::new(
            Arc::clone(&self.panel),
            Arc::clone(&self.speech),
            self.alert_cancel.clone(),
        );
        let actuation_token = self.actuation_token.clone();
        self.tasks.insert(
            "actuation".to_string(),
            tokio::spawn(worker.run(commands_rx, actuation_token)),
        );
        self.set_component_state("actuation", ComponentState::Running)
            .await;

        // Arbiter owns the only command sender
        self.set_component_state("arbiter", ComponentState::Starting)
            .await;
        let service = ArbiterService::new(
            &self.config,
            Arc::clone(&self.zones),
            Arc::clone(&self.allow),
            self.alert_cancel.clone(),
            commands_tx,
        )
        .with_shutdown_notify(self.user_shutdown_sender.clone());
        self.snapshot = Some(service.snapshot_handle());

        let cancel = self.cancellation_token.clone();
        self.tasks.insert(
            "arbiter".to_string(),
            tokio::spawn(async move {
                if let Err(e) = service.run(events, cancel).await {
                    error!("Arbiter service error: {}", e);
                }
            }),
        );
        self.set_component_state("arbiter", ComponentState::Running)
            .await;

        self.set_component_state("transport", ComponentState::Starting)
            .await;
        let listener = match EventListener::bind(&self.config.transport, self.event_bus.clone()).await
        {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to start event listener: {}", e);
                self.set_component_state("transport", ComponentState::Failed)
                    .await;
                // Unwind the consumers started above
                self.cancellation_token.cancel();
                self.actuation_token.cancel();
                return Err(e);
            }
        };
        self.tasks.insert(
            "transport".to_string(),
            tokio::spawn(listener.run(self.cancellation_token.clone())),
        );
        self.set_component_state("transport", ComponentState::Running)
            .await;

        // Start keyboard simulator (only if enabled)
        if self.keyboard_enabled {
            if let Some(keyboard_handler) = &self.keyboard_handler {
                self.set_component_state("keyboard", ComponentState::Starting)
                    .await;

                keyboard_handler.start().await.map_err(|e| {
                    error!("Failed to start keyboard handler: {}", e);
                    e
                })?;

                self.set_component_state("keyboard", ComponentState::Running)
                    .await;
            }
        }

        info!("Station started successfully");
        Ok(())
    }
}
