use super::{ComponentState, StationOrchestrator};
use crate::error::{Result, StationError};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

impl StationOrchestrator {
    /// Stop producers, then the arbiter, then drain the actuation queue
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Producers and the arbiter stop here; the actuation worker keeps
        // running until the arbiter's final commands are drained
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if self.keyboard_enabled {
            if let Some(keyboard_handler) = &self.keyboard_handler {
                if let Err(e) = keyboard_handler.stop().await {
                    error!("Error stopping keyboard: {}", e);
                    exit_code = 1;
                }
            }
            self.set_component_state("keyboard", ComponentState::Stopped)
                .await;
        }

        for component in ["transport", "arbiter", "actuation"] {
            if let Err(e) = self.stop_component(component).await {
                error!("Error stopping {}: {}", component, e);
                exit_code = 1;
            }
        }

        if let Some(snapshot) = self.snapshot() {
            match serde_json::to_string(&snapshot) {
                Ok(json) => info!("Final session state: {}", json),
                Err(e) => warn!("Failed to serialize session state: {}", e),
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Wait for a component task to finish, aborting it after the timeout
    async fn stop_component(&mut self, component: &str) -> Result<()> {
        let Some(handle) = self.tasks.remove(component) else {
            self.set_component_state(component, ComponentState::Stopped)
                .await;
            return Ok(());
        };

        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        let limit = Duration::from_secs(self.config.system.shutdown_timeout_seconds);
        let abort = handle.abort_handle();

        match timeout(limit, handle).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(StationError::component(component.to_string(), e.to_string()))
            }
            Err(_) => {
                abort.abort();
                if component == "actuation" {
                    self.actuation_token.cancel();
                }
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(StationError::component(
                    component.to_string(),
                    format!("stop timed out after {:?}", limit),
                ))
            }
        }
    }
}
