use super::{ShutdownReason, StationOrchestrator};
use crate::error::{Result, StationError};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info};

type SharedShutdownSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl StationOrchestrator {
    /// Run until a signal or a user request, then shut down gracefully
    pub async fn run(&mut self) -> Result<i32> {
        info!("Station is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| StationError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| StationError::system("Shutdown receiver already taken"))?;

        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));
        self.setup_signal_handlers(&shutdown_sender);
        self.forward_user_requests(&shutdown_sender);

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| StationError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;

        info!("Station shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self, shutdown_sender: &SharedShutdownSender) {
        // Handle SIGTERM (service stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            error!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };

                if let Some(()) = sigterm.recv().await {
                    info!("Received SIGTERM signal");
                    send_reason(&shutdown_sender_sigterm, ShutdownReason::Signal("SIGTERM".to_string()))
                        .await;
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let shutdown_sender_sigint = Arc::clone(shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                send_reason(&shutdown_sender_sigint, ShutdownReason::Signal("SIGINT".to_string()))
                    .await;
            }
        });
    }

    /// Turn shutdown requests relayed by the arbiter into a shutdown reason
    fn forward_user_requests(&mut self, shutdown_sender: &SharedShutdownSender) {
        let Some(mut requests) = self.user_shutdown_receiver.take() else {
            return;
        };

        let shutdown_sender = Arc::clone(shutdown_sender);
        let cancel = self.cancellation_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                request = requests.recv() => {
                    if let Some(reason) = request {
                        send_reason(&shutdown_sender, ShutdownReason::UserRequest(reason)).await;
                    }
                }
            }
        });
    }
}

async fn send_reason(sender: &SharedShutdownSender, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}
