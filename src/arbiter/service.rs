use super::arbitrator::{Arbitrator, ArbiterSnapshot};
use super::cancel::CancelToken;
use super::command::ActuationCommand;
use crate::config::StationConfig;
use crate::error::Result;
use crate::events::{EventReceiver, StationEvent};
use crate::geometry::{AllowList, ZoneSet};
use crate::noise::NoiseMonitor;
use crate::tracking::{ObjectTracker, TrackingPolicy};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Event loop that owns the tracker, the noise monitor and the arbitrator.
///
/// Being the only task that touches them, none of the three needs locking;
/// producers reach it only through the event bus.
pub struct ArbiterService {
    tracker: ObjectTracker,
    noise: NoiseMonitor,
    arbitrator: Arbitrator,
    commands: mpsc::UnboundedSender<ActuationCommand>,
    snapshot: Arc<Mutex<ArbiterSnapshot>>,
    shutdown_notify: Option<mpsc::UnboundedSender<String>>,
    tick_interval: Duration,
    sweep_interval: Duration,
}

impl ArbiterService {
    pub fn new(
        config: &StationConfig,
        zones: Arc<ZoneSet>,
        allow: Arc<AllowList>,
        cancel: CancelToken,
        commands: mpsc::UnboundedSender<ActuationCommand>,
    ) -> Self {
        let arbitrator = Arbitrator::new(config, cancel, Instant::now());
        let snapshot = Arc::new(Mutex::new(arbitrator.snapshot()));

        Self {
            tracker: ObjectTracker::new(zones, allow, TrackingPolicy::from(&config.tracking)),
            noise: NoiseMonitor::new(&config.noise),
            arbitrator,
            commands,
            snapshot,
            shutdown_notify: None,
            tick_interval: Duration::from_millis(config.system.tick_interval_ms.max(1)),
            sweep_interval: Duration::from_millis(config.tracking.sweep_interval_ms.max(1)),
        }
    }

    /// Forward shutdown requests from interactive producers to `notify`
    pub fn with_shutdown_notify(mut self, notify: mpsc::UnboundedSender<String>) -> Self {
        self.shutdown_notify = Some(notify);
        self
    }

    /// Shared view of the arbitrator, refreshed after every dispatch
    pub fn snapshot_handle(&self) -> Arc<Mutex<ArbiterSnapshot>> {
        Arc::clone(&self.snapshot)
    }

    /// Run until cancelled or until every event publisher is gone
    pub async fn run(mut self, mut events: EventReceiver, cancel: CancellationToken) -> Result<()> {
        info!("Arbiter service started");

        let mut tick = interval(self.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep = interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Arbiter service cancelled");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        let commands = self.handle_event(event);
                        self.dispatch(commands);
                    }
                    None => {
                        info!("Event bus closed, stopping arbiter service");
                        break;
                    }
                },
                _ = tick.tick() => {
                    let commands = self.arbitrator.tick(Instant::now());
                    self.dispatch(commands);
                }
                _ = sweep.tick() => {
                    let commands = self.sweep(Instant::now());
                    self.dispatch(commands);
                }
            }
        }

        let commands = self.arbitrator.shutdown();
        self.dispatch(commands);
        info!("Arbiter service stopped");
        Ok(())
    }

    /// Route one event through tracking or noise detection into the arbitrator
    pub fn handle_event(&mut self, event: StationEvent) -> Vec<ActuationCommand> {
        match event {
            StationEvent::Observation { marker, point, at } => {
                let transitions = self.tracker.observe(marker, point, at);
                transitions
                    .into_iter()
                    .flat_map(|t| self.arbitrator.handle(t.kind, t.at))
                    .collect()
            }
            StationEvent::Level { dbfs, at } => match self.noise.record(dbfs, at) {
                Some(kind) => self.arbitrator.handle(kind, at),
                None => Vec::new(),
            },
            StationEvent::Alert { kind, at } => {
                debug!("Token {} received", kind);
                self.arbitrator.handle(kind, at)
            }
            StationEvent::ShutdownRequested { reason } => {
                match &self.shutdown_notify {
                    Some(notify) => {
                        if notify.send(reason).is_err() {
                            warn!("Shutdown listener gone");
                        }
                    }
                    None => debug!("Shutdown request ignored: no listener"),
                }
                Vec::new()
            }
        }
    }

    /// Missing-object sweep; the resulting clears go through the arbitrator
    pub fn sweep(&mut self, now: Instant) -> Vec<ActuationCommand> {
        let transitions = self.tracker.sweep(now);
        transitions
            .into_iter()
            .flat_map(|t| self.arbitrator.handle(t.kind, t.at))
            .collect()
    }

    pub fn arbitrator(&self) -> &Arbitrator {
        &self.arbitrator
    }

    fn dispatch(&mut self, commands: Vec<ActuationCommand>) {
        for command in commands {
            if self.commands.send(command).is_err() {
                warn!("Actuation worker unavailable, dropping command");
                break;
            }
        }

        *self.snapshot.lock() = self.arbitrator.snapshot();
    }
}
