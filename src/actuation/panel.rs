use crate::arbiter::LedState;
use crate::error::{Result, StationError};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Sink for LED/buzzer state tokens
#[async_trait::async_trait]
pub trait LedPanel: Send + Sync {
    async fn show(&self, state: LedState) -> Result<()>;

    /// Get the name of this panel for logging
    fn panel_name(&self) -> &str;
}

/// Panel firmware on a serial device node, one `TOKEN\n` line per command.
/// Line settings are left to the OS (`stty`).
pub struct SerialPanel {
    device: PathBuf,
    handle: Mutex<Option<File>>,
}

impl SerialPanel {
    /// Open the device; failure here is fatal at startup
    pub fn open<P: AsRef<Path>>(device: P) -> Result<Self> {
        let device = device.as_ref().to_path_buf();
        let file = Self::open_device(&device)?;
        info!("LED panel opened on {}", device.display());

        Ok(Self {
            device,
            handle: Mutex::new(Some(file)),
        })
    }

    fn open_device(device: &Path) -> Result<File> {
        OpenOptions::new()
            .write(true)
            .open(device)
            .map_err(|e| StationError::Hardware {
                resource: device.display().to_string(),
                details: e.to_string(),
            })
    }

    pub fn device(&self) -> &Path {
        &self.device
    }
}

#[async_trait::async_trait]
impl LedPanel for SerialPanel {
    async fn show(&self, state: LedState) -> Result<()> {
        let mut handle = self.handle.lock();

        if handle.is_none() {
            debug!("Reopening LED panel {}", self.device.display());
            *handle = Some(Self::open_device(&self.device)?);
        }

        let line = format!("{}\n", state.code());
        let written = match handle.as_mut() {
            Some(file) => file.write_all(line.as_bytes()).and_then(|_| file.flush()),
            None => return Err(StationError::actuation("serial_panel", "device not open")),
        };

        if let Err(e) = written {
            // Drop the handle so the next command reopens the device
            *handle = None;
            warn!("LED panel write failed, will reopen: {}", e);
            return Err(StationError::actuation("serial_panel".to_string(), e.to_string()));
        }

        Ok(())
    }

    fn panel_name(&self) -> &str {
        "serial"
    }
}

/// Logs tokens when no panel hardware is configured
pub struct ConsolePanel;

#[async_trait::async_trait]
impl LedPanel for ConsolePanel {
    async fn show(&self, state: LedState) -> Result<()> {
        info!("[LED] {}", state);
        Ok(())
    }

    fn panel_name(&self) -> &str {
        "console"
    }
}
