// Monitor Interface Provisioning
// One-shot creation of a monitor-mode interface with the iw and ip tools

use crate::capture::{CaptureConfig, CaptureError};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs external configuration commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program args..`, returning stdout on a zero exit status
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, CaptureError>;
}

/// Spawns real processes
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, CaptureError> {
        let command = format!("{} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| CaptureError::CommandFailed {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(CaptureError::CommandFailed {
                command,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Extract the phy name from `iw dev <iface> info` output, `phy0` if absent
pub fn parse_wiphy(info: &str) -> String {
    info.lines()
        .filter_map(|line| line.trim().strip_prefix("wiphy "))
        .find_map(|index| index.trim().parse::<u32>().ok())
        .map(|index| format!("phy{}", index))
        .unwrap_or_else(|| "phy0".to_string())
}

/// Brings the monitor interface into existence
pub struct MonitorProvisioner {
    config: CaptureConfig,
    runner: Arc<dyn CommandRunner>,
}

impl MonitorProvisioner {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            runner: Arc::new(SystemCommandRunner),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Whether the monitor interface already exists
    pub fn monitor_exists(&self) -> bool {
        Path::new(&self.config.sysfs_net_root)
            .join(&self.config.monitor_interface)
            .exists()
    }

    /// Create and raise the monitor interface unless it already exists
    pub async fn provision(&self) -> Result<(), CaptureError> {
        let monitor = self.config.monitor_interface.as_str();
        if self.monitor_exists() {
            info!(interface = monitor, "monitor interface already present");
            return Ok(());
        }

        let wireless = self.config.wireless_interface.as_str();
        // A missing wiphy line still falls back to phy0.
        let info = self
            .runner
            .run("iw", &["dev", wireless, "info"])
            .await
            .unwrap_or_default();
        let phy = parse_wiphy(&info);
        debug!(wireless, phy = %phy, "resolved wiphy");

        self.runner
            .run("iw", &["phy", phy.as_str(), "interface", "add", monitor, "type", "monitor"])
            .await?;
        tokio::time::sleep(self.config.settle()).await;

        self.runner.run("ip", &["link", "set", monitor, "up"]).await?;
        tokio::time::sleep(self.config.settle()).await;

        if !self.monitor_exists() {
            return Err(CaptureError::InterfaceMissing(monitor.to_string()));
        }

        info!(interface = monitor, phy = %phy, "monitor mode active");
        Ok(())
    }
}
