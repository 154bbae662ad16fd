// Monitor Provisioner Tests
// Command sequence and failure handling with a scripted runner

use async_trait::async_trait;
use proberelay::capture::{CaptureConfig, CaptureError, CommandRunner, MonitorProvisioner};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records every command; fails any whose program matches `fail_program`.
/// With a sysfs root, `interface add` creates the interface directory the
/// way the kernel would.
struct ScriptedRunner {
    calls: Mutex<Vec<String>>,
    iw_info: String,
    fail_program: Option<&'static str>,
    sysfs: Option<PathBuf>,
}

impl ScriptedRunner {
    fn new(iw_info: &str, sysfs: &TempDir) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            iw_info: iw_info.to_string(),
            fail_program: None,
            sysfs: Some(sysfs.path().to_path_buf()),
        })
    }

    /// Every command succeeds but no interface ever appears
    fn silent(iw_info: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            iw_info: iw_info.to_string(),
            fail_program: None,
            sysfs: None,
        })
    }

    fn failing(program: &'static str, sysfs: &TempDir) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            iw_info: String::new(),
            fail_program: Some(program),
            sysfs: Some(sysfs.path().to_path_buf()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, CaptureError> {
        let command = format!("{} {}", program, args.join(" "));
        self.calls.lock().unwrap().push(command.clone());
        if self.fail_program == Some(program) {
            return Err(CaptureError::CommandFailed {
                command,
                reason: "operation not permitted".to_string(),
            });
        }
        if args.last() == Some(&"info") {
            return Ok(self.iw_info.clone());
        }
        if let (Some(root), Some(at)) = (&self.sysfs, args.iter().position(|a| *a == "add")) {
            if let Some(name) = args.get(at + 1) {
                std::fs::create_dir_all(root.join(name)).unwrap();
            }
        }
        Ok(String::new())
    }
}

fn config(sysfs: &TempDir) -> CaptureConfig {
    CaptureConfig::new()
        .with_interfaces("wlan1", "mon1")
        .with_settle_ms(0)
        .with_sysfs_net_root(sysfs.path().to_str().unwrap())
}

#[tokio::test]
async fn test_provision_command_sequence() {
    let sysfs = TempDir::new().unwrap();
    let runner = ScriptedRunner::new("Interface wlan1\n\twiphy 1\n", &sysfs);

    let provisioner = MonitorProvisioner::new(config(&sysfs)).with_runner(runner.clone());
    provisioner.provision().await.unwrap();

    assert_eq!(
        runner.calls(),
        vec![
            "iw dev wlan1 info".to_string(),
            "iw phy phy1 interface add mon1 type monitor".to_string(),
            "ip link set mon1 up".to_string(),
        ]
    );
    assert!(provisioner.monitor_exists());
}

#[tokio::test]
async fn test_existing_monitor_runs_nothing() {
    let sysfs = TempDir::new().unwrap();
    std::fs::create_dir(sysfs.path().join("mon1")).unwrap();
    let runner = ScriptedRunner::new("", &sysfs);

    let provisioner = MonitorProvisioner::new(config(&sysfs)).with_runner(runner.clone());
    assert!(provisioner.monitor_exists());
    provisioner.provision().await.unwrap();

    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_missing_wiphy_uses_phy0() {
    let sysfs = TempDir::new().unwrap();
    let runner = ScriptedRunner::new("Interface wlan1\n", &sysfs);

    MonitorProvisioner::new(config(&sysfs))
        .with_runner(runner.clone())
        .provision()
        .await
        .unwrap();

    assert_eq!(runner.calls()[1], "iw phy phy0 interface add mon1 type monitor");
}

#[tokio::test]
async fn test_link_up_failure_is_reported() {
    let sysfs = TempDir::new().unwrap();
    let runner = ScriptedRunner::failing("ip", &sysfs);

    let result = MonitorProvisioner::new(config(&sysfs))
        .with_runner(runner.clone())
        .provision()
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, CaptureError::CommandFailed { ref command, .. } if command == "ip link set mon1 up"));
    assert_eq!(runner.calls().len(), 3);
}

#[tokio::test]
async fn test_interface_that_never_appears_is_missing() {
    let sysfs = TempDir::new().unwrap();
    let runner = ScriptedRunner::silent("Interface wlan1\n\twiphy 0\n");

    let result = MonitorProvisioner::new(config(&sysfs))
        .with_runner(runner.clone())
        .provision()
        .await;

    match result {
        Err(CaptureError::InterfaceMissing(name)) => assert_eq!(name, "mon1"),
        other => panic!("expected InterfaceMissing, got {:?}", other),
    }
    assert_eq!(runner.calls().len(), 3);
}
