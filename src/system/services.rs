//! Service manager integration.

use crate::error::Result;
use crate::system::ExternalCommand;
use std::future::Future;

/// Queries and controls named system services
pub trait ServiceManager {
    /// Whether the service is running
    fn is_active(&self, service: &str) -> impl Future<Output = Result<bool>>;

    /// Start a stopped service
    fn start(&self, service: &str) -> impl Future<Output = Result<()>>;

    /// Stop a running service
    fn stop(&self, service: &str) -> impl Future<Output = Result<()>>;

    /// Restart a service
    fn restart(&self, service: &str) -> impl Future<Output = Result<()>>;

    /// Last `lines` journal lines of a service
    fn tail_logs(&self, service: &str, lines: usize) -> impl Future<Output = Result<String>>;
}

/// `systemctl` and `journalctl`
#[derive(Debug, Clone, Default)]
pub struct Systemd;

impl Systemd {
    async fn systemctl(&self, action: &str, service: &str) -> Result<()> {
        log::info!("systemctl {} {}", action, service);
        ExternalCommand::new("systemctl")
            .args([action, service])
            .run()
            .await
            .map(drop)
    }
}

impl ServiceManager for Systemd {
    async fn is_active(&self, service: &str) -> Result<bool> {
        let output = ExternalCommand::new("systemctl")
            .args(["is-active", "--quiet", service])
            .output()
            .await?;
        Ok(output.success())
    }

    async fn start(&self, service: &str) -> Result<()> {
        self.systemctl("start", service).await
    }

    async fn stop(&self, service: &str) -> Result<()> {
        self.systemctl("stop", service).await
    }

    async fn restart(&self, service: &str) -> Result<()> {
        self.systemctl("restart", service).await
    }

    async fn tail_logs(&self, service: &str, lines: usize) -> Result<String> {
        ExternalCommand::new("journalctl")
            .args(["-u".to_string(), service.to_string()])
            .args(["-n".to_string(), lines.to_string()])
            .arg("--no-pager")
            .run()
            .await
    }
}
