//! Systemd backend.
//!
//! Supervises a workload as a system unit. The unit file is installed
//! with elevated privileges and all state changes go through `systemctl`;
//! journald owns the logs, so there is nothing to tail or prune here.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{ServiceError, ServiceResult};
use crate::executor::SubprocessBuilder;
use crate::templates::{self, TemplateEngine};
use crate::workload::Workload;

use super::Service;

const UNIT_DIR: &str = "/etc/systemd/system";

/// Systemd-backed service.
pub struct SystemdService {
    workload: Workload,
    settings: Settings,
    engine: TemplateEngine,
}

impl SystemdService {
    pub fn new(workload: Workload, settings: Settings) -> ServiceResult<Self> {
        Ok(Self {
            workload,
            settings,
            engine: TemplateEngine::new()?,
        })
    }

    /// The unit name (`<slug>.service`).
    pub fn unit_name(&self) -> String {
        format!("{}.service", self.workload.slug())
    }

    fn unit_path(&self) -> PathBuf {
        Path::new(UNIT_DIR).join(self.unit_name())
    }

    fn binary_path(&self) -> PathBuf {
        self.settings
            .weave_home
            .join("bin")
            .join(self.workload.descriptor().binary_name)
    }

    /// Render the unit file for this workload rooted at `app_home`.
    pub fn render_unit(&self, app_home: &Path) -> ServiceResult<String> {
        let context = serde_json::json!({
            "description": format!("{} daemon, managed by weave", self.workload.slug()),
            "binary_path": self.binary_path(),
            "args": self.workload.daemon_args(app_home),
            "user": self.settings.user,
            "app_home": app_home,
        });
        self.engine.render(templates::SYSTEMD_UNIT, &context)
    }

    fn systemctl(&self, action: &str) -> ServiceResult<()> {
        SubprocessBuilder::new("sudo")
            .args(["systemctl", action, &self.unit_name()])
            .run()?
            .success_or(&format!("systemctl {}", action))?;
        Ok(())
    }
}

impl Service for SystemdService {
    fn service_name(&self) -> String {
        self.unit_name()
    }

    fn create(&self, binary_version: &str, app_home: &Path) -> ServiceResult<()> {
        debug!(
            unit = %self.unit_name(),
            version = %binary_version,
            home = %app_home.display(),
            "Installing systemd unit"
        );

        let rendered = self.render_unit(app_home)?;
        let path = self.unit_path();
        let path_str = path.to_string_lossy().to_string();

        // The unit directory is root-owned; install through sudo tee with
        // the rendered unit piped to stdin.
        SubprocessBuilder::new("sudo")
            .args(["tee", &path_str])
            .stdin_data(rendered)
            .run()?
            .success_or("sudo tee")?;

        SubprocessBuilder::new("sudo")
            .args(["systemctl", "daemon-reload"])
            .run()?
            .success_or("systemctl daemon-reload")?;
        self.systemctl("enable")?;

        info!(unit = %self.unit_name(), "Unit installed and enabled");
        Ok(())
    }

    fn start(&self, optional_args: &[String]) -> ServiceResult<()> {
        if !optional_args.is_empty() {
            warn!(
                unit = %self.unit_name(),
                "Extra start arguments ignored, the unit file defines the command line"
            );
        }
        self.systemctl("start")?;
        info!(unit = %self.unit_name(), "Service started");
        Ok(())
    }

    fn stop(&self) -> ServiceResult<()> {
        self.systemctl("stop")?;
        info!(unit = %self.unit_name(), "Service stopped");
        Ok(())
    }

    fn restart(&self) -> ServiceResult<()> {
        self.systemctl("restart")?;
        info!(unit = %self.unit_name(), "Service restarted");
        Ok(())
    }

    fn log(&self, n: usize) -> ServiceResult<()> {
        SubprocessBuilder::new("journalctl")
            .args(["-f", "-u", &self.unit_name(), "-n", &n.to_string()])
            .run_foreground()
    }

    fn prune_logs(&self) -> ServiceResult<()> {
        Err(ServiceError::unsupported("systemd", "PruneLogs"))
    }

    fn service_file(&self) -> ServiceResult<PathBuf> {
        Err(ServiceError::unsupported("systemd", "GetServiceFile"))
    }

    fn binary_and_home(&self) -> ServiceResult<(PathBuf, PathBuf)> {
        Err(ServiceError::unsupported("systemd", "GetServiceBinaryAndHome"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_for(workload: Workload) -> SystemdService {
        let mut settings = Settings::for_home(Path::new("/home/operator"));
        settings.user = "operator".to_string();
        SystemdService::new(workload, settings).unwrap()
    }

    #[test]
    fn test_unit_name() {
        assert_eq!(
            service_for(Workload::UpgradableInitia).unit_name(),
            "initia.service"
        );
        assert_eq!(
            service_for(Workload::OPinitChallenger).unit_name(),
            "challenger.service"
        );
    }

    #[test]
    fn test_render_unit() {
        let service = service_for(Workload::UpgradableInitia);
        let unit = service.render_unit(Path::new("/home/operator/.initia")).unwrap();

        assert!(unit.contains(
            "ExecStart=/home/operator/.weave/bin/initiad start --home /home/operator/.initia"
        ));
        assert!(unit.contains("User=operator"));
        assert!(unit.contains("WorkingDirectory=/home/operator/.initia"));
        assert!(unit.contains("WantedBy=multi-user.target"));
    }

    #[test]
    fn test_render_unit_multi_purpose_binary() {
        let service = service_for(Workload::OPinitExecutor);
        let unit = service.render_unit(Path::new("/home/operator/.opinit")).unwrap();

        // opinitd serves both bots; the inner service name selects one
        assert!(unit.contains(
            "ExecStart=/home/operator/.weave/bin/opinitd start executor --home /home/operator/.opinit"
        ));
    }

    #[test]
    fn test_introspection_is_unsupported() {
        let service = service_for(Workload::UpgradableInitia);
        assert!(matches!(
            service.service_file(),
            Err(ServiceError::Unsupported { .. })
        ));
        assert!(matches!(
            service.binary_and_home(),
            Err(ServiceError::Unsupported { .. })
        ));
        assert!(matches!(
            service.prune_logs(),
            Err(ServiceError::Unsupported { .. })
        ));
    }
}
