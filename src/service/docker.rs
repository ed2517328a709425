//! Docker backend.
//!
//! Supervises a workload as a named container with a named data volume,
//! driven entirely through the `docker` CLI. Docker itself persists the
//! container across reboots (`--restart unless-stopped`), so there is no
//! on-disk service definition to manage.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::executor::SubprocessBuilder;
use crate::workload::Workload;

use super::Service;

/// Mount point of the data volume inside workload containers.
const CONTAINER_HOME: &str = "/app/data";

/// Image reference for a workload at a given version.
///
/// Pure function of the workload identifier; workloads that are not
/// distributed as a single container yield an error.
pub fn image_name(workload: Workload, version: &str) -> ServiceResult<String> {
    let descriptor = workload.descriptor();
    match descriptor.default_image {
        Some(image) => Ok(format!("{}:{}", image, version)),
        None => Err(ServiceError::UnsupportedWorkload {
            workload: workload.to_string(),
            backend: "docker".to_string(),
        }),
    }
}

/// `-p host:container` publish flags for a workload.
///
/// Unsupported workloads simply publish nothing.
pub fn port_mappings(workload: Workload) -> Vec<String> {
    let mut flags = Vec::new();
    for port in workload.descriptor().port_bindings {
        flags.push("-p".to_string());
        flags.push(format!("{}:{}", port, port));
    }
    flags
}

/// Arguments passed to the container entrypoint.
pub fn command_args(workload: Workload) -> ServiceResult<Vec<String>> {
    match workload {
        Workload::UpgradableInitia | Workload::UpgradableMinitia => Ok(vec![
            "start".to_string(),
            "--home".to_string(),
            CONTAINER_HOME.to_string(),
        ]),
        Workload::Relayer => Ok(Vec::new()),
        other => Err(ServiceError::UnsupportedWorkload {
            workload: other.to_string(),
            backend: "docker".to_string(),
        }),
    }
}

/// Docker-backed service.
pub struct DockerService {
    workload: Workload,
    /// Image ref recorded by `create`, used by the first `start`.
    image: Mutex<Option<String>>,
}

impl DockerService {
    pub fn new(workload: Workload) -> Self {
        Self {
            workload,
            image: Mutex::new(None),
        }
    }

    /// Name of the managed container.
    pub fn container_name(&self) -> String {
        format!("weave-{}", self.workload.slug())
    }

    /// Name of the data volume backing the container.
    pub fn volume_name(&self) -> String {
        format!("{}-data", self.container_name())
    }

    fn container_exists(&self) -> ServiceResult<bool> {
        let name = self.container_name();
        let result = SubprocessBuilder::new("docker")
            .args([
                "ps",
                "-a",
                "--filter",
                &format!("name=^{}$", name),
                "--format",
                "{{.Names}}",
            ])
            .run()?
            .success_or("docker ps")?;
        Ok(result.stdout.trim() == name)
    }

    fn run_container(&self, image: &str, optional_args: &[String]) -> ServiceResult<()> {
        let name = self.container_name();

        // A previous instance may be lingering under the same name.
        let removed = SubprocessBuilder::new("docker")
            .args(["rm", "-f", &name])
            .run();
        if let Err(e) = removed {
            debug!(container = %name, error = %e, "Stale container removal skipped");
        }

        let mut builder = SubprocessBuilder::new("docker").args([
            "run",
            "-d",
            "--name",
            &name,
            "--restart",
            "unless-stopped",
            "--network",
            "host",
        ]);
        builder = builder.args(port_mappings(self.workload));
        builder = builder.args([
            "-v".to_string(),
            format!("{}:{}", self.volume_name(), CONTAINER_HOME),
        ]);
        builder = builder.args(self.workload.descriptor().env_args.iter().copied());
        builder = builder.arg(image);
        builder = builder.args(command_args(self.workload)?);
        builder = builder.args(optional_args.iter().map(String::as_str));

        builder.run()?.success_or("docker run")?;
        info!(container = %name, image = %image, "Container started");
        Ok(())
    }
}

impl Service for DockerService {
    fn service_name(&self) -> String {
        self.container_name()
    }

    fn create(&self, binary_version: &str, _app_home: &Path) -> ServiceResult<()> {
        let image = image_name(self.workload, binary_version)?;
        debug!(image = %image, "Pulling image");

        SubprocessBuilder::new("docker")
            .args(["pull", &image])
            .run()?
            .success_or("docker pull")?;

        info!(image = %image, "Image pulled");
        *self.image.lock().expect("image lock poisoned") = Some(image);
        Ok(())
    }

    fn start(&self, optional_args: &[String]) -> ServiceResult<()> {
        let image = self.image.lock().expect("image lock poisoned").clone();
        if let Some(image) = image {
            return self.run_container(&image, optional_args);
        }

        // No image recorded in this process: resume a stopped container
        // if one exists.
        let name = self.container_name();
        if self.container_exists()? {
            SubprocessBuilder::new("docker")
                .args(["start", &name])
                .run()?
                .success_or("docker start")?;
            info!(container = %name, "Container resumed");
            return Ok(());
        }

        Err(ServiceError::ServiceNotCreated {
            service: name,
            hint: self.workload.descriptor().init_command.to_string(),
        })
    }

    fn stop(&self) -> ServiceResult<()> {
        let name = self.container_name();
        SubprocessBuilder::new("docker")
            .args(["stop", &name])
            .run()?
            .success_or("docker stop")?;

        // The container may already be gone; removal is best effort.
        match SubprocessBuilder::new("docker").args(["rm", &name]).run() {
            Ok(result) if !result.success => {
                warn!(container = %name, stderr = %result.stderr.trim(), "Container removal skipped");
            }
            Err(e) => {
                warn!(container = %name, error = %e, "Container removal skipped");
            }
            Ok(_) => {}
        }

        info!(container = %name, "Container stopped");
        Ok(())
    }

    fn restart(&self) -> ServiceResult<()> {
        self.stop()?;
        self.start(&[])
    }

    fn log(&self, n: usize) -> ServiceResult<()> {
        SubprocessBuilder::new("docker")
            .args(["logs", "--tail", &n.to_string(), "-f", &self.container_name()])
            .run_foreground()
    }

    fn prune_logs(&self) -> ServiceResult<()> {
        let name = self.container_name();
        let inspected = SubprocessBuilder::new("docker")
            .args(["inspect", "--format", "{{.LogPath}}", &name])
            .run()?
            .success_or("docker inspect")?;

        let log_path = inspected.stdout.trim().to_string();
        if log_path.is_empty() {
            return Err(ServiceError::execution_failed(format!(
                "docker inspect returned no log path for {}",
                name
            )));
        }

        // The json-file log lives under /var/lib/docker and is root-owned.
        SubprocessBuilder::new("sudo")
            .args(["truncate", "-s", "0", &log_path])
            .run()?
            .success_or("truncate container log")?;

        info!(container = %name, "Container log truncated");
        Ok(())
    }

    fn service_file(&self) -> ServiceResult<PathBuf> {
        // Identity is the named container, not a file.
        Ok(PathBuf::new())
    }

    fn binary_and_home(&self) -> ServiceResult<(PathBuf, PathBuf)> {
        let result = SubprocessBuilder::new("docker")
            .args([
                "volume",
                "inspect",
                "--format",
                "{{.Mountpoint}}",
                &self.volume_name(),
            ])
            .run()?
            .success_or("docker volume inspect")?;

        // No binary path is meaningful inside a container.
        Ok((PathBuf::new(), PathBuf::from(result.stdout.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_name_relayer() {
        assert_eq!(
            image_name(Workload::Relayer, "v1.0.7").unwrap(),
            "ghcr.io/initia-labs/rapid-relayer:v1.0.7"
        );
    }

    #[test]
    fn test_image_name_unsupported() {
        assert!(image_name(Workload::OPinitExecutor, "v1.0.0").is_err());
        assert!(image_name(Workload::OPinitChallenger, "v1.0.0").is_err());
    }

    #[test]
    fn test_image_name_repeated_calls_identical() {
        let first = image_name(Workload::UpgradableMinitia, "v0.9.1").unwrap();
        let second = image_name(Workload::UpgradableMinitia, "v0.9.1").unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_port_mappings_relayer() {
        let flags = port_mappings(Workload::Relayer);
        assert_eq!(flags, vec!["-p", "7010:7010", "-p", "7011:7011"]);
    }

    #[test]
    fn test_port_mappings_rollup() {
        let flags = port_mappings(Workload::UpgradableMinitia);
        assert!(flags.contains(&"26656:26656".to_string()));
        assert!(flags.contains(&"8545:8545".to_string()));
        assert!(flags.contains(&"9090:9090".to_string()));
    }

    #[test]
    fn test_port_mappings_unsupported_is_empty() {
        assert!(port_mappings(Workload::OPinitExecutor).is_empty());
    }

    #[test]
    fn test_command_args() {
        assert_eq!(
            command_args(Workload::UpgradableMinitia).unwrap(),
            vec!["start", "--home", "/app/data"]
        );
        assert!(command_args(Workload::Relayer).unwrap().is_empty());
        assert!(command_args(Workload::OPinitExecutor).is_err());
    }

    #[test]
    fn test_service_and_volume_names() {
        let service = DockerService::new(Workload::Relayer);
        assert_eq!(service.container_name(), "weave-relayer");
        assert_eq!(service.volume_name(), "weave-relayer-data");

        let service = DockerService::new(Workload::UpgradableInitia);
        assert_eq!(service.container_name(), "weave-initia");
        assert_eq!(service.volume_name(), "weave-initia-data");
    }
}
