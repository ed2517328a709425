//! Service backends and the uniform lifecycle contract.
//!
//! A backend turns a workload into a supervised background service using
//! one host process manager: Docker containers, systemd units or launchd
//! agents, plus a docker-compose variant for multi-container workloads.

mod compose;
mod docker;
mod install;
mod launchd;
mod plist;
mod systemd;
mod tail;

use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::ServiceResult;
use crate::workload::Workload;

pub use compose::ComposeService;
pub use docker::{command_args, image_name, port_mappings, DockerService};
pub use launchd::LaunchdService;
pub use plist::LaunchdPlist;
pub use systemd::SystemdService;

/// Uniform lifecycle contract implemented by every backend.
///
/// Not every backend implements every capability; operations a backend
/// deliberately lacks return [`crate::error::ServiceError::Unsupported`]
/// rather than pretending.
pub trait Service {
    /// Deterministic service name for this workload.
    fn service_name(&self) -> String;

    /// Make the workload startable: pull the image, or render and install
    /// a unit/plist/compose definition. Safe to call again (overwrite
    /// semantics).
    fn create(&self, binary_version: &str, app_home: &Path) -> ServiceResult<()>;

    /// Begin running the workload, appending `optional_args` to the
    /// persisted argument list.
    fn start(&self, optional_args: &[String]) -> ServiceResult<()>;

    /// Stop the workload.
    fn stop(&self) -> ServiceResult<()>;

    /// Stop then start the workload.
    fn restart(&self) -> ServiceResult<()>;

    /// Emit the last `n` log lines, then stream new output until the
    /// operator interrupts or the native log command exits. Blocks.
    fn log(&self, n: usize) -> ServiceResult<()>;

    /// Clear accumulated log data.
    fn prune_logs(&self) -> ServiceResult<()>;

    /// Path of the persisted service definition. Docker has none and
    /// returns an intentionally empty path.
    fn service_file(&self) -> ServiceResult<PathBuf>;

    /// Recover the daemon binary path and home directory from the
    /// persisted definition, for validating an existing installation.
    fn binary_and_home(&self) -> ServiceResult<(PathBuf, PathBuf)>;
}

/// Backend selection for the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Docker,
    Systemd,
    Launchd,
    DockerCompose,
}

/// Construct the backend for a workload.
///
/// The production policy is Docker for every workload;
/// [`new_service_with_backend`] is the explicit selection point for
/// callers that wire up a different process manager.
pub fn new_service(workload: Workload) -> ServiceResult<Box<dyn Service>> {
    new_service_with_backend(workload, BackendKind::Docker)
}

/// Construct a specific backend for a workload.
pub fn new_service_with_backend(
    workload: Workload,
    backend: BackendKind,
) -> ServiceResult<Box<dyn Service>> {
    let service: Box<dyn Service> = match backend {
        BackendKind::Docker => Box::new(DockerService::new(workload)),
        BackendKind::Systemd => Box::new(SystemdService::new(workload, Settings::load()?)?),
        BackendKind::Launchd => Box::new(LaunchdService::new(workload, Settings::load()?)?),
        BackendKind::DockerCompose => Box::new(ComposeService::new(workload, Settings::load()?)?),
    };
    Ok(service)
}
