//! Launchd backend.
//!
//! Supervises a workload as a user launch agent. The installed plist is
//! the sole persisted record of how the daemon is configured, so starting
//! with extra arguments is a read-modify-write of `ProgramArguments`.
//! Launchd collects no logs for the daemon; the plist redirects
//! stdout/stderr into the weave log directory and `log` tails those files
//! itself.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{self, Settings};
use crate::error::{ServiceError, ServiceResult};
use crate::executor::SubprocessBuilder;
use crate::templates::{self, TemplateEngine};
use crate::workload::Workload;

use super::plist::LaunchdPlist;
use super::tail::tail_file;
use super::Service;

/// Launchd-backed service.
pub struct LaunchdService {
    workload: Workload,
    settings: Settings,
    engine: TemplateEngine,
}

impl LaunchdService {
    pub fn new(workload: Workload, settings: Settings) -> ServiceResult<Self> {
        Ok(Self {
            workload,
            settings,
            engine: TemplateEngine::new()?,
        })
    }

    /// The launchd label (`com.<slug>.daemon`).
    pub fn label(&self) -> String {
        format!("com.{}.daemon", self.workload.slug())
    }

    fn plist_path(&self) -> PathBuf {
        self.settings.plist_path(&self.label())
    }

    fn binary_path(&self) -> PathBuf {
        self.settings
            .weave_home
            .join("bin")
            .join(self.workload.descriptor().binary_name)
    }

    /// Render the plist for this workload rooted at `app_home`.
    pub fn render_plist(&self, app_home: &Path) -> ServiceResult<String> {
        // Hermes has no --home/DAEMON_HOME convention; every other daemon
        // gets both.
        let daemon_home = if matches!(self.workload, Workload::Relayer) {
            None
        } else {
            Some(app_home.to_string_lossy().to_string())
        };

        let slug = self.workload.slug();
        let context = serde_json::json!({
            "label": self.label(),
            "binary_path": self.binary_path(),
            "args": self.workload.daemon_args(app_home),
            "daemon_home": daemon_home,
            "stdout_log": self.settings.stdout_log_path(slug),
            "stderr_log": self.settings.stderr_log_path(slug),
        });
        self.engine.render(templates::LAUNCHD_PLIST, &context)
    }

    /// Unload/load cycle against the installed plist. The file may never
    /// have been loaded, so unload failure is ignored.
    fn reload(&self) -> ServiceResult<()> {
        let path = self.plist_path();
        let path_str = path.to_string_lossy().to_string();

        match SubprocessBuilder::new("launchctl")
            .args(["unload", &path_str])
            .run()
        {
            Ok(result) if !result.success => {
                debug!(plist = %path.display(), stderr = %result.stderr.trim(), "Unload skipped");
            }
            Err(e) => {
                debug!(plist = %path.display(), error = %e, "Unload skipped");
            }
            Ok(_) => {}
        }

        SubprocessBuilder::new("launchctl")
            .args(["load", &path_str])
            .run()?
            .success_or("launchctl load")?;
        Ok(())
    }
}

impl Service for LaunchdService {
    fn service_name(&self) -> String {
        self.label()
    }

    fn create(&self, binary_version: &str, app_home: &Path) -> ServiceResult<()> {
        debug!(
            service = %self.label(),
            version = %binary_version,
            home = %app_home.display(),
            "Installing launch agent"
        );

        let rendered = self.render_plist(app_home)?;

        fs::create_dir_all(&self.settings.log_dir)?;

        let path = self.plist_path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        super::install::write_atomic(&path, &rendered)?;

        self.reload()?;
        info!(plist = %path.display(), "Launch agent installed");
        Ok(())
    }

    fn start(&self, optional_args: &[String]) -> ServiceResult<()> {
        let path = self.plist_path();
        let mut plist = LaunchdPlist::load(&path)?;
        plist.splice_arguments(optional_args);
        plist.save(&path)?;

        self.reload()?;
        SubprocessBuilder::new("launchctl")
            .args(["start", &self.label()])
            .run()?
            .success_or("launchctl start")?;

        info!(service = %self.label(), "Service started");
        Ok(())
    }

    fn stop(&self) -> ServiceResult<()> {
        SubprocessBuilder::new("launchctl")
            .args(["stop", &self.label()])
            .run()?
            .success_or("launchctl stop")?;
        info!(service = %self.label(), "Service stopped");
        Ok(())
    }

    fn restart(&self) -> ServiceResult<()> {
        self.stop()?;
        // launchd needs a moment to deregister before the label can be
        // started again
        thread::sleep(Duration::from_secs(1));
        self.start(&[])
    }

    fn log(&self, n: usize) -> ServiceResult<()> {
        let slug = self.workload.slug();
        let stdout_path = self.settings.stdout_log_path(slug);
        let stderr_path = self.settings.stderr_log_path(slug);
        for path in [&stdout_path, &stderr_path] {
            if !path.exists() {
                return Err(ServiceError::LogFileNotFound { path: path.clone() });
            }
        }

        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(async move {
            let cancel = CancellationToken::new();
            let stdout_tail = tokio::spawn(tail_file(
                stdout_path,
                n,
                tokio::io::stdout(),
                cancel.clone(),
            ));
            let stderr_tail = tokio::spawn(tail_file(
                stderr_path,
                n,
                tokio::io::stderr(),
                cancel.clone(),
            ));

            shutdown_signal().await;
            info!("Interrupt received, stopping log stream");
            cancel.cancel();

            let (stdout_result, stderr_result) = tokio::join!(stdout_tail, stderr_tail);
            for result in [stdout_result, stderr_result] {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, "Log tail ended with error"),
                    Err(e) => warn!(error = %e, "Log tail task failed"),
                }
            }
            Ok(())
        })
    }

    fn prune_logs(&self) -> ServiceResult<()> {
        let slug = self.workload.slug();
        remove_log_file(&self.settings.stdout_log_path(slug))?;
        remove_log_file(&self.settings.stderr_log_path(slug))?;
        info!(service = %self.label(), "Log files removed");
        Ok(())
    }

    fn service_file(&self) -> ServiceResult<PathBuf> {
        Ok(self.plist_path())
    }

    fn binary_and_home(&self) -> ServiceResult<(PathBuf, PathBuf)> {
        let path = self.plist_path();
        let plist = LaunchdPlist::load(&path)?;

        let binary = plist.binary_path().ok_or_else(|| ServiceError::Plist {
            message: format!("'{}' has an empty ProgramArguments", path.display()),
        })?;
        let binary = PathBuf::from(binary);

        // Hermes keeps its state in a fixed location instead of taking a
        // home flag.
        let home = if matches!(self.workload, Workload::Relayer) {
            config::user_home()?.join(".hermes")
        } else {
            plist
                .home_directory()
                .map(PathBuf::from)
                .ok_or_else(|| ServiceError::Plist {
                    message: format!("'{}' records no home directory", path.display()),
                })?
        };

        Ok((binary, home))
    }
}

fn remove_log_file(path: &Path) -> ServiceResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ServiceError::LogFileNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
