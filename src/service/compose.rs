//! Docker Compose extension.
//!
//! Multi-container variant of the Docker backend for workloads composed
//! of several cooperating containers (indexer + API + Postgres). The
//! rendered manifest has a fixed topology; per-deployment values come
//! from the sibling `.env` file, resolved by `docker compose` at up time.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{CommandErrorKind, ServiceError, ServiceResult};
use crate::executor::SubprocessBuilder;
use crate::templates::{self, TemplateEngine};
use crate::workload::Workload;

use super::docker::image_name;
use super::Service;

const COMPOSE_FILE: &str = "docker-compose.yml";
const ENV_FILE: &str = ".env";
const DEFAULT_POSTGRES_VERSION: &str = "16-alpine";

/// Compose-backed service.
pub struct ComposeService {
    workload: Workload,
    settings: Settings,
    engine: TemplateEngine,
    /// Directory recorded by `create`; other operations fall back to the
    /// workload's default home under the weave directory.
    compose_dir: Mutex<Option<PathBuf>>,
}

impl ComposeService {
    pub fn new(workload: Workload, settings: Settings) -> ServiceResult<Self> {
        Ok(Self {
            workload,
            settings,
            engine: TemplateEngine::new()?,
            compose_dir: Mutex::new(None),
        })
    }

    /// Directory holding the `.env` and rendered compose file.
    pub fn compose_dir(&self) -> PathBuf {
        self.compose_dir
            .lock()
            .expect("compose dir lock poisoned")
            .clone()
            .unwrap_or_else(|| self.settings.weave_home.join(self.workload.slug()))
    }

    /// Path of the rendered manifest.
    pub fn compose_file(&self) -> PathBuf {
        self.compose_dir().join(COMPOSE_FILE)
    }

    /// Render the manifest, discovering template values from an existing
    /// `.env` next to it (the `.env` itself is never written back).
    pub fn render_manifest(&self, dir: &Path, binary_version: &str) -> ServiceResult<String> {
        let env = read_env_file(&dir.join(ENV_FILE))?;

        let image = match env.get("ROLLYTICS_IMAGE") {
            Some(image) => image.clone(),
            None => {
                let reference = image_name(self.workload, binary_version)?;
                // base ref only; the tag is a separate template value
                reference
                    .rsplit_once(':')
                    .map(|(base, _)| base.to_string())
                    .unwrap_or(reference)
            }
        };
        let postgres_version = env
            .get("POSTGRES_VERSION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_POSTGRES_VERSION.to_string());

        let context = serde_json::json!({
            "image": image,
            "version": binary_version,
            "postgres_version": postgres_version,
        });
        self.engine.render(templates::DOCKER_COMPOSE, &context)
    }

    fn compose(&self, args: &[&str]) -> ServiceResult<crate::executor::SubprocessResult> {
        let file = self.compose_file();
        SubprocessBuilder::new("docker")
            .args(["compose", "-f", &file.to_string_lossy()])
            .args(args.iter().copied())
            .run()
    }

    /// Tear the stack down and delete its volumes. Destructive; kept off
    /// the uniform contract on purpose.
    pub fn remove_volumes(&self) -> ServiceResult<()> {
        self.compose(&["down", "-v"])?
            .success_or("docker compose down -v")?;
        info!(service = %self.service_name(), "Stack and volumes removed");
        Ok(())
    }
}

impl Service for ComposeService {
    fn service_name(&self) -> String {
        format!("weave-{}", self.workload.slug())
    }

    fn create(&self, binary_version: &str, app_home: &Path) -> ServiceResult<()> {
        debug!(
            service = %self.service_name(),
            version = %binary_version,
            home = %app_home.display(),
            "Rendering compose manifest"
        );

        let rendered = self.render_manifest(app_home, binary_version)?;
        super::install::write_atomic(&app_home.join(COMPOSE_FILE), &rendered)?;

        *self
            .compose_dir
            .lock()
            .expect("compose dir lock poisoned") = Some(app_home.to_path_buf());

        info!(
            manifest = %app_home.join(COMPOSE_FILE).display(),
            "Compose manifest written"
        );
        Ok(())
    }

    fn start(&self, optional_args: &[String]) -> ServiceResult<()> {
        if !optional_args.is_empty() {
            warn!(
                service = %self.service_name(),
                "Extra start arguments ignored, the manifest defines the stack"
            );
        }

        // Surface manifest problems distinctly from runtime failures.
        let validated = self.compose(&["config", "--quiet"])?;
        if !validated.success {
            return Err(ServiceError::Command {
                kind: CommandErrorKind::InvalidManifest {
                    message: validated.stderr.trim().to_string(),
                },
            });
        }

        self.compose(&["up", "-d"])?
            .success_or("docker compose up")?;
        info!(service = %self.service_name(), "Stack started");
        Ok(())
    }

    fn stop(&self) -> ServiceResult<()> {
        self.compose(&["stop"])?.success_or("docker compose stop")?;
        info!(service = %self.service_name(), "Stack stopped");
        Ok(())
    }

    fn restart(&self) -> ServiceResult<()> {
        self.compose(&["restart"])?
            .success_or("docker compose restart")?;
        info!(service = %self.service_name(), "Stack restarted");
        Ok(())
    }

    fn log(&self, n: usize) -> ServiceResult<()> {
        let file = self.compose_file();
        SubprocessBuilder::new("docker")
            .args([
                "compose",
                "-f",
                &file.to_string_lossy(),
                "logs",
                "-f",
                "--tail",
                &n.to_string(),
            ])
            .run_foreground()
    }

    fn prune_logs(&self) -> ServiceResult<()> {
        Err(ServiceError::unsupported("docker compose", "PruneLogs"))
    }

    fn service_file(&self) -> ServiceResult<PathBuf> {
        Ok(self.compose_file())
    }

    fn binary_and_home(&self) -> ServiceResult<(PathBuf, PathBuf)> {
        // No single binary is meaningful for a stack.
        Ok((PathBuf::new(), self.compose_dir()))
    }
}

/// Parse a `.env` file into key/value pairs. Missing file means no
/// discovered values.
fn read_env_file(path: &Path) -> ServiceResult<HashMap<String, String>> {
    let mut values = HashMap::new();
    if !path.exists() {
        return Ok(values);
    }

    let content = fs::read_to_string(path)?;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_for(home: &Path) -> ComposeService {
        ComposeService::new(Workload::Rollytics, Settings::for_home(home)).unwrap()
    }

    #[test]
    fn test_service_name() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(service_for(dir.path()).service_name(), "weave-rollytics");
    }

    #[test]
    fn test_default_compose_dir() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_for(dir.path());
        assert_eq!(
            service.compose_dir(),
            dir.path().join(".weave").join("rollytics")
        );
    }

    #[test]
    fn test_create_writes_manifest_next_to_env() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_for(dir.path());
        let stack_dir = dir.path().join("rollytics");
        fs::create_dir_all(&stack_dir).unwrap();
        fs::write(stack_dir.join(".env"), "POSTGRES_VERSION=15-alpine\n").unwrap();

        service.create("v0.2.1", &stack_dir).unwrap();

        let manifest = fs::read_to_string(stack_dir.join("docker-compose.yml")).unwrap();
        assert!(manifest.contains("image: postgres:15-alpine"));
        assert!(manifest.contains("image: ghcr.io/initia-labs/rollytics:v0.2.1"));
        // the .env is discovery-only, never rewritten
        assert_eq!(
            fs::read_to_string(stack_dir.join(".env")).unwrap(),
            "POSTGRES_VERSION=15-alpine\n"
        );
        // subsequent operations target the created directory
        assert_eq!(service.compose_file(), stack_dir.join("docker-compose.yml"));
    }

    #[test]
    fn test_render_without_env_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_for(dir.path());

        let manifest = service
            .render_manifest(&dir.path().join("missing"), "v0.2.1")
            .unwrap();
        assert!(manifest.contains("image: postgres:16-alpine"));
        assert!(manifest.contains("${POSTGRES_PASSWORD:-rollytics}"));
    }

    #[test]
    fn test_read_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "# comment\n\nCHAIN_ID=minimove-1\nAPI_PORT = 8090\n").unwrap();

        let env = read_env_file(&path).unwrap();
        assert_eq!(env.get("CHAIN_ID"), Some(&"minimove-1".to_string()));
        assert_eq!(env.get("API_PORT"), Some(&"8090".to_string()));
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn test_prune_logs_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_for(dir.path());
        assert!(matches!(
            service.prune_logs(),
            Err(ServiceError::Unsupported { .. })
        ));
    }
}
