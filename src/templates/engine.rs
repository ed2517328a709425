//! Tera template engine wrapper.
//!
//! Renders the embedded service definition templates.

use std::sync::Arc;

use tera::{Context, Tera};

use crate::error::ServiceError;

use super::files;

/// Template engine for rendering persisted service definitions.
///
/// Wraps Tera with the embedded templates pre-registered.
#[derive(Clone)]
pub struct TemplateEngine {
    tera: Arc<Tera>,
}

impl TemplateEngine {
    /// Create a new engine with all embedded templates registered.
    pub fn new() -> Result<Self, ServiceError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (files::SYSTEMD_UNIT, files::SYSTEMD_UNIT_TEMPLATE),
            (files::LAUNCHD_PLIST, files::LAUNCHD_PLIST_TEMPLATE),
            (files::DOCKER_COMPOSE, files::DOCKER_COMPOSE_TEMPLATE),
        ])
        .map_err(|e| ServiceError::Template {
            message: format!("Failed to register embedded templates: {}", e),
        })?;

        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    /// Render a template with the given context.
    ///
    /// # Arguments
    ///
    /// * `template_name` - One of the names in [`super::files`]
    /// * `context` - JSON value containing template variables
    pub fn render(
        &self,
        template_name: &str,
        context: &serde_json::Value,
    ) -> Result<String, ServiceError> {
        let tera_context = Context::from_serialize(context).map_err(|e| ServiceError::Template {
            message: format!("Invalid template context: {}", e),
        })?;

        self.tera
            .render(template_name, &tera_context)
            .map_err(|e| ServiceError::Template {
                message: format!("Failed to render template '{}': {}", template_name, e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_systemd_unit() {
        let engine = TemplateEngine::new().unwrap();
        let context = serde_json::json!({
            "description": "Initia node",
            "binary_path": "/usr/local/bin/initiad",
            "args": ["start", "--home", "/home/operator/.initia"],
            "user": "operator",
            "app_home": "/home/operator/.initia",
        });

        let unit = engine.render(files::SYSTEMD_UNIT, &context).unwrap();
        assert!(unit.contains(
            "ExecStart=/usr/local/bin/initiad start --home /home/operator/.initia"
        ));
        assert!(unit.contains("User=operator"));
        assert!(unit.contains("WorkingDirectory=/home/operator/.initia"));
    }

    #[test]
    fn test_render_plist_with_daemon_home() {
        let engine = TemplateEngine::new().unwrap();
        let context = serde_json::json!({
            "label": "com.executor.daemon",
            "binary_path": "/usr/local/bin/opinitd",
            "args": ["start", "executor", "--home", "/home/operator/.opinit"],
            "daemon_home": "/home/operator/.opinit",
            "stdout_log": "/home/operator/.weave/log/executor.stdout.log",
            "stderr_log": "/home/operator/.weave/log/executor.stderr.log",
        });

        let plist = engine.render(files::LAUNCHD_PLIST, &context).unwrap();
        assert!(plist.contains("<string>com.executor.daemon</string>"));
        assert!(plist.contains("<string>/usr/local/bin/opinitd</string>"));
        assert!(plist.contains("<key>DAEMON_HOME</key>"));
        assert!(plist.contains("<string>/home/operator/.opinit</string>"));
    }

    #[test]
    fn test_render_plist_without_daemon_home() {
        let engine = TemplateEngine::new().unwrap();
        let context = serde_json::json!({
            "label": "com.relayer.daemon",
            "binary_path": "/usr/local/bin/hermes",
            "args": ["start"],
            "daemon_home": null,
            "stdout_log": "/home/operator/.weave/log/relayer.stdout.log",
            "stderr_log": "/home/operator/.weave/log/relayer.stderr.log",
        });

        let plist = engine.render(files::LAUNCHD_PLIST, &context).unwrap();
        assert!(!plist.contains("EnvironmentVariables"));
        assert!(plist.contains("<key>KeepAlive</key>"));
    }

    #[test]
    fn test_render_compose_manifest() {
        let engine = TemplateEngine::new().unwrap();
        let context = serde_json::json!({
            "image": "ghcr.io/initia-labs/rollytics",
            "version": "v0.2.1",
            "postgres_version": "16-alpine",
        });

        let manifest = engine.render(files::DOCKER_COMPOSE, &context).unwrap();
        assert!(manifest.contains("image: ghcr.io/initia-labs/rollytics:v0.2.1"));
        assert!(manifest.contains("image: postgres:16-alpine"));
        assert!(manifest.contains("rollytics-network"));
        // compose-time substitution must survive rendering untouched
        assert!(manifest.contains("${POSTGRES_PASSWORD:-rollytics}"));
    }

    #[test]
    fn test_missing_template() {
        let engine = TemplateEngine::new().unwrap();
        let result = engine.render("nonexistent", &serde_json::json!({}));
        assert!(result.is_err());
    }
}
