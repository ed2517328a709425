//! Template repository.
//!
//! Embedded per-platform service definition templates and the Tera
//! engine that renders them.

mod engine;
mod files;

pub use engine::TemplateEngine;
pub use files::{DOCKER_COMPOSE, LAUNCHD_PLIST, SYSTEMD_UNIT};
