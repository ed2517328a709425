//! Subprocess executor module.
//!
//! Wraps invocations of the host's native service-manager tools
//! (docker, systemctl, journalctl, launchctl).

mod subprocess;

pub use subprocess::{run_command, SubprocessBuilder, SubprocessResult};
