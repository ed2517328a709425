//! Typed launchd plist document model.
//!
//! The installed plist is the sole source of truth for how a launchd
//! daemon was configured. Argument injection decodes the whole document,
//! mutates the `ProgramArguments` array and re-encodes, so keys may appear
//! in any order and other arrays in the document are never touched.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// A launchd daemon definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LaunchdPlist {
    pub label: String,
    /// Binary path followed by positional/flag arguments, in order.
    pub program_arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_variables: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_at_load: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_out_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_error_path: Option<String>,
}

impl LaunchdPlist {
    /// Decode an installed plist.
    pub fn load(path: &Path) -> ServiceResult<Self> {
        plist::from_file(path).map_err(|e| ServiceError::Plist {
            message: format!("Failed to decode '{}': {}", path.display(), e),
        })
    }

    /// Re-encode the whole document back to disk as XML.
    pub fn save(&self, path: &Path) -> ServiceResult<()> {
        plist::to_file_xml(path, self).map_err(|e| ServiceError::Plist {
            message: format!("Failed to encode '{}': {}", path.display(), e),
        })
    }

    /// Rebuild `ProgramArguments` for a start with extra arguments.
    ///
    /// Entries are kept in order up to and including the element
    /// immediately following the first `--home`-prefixed entry; anything
    /// after that (optional arguments from a previous start) is replaced
    /// by `optional_args`. Without a `--home`-prefixed entry the entire
    /// original list is kept and `optional_args` appended.
    pub fn splice_arguments(&mut self, optional_args: &[String]) {
        let args = &self.program_arguments;
        let kept = match args.iter().position(|arg| arg.starts_with("--home")) {
            Some(home_idx) => {
                let end = (home_idx + 1).min(args.len().saturating_sub(1));
                &args[..=end]
            }
            None => &args[..],
        };

        let mut rebuilt = Vec::with_capacity(kept.len() + optional_args.len());
        rebuilt.extend_from_slice(kept);
        rebuilt.extend(optional_args.iter().cloned());
        self.program_arguments = rebuilt;
    }

    /// The daemon binary path (`ProgramArguments[0]`).
    pub fn binary_path(&self) -> Option<&str> {
        self.program_arguments.first().map(String::as_str)
    }

    /// The daemon home directory.
    ///
    /// Resolved from the first `--home <value>` or `--home=<value>` in
    /// `ProgramArguments`; a `DAEMON_HOME` environment entry overrides
    /// whatever the arguments say.
    pub fn home_directory(&self) -> Option<String> {
        let mut home = None;
        for (i, arg) in self.program_arguments.iter().enumerate() {
            if arg == "--home" {
                home = self.program_arguments.get(i + 1).cloned();
                break;
            }
            if let Some(value) = arg.strip_prefix("--home=") {
                home = Some(value.to_string());
                break;
            }
        }

        if let Some(env) = &self.environment_variables {
            if let Some(value) = env.get("DAEMON_HOME") {
                return Some(value.clone());
            }
        }
        home
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plist_with_args(args: &[&str]) -> LaunchdPlist {
        LaunchdPlist {
            label: "com.executor.daemon".to_string(),
            program_arguments: args.iter().map(|s| s.to_string()).collect(),
            environment_variables: None,
            run_at_load: Some(true),
            keep_alive: Some(true),
            standard_out_path: None,
            standard_error_path: None,
        }
    }

    #[test]
    fn test_splice_appends_after_home_value() {
        let mut plist =
            plist_with_args(&["/bin/opinitd", "start", "executor", "--home", "/h/.opinit"]);
        plist.splice_arguments(&["--detach".to_string()]);
        assert_eq!(
            plist.program_arguments,
            vec![
                "/bin/opinitd",
                "start",
                "executor",
                "--home",
                "/h/.opinit",
                "--detach"
            ]
        );
    }

    #[test]
    fn test_splice_replaces_stale_trailing_args() {
        let mut plist = plist_with_args(&[
            "/bin/opinitd",
            "start",
            "executor",
            "--home",
            "/h/.opinit",
            "--detach",
        ]);
        plist.splice_arguments(&["--verbose".to_string()]);
        assert_eq!(
            plist.program_arguments,
            vec![
                "/bin/opinitd",
                "start",
                "executor",
                "--home",
                "/h/.opinit",
                "--verbose"
            ]
        );
    }

    #[test]
    fn test_splice_without_home_keeps_everything() {
        let mut plist = plist_with_args(&["/bin/hermes", "start"]);
        plist.splice_arguments(&["--full-scan".to_string()]);
        assert_eq!(
            plist.program_arguments,
            vec!["/bin/hermes", "start", "--full-scan"]
        );
    }

    #[test]
    fn test_splice_with_no_optional_args_is_identity_after_home() {
        let mut plist = plist_with_args(&["/bin/initiad", "start", "--home", "/h/.initia"]);
        plist.splice_arguments(&[]);
        assert_eq!(
            plist.program_arguments,
            vec!["/bin/initiad", "start", "--home", "/h/.initia"]
        );
    }

    #[test]
    fn test_home_from_bare_flag() {
        let plist = plist_with_args(&["/bin/initiad", "start", "--home", "/x"]);
        assert_eq!(plist.home_directory(), Some("/x".to_string()));
    }

    #[test]
    fn test_home_from_equals_form() {
        let plist = plist_with_args(&["/bin/initiad", "start", "--home=/x"]);
        assert_eq!(plist.home_directory(), Some("/x".to_string()));
    }

    #[test]
    fn test_daemon_home_env_overrides_flag() {
        let mut plist = plist_with_args(&["/bin/initiad", "start", "--home", "/x"]);
        let mut env = BTreeMap::new();
        env.insert("DAEMON_HOME".to_string(), "/y".to_string());
        plist.environment_variables = Some(env);
        assert_eq!(plist.home_directory(), Some("/y".to_string()));
    }

    #[test]
    fn test_home_absent() {
        let plist = plist_with_args(&["/bin/hermes", "start"]);
        assert_eq!(plist.home_directory(), None);
    }

    #[test]
    fn test_binary_path_is_first_argument() {
        let plist = plist_with_args(&["/bin/opinitd", "start", "executor"]);
        assert_eq!(plist.binary_path(), Some("/bin/opinitd"));
    }

    #[test]
    fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("com.executor.daemon.plist");

        let mut original = plist_with_args(&["/bin/opinitd", "start", "executor"]);
        let mut env = BTreeMap::new();
        env.insert("DAEMON_HOME".to_string(), "/h/.opinit".to_string());
        original.environment_variables = Some(env);
        original.save(&path).unwrap();

        let decoded = LaunchdPlist::load(&path).unwrap();
        assert_eq!(decoded.label, "com.executor.daemon");
        assert_eq!(decoded.program_arguments, original.program_arguments);
        assert_eq!(decoded.home_directory(), Some("/h/.opinit".to_string()));
    }
}
