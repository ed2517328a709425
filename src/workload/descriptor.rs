//! Workload definitions.
//!
//! Static descriptors for every process kind weave can supervise. Pure
//! data, resolved once per invocation; backends look everything up here.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// One supervised long-running process kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workload {
    /// Initia L1 node.
    UpgradableInitia,
    /// Minitia rollup node.
    UpgradableMinitia,
    /// OPinit executor bot.
    OPinitExecutor,
    /// OPinit challenger bot.
    OPinitChallenger,
    /// IBC relayer.
    Relayer,
    /// Rollytics indexer stack (multi-container).
    Rollytics,
}

/// Static descriptor for a workload.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadDescriptor {
    /// Name of the daemon binary.
    pub binary_name: &'static str,
    /// Short slug used in service names, unit files and plist labels.
    pub service_slug: &'static str,
    /// Container image base ref, without a tag. None for workloads that
    /// are not distributed as a single container.
    pub default_image: Option<&'static str>,
    /// Arguments that start the daemon, before any home flag.
    pub start_args: &'static [&'static str],
    /// Ports published when running under Docker.
    pub port_bindings: &'static [u16],
    /// Extra `docker run` environment flags.
    pub env_args: &'static [&'static str],
    /// The weave command that sets this workload up, used in error hints.
    pub init_command: &'static str,
}

static INITIA: WorkloadDescriptor = WorkloadDescriptor {
    binary_name: "initiad",
    service_slug: "initia",
    default_image: Some("ghcr.io/initia-labs/initiad"),
    start_args: &["start"],
    port_bindings: &[26656, 26657, 1317, 9090],
    env_args: &[],
    init_command: "weave initia init",
};

static MINITIA: WorkloadDescriptor = WorkloadDescriptor {
    binary_name: "minitiad",
    service_slug: "minitia",
    default_image: Some("ghcr.io/initia-labs/minitiad"),
    start_args: &["start"],
    port_bindings: &[26656, 26657, 1317, 8545, 9090],
    env_args: &[],
    init_command: "weave rollup init",
};

static OPINIT_EXECUTOR: WorkloadDescriptor = WorkloadDescriptor {
    binary_name: "opinitd",
    service_slug: "executor",
    default_image: None,
    start_args: &["start", "executor"],
    port_bindings: &[],
    env_args: &[],
    init_command: "weave opinit init executor",
};

static OPINIT_CHALLENGER: WorkloadDescriptor = WorkloadDescriptor {
    binary_name: "opinitd",
    service_slug: "challenger",
    default_image: None,
    start_args: &["start", "challenger"],
    port_bindings: &[],
    env_args: &[],
    init_command: "weave opinit init challenger",
};

static RELAYER: WorkloadDescriptor = WorkloadDescriptor {
    binary_name: "hermes",
    service_slug: "relayer",
    default_image: Some("ghcr.io/initia-labs/rapid-relayer"),
    start_args: &["start"],
    port_bindings: &[7010, 7011],
    env_args: &[],
    init_command: "weave relayer init",
};

static ROLLYTICS: WorkloadDescriptor = WorkloadDescriptor {
    binary_name: "rollytics",
    service_slug: "rollytics",
    default_image: Some("ghcr.io/initia-labs/rollytics"),
    start_args: &[],
    port_bindings: &[],
    env_args: &[],
    init_command: "weave rollytics init",
};

impl Workload {
    /// All supported workloads.
    pub const ALL: [Workload; 6] = [
        Workload::UpgradableInitia,
        Workload::UpgradableMinitia,
        Workload::OPinitExecutor,
        Workload::OPinitChallenger,
        Workload::Relayer,
        Workload::Rollytics,
    ];

    /// The static descriptor for this workload.
    pub fn descriptor(&self) -> &'static WorkloadDescriptor {
        match self {
            Workload::UpgradableInitia => &INITIA,
            Workload::UpgradableMinitia => &MINITIA,
            Workload::OPinitExecutor => &OPINIT_EXECUTOR,
            Workload::OPinitChallenger => &OPINIT_CHALLENGER,
            Workload::Relayer => &RELAYER,
            Workload::Rollytics => &ROLLYTICS,
        }
    }

    /// Short slug (e.g. `initia` for `UpgradableInitia`).
    pub fn slug(&self) -> &'static str {
        self.descriptor().service_slug
    }

    /// The daemon's argument vector for a native (non-container) start:
    /// start args followed by the home flag. Hermes has no `--home`
    /// convention, so the relayer gets its start args verbatim.
    pub fn daemon_args(&self, app_home: &Path) -> Vec<String> {
        let descriptor = self.descriptor();
        let mut args: Vec<String> = descriptor
            .start_args
            .iter()
            .map(|s| s.to_string())
            .collect();
        if !matches!(self, Workload::Relayer) {
            args.push("--home".to_string());
            args.push(app_home.to_string_lossy().to_string());
        }
        args
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Workload::UpgradableInitia => "UpgradableInitia",
            Workload::UpgradableMinitia => "UpgradableMinitia",
            Workload::OPinitExecutor => "OPinitExecutor",
            Workload::OPinitChallenger => "OPinitChallenger",
            Workload::Relayer => "Relayer",
            Workload::Rollytics => "Rollytics",
        };
        f.write_str(name)
    }
}

impl FromStr for Workload {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initia" | "UpgradableInitia" => Ok(Workload::UpgradableInitia),
            "minitia" | "rollup" | "UpgradableMinitia" => Ok(Workload::UpgradableMinitia),
            "executor" | "OPinitExecutor" => Ok(Workload::OPinitExecutor),
            "challenger" | "OPinitChallenger" => Ok(Workload::OPinitChallenger),
            "relayer" | "Relayer" => Ok(Workload::Relayer),
            "rollytics" | "Rollytics" => Ok(Workload::Rollytics),
            other => Err(format!("unknown workload '{}'", other)),
        }
    }
}
