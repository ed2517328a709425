//! weave-service - drive a workload through its lifecycle backend.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use weave_service::config::Settings;
use weave_service::error::ServiceError;
use weave_service::service::{new_service_with_backend, BackendKind, ComposeService, Service};
use weave_service::workload::Workload;

#[derive(Parser)]
#[command(name = "weave-service", version, about = "Supervise Initia infrastructure workloads")]
struct Cli {
    /// Process manager backend
    #[arg(long, value_enum, global = true, default_value_t = Backend::Docker)]
    backend: Backend,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Docker,
    Systemd,
    Launchd,
    Compose,
}

impl From<Backend> for BackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Docker => BackendKind::Docker,
            Backend::Systemd => BackendKind::Systemd,
            Backend::Launchd => BackendKind::Launchd,
            Backend::Compose => BackendKind::DockerCompose,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Make the workload startable (pull image or install definition)
    Create {
        #[arg(value_parser = parse_workload)]
        workload: Workload,
        /// Binary/image version to install
        #[arg(long)]
        version: String,
        /// Application home directory
        #[arg(long)]
        home: PathBuf,
    },
    /// Start the workload
    Start {
        #[arg(value_parser = parse_workload)]
        workload: Workload,
        /// Extra daemon arguments, appended to the persisted list
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Stop the workload
    Stop {
        #[arg(value_parser = parse_workload)]
        workload: Workload,
    },
    /// Restart the workload
    Restart {
        #[arg(value_parser = parse_workload)]
        workload: Workload,
    },
    /// Stream workload logs
    Log {
        #[arg(value_parser = parse_workload)]
        workload: Workload,
        /// Number of backlog lines to emit first
        #[arg(short = 'n', long, default_value_t = 100)]
        lines: usize,
    },
    /// Clear accumulated log data
    PruneLogs {
        #[arg(value_parser = parse_workload)]
        workload: Workload,
    },
    /// Show the persisted definition and its recorded binary/home
    Info {
        #[arg(value_parser = parse_workload)]
        workload: Workload,
    },
    /// Tear down a compose stack and delete its volumes
    Down {
        #[arg(value_parser = parse_workload)]
        workload: Workload,
    },
}

fn parse_workload(s: &str) -> Result<Workload, String> {
    s.parse()
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Operation failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ServiceError> {
    let backend = BackendKind::from(cli.backend);
    match cli.command {
        Commands::Create {
            workload,
            version,
            home,
        } => new_service_with_backend(workload, backend)?.create(&version, &home),
        Commands::Start { workload, args } => {
            new_service_with_backend(workload, backend)?.start(&args)
        }
        Commands::Stop { workload } => new_service_with_backend(workload, backend)?.stop(),
        Commands::Restart { workload } => new_service_with_backend(workload, backend)?.restart(),
        Commands::Log { workload, lines } => {
            new_service_with_backend(workload, backend)?.log(lines)
        }
        Commands::PruneLogs { workload } => {
            new_service_with_backend(workload, backend)?.prune_logs()
        }
        Commands::Info { workload } => {
            let service = new_service_with_backend(workload, backend)?;
            let file = service.service_file()?;
            if file.as_os_str().is_empty() {
                println!("service: {} (no definition file)", service.service_name());
            } else {
                println!("service: {}", service.service_name());
                println!("definition: {}", file.display());
            }
            let (binary, home) = service.binary_and_home()?;
            if !binary.as_os_str().is_empty() {
                println!("binary: {}", binary.display());
            }
            println!("home: {}", home.display());
            Ok(())
        }
        Commands::Down { workload } => {
            let service = ComposeService::new(workload, Settings::load()?)?;
            service.remove_volumes()
        }
    }
}

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().compact())
        .init();
}
