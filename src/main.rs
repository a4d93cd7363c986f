//! Binary entry point for the gantry CLI.

mod cli;

use std::env;
use std::fmt::Display;
use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use chrono::Utc;
use clap::Parser;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use gantry::{
    AccessCache, AccessDefaults, AccessError, AccessOverrides, Collaborators, CommandContext,
    DockerRuntime, FileRegistry, GantrySettings, GcloudTokenSource, GcpEndpoints, GcpProvider,
    HttpOperatorClient, KubeServiceDirectory, LifecycleError, LifecycleOrchestrator,
    LifecycleSettings, NoPrompt, ProcessCommandRunner, Prompter, ServiceAccountKey,
    SettingsError, TerminalPrompter, TerminalReporter,
};

use cli::{Cli, ClusterArgs, Command};

/// Environment variable holding the log filter; `RUST_LOG` is the fallback.
const LOG_ENV: &str = "GANTRY_LOG";

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to set up {what}: {message}")]
    Setup { what: &'static str, message: String },
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Production collaborators, owned for the duration of a command.
struct Services {
    cloud: GcpProvider<ProcessCommandRunner>,
    docker: DockerRuntime<ProcessCommandRunner>,
    directory: KubeServiceDirectory,
    operator: HttpOperatorClient,
    registry: FileRegistry,
    cache: AccessCache,
    reporter: TerminalReporter,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(cancel.clone()));

    let exit_code = match dispatch(cli.command, &cancel).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };
    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let directive = log_directive(verbose, env::var(LOG_ENV).ok(), env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("gantry=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn log_directive(verbose: bool, gantry_log: Option<String>, rust_log: Option<String>) -> String {
    gantry_log
        .or(rust_log)
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| {
            if verbose {
                String::from("gantry=debug")
            } else {
                String::from("gantry=info")
            }
        })
}

/// The first interrupt stops the cluster wait so `up` can roll back; a
/// second one exits immediately.
async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    debug!("interrupt received, cancelling");
    cancel.cancel();
    if tokio::signal::ctrl_c().await.is_ok() {
        process::exit(130);
    }
}

async fn dispatch(command: Command, cancel: &CancellationToken) -> Result<(), CliError> {
    let settings = GantrySettings::load_without_cli_args()?;
    settings.validate()?;

    let (args, debug_bundle) = match &command {
        Command::Up(args) | Command::Down(args) => (args, false),
        Command::Info(info) => (&info.cluster, info.debug),
    };
    let context = command_context(args)?;
    let service_account = load_service_account(&settings)?;
    let services = build_services(&settings, service_account.as_ref())?;
    let prompter: &dyn Prompter = if context.disallow_prompt {
        &NoPrompt
    } else {
        &TerminalPrompter
    };
    let orchestrator = LifecycleOrchestrator::new(
        Collaborators {
            clusters: &services.cloud,
            storage: &services.cloud,
            containers: &services.docker,
            directory: &services.directory,
            operator: &services.operator,
            registry: &services.registry,
            cache: &services.cache,
            prompter,
            reporter: &services.reporter,
        },
        lifecycle_settings(&settings, service_account.as_ref())?,
    );

    match command {
        Command::Up(_) => orchestrator.up(&context, cancel).await.map(drop)?,
        Command::Info(_) if debug_bundle => orchestrator.debug(&context, Utc::now()).await.map(drop)?,
        Command::Info(_) => orchestrator.info(&context).await.map(drop)?,
        Command::Down(_) => orchestrator.down(&context).await.map(drop)?,
    }
    Ok(())
}

fn command_context(args: &ClusterArgs) -> Result<CommandContext, AccessError> {
    let config_path = args.config.as_deref().map(Utf8PathBuf::from);
    CommandContext::new(
        AccessOverrides {
            cluster_name: args.name.clone(),
            project: args.project.clone(),
            zone: args.zone.clone(),
        },
        config_path.as_deref(),
        args.configure_env.clone(),
        args.yes,
    )
}

fn setup_error(what: &'static str, err: impl Display) -> CliError {
    CliError::Setup {
        what,
        message: err.to_string(),
    }
}

fn load_service_account(settings: &GantrySettings) -> Result<Option<ServiceAccountKey>, CliError> {
    settings
        .credentials_path()
        .map(|path| ServiceAccountKey::load(&path))
        .transpose()
        .map_err(|err| setup_error("credentials", err))
}

fn build_services(
    settings: &GantrySettings,
    service_account: Option<&ServiceAccountKey>,
) -> Result<Services, CliError> {
    let tokens = GcloudTokenSource::new(ProcessCommandRunner, settings.gcloud_bin.clone());
    let cloud = GcpProvider::new(
        tokens,
        service_account.and_then(|key| key.client_email.clone()),
        GcpEndpoints::default(),
    )
    .map_err(|err| setup_error("the cloud client", err))?;
    let operator =
        HttpOperatorClient::new().map_err(|err| setup_error("the operator client", err))?;

    Ok(Services {
        cloud,
        docker: DockerRuntime::new(ProcessCommandRunner, settings.docker_bin.clone()),
        directory: KubeServiceDirectory,
        operator,
        registry: FileRegistry::new(settings.registry_path()),
        cache: AccessCache::new(settings.cache_dir()),
        reporter: TerminalReporter,
    })
}

fn lifecycle_settings(
    settings: &GantrySettings,
    service_account: Option<&ServiceAccountKey>,
) -> Result<LifecycleSettings, CliError> {
    let cwd = env::current_dir().map_err(|err| setup_error("the working directory", err))?;
    let work_dir = Utf8PathBuf::from_path_buf(cwd).map_err(|path| {
        setup_error(
            "the working directory",
            format!("{} is not valid UTF-8", path.display()),
        )
    })?;
    Ok(LifecycleSettings {
        image: settings.image.clone(),
        credentials_file: settings.credentials_path(),
        poll: settings.poll_settings(),
        work_dir,
        default_environment: settings.default_environment.clone(),
        access_defaults: AccessDefaults {
            project: service_account.and_then(|key| key.project_id.clone()),
        },
    })
}

fn report_error(err: &CliError) {
    write_error(io::stderr().lock(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error: {err}").ok();
    if let CliError::Lifecycle(LifecycleError::Teardown { report, .. }) = err {
        writeln!(target, "\nteardown summary:\n{report}").ok();
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
