use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docker_credential_chamber::config::{
    HelperConfig, LogConfig, LogSink, VerifyPolicy, DEFAULT_LOG_LEVEL, DEFAULT_SERVICE,
};
use docker_credential_chamber::credentials::{ChamberBackend, ChamberConfig, CredentialStore};
use docker_credential_chamber::{install, protocol};
use secrecy::SecretString;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Docker credential helper backed by chamber.
///
/// Implements the credential helper protocol used by `docker login`, keeping
/// secrets in chamber instead of ~/.docker/config.json.
#[derive(Parser)]
#[command(name = "docker-credential-chamber", version)]
struct Cli {
    /// Chamber service used as the credential store
    #[arg(short, long, env = "DOCKER_CREDENTIALS_SERVICE", default_value = DEFAULT_SERVICE)]
    service: String,

    /// Vault token passed to chamber as VAULT_TOKEN
    #[arg(short, long, env = "DOCKER_CREDENTIALS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Vault address passed to chamber as VAULT_ADDR
    #[arg(short = 'a', long, env = "DOCKER_CREDENTIALS_VAULT_ADDR")]
    vault_addr: Option<String>,

    /// Chamber executable
    #[arg(short, long, env = "CHAMBER", default_value = "chamber")]
    chamber: PathBuf,

    /// Show full error details on failure
    #[arg(short, long)]
    debug: bool,

    /// Log to file
    #[arg(short = 'f', long, env = "DOCKER_CREDENTIALS_LOGFILE")]
    log_file: Option<PathBuf>,

    /// Log to stderr
    #[arg(short = 'e', long)]
    log_stderr: bool,

    /// Log filter (e.g. info, debug)
    #[arg(short = 'L', long, env = "DOCKER_CREDENTIALS_LOGLEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    /// Docker client configuration directory used by `install`
    #[arg(long, env = "DOCKER_CONFIG")]
    docker_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store the credentials read from stdin (protocol command)
    Store,
    /// Print the credentials for the server URL read from stdin (protocol command)
    Get,
    /// Erase the credentials for the server URL read from stdin (protocol command)
    Erase,
    /// List stored server URLs and usernames (protocol command)
    List,
    /// Configure this helper as the credsStore in the docker config
    Install,
}

impl Cli {
    fn into_parts(self) -> (Command, HelperConfig) {
        let config = HelperConfig {
            service: self.service,
            chamber: ChamberConfig {
                program: self.chamber,
                vault_token: self.token.map(SecretString::from),
                vault_addr: self.vault_addr,
            },
            verify: VerifyPolicy::default(),
            log: LogConfig::from_switches(self.log_file, self.log_stderr, self.log_level),
            debug: self.debug,
            docker_config_dir: self.docker_config,
        };
        (self.command, config)
    }
}

fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = || {
        EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level: {}", config.level))
    };

    match &config.sink {
        LogSink::Disabled => {}
        LogSink::Stderr => {
            tracing_subscriber::registry()
                .with(filter()?)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
        LogSink::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter()?)
                .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
                .init();
        }
    }
    Ok(())
}

fn docker_config_dir(configured: Option<PathBuf>) -> Result<PathBuf> {
    match configured {
        Some(dir) => Ok(dir),
        None => Ok(dirs::home_dir()
            .context("Could not find home directory")?
            .join(".docker")),
    }
}

fn open_store(config: HelperConfig) -> CredentialStore<ChamberBackend> {
    CredentialStore::new(ChamberBackend::new(config.chamber), config.service)
        .with_verify_policy(config.verify)
}

fn run(command: Command, config: HelperConfig) -> Result<()> {
    match command {
        Command::Store => protocol::store(&mut open_store(config), io::stdin().lock())?,
        Command::Get => {
            protocol::get(&mut open_store(config), io::stdin().lock(), io::stdout().lock())?
        }
        Command::Erase => protocol::erase(&mut open_store(config), io::stdin().lock())?,
        Command::List => protocol::list(&mut open_store(config), io::stdout().lock())?,
        Command::Install => install::install(&docker_config_dir(config.docker_config_dir)?)?,
    }
    Ok(())
}

fn main() -> ExitCode {
    let (command, config) = Cli::parse().into_parts();
    let debug = config.debug;

    if let Err(err) = init_logging(&config.log) {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }
    tracing::info!(service = %config.service, "startup");

    match run(command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            if debug {
                eprintln!("Error: {err:?}");
            } else {
                eprintln!("Error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
