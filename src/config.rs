use std::path::PathBuf;
use std::time::Duration;

use crate::credentials::ChamberConfig;

/// Default chamber service holding the credentials.
pub const DEFAULT_SERVICE: &str = "docker/credentials";

/// Default log filter when a log sink is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Readback window applied after every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyPolicy {
    /// Delay between readback attempts.
    pub interval: Duration,

    /// Give up once this much time has passed since the first readback.
    pub timeout: Duration,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Where log output goes, if anywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogSink {
    /// Logging disabled; nothing is installed.
    #[default]
    Disabled,
    Stderr,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub sink: LogSink,

    /// Filter directive, e.g. `debug` or `docker_credential_chamber=trace`.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            sink: LogSink::Disabled,
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl LogConfig {
    /// Pick a sink from the command-line switches. A log file wins over stderr.
    pub fn from_switches(log_file: Option<PathBuf>, log_stderr: bool, level: String) -> Self {
        let sink = match (log_file, log_stderr) {
            (Some(path), _) => LogSink::File(path),
            (None, true) => LogSink::Stderr,
            (None, false) => LogSink::Disabled,
        };
        Self { sink, level }
    }
}

/// Configuration resolved once at startup and threaded into each component.
#[derive(Debug)]
pub struct HelperConfig {
    /// Chamber service used as the credential namespace.
    pub service: String,

    pub chamber: ChamberConfig,

    pub verify: VerifyPolicy,

    pub log: LogConfig,

    /// Print full error chains with debug formatting.
    pub debug: bool,

    /// Docker client configuration directory patched by `install`.
    pub docker_config_dir: Option<PathBuf>,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            chamber: ChamberConfig::default(),
            verify: VerifyPolicy::default(),
            log: LogConfig::default(),
            debug: false,
            docker_config_dir: None,
        }
    }
}
