//! Chamber secret backend.
//!
//! Runs the `chamber` executable as a subprocess:
//!
//! ```text
//! chamber list-services
//! chamber export <service>
//! chamber write <service> <key> <value>
//! chamber delete <service> <key>
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Output};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{Credential, SecretBackend, StorageKey};
use crate::error::{CredentialError, Result};

/// How to reach chamber and what to put in its environment.
#[derive(Debug)]
pub struct ChamberConfig {
    /// Executable name or path.
    pub program: PathBuf,

    /// Exported as `VAULT_TOKEN` when set.
    pub vault_token: Option<SecretString>,

    /// Exported as `VAULT_ADDR` when set.
    pub vault_addr: Option<String>,
}

impl Default for ChamberConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("chamber"),
            vault_token: None,
            vault_addr: None,
        }
    }
}

/// Secret backend that shells out to chamber.
pub struct ChamberBackend {
    config: ChamberConfig,
}

impl ChamberBackend {
    pub fn new(config: ChamberConfig) -> Self {
        Self { config }
    }

    fn program_name(&self) -> String {
        self.config.program.display().to_string()
    }

    /// Variables layered over the inherited process environment.
    fn env_overrides(&self) -> Vec<(&'static str, String)> {
        let mut overrides = Vec::new();
        if let Some(token) = &self.config.vault_token {
            overrides.push(("VAULT_TOKEN", token.expose_secret().to_string()));
        }
        if let Some(addr) = &self.config.vault_addr {
            overrides.push(("VAULT_ADDR", addr.clone()));
        }
        overrides
    }

    fn run<I, S>(&self, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Command::new(&self.config.program)
            .args(args)
            .envs(self.env_overrides())
            .output()
            .map_err(|e| CredentialError::BackendUnavailable {
                program: self.program_name(),
                reason: if e.kind() == io::ErrorKind::NotFound {
                    "executable not found".to_string()
                } else {
                    e.to_string()
                },
            })
    }

    /// Run a read-only subcommand and return its stdout.
    fn read(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(CredentialError::BackendUnavailable {
                program: self.program_name(),
                reason: failure_reason(args[0], &output),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| CredentialError::BackendUnavailable {
            program: self.program_name(),
            reason: format!("{} printed invalid UTF-8", args[0]),
        })
    }

    fn mutate(&self, operation: &'static str, namespace: &str, args: &[&str]) -> Result<()> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(CredentialError::BackendWrite {
                operation,
                namespace: namespace.to_string(),
                key: args.get(2).copied().unwrap_or_default().to_string(),
                reason: failure_reason(operation, &output),
            });
        }
        Ok(())
    }
}

impl SecretBackend for ChamberBackend {
    fn list_services(&self) -> Result<BTreeSet<String>> {
        tracing::debug!(program = %self.program_name(), "chamber list-services");
        let stdout = self.read(&["list-services"])?;
        Ok(parse_services(&stdout))
    }

    fn export_namespace(&self, namespace: &str) -> Result<BTreeMap<String, Credential>> {
        let present = self
            .list_services()?
            .iter()
            .any(|s| s.eq_ignore_ascii_case(namespace));
        if !present {
            tracing::debug!(namespace, "namespace not present, treating as empty");
            return Ok(BTreeMap::new());
        }

        tracing::debug!(program = %self.program_name(), namespace, "chamber export");
        let stdout = self.read(&["export", namespace])?;
        tracing::debug!(namespace, bytes = stdout.len(), "chamber export finished");

        parse_export(&stdout).map_err(|source| CredentialError::MalformedOutput {
            program: self.program_name(),
            operation: "export",
            source,
        })
    }

    fn write_entry(
        &self,
        namespace: &str,
        key: &StorageKey,
        credential: &Credential,
    ) -> Result<()> {
        let value = serde_json::to_string(credential).map_err(|e| {
            CredentialError::InvalidRequest(format!("cannot serialize credential: {e}"))
        })?;

        tracing::debug!(program = %self.program_name(), namespace, key = %key, "chamber write");
        self.mutate("write", namespace, &["write", namespace, key.as_str(), &value])
    }

    fn delete_entry(&self, namespace: &str, key: &StorageKey) -> Result<()> {
        tracing::debug!(program = %self.program_name(), namespace, key = %key, "chamber delete");
        self.mutate("delete", namespace, &["delete", namespace, key.as_str()])
    }
}

fn failure_reason(subcommand: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("{subcommand} exited with {}", output.status)
    } else {
        format!("{subcommand} exited with {}: {stderr}", output.status)
    }
}

/// Parse `list-services` output, one service per line under a `Service` header.
fn parse_services(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != "Service")
        .map(str::to_string)
        .collect()
}

/// A value as found in export output.
///
/// Depending on the chamber version a value is either the credential object
/// itself or a string holding its JSON.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredValue {
    Structured(Credential),
    Encoded(String),
}

impl StoredValue {
    fn into_credential(self) -> serde_json::Result<Credential> {
        match self {
            StoredValue::Structured(credential) => Ok(credential),
            StoredValue::Encoded(json) => serde_json::from_str(&json),
        }
    }
}

/// Parse `export` output into normalized credentials keyed by raw backend key.
fn parse_export(stdout: &str) -> serde_json::Result<BTreeMap<String, Credential>> {
    if stdout.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let raw: BTreeMap<String, StoredValue> = serde_json::from_str(stdout)?;
    raw.into_iter()
        .map(|(key, value)| Ok((key, value.into_credential()?)))
        .collect()
}
