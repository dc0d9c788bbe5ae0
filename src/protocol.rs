//! Docker credential helper protocol.
//!
//! Each command reads its payload from stdin and writes its reply to stdout;
//! see <https://docs.docker.com/engine/reference/commandline/login/#credential-helpers>.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::Deserialize;
use tracing::debug;

use crate::clock::Clock;
use crate::credentials::{Credential, CredentialStore, SecretBackend};
use crate::error::{CredentialError, Result};

/// Payload of the `store` command.
#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    #[serde(rename = "ServerURL")]
    pub server_url: String,

    #[serde(flatten)]
    pub credential: Credential,
}

/// `store`: upsert the credential described by a JSON object on `input`.
pub fn store<B, C>(credentials: &mut CredentialStore<B, C>, input: impl Read) -> Result<()>
where
    B: SecretBackend,
    C: Clock,
{
    let raw = read_all(input)?;
    let request: StoreRequest = serde_json::from_str(&raw)
        .map_err(|e| CredentialError::InvalidRequest(format!("store payload: {e}")))?;

    debug!(server = %request.server_url, "store");
    credentials.put(&request.server_url, request.credential)
}

/// `get`: write the credential for the server URL on `input`, or `null`.
pub fn get<B, C>(
    credentials: &mut CredentialStore<B, C>,
    input: impl Read,
    output: impl Write,
) -> Result<()>
where
    B: SecretBackend,
    C: Clock,
{
    let server_url = read_server_url(input)?;
    debug!(server = %server_url, "get");

    let credential = credentials.get(&server_url)?;
    write_json(output, &credential)
}

/// `erase`: remove the credential for the server URL on `input`.
pub fn erase<B, C>(credentials: &mut CredentialStore<B, C>, input: impl Read) -> Result<()>
where
    B: SecretBackend,
    C: Clock,
{
    let server_url = read_server_url(input)?;
    debug!(server = %server_url, "erase");
    credentials.delete(&server_url)
}

/// `list`: write a JSON object of server URL to username.
pub fn list<B, C>(credentials: &mut CredentialStore<B, C>, output: impl Write) -> Result<()>
where
    B: SecretBackend,
    C: Clock,
{
    debug!("list");
    let servers: BTreeMap<String, String> = credentials.list()?;
    write_json(output, &servers)
}

fn read_all(mut input: impl Read) -> Result<String> {
    let mut raw = String::new();
    input.read_to_string(&mut raw)?;
    Ok(raw)
}

fn read_server_url(input: impl Read) -> Result<String> {
    Ok(read_all(input)?.trim().to_string())
}

fn write_json<T: serde::Serialize>(mut output: impl Write, value: &T) -> Result<()> {
    serde_json::to_writer(&mut output, value).map_err(std::io::Error::from)?;
    output.flush()?;
    Ok(())
}
