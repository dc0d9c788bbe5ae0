//! Registry credential storage.
//!
//! Credentials are kept in an external secret backend, one entry per
//! registry server, under a single namespace:
//!
//! ```text
//! <namespace>/<codec::encode(server_url)> = {"Username": "...", "Secret": "..."}
//! ```
//!
//! [`CredentialStore`] layers read-modify-verify-write semantics on top of a
//! [`SecretBackend`], which only knows how to list, export, write and delete
//! individual entries.

pub mod chamber;
pub mod codec;
mod memory;
mod store;

pub use chamber::{ChamberBackend, ChamberConfig};
pub use codec::{DecodeError, StorageKey};
pub use memory::{BackendCall, MemoryBackend};
pub use store::CredentialStore;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;

/// A registry login: username plus password or token.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Credential {
    pub username: String,

    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub secret: SecretString,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: SecretString::from(secret.into()),
        }
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self {
            username: self.username.clone(),
            secret: SecretString::from(self.secret.expose_secret().to_owned()),
        }
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
            && self.secret.expose_secret() == other.secret.expose_secret()
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

fn serialize_secret<S: Serializer>(
    secret: &SecretString,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

/// Full logical state: server URL to credential.
pub type CredentialSet = BTreeMap<String, Credential>;

/// Namespace-scoped key/value secret storage.
///
/// Implementations are responsible for serializing credentials to whatever
/// value format the backend stores and for normalizing them on the way back.
/// Keys returned by [`SecretBackend::export_namespace`] are raw backend keys;
/// they may not all be decodable.
pub trait SecretBackend {
    /// Names of the namespaces that currently hold at least one entry.
    fn list_services(&self) -> Result<BTreeSet<String>>;

    /// All entries under `namespace`, empty if the namespace does not exist.
    fn export_namespace(&self, namespace: &str) -> Result<BTreeMap<String, Credential>>;

    fn write_entry(
        &self,
        namespace: &str,
        key: &StorageKey,
        credential: &Credential,
    ) -> Result<()>;

    fn delete_entry(&self, namespace: &str, key: &StorageKey) -> Result<()>;
}

impl<B: SecretBackend + ?Sized> SecretBackend for &B {
    fn list_services(&self) -> Result<BTreeSet<String>> {
        (**self).list_services()
    }

    fn export_namespace(&self, namespace: &str) -> Result<BTreeMap<String, Credential>> {
        (**self).export_namespace(namespace)
    }

    fn write_entry(
        &self,
        namespace: &str,
        key: &StorageKey,
        credential: &Credential,
    ) -> Result<()> {
        (**self).write_entry(namespace, key, credential)
    }

    fn delete_entry(&self, namespace: &str, key: &StorageKey) -> Result<()> {
        (**self).delete_entry(namespace, key)
    }
}
