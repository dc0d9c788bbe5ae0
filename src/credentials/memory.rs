//! In-memory secret backend for testing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::{Credential, SecretBackend, StorageKey};
use crate::error::{CredentialError, Result};

/// A backend call, recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    ListServices,
    Export(String),
    Write(String, String),
    Delete(String, String),
}

/// In-memory secret backend.
///
/// Can be told to acknowledge writes without applying them, which simulates
/// a backend whose reads never catch up, or to reject writes outright.
#[derive(Default)]
pub struct MemoryBackend {
    namespaces: Mutex<BTreeMap<String, BTreeMap<String, Credential>>>,
    calls: Mutex<Vec<BackendCall>>,
    discard_writes: bool,
    reject_writes: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report success for writes and deletes but never apply them.
    pub fn discarding_writes(mut self) -> Self {
        self.discard_writes = true;
        self
    }

    /// Fail every write and delete.
    pub fn rejecting_writes(mut self) -> Self {
        self.reject_writes = true;
        self
    }

    /// Place an entry under an arbitrary raw key, bypassing key encoding.
    pub fn insert_raw(&self, namespace: &str, key: &str, credential: Credential) {
        let mut namespaces = self.namespaces.lock().expect("namespace lock poisoned");
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), credential);
    }

    /// Raw entries currently held under `namespace`.
    pub fn entries(&self, namespace: &str) -> BTreeMap<String, Credential> {
        let namespaces = self.namespaces.lock().expect("namespace lock poisoned");
        namespaces.get(namespace).cloned().unwrap_or_default()
    }

    /// Calls made so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().expect("call log lock poisoned").clone()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().expect("call log lock poisoned").push(call);
    }
}

impl SecretBackend for MemoryBackend {
    fn list_services(&self) -> Result<BTreeSet<String>> {
        self.record(BackendCall::ListServices);
        let namespaces = self.namespaces.lock().expect("namespace lock poisoned");
        Ok(namespaces.keys().cloned().collect())
    }

    fn export_namespace(&self, namespace: &str) -> Result<BTreeMap<String, Credential>> {
        self.record(BackendCall::Export(namespace.to_string()));
        Ok(self.entries(namespace))
    }

    fn write_entry(
        &self,
        namespace: &str,
        key: &StorageKey,
        credential: &Credential,
    ) -> Result<()> {
        self.record(BackendCall::Write(
            namespace.to_string(),
            key.as_str().to_string(),
        ));
        if self.reject_writes {
            return Err(CredentialError::BackendWrite {
                operation: "write",
                namespace: namespace.to_string(),
                key: key.as_str().to_string(),
                reason: "writes rejected".to_string(),
            });
        }
        if !self.discard_writes {
            self.insert_raw(namespace, key.as_str(), credential.clone());
        }
        Ok(())
    }

    fn delete_entry(&self, namespace: &str, key: &StorageKey) -> Result<()> {
        self.record(BackendCall::Delete(
            namespace.to_string(),
            key.as_str().to_string(),
        ));
        if self.reject_writes {
            return Err(CredentialError::BackendWrite {
                operation: "delete",
                namespace: namespace.to_string(),
                key: key.as_str().to_string(),
                reason: "deletes rejected".to_string(),
            });
        }
        if self.discard_writes {
            return Ok(());
        }

        let mut namespaces = self.namespaces.lock().expect("namespace lock poisoned");
        if let Some(entries) = namespaces.get_mut(namespace) {
            entries.remove(key.as_str());
            if entries.is_empty() {
                namespaces.remove(namespace);
            }
        }
        Ok(())
    }
}
