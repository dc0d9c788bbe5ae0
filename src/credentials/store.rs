//! Credential store over a secret backend.
//!
//! Every mutation re-reads the whole namespace, computes the desired set,
//! re-asserts it against the backend and then reads it back until the
//! backend reports exactly that set. There is no locking around this cycle:
//! two helpers mutating the same namespace concurrently can overwrite each
//! other. Callers are expected to run one helper at a time.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::codec::{self, StorageKey};
use super::{Credential, CredentialSet, SecretBackend};
use crate::clock::{Clock, SystemClock};
use crate::config::VerifyPolicy;
use crate::error::{CredentialError, Result};

pub struct CredentialStore<B, C = SystemClock> {
    backend: B,
    namespace: String,
    clock: C,
    policy: VerifyPolicy,
    loaded: Option<CredentialSet>,
}

impl<B: SecretBackend> CredentialStore<B> {
    pub fn new(backend: B, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            clock: SystemClock,
            policy: VerifyPolicy::default(),
            loaded: None,
        }
    }
}

impl<B: SecretBackend, C: Clock> CredentialStore<B, C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> CredentialStore<B, C2> {
        CredentialStore {
            backend: self.backend,
            namespace: self.namespace,
            clock,
            policy: self.policy,
            loaded: self.loaded,
        }
    }

    pub fn with_verify_policy(mut self, policy: VerifyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Look up the credential for a server. `Ok(None)` if there is none.
    pub fn get(&mut self, server_url: &str) -> Result<Option<Credential>> {
        let credential = self.current()?.get(server_url).cloned();
        if credential.is_none() {
            info!(namespace = %self.namespace, server = server_url, "no credentials stored for server");
        }
        Ok(credential)
    }

    /// Map of every stored server URL to its username.
    pub fn list(&mut self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .current()?
            .iter()
            .map(|(server, credential)| (server.clone(), credential.username.clone()))
            .collect())
    }

    /// Add or replace the credential for a server.
    pub fn put(&mut self, server_url: &str, credential: Credential) -> Result<()> {
        let current = self.load()?;
        let mut desired = current.clone();
        desired.insert(server_url.to_string(), credential);

        info!(namespace = %self.namespace, server = server_url, "storing credentials");
        self.commit(&current, desired, server_url)
    }

    /// Remove the credential for a server. Removing an absent server is a no-op.
    pub fn delete(&mut self, server_url: &str) -> Result<()> {
        let current = self.load()?;
        let mut desired = current.clone();
        if desired.remove(server_url).is_none() {
            info!(namespace = %self.namespace, server = server_url, "no credentials to erase");
        } else {
            info!(namespace = %self.namespace, server = server_url, "erasing credentials");
        }

        self.commit(&current, desired, server_url)
    }

    fn current(&mut self) -> Result<&CredentialSet> {
        let set = self.load()?;
        Ok(self.loaded.insert(set))
    }

    /// Take the cached set, reading it from the backend on first use.
    fn load(&mut self) -> Result<CredentialSet> {
        match self.loaded.take() {
            Some(set) => Ok(set),
            None => self.read_set(),
        }
    }

    /// Read the full namespace and decode its keys.
    ///
    /// Entries whose key does not decode are left out; mutations never touch them.
    fn read_set(&self) -> Result<CredentialSet> {
        let entries = self.backend.export_namespace(&self.namespace)?;
        let mut set = CredentialSet::new();
        for (key, credential) in entries {
            match codec::decode(&key) {
                Ok(server) => {
                    set.insert(server, credential);
                }
                Err(e) => {
                    warn!(namespace = %self.namespace, key = %key, error = %e, "skipping entry with undecodable key");
                }
            }
        }
        Ok(set)
    }

    fn commit(
        &mut self,
        current: &CredentialSet,
        desired: CredentialSet,
        server_url: &str,
    ) -> Result<()> {
        for server in current.keys().filter(|s| !desired.contains_key(*s)) {
            self.backend
                .delete_entry(&self.namespace, &StorageKey::for_server(server))?;
        }
        for (server, credential) in &desired {
            self.backend
                .write_entry(&self.namespace, &StorageKey::for_server(server), credential)?;
        }

        self.verify(&desired, server_url)?;
        self.loaded = Some(desired);
        Ok(())
    }

    /// Read back until the backend holds exactly `desired` or the window closes.
    fn verify(&self, desired: &CredentialSet, server_url: &str) -> Result<()> {
        let started = self.clock.now();
        let mut attempt = 1u32;
        loop {
            let observed = self.read_set()?;
            if &observed == desired {
                debug!(namespace = %self.namespace, attempt, "readback matches");
                return Ok(());
            }

            let waited = self.clock.elapsed_since(started);
            if waited >= self.policy.timeout {
                return Err(CredentialError::VerificationTimeout {
                    namespace: self.namespace.clone(),
                    server: server_url.to_string(),
                    waited,
                });
            }

            warn!(namespace = %self.namespace, attempt, "readback does not match yet, retrying");
            self.clock.sleep(self.policy.interval);
            attempt += 1;
        }
    }
}
