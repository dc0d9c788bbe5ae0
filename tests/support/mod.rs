#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use docker_credential_chamber::credentials::{ChamberBackend, ChamberConfig};
use tempfile::TempDir;

pub const SERVICE: &str = "docker-credentials-test";

/// How the fake chamber handles `write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Apply,
    Ignore,
    Fail,
}

/// A chamber stand-in: a shell script keeping one file per key under a temp dir.
///
/// Every invocation is appended to a call log together with the vault
/// variables it saw.
pub struct FakeChamber {
    dir: TempDir,
    pub program: PathBuf,
    pub root: PathBuf,
    pub log: PathBuf,
}

impl FakeChamber {
    pub fn new() -> Result<Self> {
        Self::with_write_mode(WriteMode::Apply)
    }

    pub fn with_write_mode(mode: WriteMode) -> Result<Self> {
        let dir = TempDir::new()?;
        let root = dir.path().join("store");
        let log = dir.path().join("calls.log");
        let program = dir.path().join("chamber");

        let write = match mode {
            WriteMode::Apply => r#"mkdir -p "$root/$2" && printf '%s' "$4" > "$root/$2/$3""#,
            WriteMode::Ignore => "exit 0",
            WriteMode::Fail => r#"echo "permission denied" >&2; exit 1"#,
        };
        let script = format!(
            r#"#!/bin/sh
root='{root}'
log='{log}'
echo "$1 token=${{VAULT_TOKEN:-}} addr=${{VAULT_ADDR:-}}" >> "$log"
case "$1" in
  list-services)
    echo "Service"
    if [ -d "$root" ]; then ls -1 "$root"; fi
    ;;
  export)
    dir="$root/$2"
    if [ ! -d "$dir" ]; then echo "service not found" >&2; exit 1; fi
    printf '{{'
    sep=''
    for f in "$dir"/*; do
      [ -e "$f" ] || continue
      printf '%s"%s":' "$sep" "$(basename "$f")"
      cat "$f"
      sep=','
    done
    printf '}}\n'
    ;;
  write)
    {write}
    ;;
  delete)
    if [ ! -f "$root/$2/$3" ]; then echo "secret not found" >&2; exit 1; fi
    rm "$root/$2/$3"
    rmdir "$root/$2" 2>/dev/null
    exit 0
    ;;
  *)
    echo "unknown command $1" >&2
    exit 2
    ;;
esac
"#,
            root = root.display(),
            log = log.display(),
        );

        fs::write(&program, script)?;
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755))?;

        Ok(Self {
            dir,
            program,
            root,
            log,
        })
    }

    pub fn backend(&self) -> ChamberBackend {
        ChamberBackend::new(ChamberConfig {
            program: self.program.clone(),
            ..ChamberConfig::default()
        })
    }

    /// Plant a raw value exactly as chamber would print it in export output.
    pub fn put_raw(&self, service: &str, key: &str, value: &str) -> Result<()> {
        let dir = self.root.join(service);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(key), value)?;
        Ok(())
    }

    pub fn keys(&self, service: &str) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.root.join(service)) else {
            return Vec::new();
        };
        let mut keys: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        keys.sort();
        keys
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
