//! Known hosts trust store
//!
//! Reads and appends OpenSSH `known_hosts` text. Hashed host entries are
//! skipped. A missing or unreadable file behaves as an empty store.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::RwLock;
use russh::keys::{PublicKey, PublicKeyBase64};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::error::SshError;

/// A server host key as it appears on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKey {
    /// Algorithm name, e.g. `ssh-ed25519`
    pub algorithm: String,
    /// SSH wire encoding of the public key
    pub blob: Vec<u8>,
}

impl HostKey {
    pub fn new(algorithm: impl Into<String>, blob: Vec<u8>) -> Self {
        Self {
            algorithm: algorithm.into(),
            blob,
        }
    }

    pub fn from_public_key(key: &PublicKey) -> Self {
        Self::new(key.algorithm().as_str(), key.public_key_bytes())
    }

    /// `SHA256:<base64>` over the key blob
    pub fn fingerprint(&self) -> String {
        let hash = Sha256::digest(&self.blob);
        format!("SHA256:{}", BASE64.encode(hash).trim_end_matches('='))
    }

    /// Short key type shown to the user
    pub fn label(&self) -> String {
        match self.algorithm.as_str() {
            "ssh-ed25519" => "ED25519".to_string(),
            "ssh-rsa" | "rsa-sha2-256" | "rsa-sha2-512" => "RSA".to_string(),
            "ssh-dss" => "DSA".to_string(),
            a if a.starts_with("ecdsa-") => "ECDSA".to_string(),
            other => other.to_uppercase(),
        }
    }

    fn encoded(&self) -> String {
        BASE64.encode(&self.blob)
    }
}

/// Result of host key verification
#[derive(Debug, Clone, PartialEq)]
pub enum HostKeyVerification {
    /// Key matches a known_hosts entry
    Verified,
    /// No entry of this key type for the host
    Unknown,
    /// Key differs from the stored one
    Changed { expected_fingerprint: String },
}

/// Entry in known_hosts: (key_type, base64_key)
#[derive(Clone, Debug)]
struct HostKeyEntry {
    key_type: String,
    key_data: String,
}

pub struct KnownHostsStore {
    /// host -> keys (one per key type)
    hosts: RwLock<HashMap<String, Vec<HostKeyEntry>>>,
    path: PathBuf,
}

impl KnownHostsStore {
    /// Open the store at `path`; read failures leave it empty
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let hosts = match Self::load(&path) {
            Ok(hosts) => hosts,
            Err(e) => {
                debug!("Known hosts file {} not usable: {}", path.display(), e);
                HashMap::new()
            }
        };
        Self {
            hosts: RwLock::new(hosts),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<HashMap<String, Vec<HostKeyEntry>>, SshError> {
        let mut hosts: HashMap<String, Vec<HostKeyEntry>> = HashMap::new();
        if !path.exists() {
            return Ok(hosts);
        }

        let reader = BufReader::new(fs::File::open(path)?);
        let mut entry_count = 0;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // hostname[,alias] keytype base64key [comment]
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 || parts[0].starts_with('@') {
                continue;
            }

            let entry = HostKeyEntry {
                key_type: parts[1].to_string(),
                key_data: parts[2].to_string(),
            };
            for hostname in parts[0].split(',') {
                if hostname.starts_with('|') {
                    continue;
                }
                hosts
                    .entry(hostname.to_lowercase())
                    .or_default()
                    .push(entry.clone());
                entry_count += 1;
            }
        }

        debug!(
            "Loaded {} known host entries ({} unique hosts)",
            entry_count,
            hosts.len()
        );
        Ok(hosts)
    }

    /// Lookup key for host:port in known_hosts syntax
    fn make_key(host: &str, port: u16) -> String {
        let host = host.to_lowercase();
        if port == 22 {
            host
        } else {
            format!("[{}]:{}", host, port)
        }
    }

    pub fn verify(&self, host: &str, port: u16, key: &HostKey) -> HostKeyVerification {
        let lookup_key = Self::make_key(host, port);
        let actual = key.encoded();
        let hosts = self.hosts.read();

        let Some(entries) = hosts.get(&lookup_key) else {
            debug!("Unknown host: {}", lookup_key);
            return HostKeyVerification::Unknown;
        };

        match entries.iter().find(|e| e.key_type == key.algorithm) {
            Some(entry) if entry.key_data == actual => {
                debug!("Host key verified for {} (type: {})", lookup_key, key.algorithm);
                HostKeyVerification::Verified
            }
            Some(entry) => {
                let expected_fingerprint = BASE64
                    .decode(&entry.key_data)
                    .map(|blob| HostKey::new(entry.key_type.clone(), blob).fingerprint())
                    .unwrap_or_else(|_| "unknown".to_string());
                warn!(
                    "HOST KEY CHANGED for {} (type: {})! Expected {}, got {}",
                    lookup_key,
                    key.algorithm,
                    expected_fingerprint,
                    key.fingerprint()
                );
                HostKeyVerification::Changed { expected_fingerprint }
            }
            None => {
                debug!("Host {} known but no {} key stored", lookup_key, key.algorithm);
                HostKeyVerification::Unknown
            }
        }
    }

    /// Trust `key` for this process and append it to the file
    ///
    /// The in-memory entry is kept even when the append fails.
    pub fn add_host(&self, host: &str, port: u16, key: &HostKey) -> Result<(), SshError> {
        let lookup_key = Self::make_key(host, port);
        let key_b64 = key.encoded();

        self.hosts
            .write()
            .entry(lookup_key.clone())
            .or_default()
            .push(HostKeyEntry {
                key_type: key.algorithm.clone(),
                key_data: key_b64.clone(),
            });

        self.append_to_file(&lookup_key, &key.algorithm, &key_b64)?;
        info!("Added host key for {} (type: {}) to known_hosts", lookup_key, key.algorithm);
        Ok(())
    }

    fn append_to_file(&self, host: &str, key_type: &str, key_b64: &str) -> Result<(), SshError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{} {} {}", host, key_type, key_b64)?;
        Ok(())
    }
}
