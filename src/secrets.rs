// SPDX-License-Identifier: AGPL-3.0-or-later
//! TLS material extraction and consul key derivation
//!
//! A bundle is validated as a whole before anything touches the disk, and
//! each file is written through a temporary name and renamed into place,
//! so an enabled feature either has all of its files or the run fails.

use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha1::Sha1;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{GenerateError, Result};
use crate::manifest::Node;

/// PBKDF2 rounds used for consul passphrases
pub const ENCRYPT_KEY_ITERATIONS: u32 = 20_000;

/// Length in bytes of a consul gossip key
pub const ENCRYPT_KEY_LEN: usize = 16;

/// TLS-backed features that ship key material to the cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsFeature {
    /// BBS client certificates
    Bbs,
    /// Consul agent certificates and gossip key
    Consul,
    /// Metron agent certificates
    Metron,
}

impl TlsFeature {
    pub fn name(&self) -> &'static str {
        match self {
            TlsFeature::Bbs => "bbs",
            TlsFeature::Consul => "consul",
            TlsFeature::Metron => "metron",
        }
    }
}

/// Where a secret comes from and which file it lands in
#[derive(Debug, Clone, Copy)]
pub struct SecretField {
    pub path: &'static str,
    pub file_name: &'static str,
}

const fn field(path: &'static str, file_name: &'static str) -> SecretField {
    SecretField { path, file_name }
}

pub const BBS_FIELDS: [SecretField; 3] = [
    field("diego.rep.bbs.client_cert", "bbs_client.crt"),
    field("diego.rep.bbs.client_key", "bbs_client.key"),
    field("diego.rep.bbs.ca_cert", "bbs_ca.crt"),
];

pub const CONSUL_FIELDS: [SecretField; 3] = [
    field("consul.agent_cert", "consul_agent.crt"),
    field("consul.agent_key", "consul_agent.key"),
    field("consul.ca_cert", "consul_ca.crt"),
];

pub const CONSUL_ENCRYPT_FILE: &str = "consul_encrypt.key";

pub const METRON_FIELDS: [SecretField; 3] = [
    field("metron_agent.tls.client_cert", "metron_agent.crt"),
    field("metron_agent.tls.client_key", "metron_agent.key"),
    field("loggregator.tls.ca_cert", "metron_ca.crt"),
];

/// Newer loggregator releases moved the metron certificates
pub const METRON_TLS_CLIENT_FIELDS: [SecretField; 3] = [
    field("metron_agent.tls_client.cert", "metron_agent.crt"),
    field("metron_agent.tls_client.key", "metron_agent.key"),
    field("loggregator.tls.ca", "metron_ca.crt"),
];

/// The complete, validated file set for one feature
#[derive(Debug, Clone)]
pub struct SecretBundle {
    pub feature: TlsFeature,
    pub files: Vec<(String, String)>,
}

impl SecretBundle {
    /// Read every field from one scope; the first missing one fails the bundle
    pub fn extract(feature: TlsFeature, scope: &Node, fields: &[SecretField]) -> Result<Self> {
        let files = fields
            .iter()
            .map(|f| {
                let contents = scope
                    .lookup_dotted(f.path)
                    .and_then(Node::scalar_text)
                    .ok_or_else(|| GenerateError::CertExtractionFailed {
                        feature: feature.name().to_string(),
                        path: f.path.to_string(),
                    })?;
                Ok((f.file_name.to_string(), contents))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { feature, files })
    }

    /// Add an extra file, e.g. the derived consul gossip key
    pub fn with_file(mut self, file_name: &str, contents: String) -> Self {
        self.files.push((file_name.to_string(), contents));
        self
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|(name, _)| name.as_str())
    }

    /// Write every file into `dir`, replacing existing files of the same name
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.files.len());

        for (file_name, contents) in &self.files {
            let target = dir.join(file_name);
            let mut temp = NamedTempFile::new_in(dir)?;
            temp.write_all(contents.as_bytes())?;
            temp.persist(&target).map_err(|e| e.error)?;
            debug!(feature = self.feature.name(), file = %target.display(), "Wrote secret file");
            written.push(target);
        }

        info!(feature = self.feature.name(), files = written.len(), "Extracted TLS material");
        Ok(written)
    }
}

/// Turn a consul `encrypt_keys` entry into a base64 gossip key
///
/// A value that base64-decodes to exactly 16 bytes is already a key and is
/// returned unchanged. Anything else is a passphrase and goes through
/// PBKDF2-HMAC-SHA1 with no salt.
pub fn derive_encrypt_key(value: &str) -> String {
    if let Ok(decoded) = BASE64.decode(value) {
        if decoded.len() == ENCRYPT_KEY_LEN {
            return value.to_string();
        }
    }

    let mut key = [0u8; ENCRYPT_KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha1>(value.as_bytes(), &[], ENCRYPT_KEY_ITERATIONS, &mut key);
    BASE64.encode(key)
}
