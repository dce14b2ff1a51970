// SPDX-License-Identifier: AGPL-3.0-or-later
//! Property resolution over the manifest
//!
//! Plain settings are read path by path: the first rep job's properties
//! win, and global properties fill in whatever the job leaves out.
//! Certificate bundles are the exception. Their files always come from a
//! single scope, chosen by where the bundle's anchor key lives.

use tracing::debug;

use crate::error::{GenerateError, Result};
use crate::manifest::{Job, Manifest, Node};
use crate::secrets::{
    derive_encrypt_key, SecretBundle, TlsFeature, BBS_FIELDS, CONSUL_ENCRYPT_FILE, CONSUL_FIELDS,
    METRON_FIELDS, METRON_TLS_CLIENT_FIELDS,
};

/// Which property set a value was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Job,
    Global,
}

/// Protocol value that turns on metron TLS
pub const METRON_TLS_PROTOCOL: &str = "tls";

/// Remote syslog destination
#[derive(Debug, Clone, PartialEq)]
pub struct SyslogTarget {
    pub address: String,
    pub port: Option<String>,
}

/// Everything resolved from the `consul` properties
#[derive(Debug, Clone)]
pub struct ConsulSettings {
    pub servers: Vec<String>,
    pub domain: String,
    /// Present when `require_ssl` is not disabled
    pub tls: Option<SecretBundle>,
}

/// Reads settings out of one manifest with job-then-global fallback
pub struct PropertyResolver<'a> {
    manifest: &'a Manifest,
    rep_job: &'a Job,
}

impl<'a> PropertyResolver<'a> {
    /// Fails when no job carries the rep marker
    pub fn new(manifest: &'a Manifest) -> Result<Self> {
        let rep_job = manifest.first_rep_job().ok_or(GenerateError::MissingRepScope)?;
        debug!(job = %rep_job.name, "Using rep job as property scope");
        Ok(Self { manifest, rep_job })
    }

    pub fn rep_job(&self) -> &'a Job {
        self.rep_job
    }

    /// Value at `path`, from the rep job if it has one, else from global properties
    pub fn lookup(&self, path: &str) -> Option<(ScopeKind, &'a Node)> {
        let found = match self.rep_job.properties.lookup_dotted(path) {
            Some(node) => Some((ScopeKind::Job, node)),
            None => self
                .manifest
                .properties
                .lookup_dotted(path)
                .map(|node| (ScopeKind::Global, node)),
        };
        if let Some((kind, _)) = found {
            debug!(path, scope = ?kind, "Resolved property");
        }
        found
    }

    fn value(&self, path: &str) -> Option<&'a Node> {
        self.lookup(path).map(|(_, node)| node)
    }

    /// Scope holding a bundle: the job when it carries any of `anchors`
    pub fn bundle_scope(&self, anchors: &[&str]) -> (ScopeKind, &'a Node) {
        if anchors
            .iter()
            .any(|anchor| self.rep_job.properties.contains(anchor))
        {
            (ScopeKind::Job, &self.rep_job.properties)
        } else {
            (ScopeKind::Global, &self.manifest.properties)
        }
    }

    fn bundle_scope_for(&self, feature: TlsFeature, anchors: &[&str]) -> &'a Node {
        let (kind, node) = self.bundle_scope(anchors);
        debug!(feature = feature.name(), scope = ?kind, "Resolved bundle scope");
        node
    }

    /// First etcd machine, used as the cluster address
    pub fn etcd_cluster(&self) -> Result<String> {
        const PATH: &str = "loggregator.etcd.machines";

        self.value(PATH)
            .and_then(Node::string_list)
            .and_then(|machines| machines.into_iter().next())
            .ok_or_else(|| missing("etcd cluster", PATH))
    }

    /// Loggregator shared secret
    pub fn shared_secret(&self) -> Result<String> {
        const PATH: &str = "metron_endpoint.shared_secret";

        self.value(PATH)
            .and_then(Node::scalar_text)
            .ok_or_else(|| missing("shared secret", PATH))
    }

    /// Metron certificates, when the preferred protocol is TLS
    pub fn metron_tls(&self) -> Result<Option<SecretBundle>> {
        let protocol = self
            .value("metron_agent.preferred_protocol")
            .and_then(Node::scalar_text);
        if protocol.as_deref() != Some(METRON_TLS_PROTOCOL) {
            return Ok(None);
        }

        let legacy = METRON_FIELDS[0].path;
        let current = METRON_TLS_CLIENT_FIELDS[0].path;
        let scope = self.bundle_scope_for(TlsFeature::Metron, &[legacy, current]);
        let fields = if scope.contains(legacy) {
            &METRON_FIELDS
        } else {
            &METRON_TLS_CLIENT_FIELDS
        };
        SecretBundle::extract(TlsFeature::Metron, scope, fields).map(Some)
    }

    /// Syslog drain; absent or null address means no syslog clause
    pub fn syslog(&self) -> Option<SyslogTarget> {
        Some(SyslogTarget {
            address: self
                .value("syslog_daemon_config.address")
                .and_then(Node::scalar_text)?,
            port: self
                .value("syslog_daemon_config.port")
                .and_then(Node::scalar_text),
        })
    }

    /// Consul servers, domain and (unless disabled) TLS material
    pub fn consul(&self, default_domain: &str) -> Result<ConsulSettings> {
        let servers = self
            .value("consul.agent.servers.lan")
            .and_then(Node::string_list)
            .unwrap_or_default();
        if servers.is_empty() {
            return Err(GenerateError::NoConsulServers);
        }

        let domain = self
            .value("consul.agent.domain")
            .and_then(Node::scalar_text)
            .filter(|domain| !domain.is_empty())
            .unwrap_or_else(|| default_domain.to_string());

        let tls = if self.require_ssl("consul.require_ssl") {
            let scope = self.bundle_scope_for(TlsFeature::Consul, &[CONSUL_FIELDS[0].path]);
            let encrypt_key = scope
                .lookup_dotted("consul.encrypt_keys")
                .and_then(Node::string_list)
                .and_then(|keys| keys.into_iter().next())
                .ok_or_else(|| GenerateError::CertExtractionFailed {
                    feature: TlsFeature::Consul.name().to_string(),
                    path: "consul.encrypt_keys".to_string(),
                })?;

            let bundle = SecretBundle::extract(TlsFeature::Consul, scope, &CONSUL_FIELDS)?
                .with_file(CONSUL_ENCRYPT_FILE, derive_encrypt_key(&encrypt_key));
            Some(bundle)
        } else {
            None
        };

        Ok(ConsulSettings {
            servers,
            domain,
            tls,
        })
    }

    /// BBS client certificates unless `require_ssl` is disabled
    pub fn bbs_tls(&self) -> Result<Option<SecretBundle>> {
        if !self.require_ssl("diego.rep.bbs.require_ssl") {
            return Ok(None);
        }
        let scope = self.bundle_scope_for(TlsFeature::Bbs, &[BBS_FIELDS[0].path]);
        SecretBundle::extract(TlsFeature::Bbs, scope, &BBS_FIELDS).map(Some)
    }

    /// Absent means required; only an explicit false turns TLS off
    fn require_ssl(&self, path: &str) -> bool {
        !matches!(self.value(path).and_then(Node::as_bool), Some(false))
    }
}

fn missing(setting: &str, path: &str) -> GenerateError {
    GenerateError::RequiredPropertyMissing {
        setting: setting.to_string(),
        path: path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(yaml: &str) -> Manifest {
        Manifest::from_yaml(yaml).unwrap()
    }

    const GLOBAL_ONLY: &str = r#"
jobs:
- name: cell_z1
  properties:
    diego:
      rep:
        zone: z1
properties:
  loggregator:
    etcd:
      machines: [etcd1.foo.bar, etcd2.foo.bar]
  metron_endpoint:
    shared_secret: secret123
  syslog_daemon_config:
    address: logs2.test.com
    port: 11111
  consul:
    agent:
      servers:
        lan: [consul1.foo.bar]
    require_ssl: false
  diego:
    rep:
      bbs:
        require_ssl: false
"#;

    #[test]
    fn test_missing_rep_job() {
        let manifest = manifest("jobs:\n- name: api\n  properties: {}\nproperties: {}\n");
        assert!(matches!(
            PropertyResolver::new(&manifest),
            Err(GenerateError::MissingRepScope)
        ));
    }

    #[test]
    fn test_global_fallback() {
        let manifest = manifest(GLOBAL_ONLY);
        let resolver = PropertyResolver::new(&manifest).unwrap();

        assert_eq!(resolver.etcd_cluster().unwrap(), "etcd1.foo.bar");
        assert_eq!(resolver.shared_secret().unwrap(), "secret123");
        assert_eq!(
            resolver.lookup("consul.agent.servers.lan").map(|(kind, _)| kind),
            Some(ScopeKind::Global)
        );
    }

    #[test]
    fn test_job_scope_wins_over_global() {
        let manifest = manifest(
            r#"
jobs:
- name: cell_z1
  properties:
    diego:
      rep: {}
    metron_endpoint:
      shared_secret: job-secret
properties:
  metron_endpoint:
    shared_secret: global-secret
"#,
        );
        let resolver = PropertyResolver::new(&manifest).unwrap();
        assert_eq!(resolver.shared_secret().unwrap(), "job-secret");
        assert_eq!(
            resolver.lookup("metron_endpoint.shared_secret").map(|(kind, _)| kind),
            Some(ScopeKind::Job)
        );
    }

    #[test]
    fn test_required_property_missing_names_path() {
        let manifest = manifest("jobs:\n- name: cell\n  properties:\n    diego:\n      rep: {}\n");
        let resolver = PropertyResolver::new(&manifest).unwrap();

        match resolver.shared_secret().unwrap_err() {
            GenerateError::RequiredPropertyMissing { setting, path } => {
                assert_eq!(setting, "shared secret");
                assert_eq!(path, "metron_endpoint.shared_secret");
            }
            other => panic!("Expected RequiredPropertyMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_etcd_machines_is_missing() {
        let manifest = manifest(
            "jobs:\n- name: cell\n  properties:\n    diego:\n      rep: {}\nproperties:\n  loggregator:\n    etcd:\n      machines: []\n",
        );
        let resolver = PropertyResolver::new(&manifest).unwrap();
        assert!(matches!(
            resolver.etcd_cluster(),
            Err(GenerateError::RequiredPropertyMissing { .. })
        ));
    }

    #[test]
    fn test_syslog_numeric_port_renders_as_string() {
        let manifest = manifest(GLOBAL_ONLY);
        let resolver = PropertyResolver::new(&manifest).unwrap();
        assert_eq!(
            resolver.syslog(),
            Some(SyslogTarget {
                address: "logs2.test.com".to_string(),
                port: Some("11111".to_string()),
            })
        );
    }

    #[test]
    fn test_syslog_null_address_is_unset() {
        let manifest = manifest(
            "jobs:\n- name: cell\n  properties:\n    diego:\n      rep: {}\nproperties:\n  syslog_daemon_config:\n    address: null\n    port: null\n",
        );
        let resolver = PropertyResolver::new(&manifest).unwrap();
        assert_eq!(resolver.syslog(), None);
    }

    #[test]
    fn test_explicit_false_disables_tls() {
        let manifest = manifest(GLOBAL_ONLY);
        let resolver = PropertyResolver::new(&manifest).unwrap();

        let consul = resolver.consul("cf.internal").unwrap();
        assert_eq!(consul.servers, vec!["consul1.foo.bar"]);
        assert_eq!(consul.domain, "cf.internal");
        assert!(consul.tls.is_none());
        assert!(resolver.bbs_tls().unwrap().is_none());
        assert!(resolver.metron_tls().unwrap().is_none());
    }

    #[test]
    fn test_absent_require_ssl_defaults_to_true() {
        let manifest = manifest(
            r#"
jobs:
- name: cell_z1
  properties:
    diego:
      rep:
        bbs:
          api_location: bbs.service.cf.internal:8889
properties:
  consul:
    agent:
      domain: custom.cf.internal
      servers:
        lan: [10.0.0.1, 10.0.0.2]
"#,
        );
        let resolver = PropertyResolver::new(&manifest).unwrap();

        match resolver.bbs_tls().unwrap_err() {
            GenerateError::CertExtractionFailed { feature, path } => {
                assert_eq!(feature, "bbs");
                assert_eq!(path, "diego.rep.bbs.client_cert");
            }
            other => panic!("Expected CertExtractionFailed, got {:?}", other),
        }
        match resolver.consul("cf.internal").unwrap_err() {
            GenerateError::CertExtractionFailed { path, .. } => {
                assert_eq!(path, "consul.encrypt_keys");
            }
            other => panic!("Expected CertExtractionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_etcd_falls_back_when_job_only_has_loggregator_tls() {
        let manifest = manifest(
            r#"
jobs:
- name: cell_z1
  properties:
    diego:
      rep: {}
    loggregator:
      tls:
        ca: METRON_CA_CERT
properties:
  loggregator:
    etcd:
      machines: [etcd1.foo.bar]
"#,
        );
        let resolver = PropertyResolver::new(&manifest).unwrap();
        assert_eq!(resolver.etcd_cluster().unwrap(), "etcd1.foo.bar");
    }

    #[test]
    fn test_scalars_fall_back_per_path() {
        let manifest = manifest(
            r#"
jobs:
- name: cell_z1
  properties:
    diego:
      rep: {}
    consul:
      agent:
        servers:
          lan: [consul1.foo.bar]
    syslog_daemon_config:
      address: logs.job.com
properties:
  consul:
    agent:
      domain: custom.internal
      servers:
        lan: [consul-global.foo.bar]
    require_ssl: false
  syslog_daemon_config:
    address: logs.global.com
    port: 5514
"#,
        );
        let resolver = PropertyResolver::new(&manifest).unwrap();

        let consul = resolver.consul("cf.internal").unwrap();
        assert_eq!(consul.servers, vec!["consul1.foo.bar"]);
        assert_eq!(consul.domain, "custom.internal");
        assert!(consul.tls.is_none());
        assert_eq!(
            resolver.syslog(),
            Some(SyslogTarget {
                address: "logs.job.com".to_string(),
                port: Some("5514".to_string()),
            })
        );
    }

    #[test]
    fn test_bundle_does_not_mix_scopes() {
        let manifest = manifest(
            r#"
jobs:
- name: cell_z1
  properties:
    diego:
      rep:
        bbs:
          client_cert: JOB_CERT
properties:
  diego:
    rep:
      bbs:
        client_cert: GLOBAL_CERT
        client_key: GLOBAL_KEY
        ca_cert: GLOBAL_CA
"#,
        );
        let resolver = PropertyResolver::new(&manifest).unwrap();
        match resolver.bbs_tls().unwrap_err() {
            GenerateError::CertExtractionFailed { path, .. } => {
                assert_eq!(path, "diego.rep.bbs.client_key");
            }
            other => panic!("Expected CertExtractionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_consul_tls_bundle_from_job_scope() {
        let manifest = manifest(
            r#"
jobs:
- name: cell_z1
  properties:
    diego:
      rep: {}
    consul:
      agent:
        servers:
          lan: [consul1.foo.bar]
      require_ssl: "true"
      agent_cert: CONSUL_AGENT_CERT
      agent_key: CONSUL_AGENT_KEY
      ca_cert: CONSUL_CA_CERT
      encrypt_keys: [password]
properties:
  consul:
    agent:
      domain: custom.internal
    agent_cert: GLOBAL_CONSUL_AGENT_CERT
"#,
        );
        let resolver = PropertyResolver::new(&manifest).unwrap();
        let consul = resolver.consul("cf.internal").unwrap();
        assert_eq!(consul.domain, "custom.internal");

        let bundle = consul.tls.unwrap();
        assert_eq!(
            bundle.file_names().collect::<Vec<_>>(),
            vec!["consul_agent.crt", "consul_agent.key", "consul_ca.crt", "consul_encrypt.key"]
        );
        assert_eq!(bundle.files[0].1, "CONSUL_AGENT_CERT");
        assert_eq!(bundle.files[3].1, "Hw4l6hR+Ch6yKyma7gL7Fw==");
    }

    #[test]
    fn test_no_consul_servers() {
        let manifest = manifest(
            "jobs:\n- name: cell\n  properties:\n    diego:\n      rep: {}\nproperties:\n  consul:\n    agent:\n      servers:\n        lan: []\n",
        );
        let resolver = PropertyResolver::new(&manifest).unwrap();
        assert!(matches!(
            resolver.consul("cf.internal"),
            Err(GenerateError::NoConsulServers)
        ));
    }

    #[test]
    fn test_metron_tls_layouts() {
        let legacy = manifest(
            r#"
jobs:
- name: cell_z1
  properties:
    diego:
      rep: {}
properties:
  metron_agent:
    preferred_protocol: tls
    tls:
      client_cert: METRON_AGENT_CERT
      client_key: METRON_AGENT_KEY
  loggregator:
    tls:
      ca_cert: METRON_CA_CERT
"#,
        );
        let resolver = PropertyResolver::new(&legacy).unwrap();
        let bundle = resolver.metron_tls().unwrap().unwrap();
        assert_eq!(bundle.files[0].1, "METRON_AGENT_CERT");
        assert_eq!(bundle.files[2].1, "METRON_CA_CERT");

        let current = manifest(
            r#"
jobs:
- name: cell_z1
  properties:
    diego:
      rep: {}
    metron_agent:
      preferred_protocol: tls
      tls_client:
        cert: METRON_AGENT_CERT
        key: METRON_AGENT_KEY
    loggregator:
      tls:
        ca: METRON_CA_CERT
"#,
        );
        let resolver = PropertyResolver::new(&current).unwrap();
        let bundle = resolver.metron_tls().unwrap().unwrap();
        assert_eq!(bundle.files[1].1, "METRON_AGENT_KEY");
        assert_eq!(bundle.files[2], ("metron_ca.crt".to_string(), "METRON_CA_CERT".to_string()));
    }

    #[test]
    fn test_metron_udp_is_not_tls() {
        let manifest = manifest(
            "jobs:\n- name: cell\n  properties:\n    diego:\n      rep: {}\n    metron_agent:\n      preferred_protocol: udp\n",
        );
        let resolver = PropertyResolver::new(&manifest).unwrap();
        assert!(resolver.metron_tls().unwrap().is_none());
    }
}
