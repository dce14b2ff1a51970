// SPDX-License-Identifier: AGPL-3.0-or-later
//! Installer arguments and the rendered `install.bat`

use crate::resolver::SyslogTarget;
use crate::secrets::TlsFeature;

const DIEGO_MSI: &str = r"%~dp0\DiegoWindows.msi";
const GARDEN_MSI: &str = r"%~dp0\GardenWindows.msi";
const ETCD_PORT: u16 = 4001;
const CONTINUATION: &str = " ^\r\n  ";

/// Administrator account the MSIs configure on the cell
#[derive(Debug, Clone, PartialEq)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

/// Flat record handed to the script renderer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallerArguments {
    pub etcd_cluster: String,
    pub shared_secret: String,
    pub zone: String,
    pub stack: String,
    pub machine_ip: String,
    pub consul_ips: String,
    pub consul_domain: String,
    pub syslog: Option<SyslogTarget>,
    pub credentials: Option<AdminCredentials>,
    bbs_require_ssl: bool,
    consul_require_ssl: bool,
    metron_prefer_tls: bool,
}

impl InstallerArguments {
    /// Record that a feature's files are on disk; only then is its clause rendered
    pub fn enable_tls(&mut self, feature: TlsFeature) {
        match feature {
            TlsFeature::Bbs => self.bbs_require_ssl = true,
            TlsFeature::Consul => self.consul_require_ssl = true,
            TlsFeature::Metron => self.metron_prefer_tls = true,
        }
    }

    pub fn tls_enabled(&self, feature: TlsFeature) -> bool {
        match feature {
            TlsFeature::Bbs => self.bbs_require_ssl,
            TlsFeature::Consul => self.consul_require_ssl,
            TlsFeature::Metron => self.metron_prefer_tls,
        }
    }
}

/// Render the batch script, CRLF line endings throughout
pub fn render_install_script(args: &InstallerArguments) -> String {
    let mut diego = Vec::new();

    if let Some(credentials) = &args.credentials {
        diego.push(format!("ADMIN_USERNAME={}", credentials.username));
        diego.push(format!(r#"ADMIN_PASSWORD="""{}""""#, credentials.password));
    }
    if args.bbs_require_ssl {
        diego.push(file_param("BBS_CA_FILE", "bbs_ca.crt"));
        diego.push(file_param("BBS_CLIENT_CERT_FILE", "bbs_client.crt"));
        diego.push(file_param("BBS_CLIENT_KEY_FILE", "bbs_client.key"));
    }
    diego.push(format!("CONSUL_DOMAIN={}", args.consul_domain));
    diego.push(format!("CONSUL_IPS={}", args.consul_ips));
    diego.push(format!("CF_ETCD_CLUSTER=http://{}:{}", args.etcd_cluster, ETCD_PORT));
    diego.push(format!("STACK={}", args.stack));
    diego.push(format!("REDUNDANCY_ZONE={}", args.zone));
    diego.push(format!("LOGGREGATOR_SHARED_SECRET={}", args.shared_secret));
    diego.push(format!("MACHINE_IP={}", args.machine_ip));
    diego.extend(syslog_params(args));
    if args.consul_require_ssl {
        diego.push(file_param("CONSUL_ENCRYPT_FILE", "consul_encrypt.key"));
        diego.push(file_param("CONSUL_CA_FILE", "consul_ca.crt"));
        diego.push(file_param("CONSUL_AGENT_CERT_FILE", "consul_agent.crt"));
        diego.push(file_param("CONSUL_AGENT_KEY_FILE", "consul_agent.key"));
    }
    if args.metron_prefer_tls {
        diego.push(file_param("METRON_CA_FILE", "metron_ca.crt"));
        diego.push(file_param("METRON_AGENT_CERT_FILE", "metron_agent.crt"));
        diego.push(file_param("METRON_AGENT_KEY_FILE", "metron_agent.key"));
    }

    let mut garden = vec![format!("MACHINE_IP={}", args.machine_ip)];
    garden.extend(syslog_params(args));

    format!(
        "{}\r\n\r\n{}\r\n",
        msiexec(DIEGO_MSI, &diego),
        msiexec(GARDEN_MSI, &garden)
    )
}

fn msiexec(package: &str, params: &[String]) -> String {
    let mut line = format!("msiexec /passive /norestart /i {}", package);
    for param in params {
        line.push_str(CONTINUATION);
        line.push_str(param);
    }
    line
}

fn file_param(name: &str, file_name: &str) -> String {
    format!(r"{}=%~dp0\{}", name, file_name)
}

fn syslog_params(args: &InstallerArguments) -> Vec<String> {
    match &args.syslog {
        Some(syslog) => vec![
            format!("SYSLOG_HOST_IP={}", syslog.address),
            format!("SYSLOG_PORT={}", syslog.port.as_deref().unwrap_or_default()),
        ],
        None => Vec::new(),
    }
}
