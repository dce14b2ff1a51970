// SPDX-License-Identifier: AGPL-3.0-or-later
//! The generation pipeline
//!
//! director → deployment → manifest → resolved plan → files on disk.
//! Nothing is written until every setting has resolved, so a run that
//! fails on the manifest leaves the output directory as it was.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::director::{select_deployment, DirectorClient};
use crate::error::{GenerateError, Result};
use crate::manifest::Manifest;
use crate::resolver::PropertyResolver;
use crate::script::{render_install_script, AdminCredentials, InstallerArguments};
use crate::secrets::SecretBundle;

/// Port the discovery socket "connects" to; no packet is ever sent
const DISCOVERY_PORT: u16 = 65530;

/// Inputs of one run
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Director URL including credentials
    pub director_url: String,
    /// Directory receiving the script and secret files
    pub output_dir: PathBuf,
    /// Address of this cell; discovered when absent
    pub machine_ip: Option<String>,
    /// Optional administrator account for the MSIs
    pub credentials: Option<AdminCredentials>,
    pub config: Config,
}

/// Resolved arguments plus the secret files they depend on
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub arguments: InstallerArguments,
    pub bundles: Vec<SecretBundle>,
}

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub deployment: String,
    pub script_path: PathBuf,
    pub secret_files: Vec<PathBuf>,
    pub arguments: InstallerArguments,
}

/// Run the whole pipeline against a live director
pub fn generate(options: &GenerateOptions) -> Result<GenerationReport> {
    let mut director = DirectorClient::new(&options.director_url, &options.config.director)?;
    director.authenticate()?;
    info!(director = %director.endpoint(), "Connected to BOSH director");

    let listing = director.deployments()?;
    let index = select_deployment(&listing, &options.config.selection.required_releases)?;
    let deployment = listing[index].name.clone();
    info!(deployment = %deployment, "Selected deployment");

    let manifest = Manifest::from_yaml(&director.manifest(&deployment)?)?;
    let plan = plan_installation(&manifest, options)?;

    let (script_path, secret_files, arguments) = write_installation(
        plan,
        &options.output_dir,
        &options.config.installer.script_name,
    )?;

    Ok(GenerationReport {
        deployment,
        script_path,
        secret_files,
        arguments,
    })
}

/// Resolve every setting of the manifest without touching the filesystem
pub fn plan_installation(manifest: &Manifest, options: &GenerateOptions) -> Result<InstallPlan> {
    let resolver = PropertyResolver::new(manifest)?;
    let installer = &options.config.installer;

    let mut arguments = InstallerArguments::default();
    let mut bundles = Vec::new();

    arguments.zone = installer.redundancy_zone.clone();
    arguments.stack = installer.stack.clone();
    arguments.credentials = options.credentials.clone();

    arguments.etcd_cluster = resolver.etcd_cluster()?;
    arguments.shared_secret = resolver.shared_secret()?;
    bundles.extend(resolver.metron_tls()?);
    arguments.syslog = resolver.syslog();

    let consul = resolver.consul(&installer.consul_domain)?;
    arguments.consul_ips = consul.servers.join(",");
    arguments.consul_domain = consul.domain;
    bundles.extend(consul.tls);

    arguments.machine_ip = match &options.machine_ip {
        Some(ip) => ip.clone(),
        None => discover_machine_ip(&consul.servers[0])?.to_string(),
    };

    bundles.extend(resolver.bbs_tls()?);

    Ok(InstallPlan { arguments, bundles })
}

/// Write secret bundles, then the script that references them
pub fn write_installation(
    plan: InstallPlan,
    output_dir: &Path,
    script_name: &str,
) -> Result<(PathBuf, Vec<PathBuf>, InstallerArguments)> {
    let InstallPlan {
        mut arguments,
        bundles,
    } = plan;

    std::fs::create_dir_all(output_dir)?;

    let mut secret_files = Vec::new();
    for bundle in &bundles {
        secret_files.extend(bundle.write_to(output_dir)?);
        arguments.enable_tls(bundle.feature);
    }

    let script_path = output_dir.join(script_name);
    std::fs::write(&script_path, render_install_script(&arguments))?;
    info!(script = %script_path.display(), "Wrote install script");

    Ok((script_path, secret_files, arguments))
}

/// Outbound address of this host towards `target`
///
/// Connecting a UDP socket only makes the kernel choose a route and source
/// address. It is a heuristic: on multi-homed hosts the address that reaches
/// consul is not necessarily the one other cells should use, so pass
/// `--machineIp` when it matters.
///
/// Host names are resolved first and every resolved address is tried, each
/// with a socket of the matching family.
pub fn discover_machine_ip(target: &str) -> Result<IpAddr> {
    let discovery_error = |message: String| GenerateError::MachineIpDiscovery {
        target: target.to_string(),
        message,
    };

    let candidates: Vec<SocketAddr> = (target, DISCOVERY_PORT)
        .to_socket_addrs()
        .map_err(|e| discovery_error(e.to_string()))?
        .collect();

    let mut last_error = None;
    for candidate in candidates {
        match outbound_address(candidate) {
            Ok(ip) => {
                warn!(machine_ip = %ip, via = %target, "Machine IP not given; using the outbound address");
                return Ok(ip);
            }
            Err(e) => {
                debug!(candidate = %candidate, error = %e, "Discovery attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(discovery_error(match last_error {
        Some(e) => e.to_string(),
        None => "name resolved to no addresses".to_string(),
    }))
}

fn outbound_address(candidate: SocketAddr) -> std::io::Result<IpAddr> {
    let bind_addr: SocketAddr = match candidate {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind_addr)?;
    socket.connect(candidate)?;
    Ok(socket.local_addr()?.ip())
}
