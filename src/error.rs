// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the install script generator

use thiserror::Error;

/// Result type alias for generator operations
pub type Result<T> = std::result::Result<T, GenerateError>;

/// Errors that abort a generation run
///
/// Every variant is terminal: the run stops and the binary exits non-zero.
#[derive(Error, Debug)]
pub enum GenerateError {
    /// The director could not be reached (DNS, refused connection, timeout)
    #[error("Unable to establish connection to BOSH Director: {message}")]
    TransportUnreachable { message: String },

    /// Credentials are missing from the director URL
    #[error("{message}")]
    AuthRequired { message: String },

    /// The director or UAA answered with a non-success status
    #[error("Unexpected BOSH director response: {status}, {body}")]
    UnexpectedResponse { status: u16, body: String },

    /// A response body did not have the expected shape
    #[error("Invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    /// Zero or several deployments carry the required releases
    #[error("BOSH Director does not have exactly one deployment containing a cf and diego release.")]
    AmbiguousDeployment,

    /// No job in the manifest hosts the rep
    #[error("Could not find a job with diego.rep properties in the deployment manifest")]
    MissingRepScope,

    /// A required setting could not be found in the job or global scope
    #[error("Missing required property '{setting}' (looked up '{path}')")]
    RequiredPropertyMissing { setting: String, path: String },

    /// The consul server list resolved to nothing
    #[error("Could not find any Consul VMs in your BOSH deployment")]
    NoConsulServers,

    /// A certificate or key needed by an enabled TLS feature is absent
    #[error("Failed to extract cert from deployment: {feature} is missing '{path}'")]
    CertExtractionFailed { feature: String, path: String },

    /// The outbound address of this host could not be determined
    #[error("Could not determine machine IP via {target}: {message}")]
    MachineIpDiscovery { target: String, message: String },

    /// The manifest text could not be decoded
    #[error("Invalid deployment manifest: {message}")]
    InvalidManifest { message: String },

    /// The director URL is malformed
    #[error("Invalid director URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration values
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
