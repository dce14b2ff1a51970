// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment listing and selection

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GenerateError, Result};

/// A release entry of a deployment listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Release {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// One entry of `GET /deployments`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentSummary {
    pub name: String,
    #[serde(default)]
    pub releases: Vec<Release>,
}

/// Body of `GET /deployments/{name}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowDeployment {
    #[serde(default)]
    pub manifest: String,
}

impl DeploymentSummary {
    /// Whether every required release name appears in this deployment
    pub fn has_releases<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required
            .iter()
            .all(|name| self.releases.iter().any(|r| r.name == name.as_ref()))
    }
}

/// Pick the single deployment carrying all required releases
///
/// Zero or several matches are both ambiguous; there is no tie-breaking.
pub fn select_deployment<S: AsRef<str>>(
    listing: &[DeploymentSummary],
    required: &[S],
) -> Result<usize> {
    let mut selected = None;

    for (index, deployment) in listing.iter().enumerate() {
        if !deployment.has_releases(required) {
            continue;
        }

        debug!(deployment = %deployment.name, "Deployment carries the required releases");

        if selected.is_some() {
            return Err(GenerateError::AmbiguousDeployment);
        }
        selected = Some(index);
    }

    selected.ok_or(GenerateError::AmbiguousDeployment)
}
