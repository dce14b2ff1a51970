// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment manifest decoding
//!
//! A manifest is a list of jobs, each with its own properties, plus a
//! global `properties` section. Only the parts the generator reads are
//! lifted into types; everything below `properties` stays a [`Node`] tree.

mod node;

pub use node::{Node, Scalar};

use crate::error::{GenerateError, Result};

/// Path whose presence marks a job as hosting the rep
pub const REP_MARKER: &str = "diego.rep";

/// One job (role) of the deployment
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub properties: Node,
}

/// The decoded manifest of one deployment
#[derive(Debug, Clone)]
pub struct Manifest {
    pub name: Option<String>,
    pub jobs: Vec<Job>,
    pub properties: Node,
}

impl Manifest {
    /// Decode manifest YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| GenerateError::InvalidManifest {
                message: e.to_string(),
            })?;
        let root = Node::from(value);

        if !matches!(root, Node::Mapping(_)) {
            return Err(GenerateError::InvalidManifest {
                message: "top level is not a mapping".to_string(),
            });
        }

        let jobs = root
            .get("jobs")
            .and_then(Node::as_sequence)
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(index, job)| Job {
                name: job
                    .get("name")
                    .and_then(Node::scalar_text)
                    .unwrap_or_else(|| format!("job-{}", index)),
                properties: job
                    .get("properties")
                    .cloned()
                    .unwrap_or_else(Node::empty_mapping),
            })
            .collect();

        Ok(Manifest {
            name: root.get("name").and_then(Node::scalar_text),
            jobs,
            properties: root
                .get("properties")
                .cloned()
                .unwrap_or_else(Node::empty_mapping),
        })
    }

    /// First job whose properties carry the rep marker
    pub fn first_rep_job(&self) -> Option<&Job> {
        self.jobs.iter().find(|job| job.properties.contains(REP_MARKER))
    }
}
