// SPDX-License-Identifier: AGPL-3.0-or-later
//! BOSH director access
//!
//! Authentication, deployment listing and selection of the single
//! deployment that runs Diego.

mod client;
mod deployments;

pub use client::{AuthContext, DirectorClient, DirectorResponse};
pub use deployments::{select_deployment, DeploymentSummary, Release, ShowDeployment};
