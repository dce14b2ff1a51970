// SPDX-License-Identifier: AGPL-3.0-or-later
//! Install script generator for Windows Diego cells
//!
//! Reads a BOSH director, finds the single deployment that runs Diego and
//! turns its manifest into an `install.bat` plus the TLS material the
//! installers need.
//!
//! # Features
//!
//! * **Director access:** basic or UAA authentication, discovered from `/info`
//! * **Scoped resolution:** rep job properties first, global properties second
//! * **Secret extraction:** BBS, consul and metron certificates, consul gossip key derivation

pub mod config;
pub mod director;
pub mod error;
pub mod generate;
pub mod manifest;
pub mod resolver;
pub mod script;
pub mod secrets;

pub use config::Config;
pub use error::{GenerateError, Result};
pub use generate::{generate, GenerateOptions, GenerationReport};
