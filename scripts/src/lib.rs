//! Scripts for deploying ordered sets of interdependent contracts, such as the
//! identity registries and their upgradeable proxies.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod chain;
pub mod cli;
mod commands;
pub mod constants;
pub mod deployments;
pub mod errors;
pub mod orchestrator;
pub mod plan;
pub mod presets;
pub mod remappings;
mod solidity;
pub mod types;
