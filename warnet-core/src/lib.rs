//! Warnet core library
//!
//! Everything the `warnet` command line drives: Kubernetes plumbing, the helm
//! driver, lnd chart rendering, project scaffolding, network deployment,
//! scenario execution and RPC access to the simulated nodes.

pub mod error;
pub mod logging;
pub mod process;

// Cluster access
pub mod helm;
pub mod kubernetes;

// Charts and projects
pub mod chart;
pub mod project;

// Network lifecycle
pub mod bitcoin;
pub mod image;
pub mod ln;
pub mod network;
pub mod scenario;
pub mod setup;

pub use error::{WarnetError, WarnetResult};
