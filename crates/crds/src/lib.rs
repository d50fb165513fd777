//! Cluster Hub CRD Definitions
//!
//! Kubernetes Custom Resource Definitions read and written by the hub
//! controllers.

pub mod condition;
pub mod managed_cluster;

pub use condition::*;
pub use managed_cluster::*;
