//! Prints the ManagedCluster CustomResourceDefinition as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/managedclusters.yaml`

use crds::ManagedCluster;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&ManagedCluster::crd())?);
    Ok(())
}
