//! kchart Kube - cluster operations for kchart
//!
//! Everything here talks to the outside world through external processes:
//! - **Runner**: one execution primitive for kubectl, helm, aws and friends
//! - **Cluster**: namespace, pod, image and secret lookups via kubectl
//! - **Helm**: upgrade command construction for v1 and v2 charts
//! - **Registry**: ECR tag listing and rollback re-tagging
//! - **Secrets**: declared vs deployed secret key validation
//! - **Tunnel**: scoped port-forwards with guaranteed teardown
//! - **Database**: migrations and compressed dumps through a tunnel
//! - **Deploy**: upgrade, rollback and restart orchestration

pub mod actions;
pub mod cluster;
pub mod database;
pub mod deploy;
pub mod error;
pub mod helm;
pub mod mock;
pub mod registry;
pub mod runner;
pub mod secrets;
pub mod tunnel;

pub use actions::{DumpOptions, RollbackOptions, UpgradeOptions};
pub use cluster::Cluster;
pub use database::{Compressor, DatabaseOperations, DumpResult};
pub use deploy::{DeploymentStatus, Deployer, UpgradeOutcome};
pub use error::{KubeError, Result};
pub use helm::HelmUpgrade;
pub use mock::MockRunner;
pub use registry::{Registry, RollbackPlan};
pub use runner::{BackgroundProcess, CommandRunner, ExternalCommand, SystemRunner};
pub use secrets::SecretValidator;
pub use tunnel::{Tunnel, TunnelSpec, with_tunnel};
