//! CLI commands

// Deployment
pub mod upgrade;
pub mod restart;
pub mod rollback;
pub mod status;

// Preflight checks
pub mod valid_environment;
pub mod valid_secret;

// Secrets and database
pub mod patch_secret;
pub mod migrate;
pub mod dump;
