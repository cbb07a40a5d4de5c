//! Deployed image references
//!
//! A running pod reports its image as `registry/chart:environment-version`.
//! Older deployments used `registry/chart/environment:version`; both layouts
//! are understood.

use std::fmt;

use crate::environment::{EnvironmentDescriptor, Environments};
use crate::error::{CoreError, Result};

/// A container image split into its deployment coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry host (and any path before the chart segment)
    pub registry: String,

    /// Chart identity embedded in the image path
    pub chart: String,

    /// Environment the image was built for
    pub environment: String,

    /// Version tag
    pub version: String,
}

impl ImageReference {
    /// Parse an image string, using the known environment names to split the tag
    pub fn parse<'a>(
        image: &str,
        known_environments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let invalid = |message: &str| CoreError::InvalidImage {
            image: image.to_string(),
            message: message.to_string(),
        };

        let known: Vec<&str> = known_environments.into_iter().collect();
        let trimmed = image.trim();
        // Drop a pinned digest, it carries no deployment coordinates
        let without_digest = trimmed.split('@').next().unwrap_or(trimmed);

        let (path, tag) = match without_digest.rsplit_once(':') {
            Some((path, tag)) if !tag.contains('/') && !tag.is_empty() => (path, tag),
            _ => return Err(invalid("missing tag")),
        };

        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("expected registry/chart:environment-version"));
        }

        let last = segments[segments.len() - 1];
        if segments.len() >= 3 && known.contains(&last) {
            return Ok(Self {
                registry: segments[..segments.len() - 2].join("/"),
                chart: segments[segments.len() - 2].to_string(),
                environment: last.to_string(),
                version: tag.to_string(),
            });
        }

        let (environment, version) =
            split_environment_tag(tag, &known).ok_or_else(|| invalid("tag is not environment-version"))?;

        Ok(Self {
            registry: segments[..segments.len() - 1].join("/"),
            chart: last.to_string(),
            environment: environment.to_string(),
            version: version.to_string(),
        })
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{}-{}",
            self.registry, self.chart, self.environment, self.version
        )
    }
}

/// Split `environment-version`, preferring the longest known environment name
fn split_environment_tag<'t>(tag: &'t str, known: &[&str]) -> Option<(&'t str, &'t str)> {
    let matched = known
        .iter()
        .filter(|env| {
            tag.len() > env.len() + 1
                && tag.starts_with(*env)
                && tag.as_bytes()[env.len()] == b'-'
        })
        .max_by_key(|env| env.len());

    let (environment, version) = match matched {
        Some(env) => (&tag[..env.len()], &tag[env.len() + 1..]),
        None => tag.split_once('-')?,
    };

    if environment.is_empty() || version.is_empty() {
        return None;
    }
    Some((environment, version))
}

/// Resolve the environment a deployed image belongs to and its version
///
/// The chart embedded in the image must be the chart this repository deploys
/// to that environment; anything else means the operator is pointed at the
/// wrong namespace or cluster.
pub fn extract_env_version<'e>(
    image: &str,
    environments: &'e Environments,
) -> Result<(&'e EnvironmentDescriptor, String)> {
    let reference = ImageReference::parse(image, environments.names())?;

    let descriptor =
        environments
            .get(&reference.environment)
            .ok_or_else(|| CoreError::UnknownEnvironment {
                environment: reference.environment.clone(),
            })?;

    if descriptor.chart != reference.chart {
        return Err(CoreError::ChartMismatch {
            environment: descriptor.name.clone(),
            expected: descriptor.chart.clone(),
            found: reference.chart,
        });
    }

    Ok((descriptor, reference.version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::ValuesFile;

    fn environments() -> Environments {
        let files = [
            ("values.yaml", "registry/payments/production"),
            ("values-staging.yaml", "registry/payments/staging"),
            ("values-staging-eu.yaml", "registry/payments/staging-eu"),
        ]
        .map(|(path, repo)| {
            ValuesFile::from_yaml(path, &format!("image:\n  repository: {}\n", repo)).unwrap()
        });
        Environments::from_values(&files)
    }

    #[test]
    fn test_parse_environment_version_layout() {
        let image = ImageReference::parse("registry/payments:staging-2.4.0", ["staging"]).unwrap();
        assert_eq!(image.registry, "registry");
        assert_eq!(image.chart, "payments");
        assert_eq!(image.environment, "staging");
        assert_eq!(image.version, "2.4.0");
        assert_eq!(image.to_string(), "registry/payments:staging-2.4.0");
    }

    #[test]
    fn test_parse_prefers_longest_environment() {
        let image = ImageReference::parse(
            "registry/payments:staging-eu-1.0.0-rc.2",
            ["staging", "staging-eu"],
        )
        .unwrap();
        assert_eq!(image.environment, "staging-eu");
        assert_eq!(image.version, "1.0.0-rc.2");
    }

    #[test]
    fn test_parse_unknown_environment_splits_on_first_dash() {
        let image = ImageReference::parse("registry/payments:qa-1.0.0", Vec::new()).unwrap();
        assert_eq!(image.environment, "qa");
        assert_eq!(image.version, "1.0.0");
    }

    #[test]
    fn test_parse_registry_with_port_and_path() {
        let image = ImageReference::parse(
            "123.dkr.ecr.us-east-1.amazonaws.com:443/team/payments:production-3.1.4",
            ["production"],
        )
        .unwrap();
        assert_eq!(image.registry, "123.dkr.ecr.us-east-1.amazonaws.com:443/team");
        assert_eq!(image.chart, "payments");
    }

    #[test]
    fn test_parse_legacy_layout() {
        let image =
            ImageReference::parse("registry/payments/staging:2.4.0", ["staging"]).unwrap();
        assert_eq!(image.chart, "payments");
        assert_eq!(image.environment, "staging");
        assert_eq!(image.version, "2.4.0");
    }

    #[test]
    fn test_parse_strips_digest() {
        let image = ImageReference::parse(
            "registry/payments:staging-2.4.0@sha256:abcdef",
            ["staging"],
        )
        .unwrap();
        assert_eq!(image.version, "2.4.0");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ImageReference::parse("payments", ["staging"]).is_err());
        assert!(ImageReference::parse("payments:staging-1.0.0", ["staging"]).is_err());
        assert!(ImageReference::parse("registry/payments:latest", ["staging"]).is_err());
        assert!(ImageReference::parse("registry/payments:staging-", ["staging"]).is_err());
        assert!(ImageReference::parse("", ["staging"]).is_err());
    }

    #[test]
    fn test_extract_env_version() {
        let envs = environments();
        let (env, version) = extract_env_version("registry/payments:staging-2.4.0", &envs).unwrap();
        assert_eq!(env.name, "staging");
        assert_eq!(env.values_file.to_str(), Some("values-staging.yaml"));
        assert_eq!(version, "2.4.0");
    }

    #[test]
    fn test_extract_env_version_chart_mismatch() {
        let envs = environments();
        let err = extract_env_version("registry/billing:staging-2.4.0", &envs).unwrap_err();
        match err {
            CoreError::ChartMismatch {
                environment,
                expected,
                found,
            } => {
                assert_eq!(environment, "staging");
                assert_eq!(expected, "payments");
                assert_eq!(found, "billing");
            }
            other => panic!("expected chart mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_env_version_unknown_environment() {
        let envs = environments();
        let err = extract_env_version("registry/payments:qa-2.4.0", &envs).unwrap_err();
        assert!(matches!(err, CoreError::UnknownEnvironment { .. }));
    }
}
