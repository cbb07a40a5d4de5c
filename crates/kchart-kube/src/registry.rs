//! ECR tag history and rollback re-tagging
//!
//! A rollback publishes the manifest of an older image under a new
//! release-candidate tag, then deploys that tag like any other upgrade.

use kchart_core::{
    CoreError, TagOrder, compute_release_candidate, select_rollback_pair, sort_tags,
};
use std::collections::BTreeSet;
use std::io::Write;

use crate::error::{KubeError, Result};
use crate::runner::{CommandRunner, ExternalCommand};

/// aws CLI binary name
pub const AWS: &str = "aws";

/// What a rollback will publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackPlan {
    /// Registry repository (`chart/environment`)
    pub repository: String,
    /// Existing tag whose manifest is re-published
    pub base: String,
    /// Most recent tag in the registry
    pub current: String,
    /// New tag pointing at the base manifest
    pub new_tag: String,
}

/// ECR front-end bound to a command runner
pub struct Registry<'r, R: CommandRunner + ?Sized> {
    runner: &'r R,
    max_items: u32,
    tag_order: TagOrder,
}

impl<'r, R: CommandRunner + ?Sized> Registry<'r, R> {
    pub fn new(runner: &'r R, max_items: u32, tag_order: TagOrder) -> Self {
        Self {
            runner,
            max_items,
            tag_order,
        }
    }

    fn ecr<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner
            .run(&ExternalCommand::new(AWS).arg("ecr").args(args))
    }

    /// Tags of a repository, ordered for rollback selection
    pub fn list_versions(&self, repository: &str) -> Result<Vec<String>> {
        let out = self.ecr([
            "list-images".to_string(),
            "--repository-name".to_string(),
            repository.to_string(),
            "--output".to_string(),
            "text".to_string(),
            "--max-items".to_string(),
            self.max_items.to_string(),
        ])?;

        let mut tags: Vec<String> = parse_image_tags(&out).into_iter().collect();
        sort_tags(&mut tags, self.tag_order);

        tracing::debug!(repository, count = tags.len(), "listed registry tags");
        Ok(tags)
    }

    /// Decide which tag to re-publish and under which new tag
    ///
    /// An explicit version must already exist in the registry; otherwise the
    /// tag before the most recent one is used.
    pub fn resolve_rollback_target(
        &self,
        repository: &str,
        explicit_version: Option<&str>,
    ) -> Result<RollbackPlan> {
        let tags = self.list_versions(repository)?;
        let (previous, current) = select_rollback_pair(&tags)?;

        let base = match explicit_version {
            Some(version) if tags.iter().any(|t| t == version) => version.to_string(),
            Some(version) => {
                return Err(CoreError::VersionNotInRegistry {
                    version: version.to_string(),
                    repository: repository.to_string(),
                }
                .into());
            }
            None => previous,
        };

        let new_tag = compute_release_candidate(&current)?;

        Ok(RollbackPlan {
            repository: repository.to_string(),
            base,
            current,
            new_tag,
        })
    }

    /// Image manifest stored under `tag`
    pub fn fetch_manifest(&self, repository: &str, tag: &str) -> Result<String> {
        let manifest = self.ecr([
            "batch-get-image".to_string(),
            "--repository-name".to_string(),
            repository.to_string(),
            "--image-ids".to_string(),
            format!("imageTag={}", tag),
            "--query".to_string(),
            "images[].imageManifest".to_string(),
            "--output".to_string(),
            "text".to_string(),
        ])?;

        if manifest.trim().is_empty() {
            return Err(KubeError::EmptyManifest {
                repository: repository.to_string(),
                tag: tag.to_string(),
            });
        }
        Ok(manifest)
    }

    /// Publish `manifest` under `tag`
    pub fn put_image(&self, repository: &str, tag: &str, manifest: &str) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("kchart-manifest-")
            .suffix(".json")
            .tempfile()?;
        file.write_all(manifest.as_bytes())?;
        file.flush()?;

        self.ecr([
            "put-image".to_string(),
            "--repository-name".to_string(),
            repository.to_string(),
            "--image-tag".to_string(),
            tag.to_string(),
            "--image-manifest".to_string(),
            format!("file://{}", file.path().display()),
        ])?;
        Ok(())
    }

    /// Re-publish the plan's base manifest under its new tag
    pub fn retag(&self, plan: &RollbackPlan) -> Result<()> {
        let manifest = self.fetch_manifest(&plan.repository, &plan.base)?;
        self.put_image(&plan.repository, &plan.new_tag, &manifest)?;

        tracing::info!(
            repository = %plan.repository,
            base = %plan.base,
            new_tag = %plan.new_tag,
            "re-tagged image"
        );
        Ok(())
    }
}

/// Tags from `aws ecr list-images --output text`
///
/// Rows look like `IMAGEIDS <digest> <tag>`; untagged images have no third
/// column and pagination rows (`NEXTTOKEN ...`) are skipped.
fn parse_image_tags(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            if columns.next()? != "IMAGEIDS" {
                return None;
            }
            columns
                .find(|c| !c.starts_with("sha256:"))
                .map(str::to_string)
        })
        .collect()
}
