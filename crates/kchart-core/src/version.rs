//! Release versions and rollback tag arithmetic
//!
//! Rolling back re-publishes an older image under a brand-new tag, because
//! the registry refuses to point an existing tag at different content. The
//! new tag is always a release candidate one step ahead of what is deployed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{CoreError, Result};

/// Registry tag that never names a real release
pub const LATEST_TAG: &str = "latest";

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)(?:-rc\.(\d+))?$").expect("version pattern is valid")
});

/// `MAJOR.MINOR.PATCH[-rc.N]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReleaseVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Release-candidate counter, 0 when the version is not a pre-release
    pub rc: u64,
}

impl ReleaseVersion {
    pub fn parse(version: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidVersion {
            version: version.to_string(),
        };

        let captures = VERSION_PATTERN.captures(version.trim()).ok_or_else(invalid)?;
        let number = |index: usize| -> Result<u64> {
            captures
                .get(index)
                .map_or(Ok(0), |m| m.as_str().parse().map_err(|_| invalid()))
        };

        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            rc: number(4)?,
        })
    }

    /// Next release candidate
    ///
    /// A final release moves to the next patch; an existing candidate keeps
    /// its patch. The candidate counter always advances by one.
    pub fn next_release_candidate(self) -> Result<Self> {
        let overflow = || CoreError::InvalidVersion {
            version: self.to_string(),
        };
        let patch = if self.rc == 0 {
            self.patch.checked_add(1).ok_or_else(overflow)?
        } else {
            self.patch
        };
        Ok(Self {
            patch,
            rc: self.rc.checked_add(1).ok_or_else(overflow)?,
            ..self
        })
    }

    pub fn is_release_candidate(&self) -> bool {
        self.rc > 0
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.rc > 0 {
            write!(f, "-rc.{}", self.rc)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ReleaseVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Compute the release-candidate tag that follows `current`
pub fn compute_release_candidate(current: &str) -> Result<String> {
    Ok(ReleaseVersion::parse(current)?
        .next_release_candidate()?
        .to_string())
}

/// Pick `(previous, current)` from an ordered tag list
///
/// Tags that are neither release versions nor `latest` are ignored. Of the
/// rest, the last two entries are used. When the list ends with `latest`,
/// that tag and the release it was pushed alongside are both skipped.
pub fn select_rollback_pair(tags: &[String]) -> Result<(String, String)> {
    let tags: Vec<String> = tags
        .iter()
        .filter(|tag| *tag == LATEST_TAG || ReleaseVersion::parse(tag).is_ok())
        .cloned()
        .collect();

    let versions = match tags.split_last() {
        Some((last, rest)) if last == LATEST_TAG => {
            rest.split_last().map_or(rest, |(_, older)| older)
        }
        _ => tags.as_slice(),
    };

    match versions {
        [.., previous, current] => Ok((previous.clone(), current.clone())),
        _ => Err(CoreError::NotEnoughTags {
            needed: 2,
            found: versions.len(),
        }),
    }
}

/// How registry tags are ordered before picking rollback candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagOrder {
    /// Semantic-version order; non-version tags sort last, lexically
    #[default]
    Semantic,
    /// Plain string order (`1.0.10` sorts before `1.0.9`)
    Lexical,
}

/// Sort tags in place according to `order`
pub fn sort_tags(tags: &mut [String], order: TagOrder) {
    match order {
        TagOrder::Lexical => tags.sort(),
        TagOrder::Semantic => tags.sort_by(|a, b| compare_semantic(a, b)),
    }
}

fn compare_semantic(a: &str, b: &str) -> Ordering {
    let parse = |tag: &str| semver::Version::parse(tag.strip_prefix('v').unwrap_or(tag)).ok();

    match (parse(a), parse(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
