//! Template tag selection by semantic version range

use crate::error::RequestError;
use semver::{Version, VersionReq};
use std::future::Future;
use tracing::debug;

/// Picks the newest tag whose version satisfies a range
#[derive(Debug, Clone)]
pub struct TagSelector {
    prefix: String,
    range: VersionReq,
    prerelease: Option<String>,
}

impl TagSelector {
    /// `prefix` is stripped from each tag (e.g. `templates@`) before parsing
    pub fn new(prefix: impl Into<String>, range: VersionReq) -> Self {
        Self {
            prefix: prefix.into(),
            range,
            prerelease: None,
        }
    }

    /// Pin selection to the `0.0.0-<channel>` pre-release instead of the stable range
    pub fn with_prerelease(mut self, channel: Option<String>) -> Self {
        self.prerelease = channel.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Requirement actually used for selection
    fn effective_range(&self) -> VersionReq {
        match &self.prerelease {
            Some(channel) => VersionReq::parse(&format!("=0.0.0-{}", channel.trim()))
                .unwrap_or_else(|_| self.range.clone()),
            None => self.range.clone(),
        }
    }

    /// Select the best tag from a list; non-semver entries are ignored
    pub fn select<S: AsRef<str>>(&self, tags: &[S]) -> Option<String> {
        let range = self.effective_range();
        tags.iter()
            .filter_map(|tag| {
                let tag = tag.as_ref().trim();
                tag.strip_prefix(&self.prefix)
                    .and_then(|version| Version::parse(version).ok())
            })
            .filter(|version| range.matches(version))
            .max()
            .map(|version| format!("{}{}", self.prefix, version))
    }
}

/// Fetch the tag list once and select the newest matching tag
pub async fn select_version_tag<F, Fut>(
    get_tags: F,
    selector: &TagSelector,
) -> Result<Option<String>, RequestError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<String>, RequestError>>,
{
    let tags = get_tags().await?;
    let selected = selector.select(&tags);
    debug!(candidates = tags.len(), selected = ?selected, "selected template tag");
    Ok(selected)
}

/// Warn when a sample needs a newer CLI than the one running
///
/// Returns `None` when either version fails to parse.
pub fn check_compatibility(cli_version: &str, minimum_version: &str) -> Option<String> {
    let cli_ver = parse_version(cli_version)?;
    let minimum = parse_version(minimum_version)?;

    if cli_ver < minimum {
        Some(format!(
            "This sample requires CLI version {} or newer (running {})",
            minimum, cli_ver
        ))
    } else {
        None
    }
}

/// Parse a version, tolerating a leading `v`
fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim();
    Version::parse(version.strip_prefix('v').unwrap_or(version)).ok()
}

/// Split a newline-delimited tag list body into tags
pub fn parse_tag_list(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
