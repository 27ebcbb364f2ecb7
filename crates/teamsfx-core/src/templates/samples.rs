//! Remote sample catalogue

use serde::{Deserialize, Serialize};
use url::Url;

/// Sample catalogue document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleConfig {
    #[serde(default)]
    pub version: Option<String>,
    pub samples: Vec<SampleInfo>,
}

impl SampleConfig {
    /// Look up a sample by id (case-insensitive)
    pub fn find(&self, id: &str) -> Option<&SampleInfo> {
        self.samples
            .iter()
            .find(|sample| sample.id.eq_ignore_ascii_case(id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub full_description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Oldest CLI version able to scaffold this sample
    #[serde(default)]
    pub minimum_toolkit_version: Option<String>,
    pub download_url_info: DownloadUrlInfo,
}

/// Where a sample lives in source control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadUrlInfo {
    pub owner: String,
    pub repository: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Sample directory inside the repository
    pub dir: String,
}

impl DownloadUrlInfo {
    /// `<base>/<owner>/<repository>/archive/<ref>.zip`
    pub fn archive_url(&self, base: &Url) -> Result<Url, url::ParseError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(&self.owner)
            .push(&self.repository)
            .push("archive");
        // refs such as `releases/v3` keep their slashes
        for segment in self.git_ref.split('/') {
            url.path_segments_mut()
                .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
                .push(segment);
        }
        let path = format!("{}.zip", url.path());
        url.set_path(&path);
        Ok(url)
    }

    /// Path of an archive entry relative to the sample directory
    ///
    /// Source-hosting archives wrap everything in one top-level folder whose
    /// name depends on the ref, so the first component is skipped. Entries
    /// outside the sample directory yield `None`.
    pub fn sample_relative_path<'a>(&self, entry: &'a str) -> Option<&'a str> {
        let (_, in_repo) = entry.split_once('/')?;
        let dir = self.dir.trim_matches('/');
        if dir.is_empty() {
            return Some(in_repo).filter(|path| !path.is_empty());
        }
        in_repo
            .strip_prefix(dir)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|path| !path.is_empty())
    }
}
