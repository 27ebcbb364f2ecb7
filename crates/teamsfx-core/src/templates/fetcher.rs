//! Template and sample fetching from the remote index
//!
//! Every download goes through the retry/timeout helper. The generator talks
//! to the network only through [`TemplateRemote`], so tests and offline modes
//! can substitute their own source.

use super::manifest::RootManifest;
use super::samples::{SampleConfig, SampleInfo};
use super::unzip::{open_zip, Archive};
use super::version::parse_tag_list;
use crate::config::GeneratorSettings;
use crate::error::{GeneratorError, RequestError};
use crate::http::{send_request_with_timeout, HttpStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Network side of template and sample generation
#[async_trait]
pub trait TemplateRemote: Send + Sync {
    /// Raw template tags published in the remote index
    async fn fetch_tag_list(&self) -> Result<Vec<String>, RequestError>;

    /// Download URL of a template zip for a resolved tag
    fn template_zip_url(&self, tag: &str, template_name: &str) -> Result<Url, GeneratorError>;

    /// Download and open a zip archive
    async fn fetch_zip(&self, url: &Url) -> Result<Archive, GeneratorError>;

    async fn fetch_sample_config(&self) -> Result<SampleConfig, GeneratorError>;

    /// Download URL of the archive containing a sample
    fn sample_zip_url(&self, sample: &SampleInfo) -> Result<Url, GeneratorError>;
}

/// Response status and body read in one attempt
struct FetchedBody {
    status: u16,
    rate_limit_exhausted: bool,
    bytes: Vec<u8>,
}

impl FetchedBody {
    async fn read(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status().as_u16();
        let rate_limit_exhausted = response.rate_limit_exhausted();
        let bytes = response.bytes().await?.to_vec();
        Ok(Self {
            status,
            rate_limit_exhausted,
            bytes,
        })
    }
}

impl HttpStatus for FetchedBody {
    fn http_status(&self) -> Option<u16> {
        Some(self.status)
    }

    fn rate_limit_exhausted(&self) -> bool {
        self.rate_limit_exhausted
    }
}

/// GET `url` and return the full body, retried and bounded by `timeout`
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &Url,
    try_limits: usize,
    timeout: Duration,
) -> Result<Vec<u8>, RequestError> {
    let body = send_request_with_timeout(
        || {
            let request = client.get(url.clone());
            async move { FetchedBody::read(request.send().await?).await }
        },
        timeout,
        try_limits,
    )
    .await?;
    Ok(body.bytes)
}

/// Download a zip archive and open it in memory
pub async fn fetch_zip_from_url(
    client: &reqwest::Client,
    url: &Url,
    try_limits: usize,
    timeout: Duration,
) -> Result<Archive, GeneratorError> {
    let bytes = fetch_bytes(client, url, try_limits, timeout).await?;
    debug!(%url, bytes = bytes.len(), "downloaded zip");
    open_zip(bytes)
}

/// Template fetcher backed by HTTP
pub struct TemplateFetcher {
    client: reqwest::Client,
    tag_list_url: Url,
    template_download_base: Url,
    sample_config_url: Url,
    sample_archive_base: Url,
    try_limits: usize,
    index_timeout: Duration,
    zip_timeout: Duration,
}

impl TemplateFetcher {
    /// Create a fetcher from resolved generator settings
    pub fn new(settings: &GeneratorSettings) -> Self {
        let endpoints = &settings.endpoints;
        Self {
            client: reqwest::Client::builder()
                .user_agent(settings.user_agent.as_str())
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            tag_list_url: endpoints.tag_list_url.clone(),
            template_download_base: endpoints.template_download_base.clone(),
            sample_config_url: endpoints.sample_config_url.clone(),
            sample_archive_base: endpoints.sample_archive_base.clone(),
            try_limits: settings.try_limits,
            index_timeout: settings.index_timeout,
            zip_timeout: settings.zip_timeout,
        }
    }

    /// Build a URL by appending path segments, preserving query parameters
    fn build_url(base: &Url, segments: &[&str]) -> Result<Url, GeneratorError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| GeneratorError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl TemplateRemote for TemplateFetcher {
    async fn fetch_tag_list(&self) -> Result<Vec<String>, RequestError> {
        let bytes = fetch_bytes(
            &self.client,
            &self.tag_list_url,
            self.try_limits,
            self.index_timeout,
        )
        .await?;
        Ok(parse_tag_list(&String::from_utf8_lossy(&bytes)))
    }

    fn template_zip_url(&self, tag: &str, template_name: &str) -> Result<Url, GeneratorError> {
        let file_name = format!("{}.zip", template_name);
        Self::build_url(&self.template_download_base, &[tag, file_name.as_str()])
    }

    async fn fetch_zip(&self, url: &Url) -> Result<Archive, GeneratorError> {
        fetch_zip_from_url(&self.client, url, self.try_limits, self.zip_timeout).await
    }

    async fn fetch_sample_config(&self) -> Result<SampleConfig, GeneratorError> {
        let bytes = fetch_bytes(
            &self.client,
            &self.sample_config_url,
            self.try_limits,
            self.index_timeout,
        )
        .await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn sample_zip_url(&self, sample: &SampleInfo) -> Result<Url, GeneratorError> {
        Ok(sample
            .download_url_info
            .archive_url(&self.sample_archive_base)?)
    }
}

/// Build the fallback zip for one local template directory
///
/// Entries are stored as `<template_name>/<relative path>`, the same layout
/// as the published release zips. Shared files from the templates root are
/// added to every template under their destination name.
pub fn build_local_zip(
    templates_dir: &Path,
    template_name: &str,
    manifest: &RootManifest,
) -> Result<Vec<u8>> {
    let template_path = templates_dir.join(template_name);
    if !template_path.is_dir() {
        anyhow::bail!("Template directory not found: {}", template_path.display());
    }

    let mut zip_buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_buffer));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for entry in WalkDir::new(&template_path).sort_by_file_name() {
            let entry = entry
                .with_context(|| format!("Failed to walk {}", template_path.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if manifest.is_ignored(&file_name) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&template_path)
                .with_context(|| format!("Unexpected path {}", entry.path().display()))?;
            let relative = relative.to_string_lossy().replace('\\', "/");

            let content = std::fs::read(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;
            zip.start_file(format!("{}/{}", template_name, relative), options)?;
            zip.write_all(&content)?;
        }

        for shared in &manifest.shared_files {
            let source_path = templates_dir.join(&shared.source);
            if !source_path.exists() {
                tracing::warn!(
                    file = %shared.source,
                    dir = %templates_dir.display(),
                    "shared file not found"
                );
                continue;
            }
            let content = std::fs::read(&source_path).with_context(|| {
                format!("Failed to read shared file {}", source_path.display())
            })?;
            zip.start_file(
                format!("{}/{}", template_name, shared.destination()),
                options,
            )?;
            zip.write_all(&content)?;
        }

        zip.finish()?;
    }

    info!(template = template_name, bytes = zip_buffer.len(), "built fallback zip");
    Ok(zip_buffer)
}
