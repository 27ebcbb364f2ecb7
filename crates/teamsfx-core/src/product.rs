//! Product configuration trait for CLI binaries
//!
//! Each binary built on this library describes where its templates and samples
//! live and which environment variables tune generation.

use std::path::PathBuf;

/// Configuration trait for different CLI products
///
/// Implementors define:
/// - Product identity (name, display name)
/// - Remote template index (tag list, release downloads, tag prefix, version range)
/// - Remote sample catalogue
/// - Environment variable names used to override defaults
pub trait ProductConfig: Clone + Send + Sync + 'static {
    /// Internal product name (used for CLI command, user agent)
    fn name(&self) -> &'static str;

    /// Human-readable display name
    fn display_name(&self) -> &'static str;

    /// Prefix of template release tags, stripped before version parsing
    fn template_tag_prefix(&self) -> &'static str {
        "templates@"
    }

    /// Semver range of template releases this CLI understands
    fn template_version_range(&self) -> &'static str;

    /// URL of the newline-delimited template tag list
    fn tag_list_url(&self) -> &'static str;

    /// Base URL under which `<tag>/<template>.zip` is published
    fn template_download_base_url(&self) -> &'static str;

    /// URL of the JSON sample catalogue
    fn sample_config_url(&self) -> &'static str;

    /// Source hosting base used to build sample archive URLs
    fn sample_archive_base_url(&self) -> &'static str {
        "https://github.com"
    }

    /// Environment variable selecting a pre-release template channel
    fn prerelease_env(&self) -> &'static str;

    /// Environment variable switching to local templates only
    fn local_template_env(&self) -> &'static str;

    /// Environment variable overriding the templates root directory
    fn templates_root_env(&self) -> &'static str;

    /// Templates root used when no override is set
    fn default_templates_root(&self) -> PathBuf {
        PathBuf::from("templates")
    }

    /// User agent string for HTTP requests
    fn user_agent(&self) -> &'static str {
        self.name()
    }
}
