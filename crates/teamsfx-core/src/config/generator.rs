//! Settings for template and sample generation

use crate::product::ProductConfig;
use crate::templates::version::TagSelector;
use anyhow::{Context, Result};
use semver::VersionReq;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Attempts per download before giving up
pub const DEFAULT_TRY_LIMITS: usize = 2;

/// Time budget for fetching the tag list or the sample catalogue
pub const DEFAULT_INDEX_TIMEOUT: Duration = Duration::from_secs(10);

/// Time budget for downloading one template or sample zip
pub const DEFAULT_ZIP_TIMEOUT: Duration = Duration::from_secs(60);

/// Remote locations of the template and sample indexes
#[derive(Debug, Clone)]
pub struct TemplateEndpoints {
    pub tag_list_url: Url,
    pub template_download_base: Url,
    pub sample_config_url: Url,
    pub sample_archive_base: Url,
}

/// Everything the generator needs to know, resolved once at startup
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub endpoints: TemplateEndpoints,
    pub tag_prefix: String,
    pub version_range: VersionReq,
    /// Pre-release channel (e.g. `alpha`, `rc`) overriding the stable range
    pub prerelease: Option<String>,
    /// Skip every network call and use the bundled fallback zips
    pub local_only: bool,
    pub templates_root: PathBuf,
    pub try_limits: usize,
    pub index_timeout: Duration,
    pub zip_timeout: Duration,
    pub user_agent: String,
    /// Version of the running CLI, compared against sample requirements
    pub cli_version: Option<String>,
}

impl GeneratorSettings {
    /// Resolve settings from a product config and the process environment
    pub fn from_config<C: ProductConfig>(config: &C) -> Result<Self> {
        Self::from_config_with_env(config, |key| std::env::var(key).ok())
    }

    /// Resolve settings reading environment variables through `env`
    pub fn from_config_with_env<C, F>(config: &C, env: F) -> Result<Self>
    where
        C: ProductConfig,
        F: Fn(&str) -> Option<String>,
    {
        let endpoints = TemplateEndpoints {
            tag_list_url: parse_url(config.tag_list_url())?,
            template_download_base: parse_url(config.template_download_base_url())?,
            sample_config_url: parse_url(config.sample_config_url())?,
            sample_archive_base: parse_url(config.sample_archive_base_url())?,
        };

        let version_range = VersionReq::parse(config.template_version_range()).with_context(|| {
            format!(
                "Invalid template version range: {}",
                config.template_version_range()
            )
        })?;

        let prerelease = env(config.prerelease_env())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let local_only = env(config.local_template_env()).is_some_and(|value| is_enabled(&value));

        let templates_root = env(config.templates_root_env())
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| config.default_templates_root());

        Ok(Self {
            endpoints,
            tag_prefix: config.template_tag_prefix().to_string(),
            version_range,
            prerelease,
            local_only,
            templates_root,
            try_limits: DEFAULT_TRY_LIMITS,
            index_timeout: DEFAULT_INDEX_TIMEOUT,
            zip_timeout: DEFAULT_ZIP_TIMEOUT,
            user_agent: config.user_agent().to_string(),
            cli_version: None,
        })
    }

    pub fn with_cli_version(mut self, version: impl Into<String>) -> Self {
        self.cli_version = Some(version.into());
        self
    }

    /// Tag selector honouring the pre-release override
    pub fn tag_selector(&self) -> TagSelector {
        TagSelector::new(self.tag_prefix.clone(), self.version_range.clone())
            .with_prerelease(self.prerelease.clone())
    }

    /// Directory holding the bundled fallback zips
    pub fn fallback_dir(&self) -> PathBuf {
        fallback_dir(&self.templates_root)
    }

    /// `<templates_root>/fallback/<name>.zip`
    pub fn fallback_zip_path(&self, template_name: &str) -> PathBuf {
        self.fallback_dir().join(format!("{}.zip", template_name))
    }
}

/// Fallback zip directory for a templates root
pub fn fallback_dir(templates_root: &Path) -> PathBuf {
    templates_root.join("fallback")
}

fn parse_url(value: &str) -> Result<Url> {
    Url::parse(value).with_context(|| format!("Invalid URL: {}", value))
}

fn is_enabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Clone)]
    struct TestConfig {
        range: &'static str,
    }

    impl ProductConfig for TestConfig {
        fn name(&self) -> &'static str {
            "test-cli"
        }

        fn display_name(&self) -> &'static str {
            "Test CLI"
        }

        fn template_version_range(&self) -> &'static str {
            self.range
        }

        fn tag_list_url(&self) -> &'static str {
            "https://example.com/tags.txt"
        }

        fn template_download_base_url(&self) -> &'static str {
            "https://example.com/releases/download"
        }

        fn sample_config_url(&self) -> &'static str {
            "https://example.com/samples.json"
        }

        fn prerelease_env(&self) -> &'static str {
            "TEST_PRERELEASE"
        }

        fn local_template_env(&self) -> &'static str {
            "TEST_LOCAL"
        }

        fn templates_root_env(&self) -> &'static str {
            "TEST_TEMPLATES_ROOT"
        }
    }

    fn settings_with(env: &[(&str, &str)]) -> GeneratorSettings {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GeneratorSettings::from_config_with_env(&TestConfig { range: "^2.0.0" }, |key| {
            env.get(key).cloned()
        })
        .unwrap()
    }

    #[test]
    fn test_defaults_without_environment() {
        let settings = settings_with(&[]);
        assert_eq!(settings.prerelease, None);
        assert!(!settings.local_only);
        assert_eq!(settings.templates_root, PathBuf::from("templates"));
        assert_eq!(settings.tag_prefix, "templates@");
        assert_eq!(settings.user_agent, "test-cli");
        assert_eq!(settings.try_limits, DEFAULT_TRY_LIMITS);
    }

    #[test]
    fn test_environment_overrides() {
        let settings = settings_with(&[
            ("TEST_PRERELEASE", " rc "),
            ("TEST_LOCAL", "TRUE"),
            ("TEST_TEMPLATES_ROOT", "/opt/templates"),
        ]);
        assert_eq!(settings.prerelease.as_deref(), Some("rc"));
        assert!(settings.local_only);
        assert_eq!(
            settings.fallback_zip_path("default-bot"),
            PathBuf::from("/opt/templates/fallback/default-bot.zip")
        );
    }

    #[test]
    fn test_local_mode_requires_enabled_value() {
        assert!(!settings_with(&[("TEST_LOCAL", "false")]).local_only);
        assert!(!settings_with(&[("TEST_LOCAL", "")]).local_only);
        assert!(settings_with(&[("TEST_LOCAL", "1")]).local_only);
    }

    #[test]
    fn test_tag_selector_uses_prerelease() {
        let tags = vec!["templates@2.0.0".to_string(), "templates@0.0.0-alpha".to_string()];
        assert_eq!(
            settings_with(&[]).tag_selector().select(&tags),
            Some("templates@2.0.0".to_string())
        );
        assert_eq!(
            settings_with(&[("TEST_PRERELEASE", "alpha")])
                .tag_selector()
                .select(&tags),
            Some("templates@0.0.0-alpha".to_string())
        );
    }

    #[test]
    fn test_invalid_range_is_rejected() {
        let result =
            GeneratorSettings::from_config_with_env(&TestConfig { range: "not a range" }, |_| None);
        assert!(result.is_err());
    }
}
