//! Local template directory manifest (templates/template.yaml)

use serde::{Deserialize, Serialize};

/// A shared file from the root templates directory that gets bundled into every template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedFile {
    /// Source path relative to templates/ directory
    pub source: String,

    /// Destination path in each template (defaults to source if not specified)
    #[serde(default)]
    pub dest: Option<String>,
}

impl SharedFile {
    /// Get the destination path (falls back to source if dest not specified)
    pub fn destination(&self) -> &str {
        self.dest.as_deref().unwrap_or(&self.source)
    }
}

/// Root template manifest
///
/// Lists the template directories that are packaged into fallback zips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootManifest {
    /// List of template directory names
    pub templates: Vec<String>,

    /// Shared files from root templates/ directory to include in every template
    #[serde(default)]
    pub shared_files: Vec<SharedFile>,

    /// File names never packaged (e.g. `.DS_Store`)
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl RootManifest {
    pub fn is_ignored(&self, file_name: &str) -> bool {
        self.ignore.iter().any(|ignored| ignored == file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root_manifest() {
        let yaml = r#"
templates:
  - default-bot
  - notification-bot
shared_files:
  - source: gitignore
    dest: .gitignore
  - source: LICENSE
ignore:
  - .DS_Store
"#;
        let manifest: RootManifest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(manifest.templates, vec!["default-bot", "notification-bot"]);
        assert_eq!(manifest.shared_files[0].destination(), ".gitignore");
        assert_eq!(manifest.shared_files[1].destination(), "LICENSE");
        assert!(manifest.is_ignored(".DS_Store"));
        assert!(!manifest.is_ignored("README.md"));
    }

    #[test]
    fn test_optional_sections_default_to_empty() {
        let manifest: RootManifest = serde_yaml::from_str("templates: [tab]").unwrap();
        assert!(manifest.shared_files.is_empty());
        assert!(manifest.ignore.is_empty());
    }
}
