//! Template and sample fetching, rendering and extraction
//!
//! This module provides:
//! - Tag selection against the remote template index
//! - Template/sample download with local fallback zips
//! - Zip extraction with per-entry rename and rewrite
//! - Mustache-style rendering of `.tpl` files

pub mod fetcher;
pub mod manifest;
pub mod render;
pub mod samples;
pub mod unzip;
pub mod variables;
pub mod version;

use crate::config::generator::fallback_dir;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

pub use fetcher::{build_local_zip, fetch_zip_from_url, TemplateFetcher, TemplateRemote};
pub use manifest::{RootManifest, SharedFile};
pub use render::{render_template_file_data, render_template_file_name, Variables};
pub use samples::{DownloadUrlInfo, SampleConfig, SampleInfo};
pub use unzip::{open_zip, unzip, Archive, DataReplaceFn, FilterFn, NameReplaceFn};
pub use variables::TemplateVariables;
pub use version::{check_compatibility, select_version_tag, TagSelector};

/// Name of the manifest at the root of a local templates directory
pub const ROOT_MANIFEST: &str = "template.yaml";

/// Load `<templates_dir>/template.yaml`
pub fn load_root_manifest(templates_dir: &Path) -> Result<RootManifest> {
    let manifest_path = templates_dir.join(ROOT_MANIFEST);
    if !manifest_path.exists() {
        anyhow::bail!("Root {} not found in {}", ROOT_MANIFEST, templates_dir.display());
    }

    let manifest_content = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    serde_yaml::from_str(&manifest_content)
        .with_context(|| format!("Failed to parse {}", manifest_path.display()))
}

/// Package every template listed in the root manifest into `fallback/<name>.zip`
///
/// Returns the paths of the zips written. Templates whose directory is
/// missing or fails to package are reported and skipped.
pub fn build_fallback_zips(templates_dir: &Path) -> Result<Vec<PathBuf>> {
    if !templates_dir.exists() {
        anyhow::bail!("Template directory not found: {}", templates_dir.display());
    }
    let root_manifest = load_root_manifest(templates_dir)?;

    let out_dir = fallback_dir(templates_dir);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    println!("{}", "Building fallback template zips...".cyan().bold());
    println!();

    let mut built = Vec::new();
    for template_name in &root_manifest.templates {
        let template_path = templates_dir.join(template_name);
        if !template_path.exists() {
            eprintln!(
                "{} Template directory not found: {}",
                "Warning:".yellow(),
                template_path.display()
            );
            continue;
        }

        print!("  {} {}...", "->".blue(), template_name);

        match build_local_zip(templates_dir, template_name, &root_manifest) {
            Ok(zip_bytes) => {
                let zip_path = out_dir.join(format!("{}.zip", template_name));
                std::fs::write(&zip_path, &zip_bytes)
                    .with_context(|| format!("Failed to write {}", zip_path.display()))?;
                println!(" {} ({} bytes)", "done".green(), zip_bytes.len());
                built.push(zip_path);
            }
            Err(e) => {
                println!(" {}", "failed".red());
                eprintln!("    Error: {:#}", e);
            }
        }
    }

    println!();
    println!(
        "{} {} template zip(s) in {}",
        "Built".green().bold(),
        built.len(),
        out_dir.display()
    );

    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_fallback_zips() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join(ROOT_MANIFEST), "templates: [tab, missing]\n").unwrap();
        std::fs::create_dir_all(root.join("tab")).unwrap();
        std::fs::write(root.join("tab/README.md.tpl"), "# {{appName}}").unwrap();

        let built = build_fallback_zips(root).unwrap();

        assert_eq!(built, vec![root.join("fallback/tab.zip")]);
        let zip = open_zip(std::fs::read(&built[0]).unwrap()).unwrap();
        assert_eq!(zip.file_names().collect::<Vec<_>>(), vec!["tab/README.md.tpl"]);
    }

    #[test]
    fn test_missing_manifest_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = build_fallback_zips(dir.path()).unwrap_err();
        assert!(err.to_string().contains(ROOT_MANIFEST));
    }
}
