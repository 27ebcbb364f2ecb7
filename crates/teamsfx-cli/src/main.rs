//! teamsfx CLI - Scaffold Teams apps from templates and samples

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use teamsfx_core::logging::init_logging;
use teamsfx_core::templates::{build_fallback_zips, Variables};
use teamsfx_core::{Generator, GeneratorSettings, ProductConfig, TemplateVariables};
use tracing::debug;

/// CLI version
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// TeamsFx product configuration
#[derive(Clone)]
pub struct TeamsFxConfig;

impl ProductConfig for TeamsFxConfig {
    fn name(&self) -> &'static str {
        "teamsfx"
    }

    fn display_name(&self) -> &'static str {
        "Teams Toolkit"
    }

    fn template_version_range(&self) -> &'static str {
        "~4.2"
    }

    fn tag_list_url(&self) -> &'static str {
        "https://github.com/OfficeDev/TeamsFx/releases/download/template-tag-list/template-tags.txt"
    }

    fn template_download_base_url(&self) -> &'static str {
        "https://github.com/OfficeDev/TeamsFx/releases/download"
    }

    fn sample_config_url(&self) -> &'static str {
        "https://raw.githubusercontent.com/OfficeDev/TeamsFx-Samples/v3.0.0/.config/samples-config-v3.json"
    }

    fn prerelease_env(&self) -> &'static str {
        "TEAMSFX_TEMPLATE_PRERELEASE"
    }

    fn local_template_env(&self) -> &'static str {
        "TEAMSFX_LOCAL_TEMPLATE"
    }

    fn templates_root_env(&self) -> &'static str {
        "TEAMSFX_TEMPLATES_ROOT"
    }
}

#[derive(Parser, Debug)]
#[command(name = "teamsfx")]
#[command(about = "CLI for scaffolding Teams apps")]
#[command(version)]
pub struct Args {
    /// Show debug logs (overridden by TEAMSFX_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new app from a template
    New(NewArgs),
    /// Create a new app from a sample
    Sample(SampleArgs),
    /// List the available samples
    ListSamples,
    /// Build fallback zips for all templates in the template directory (for development use)
    BuildFallback(BuildFallbackArgs),
}

#[derive(Parser, Debug)]
pub struct NewArgs {
    /// Template name (e.g. default-bot)
    #[arg(short, long)]
    pub template: String,

    /// Name of the app
    #[arg(short = 'n', long = "app-name")]
    pub app_name: String,

    /// Project directory to create (defaults to ./<app-name>)
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Extra template variables
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
}

#[derive(Parser, Debug)]
pub struct SampleArgs {
    /// Sample id (see `teamsfx list-samples`)
    pub id: String,

    /// Project directory to create (defaults to ./<id>)
    #[arg(short, long)]
    pub directory: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct BuildFallbackArgs {
    /// Local directory containing templates (defaults to the templates root)
    #[arg(long = "template-dir")]
    pub template_dir: Option<PathBuf>,
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{}`", raw)),
    }
}

/// Refuse to scaffold into a non-empty directory
fn ensure_empty_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        let mut entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?;
        if entries.next().is_some() {
            anyhow::bail!("Directory {} already exists and is not empty", dir.display());
        }
    }
    Ok(())
}

fn print_written(dir: &Path, written: &[String]) {
    println!();
    println!(
        "{} {} file(s) in {}",
        "Created".green().bold(),
        written.len(),
        dir.display()
    );
    println!();
    println!("{}", "Next steps:".cyan().bold());
    println!("  {} cd {}", "->".blue(), dir.display());
    println!("  {} Open README.md to get started", "->".blue());
}

/// Standard variables for `app_name`, overridden by `--var` pairs
fn template_variables(app_name: &str, extra: Vec<(String, String)>) -> Variables {
    extra
        .into_iter()
        .fold(TemplateVariables::for_app(app_name), |vars, (key, value)| {
            vars.with(key, value)
        })
        .into_map()
}

async fn run_new(generator: &Generator, args: NewArgs) -> Result<()> {
    let dir = args
        .directory
        .unwrap_or_else(|| PathBuf::from(&args.app_name));
    ensure_empty_dir(&dir)?;

    let vars = template_variables(&args.app_name, args.vars);

    println!(
        "{} {} from template {}...",
        "Creating".cyan().bold(),
        args.app_name,
        args.template.bold()
    );
    let written = generator
        .generate_template(&args.template, &dir, &vars)
        .await
        .with_context(|| format!("Failed to create app from template `{}`", args.template))?;

    print_written(&dir, &written);
    Ok(())
}

async fn run_sample(generator: &Generator, args: SampleArgs) -> Result<()> {
    let dir = args.directory.unwrap_or_else(|| PathBuf::from(&args.id));
    ensure_empty_dir(&dir)?;

    println!("{} sample {}...", "Downloading".cyan().bold(), args.id.bold());
    let written = generator
        .generate_sample(&args.id, &dir)
        .await
        .with_context(|| format!("Failed to download sample `{}`", args.id))?;

    print_written(&dir, &written);
    Ok(())
}

async fn run_list_samples(generator: &Generator, product: &str) -> Result<()> {
    let config = generator
        .list_samples()
        .await
        .context("Failed to fetch the sample catalogue")?;

    println!("{}", format!("Available {} samples:", product).cyan().bold());
    println!();
    for sample in &config.samples {
        println!("  {} {}", sample.id.green(), sample.title);
        if !sample.short_description.is_empty() {
            println!("      {}", sample.short_description.dimmed());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    debug!(version = CLI_VERSION, "starting teamsfx");

    let config = TeamsFxConfig;
    let settings = GeneratorSettings::from_config(&config)?.with_cli_version(CLI_VERSION);

    match args.command {
        Command::New(new_args) => run_new(&Generator::new(settings), new_args).await,
        Command::Sample(sample_args) => run_sample(&Generator::new(settings), sample_args).await,
        Command::ListSamples => {
            run_list_samples(&Generator::new(settings), config.display_name()).await
        }
        Command::BuildFallback(build_args) => {
            let dir = build_args
                .template_dir
                .unwrap_or_else(|| settings.templates_root.clone());
            build_fallback_zips(&dir).map(|_| ())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("apiKey=abc=def").unwrap(),
            ("apiKey".to_string(), "abc=def".to_string())
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_config_resolves_to_valid_settings() {
        let settings =
            GeneratorSettings::from_config_with_env(&TeamsFxConfig, |_| None).unwrap();
        assert_eq!(settings.tag_prefix, "templates@");
        assert_eq!(
            settings.endpoints.template_download_base.as_str(),
            "https://github.com/OfficeDev/TeamsFx/releases/download"
        );
    }

    #[test]
    fn test_args_parse_new_command() {
        let args = Args::try_parse_from([
            "teamsfx",
            "new",
            "-t",
            "default-bot",
            "--app-name",
            "My Bot",
            "--var",
            "region=eu",
        ])
        .unwrap();
        match args.command {
            Command::New(new_args) => {
                assert_eq!(new_args.template, "default-bot");
                assert_eq!(new_args.vars, vec![("region".to_string(), "eu".to_string())]);
                assert!(new_args.directory.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_template_variables_apply_overrides() {
        let vars = template_variables(
            "My Bot",
            vec![
                ("region".to_string(), "eu".to_string()),
                ("appName".to_string(), "renamed".to_string()),
            ],
        );
        assert_eq!(vars["region"], "eu");
        assert_eq!(vars["appName"], "renamed");
        assert_eq!(vars["SafeProjectName"], "MyBot");
    }

    #[test]
    fn test_ensure_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(ensure_empty_dir(dir.path()).is_ok());
        assert!(ensure_empty_dir(&dir.path().join("missing")).is_ok());
        std::fs::write(dir.path().join("file"), "x").unwrap();
        assert!(ensure_empty_dir(dir.path()).is_err());
    }
}
