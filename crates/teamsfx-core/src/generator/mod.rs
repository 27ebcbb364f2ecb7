//! Template and sample generation pipeline
//!
//! A generation is a fixed [`ActionSequence`] run against a
//! [`GeneratorContext`]. Templates resolve a tag, download the matching zip
//! and fall back to the bundled zip when the network fails; samples are
//! downloaded from their source repository with no fallback.

pub mod action;
pub mod context;

use crate::config::GeneratorSettings;
use crate::error::GeneratorError;
use crate::templates::fetcher::{TemplateFetcher, TemplateRemote};
use crate::templates::render::{render_template_file_data, render_template_file_name, Variables};
use crate::templates::samples::SampleConfig;
use crate::templates::unzip::{DataReplaceFn, FilterFn, NameReplaceFn};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub use action::{
    run_actions, ActionEnv, ActionSequence, GeneratorAction, SAMPLE_ACTIONS, SAMPLE_SEQUENCE,
    TEMPLATE_ACTIONS, TEMPLATE_SEQUENCE,
};
pub use context::{ActionObserver, ContextUpdate, GeneratorContext, LoggingObserver};

/// Scaffolds templates and samples into a destination directory
pub struct Generator {
    remote: Arc<dyn TemplateRemote>,
    settings: GeneratorSettings,
    observer: Arc<dyn ActionObserver>,
}

impl Generator {
    /// Generator downloading over HTTP
    pub fn new(settings: GeneratorSettings) -> Self {
        let remote = Arc::new(TemplateFetcher::new(&settings));
        Self::with_remote(remote, settings)
    }

    pub fn with_remote(remote: Arc<dyn TemplateRemote>, settings: GeneratorSettings) -> Self {
        Self {
            remote,
            settings,
            observer: Arc::new(LoggingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ActionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    fn env(&self) -> ActionEnv<'_> {
        ActionEnv {
            remote: self.remote.as_ref(),
            settings: &self.settings,
        }
    }

    /// Scaffold template `name` into `destination`
    ///
    /// Only entries under the template's top-level folder are extracted; that
    /// folder is stripped and `.tpl` files are rendered with `variables`.
    /// Returns the written paths relative to `destination`.
    pub async fn generate_template(
        &self,
        name: &str,
        destination: &Path,
        variables: &Variables,
    ) -> Result<Vec<String>, GeneratorError> {
        info!(template = name, destination = %destination.display(), "generating template");

        let prefix = format!("{}/", name);
        let variables = Arc::new(variables.clone());

        let filter_prefix = prefix.clone();
        let filter: FilterFn = Arc::new(move |entry: &str| entry.starts_with(&filter_prefix));

        let name_vars = Arc::clone(&variables);
        let name_prefix = prefix;
        let rename: NameReplaceFn = Arc::new(move |entry: &str, _: &[u8]| {
            let relative = entry.strip_prefix(&name_prefix).unwrap_or(entry);
            Ok(render_template_file_name(relative, &name_vars)?)
        });

        let data_vars = variables;
        let render: DataReplaceFn = Arc::new(move |entry: &str, data: &[u8]| {
            Ok(render_template_file_data(entry, data, &data_vars)?.into_owned())
        });

        let ctx = GeneratorContext::new(name, destination)
            .with_observer(Arc::clone(&self.observer))
            .with_fallback_zip_path(self.settings.fallback_zip_path(name))
            .with_filter(filter)
            .with_file_name_replace(rename)
            .with_file_data_replace(render);

        let ctx = run_actions(&TEMPLATE_SEQUENCE, ctx, self.env()).await?;
        let written = ctx.into_outputs();
        info!(template = name, files = written.len(), "template generated");
        Ok(written)
    }

    /// Download sample `id` and extract its directory into `destination`
    pub async fn generate_sample(
        &self,
        id: &str,
        destination: &Path,
    ) -> Result<Vec<String>, GeneratorError> {
        if self.settings.local_only {
            return Err(GeneratorError::LocalOnly { id: id.to_string() });
        }
        info!(sample = id, destination = %destination.display(), "generating sample");

        let ctx =
            GeneratorContext::new(id, destination).with_observer(Arc::clone(&self.observer));
        let ctx = run_actions(&SAMPLE_SEQUENCE, ctx, self.env()).await?;

        let written = ctx.into_outputs();
        info!(sample = id, files = written.len(), "sample generated");
        Ok(written)
    }

    /// The remote sample catalogue
    pub async fn list_samples(&self) -> Result<SampleConfig, GeneratorError> {
        self.remote.fetch_sample_config().await
    }
}
