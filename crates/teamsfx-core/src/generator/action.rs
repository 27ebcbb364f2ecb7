//! Named generator steps and the sequences they form

use super::context::{ContextUpdate, GeneratorContext};
use crate::config::GeneratorSettings;
use crate::error::GeneratorError;
use crate::templates::fetcher::TemplateRemote;
use crate::templates::samples::DownloadUrlInfo;
use crate::templates::unzip::{open_zip, unzip, FilterFn, NameReplaceFn};
use crate::templates::version::{check_compatibility, select_version_tag};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the actions may use besides the context
#[derive(Clone, Copy)]
pub struct ActionEnv<'a> {
    pub remote: &'a dyn TemplateRemote,
    pub settings: &'a GeneratorSettings,
}

/// One step of a generation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorAction {
    FetchTemplateTag,
    BuildTemplateUrl,
    FetchZipFromUrl,
    FetchZipFromLocal,
    FetchSampleInfo,
    Unzip,
}

pub const TEMPLATE_ACTIONS: [GeneratorAction; 5] = [
    GeneratorAction::FetchTemplateTag,
    GeneratorAction::BuildTemplateUrl,
    GeneratorAction::FetchZipFromUrl,
    GeneratorAction::FetchZipFromLocal,
    GeneratorAction::Unzip,
];

pub const SAMPLE_ACTIONS: [GeneratorAction; 3] = [
    GeneratorAction::FetchSampleInfo,
    GeneratorAction::FetchZipFromUrl,
    GeneratorAction::Unzip,
];

/// A fixed list of actions run against one context
#[derive(Debug, Clone, Copy)]
pub struct ActionSequence {
    pub name: &'static str,
    pub actions: &'static [GeneratorAction],
    /// Network failures cancel downloading instead of aborting the sequence
    pub recover_network: bool,
}

pub const TEMPLATE_SEQUENCE: ActionSequence = ActionSequence {
    name: "template",
    actions: &TEMPLATE_ACTIONS,
    recover_network: true,
};

pub const SAMPLE_SEQUENCE: ActionSequence = ActionSequence {
    name: "sample",
    actions: &SAMPLE_ACTIONS,
    recover_network: false,
};

impl GeneratorAction {
    pub fn name(self) -> &'static str {
        match self {
            GeneratorAction::FetchTemplateTag => "FetchTemplateTag",
            GeneratorAction::BuildTemplateUrl => "BuildTemplateUrl",
            GeneratorAction::FetchZipFromUrl => "FetchZipFromUrl",
            GeneratorAction::FetchZipFromLocal => "FetchZipFromLocal",
            GeneratorAction::FetchSampleInfo => "FetchSampleInfo",
            GeneratorAction::Unzip => "Unzip",
        }
    }

    /// Actions that talk to the remote index
    pub fn is_network(self) -> bool {
        matches!(
            self,
            GeneratorAction::FetchTemplateTag
                | GeneratorAction::FetchZipFromUrl
                | GeneratorAction::FetchSampleInfo
        )
    }

    /// Run the action, returning the fields it produced
    ///
    /// An action whose target field is already filled does nothing.
    pub async fn run(
        self,
        ctx: &GeneratorContext,
        env: ActionEnv<'_>,
    ) -> Result<ContextUpdate, GeneratorError> {
        let offline = ctx.is_downloading_cancelled() || env.settings.local_only;

        match self {
            GeneratorAction::FetchTemplateTag => {
                if ctx.tag().is_some() || ctx.zip_url().is_some() || ctx.zip().is_some() || offline
                {
                    return Ok(ContextUpdate::none());
                }
                let selector = env.settings.tag_selector();
                let tag = select_version_tag(|| env.remote.fetch_tag_list(), &selector)
                    .await?
                    .ok_or_else(|| GeneratorError::TemplateNotFound {
                        name: ctx.name().to_string(),
                    })?;
                debug!(tag = %tag, "resolved template tag");
                Ok(ContextUpdate {
                    tag: Some(tag),
                    ..ContextUpdate::none()
                })
            }

            GeneratorAction::BuildTemplateUrl => {
                if ctx.zip_url().is_some() || ctx.zip().is_some() || offline {
                    return Ok(ContextUpdate::none());
                }
                let tag = ctx.tag().ok_or(GeneratorError::MissingKey {
                    key: "tag",
                    action: self.name(),
                })?;
                let url = env.remote.template_zip_url(tag, ctx.name())?;
                Ok(ContextUpdate {
                    zip_url: Some(url),
                    ..ContextUpdate::none()
                })
            }

            GeneratorAction::FetchZipFromUrl => {
                if ctx.zip().is_some() || offline {
                    return Ok(ContextUpdate::none());
                }
                let url = ctx.zip_url().ok_or(GeneratorError::MissingKey {
                    key: "zip_url",
                    action: self.name(),
                })?;
                info!(%url, "downloading");
                let zip = env.remote.fetch_zip(url).await?;
                Ok(ContextUpdate {
                    zip: Some(zip),
                    ..ContextUpdate::none()
                })
            }

            GeneratorAction::FetchZipFromLocal => {
                if ctx.zip().is_some() {
                    return Ok(ContextUpdate::none());
                }
                let path = match ctx.fallback_zip_path() {
                    Some(path) => path.to_path_buf(),
                    None => env.settings.fallback_zip_path(ctx.name()),
                };
                if !path.is_file() {
                    debug!(path = %path.display(), "no fallback zip");
                    return Err(GeneratorError::TemplateNotFound {
                        name: ctx.name().to_string(),
                    });
                }
                info!(path = %path.display(), "using fallback template");
                let bytes = tokio::fs::read(&path).await?;
                Ok(ContextUpdate {
                    zip: Some(open_zip(bytes)?),
                    ..ContextUpdate::none()
                })
            }

            GeneratorAction::FetchSampleInfo => {
                if ctx.zip_url().is_some() || ctx.zip().is_some() || offline {
                    return Ok(ContextUpdate::none());
                }
                let config = env.remote.fetch_sample_config().await?;
                let sample = config
                    .find(ctx.name())
                    .cloned()
                    .ok_or_else(|| GeneratorError::SampleNotFound {
                        id: ctx.name().to_string(),
                    })?;

                if let (Some(cli), Some(minimum)) = (
                    env.settings.cli_version.as_deref(),
                    sample.minimum_toolkit_version.as_deref(),
                ) {
                    if let Some(warning) = check_compatibility(cli, minimum) {
                        warn!(sample = %sample.id, "{}", warning);
                    }
                }

                let zip_url = env.remote.sample_zip_url(&sample)?;
                let (filter, file_name_replace) = sample_entry_fns(&sample.download_url_info);
                Ok(ContextUpdate {
                    zip_url: Some(zip_url),
                    sample: Some(sample),
                    filter: Some(filter),
                    file_name_replace: Some(file_name_replace),
                    ..ContextUpdate::none()
                })
            }

            GeneratorAction::Unzip => {
                if ctx.outputs().is_some() {
                    return Ok(ContextUpdate::none());
                }
                let mut zip = ctx
                    .zip()
                    .cloned()
                    .ok_or(GeneratorError::MissingKey {
                        key: "zip",
                        action: self.name(),
                    })?;
                let written = unzip(
                    &mut zip,
                    ctx.destination(),
                    ctx.file_name_replace(),
                    ctx.file_data_replace(),
                    ctx.filter(),
                )
                .await?;
                info!(
                    files = written.len(),
                    destination = %ctx.destination().display(),
                    "extracted"
                );
                Ok(ContextUpdate {
                    outputs: Some(written),
                    ..ContextUpdate::none()
                })
            }
        }
    }
}

/// Filter and rename keeping only the entries of a sample's directory
fn sample_entry_fns(info: &DownloadUrlInfo) -> (FilterFn, NameReplaceFn) {
    let filter_info = info.clone();
    let filter: FilterFn =
        Arc::new(move |entry: &str| filter_info.sample_relative_path(entry).is_some());

    let rename_info = info.clone();
    let rename: NameReplaceFn = Arc::new(move |entry: &str, _: &[u8]| {
        Ok(rename_info
            .sample_relative_path(entry)
            .unwrap_or_default()
            .to_string())
    });

    (filter, rename)
}

/// Run `sequence` against `ctx` in order
///
/// Observers are told about every action. In a recovering sequence a failed
/// network action cancels downloading and the sequence continues; any other
/// failure ends it, wrapped with the name of the failing action.
pub async fn run_actions(
    sequence: &ActionSequence,
    mut ctx: GeneratorContext,
    env: ActionEnv<'_>,
) -> Result<GeneratorContext, GeneratorError> {
    let observer = ctx.observer();

    for action in sequence.actions {
        let name = action.name();
        observer.on_action_start(name, &ctx);

        match action.run(&ctx, env).await {
            Ok(update) => {
                if update.is_empty() {
                    debug!(sequence = sequence.name, action = name, "nothing to do");
                }
                ctx = ctx.apply(update);
                observer.on_action_end(name, &ctx);
            }
            Err(err) => {
                observer.on_action_error(name, &err, &ctx);
                if sequence.recover_network && action.is_network() {
                    warn!(
                        sequence = sequence.name,
                        action = name,
                        error = %err,
                        "download failed, falling back to local template"
                    );
                    ctx = ctx.cancel_downloading();
                    continue;
                }
                return Err(GeneratorError::Action {
                    action: name,
                    source: Box::new(err),
                });
            }
        }
    }

    Ok(ctx)
}
