//! State threaded through a generator action sequence

use crate::error::GeneratorError;
use crate::templates::samples::SampleInfo;
use crate::templates::unzip::{Archive, DataReplaceFn, FilterFn, NameReplaceFn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Hooks notified around every action
///
/// Observers see the context but cannot change it or the control flow.
pub trait ActionObserver: Send + Sync {
    fn on_action_start(&self, _action: &str, _ctx: &GeneratorContext) {}

    fn on_action_end(&self, _action: &str, _ctx: &GeneratorContext) {}

    fn on_action_error(&self, _action: &str, _error: &GeneratorError, _ctx: &GeneratorContext) {}
}

/// Observer that reports action progress through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ActionObserver for LoggingObserver {
    fn on_action_start(&self, action: &str, ctx: &GeneratorContext) {
        debug!(action, name = ctx.name(), "action started");
    }

    fn on_action_end(&self, action: &str, ctx: &GeneratorContext) {
        debug!(action, name = ctx.name(), "action finished");
    }

    fn on_action_error(&self, action: &str, error: &GeneratorError, ctx: &GeneratorContext) {
        warn!(action, name = ctx.name(), error = %error, "action failed");
    }
}

/// Fields produced by one action
///
/// Applying an update only fills fields that are still empty.
#[derive(Default)]
pub struct ContextUpdate {
    pub tag: Option<String>,
    pub zip_url: Option<Url>,
    pub zip: Option<Archive>,
    pub sample: Option<SampleInfo>,
    pub file_name_replace: Option<NameReplaceFn>,
    pub filter: Option<FilterFn>,
    pub outputs: Option<Vec<String>>,
}

impl ContextUpdate {
    /// Nothing to change; the action was skipped
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.zip_url.is_none()
            && self.zip.is_none()
            && self.sample.is_none()
            && self.file_name_replace.is_none()
            && self.filter.is_none()
            && self.outputs.is_none()
    }
}

/// Inputs and intermediate results of one template or sample generation
///
/// Fields fill monotonically: once set they are never replaced, and the
/// actions treat a filled field as already done.
pub struct GeneratorContext {
    name: String,
    destination: PathBuf,
    tag: Option<String>,
    zip_url: Option<Url>,
    zip: Option<Archive>,
    fallback_zip_path: Option<PathBuf>,
    sample: Option<SampleInfo>,
    cancel_downloading: bool,
    file_name_replace: Option<NameReplaceFn>,
    file_data_replace: Option<DataReplaceFn>,
    filter: Option<FilterFn>,
    outputs: Option<Vec<String>>,
    observer: Arc<dyn ActionObserver>,
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

impl GeneratorContext {
    /// `name` is the template name or the sample id
    pub fn new(name: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
            tag: None,
            zip_url: None,
            zip: None,
            fallback_zip_path: None,
            sample: None,
            cancel_downloading: false,
            file_name_replace: None,
            file_data_replace: None,
            filter: None,
            outputs: None,
            observer: Arc::new(LoggingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ActionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        fill(&mut self.tag, Some(tag.into()));
        self
    }

    pub fn with_zip_url(mut self, url: Url) -> Self {
        fill(&mut self.zip_url, Some(url));
        self
    }

    pub fn with_zip(mut self, zip: Archive) -> Self {
        fill(&mut self.zip, Some(zip));
        self
    }

    pub fn with_fallback_zip_path(mut self, path: impl Into<PathBuf>) -> Self {
        fill(&mut self.fallback_zip_path, Some(path.into()));
        self
    }

    pub fn with_file_name_replace(mut self, replace: NameReplaceFn) -> Self {
        fill(&mut self.file_name_replace, Some(replace));
        self
    }

    pub fn with_file_data_replace(mut self, replace: DataReplaceFn) -> Self {
        fill(&mut self.file_data_replace, Some(replace));
        self
    }

    pub fn with_filter(mut self, filter: FilterFn) -> Self {
        fill(&mut self.filter, Some(filter));
        self
    }

    /// Merge an action's results into the context
    pub fn apply(mut self, update: ContextUpdate) -> Self {
        fill(&mut self.tag, update.tag);
        fill(&mut self.zip_url, update.zip_url);
        fill(&mut self.zip, update.zip);
        fill(&mut self.sample, update.sample);
        fill(&mut self.file_name_replace, update.file_name_replace);
        fill(&mut self.filter, update.filter);
        fill(&mut self.outputs, update.outputs);
        self
    }

    /// Stop attempting downloads; later network actions become no-ops
    pub fn cancel_downloading(mut self) -> Self {
        self.cancel_downloading = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn zip_url(&self) -> Option<&Url> {
        self.zip_url.as_ref()
    }

    pub fn zip(&self) -> Option<&Archive> {
        self.zip.as_ref()
    }

    pub fn fallback_zip_path(&self) -> Option<&Path> {
        self.fallback_zip_path.as_deref()
    }

    pub fn sample(&self) -> Option<&SampleInfo> {
        self.sample.as_ref()
    }

    pub fn is_downloading_cancelled(&self) -> bool {
        self.cancel_downloading
    }

    pub fn file_name_replace(&self) -> Option<&NameReplaceFn> {
        self.file_name_replace.as_ref()
    }

    pub fn file_data_replace(&self) -> Option<&DataReplaceFn> {
        self.file_data_replace.as_ref()
    }

    pub fn filter(&self) -> Option<&FilterFn> {
        self.filter.as_ref()
    }

    /// Paths written by the unzip step, relative to the destination
    pub fn outputs(&self) -> Option<&[String]> {
        self.outputs.as_deref()
    }

    pub fn into_outputs(self) -> Vec<String> {
        self.outputs.unwrap_or_default()
    }

    pub(crate) fn observer(&self) -> Arc<dyn ActionObserver> {
        Arc::clone(&self.observer)
    }
}

impl fmt::Debug for GeneratorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorContext")
            .field("name", &self.name)
            .field("destination", &self.destination)
            .field("tag", &self.tag)
            .field("zip_url", &self.zip_url.as_ref().map(Url::as_str))
            .field("zip", &self.zip.as_ref().map(|zip| zip.len()))
            .field("fallback_zip_path", &self.fallback_zip_path)
            .field("sample", &self.sample.as_ref().map(|s| s.id.as_str()))
            .field("cancel_downloading", &self.cancel_downloading)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_fills_empty_fields() {
        let ctx = GeneratorContext::new("tab", "/tmp/out");
        let ctx = ctx.apply(ContextUpdate {
            tag: Some("templates@1.0.0".to_string()),
            ..ContextUpdate::none()
        });
        assert_eq!(ctx.tag(), Some("templates@1.0.0"));
        assert!(ctx.zip_url().is_none());
    }

    #[test]
    fn test_filled_fields_are_never_overwritten() {
        let first = Url::parse("https://example.com/a.zip").unwrap();
        let second = Url::parse("https://example.com/b.zip").unwrap();

        let ctx = GeneratorContext::new("tab", "/tmp/out")
            .with_tag("templates@1.0.0")
            .with_zip_url(first.clone())
            .with_tag("templates@9.9.9")
            .apply(ContextUpdate {
                zip_url: Some(second),
                outputs: Some(vec!["a".to_string()]),
                ..ContextUpdate::none()
            })
            .apply(ContextUpdate {
                outputs: Some(vec!["b".to_string()]),
                ..ContextUpdate::none()
            });

        assert_eq!(ctx.tag(), Some("templates@1.0.0"));
        assert_eq!(ctx.zip_url(), Some(&first));
        assert_eq!(ctx.outputs(), Some(&["a".to_string()][..]));
    }

    #[test]
    fn test_cancel_downloading_sticks() {
        let ctx = GeneratorContext::new("tab", "/tmp/out");
        assert!(!ctx.is_downloading_cancelled());
        let ctx = ctx.cancel_downloading().apply(ContextUpdate::none());
        assert!(ctx.is_downloading_cancelled());
    }

    #[test]
    fn test_empty_update() {
        assert!(ContextUpdate::none().is_empty());
        let update = ContextUpdate {
            outputs: Some(Vec::new()),
            ..ContextUpdate::none()
        };
        assert!(!update.is_empty());
    }
}
