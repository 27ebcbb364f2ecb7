//! Sequential and concurrent execution of plugin lifecycle hooks

use super::plugin::{lifecycle_hook, Lifecycle, LifecycleFn, PluginContext, ResourcePlugin};
use crate::error::PluginError;
use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use tracing::{debug, error, info};

/// A plugin's hook for one step; `None` when the plugin has nothing to do
pub struct LifecycleEntry<'a> {
    pub plugin_name: String,
    pub hook: Option<LifecycleFn<'a>>,
}

impl<'a> LifecycleEntry<'a> {
    pub fn new(plugin_name: impl Into<String>, hook: Option<LifecycleFn<'a>>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            hook,
        }
    }

    pub fn for_plugin(
        plugin: &'a dyn ResourcePlugin,
        lifecycle: Lifecycle,
        ctx: &'a PluginContext,
    ) -> Self {
        Self::new(plugin.name(), lifecycle_hook(plugin, lifecycle, ctx))
    }
}

/// One plugin's slice of output from an executed hook
#[derive(Debug, Clone, PartialEq)]
pub struct PluginOutput {
    pub plugin_name: String,
    pub output: Value,
}

/// Called after a stage succeeds; an error stops the remaining stages
pub type StageCallback<'a> =
    Box<dyn FnOnce() -> BoxFuture<'a, Result<(), PluginError>> + Send + 'a>;

/// Outputs of the three stages of [`execute_lifecycles`]
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LifecycleOutputs {
    pub pre: Vec<PluginOutput>,
    pub main: Vec<PluginOutput>,
    pub post: Vec<PluginOutput>,
}

impl LifecycleOutputs {
    /// Every output in stage order
    pub fn all(&self) -> impl Iterator<Item = &PluginOutput> {
        self.pre.iter().chain(&self.main).chain(&self.post)
    }
}

fn log_outcome(step: &str, plugin_name: &str, result: &Result<Value, PluginError>) {
    match result {
        Ok(_) => info!("[{}] {} succeeded", step, plugin_name),
        Err(err) => error!("[{}] {} failed: {}", step, plugin_name, err),
    }
}

fn log_skipped(step: &str, plugin_name: &str) {
    debug!("[{}] {} skipped (no hook)", step, plugin_name);
}

fn log_summary(step: &str, invoked: usize, skipped: usize, failed: bool) {
    if failed {
        error!("[{}] failed after running {} hook(s)", step, invoked);
    } else {
        info!("[{}] {} hook(s) succeeded, {} skipped", step, invoked, skipped);
    }
}

/// Run the hooks one after another, stopping at the first error
pub async fn execute_sequentially(
    step: &str,
    entries: Vec<LifecycleEntry<'_>>,
) -> Result<Vec<PluginOutput>, PluginError> {
    let mut outputs = Vec::new();
    let mut skipped = 0;

    for entry in entries {
        let Some(hook) = entry.hook else {
            log_skipped(step, &entry.plugin_name);
            skipped += 1;
            continue;
        };
        let result = hook().await;
        log_outcome(step, &entry.plugin_name, &result);
        match result {
            Ok(output) => outputs.push(PluginOutput {
                plugin_name: entry.plugin_name,
                output,
            }),
            Err(err) => {
                log_summary(step, outputs.len() + 1, skipped, true);
                return Err(err);
            }
        }
    }

    log_summary(step, outputs.len(), skipped, false);
    Ok(outputs)
}

/// Run every hook concurrently and wait for all of them
///
/// All hooks run to completion; the error returned is the first failure in
/// input order.
pub async fn execute_concurrently(
    step: &str,
    entries: Vec<LifecycleEntry<'_>>,
) -> Result<Vec<PluginOutput>, PluginError> {
    let total = entries.len();
    let invoked: Vec<(String, LifecycleFn<'_>)> = entries
        .into_iter()
        .filter_map(|entry| match entry.hook {
            Some(hook) => Some((entry.plugin_name, hook)),
            None => {
                log_skipped(step, &entry.plugin_name);
                None
            }
        })
        .collect();
    let count = invoked.len();
    let skipped = total - count;

    let results = join_all(invoked.into_iter().map(|(plugin_name, hook)| async move {
        let result = hook().await;
        (plugin_name, result)
    }))
    .await;

    let mut outputs = Vec::with_capacity(count);
    let mut first_error = None;
    for (plugin_name, result) in results {
        log_outcome(step, &plugin_name, &result);
        match result {
            Ok(output) => outputs.push(PluginOutput {
                plugin_name,
                output,
            }),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    log_summary(step, count, skipped, first_error.is_some());
    match first_error {
        Some(err) => Err(err),
        None => Ok(outputs),
    }
}

/// Pre hooks in sequence, then main and post hooks concurrently
///
/// Each stage runs only if the previous stage and its callback succeeded.
pub async fn execute_lifecycles<'a>(
    pre: Vec<LifecycleEntry<'a>>,
    main: Vec<LifecycleEntry<'a>>,
    post: Vec<LifecycleEntry<'a>>,
    on_pre_done: Option<StageCallback<'a>>,
    on_main_done: Option<StageCallback<'a>>,
    on_post_done: Option<StageCallback<'a>>,
) -> Result<LifecycleOutputs, PluginError> {
    let pre = execute_sequentially("pre", pre).await?;
    if let Some(callback) = on_pre_done {
        callback().await?;
    }

    let main = execute_concurrently("main", main).await?;
    if let Some(callback) = on_main_done {
        callback().await?;
    }

    let post = execute_concurrently("post", post).await?;
    if let Some(callback) = on_post_done {
        callback().await?;
    }

    Ok(LifecycleOutputs { pre, main, post })
}
