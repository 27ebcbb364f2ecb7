//! Named thunks and the result-collecting concurrent executor

use crate::error::{ExecutionError, PluginError};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, info};

/// Deferred plugin task; nothing runs until it is called
pub type Thunk<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T, PluginError>> + Send + 'a>;

/// A thunk labelled with the plugin and task it belongs to
pub struct NamedThunk<'a, T> {
    pub plugin_name: String,
    pub task_name: String,
    pub thunk: Thunk<'a, T>,
}

impl<'a, T> NamedThunk<'a, T> {
    pub fn new<F, Fut>(plugin_name: impl Into<String>, task_name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, PluginError>> + Send + 'a,
    {
        Self {
            plugin_name: plugin_name.into(),
            task_name: task_name.into(),
            thunk: Box::new(move || f().boxed()),
        }
    }

    /// `plugin.task`, used in logs and aggregate errors
    pub fn label(&self) -> String {
        format!("{}.{}", self.plugin_name, self.task_name)
    }
}

/// Output of one successful thunk
#[derive(Debug, Clone, PartialEq)]
pub struct ThunkOutput<T> {
    pub plugin_name: String,
    pub task_name: String,
    pub output: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionKind {
    Success,
    PartialSuccess,
    Failure,
}

/// Outcome of [`execute_thunks`]
///
/// Every thunk runs to completion; successful outputs are kept even when
/// siblings fail.
#[derive(Debug)]
pub enum ExecutionResult<T> {
    Success(Vec<ThunkOutput<T>>),
    PartialSuccess {
        outputs: Vec<ThunkOutput<T>>,
        errors: Vec<PluginError>,
    },
    Failure(Vec<PluginError>),
}

impl<T> ExecutionResult<T> {
    pub fn kind(&self) -> ExecutionKind {
        match self {
            ExecutionResult::Success(_) => ExecutionKind::Success,
            ExecutionResult::PartialSuccess { .. } => ExecutionKind::PartialSuccess,
            ExecutionResult::Failure(_) => ExecutionKind::Failure,
        }
    }

    pub fn outputs(&self) -> &[ThunkOutput<T>] {
        match self {
            ExecutionResult::Success(outputs) | ExecutionResult::PartialSuccess { outputs, .. } => {
                outputs
            }
            ExecutionResult::Failure(_) => &[],
        }
    }

    pub fn errors(&self) -> &[PluginError] {
        match self {
            ExecutionResult::Success(_) => &[],
            ExecutionResult::PartialSuccess { errors, .. } | ExecutionResult::Failure(errors) => {
                errors
            }
        }
    }

    /// Split into the successful outputs and the aggregate error, if any
    pub fn into_parts(self) -> (Vec<ThunkOutput<T>>, Option<ExecutionError>) {
        match self {
            ExecutionResult::Success(outputs) => (outputs, None),
            ExecutionResult::PartialSuccess { outputs, errors } => {
                let error = ExecutionError {
                    partial: true,
                    succeeded: outputs.iter().map(label).collect(),
                    failures: errors,
                };
                (outputs, Some(error))
            }
            ExecutionResult::Failure(errors) => (
                Vec::new(),
                Some(ExecutionError {
                    partial: false,
                    succeeded: Vec::new(),
                    failures: errors,
                }),
            ),
        }
    }

    /// All outputs, or the aggregate error when anything failed
    pub fn into_result(self) -> Result<Vec<ThunkOutput<T>>, ExecutionError> {
        match self.into_parts() {
            (outputs, None) => Ok(outputs),
            (_, Some(error)) => Err(error),
        }
    }
}

fn label<T>(output: &ThunkOutput<T>) -> String {
    format!("{}.{}", output.plugin_name, output.task_name)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one thunk, turning a panic into a system error for its plugin
async fn run_isolated<'a, T>(
    plugin_name: &str,
    task_name: &str,
    thunk: Thunk<'a, T>,
) -> Result<T, PluginError> {
    let panicked = |payload: Box<dyn Any + Send>| {
        PluginError::system(
            plugin_name,
            format!("task `{}` panicked: {}", task_name, panic_message(&*payload)),
        )
    };

    let future = catch_unwind(AssertUnwindSafe(thunk)).map_err(panicked)?;
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(panicked(payload)))
}

/// Run every thunk concurrently and collect all outcomes
///
/// Thunks are polled together on the current task. A failing or panicking
/// thunk never cancels its siblings.
pub async fn execute_thunks<'a, T>(thunks: Vec<NamedThunk<'a, T>>) -> ExecutionResult<T> {
    let total = thunks.len();
    let results = join_all(thunks.into_iter().map(|named| async move {
        let NamedThunk {
            plugin_name,
            task_name,
            thunk,
        } = named;
        let result = run_isolated(&plugin_name, &task_name, thunk).await;
        (plugin_name, task_name, result)
    }))
    .await;

    let mut outputs = Vec::new();
    let mut errors = Vec::new();
    for (plugin_name, task_name, result) in results {
        match result {
            Ok(output) => {
                info!(plugin = %plugin_name, task = %task_name, "task succeeded");
                outputs.push(ThunkOutput {
                    plugin_name,
                    task_name,
                    output,
                });
            }
            Err(err) => {
                error!(plugin = %plugin_name, task = %task_name, error = %err, "task failed");
                errors.push(err);
            }
        }
    }

    info!(
        total,
        succeeded = outputs.len(),
        failed = errors.len(),
        "executed tasks"
    );

    match (outputs.is_empty(), errors.is_empty()) {
        (_, true) => ExecutionResult::Success(outputs),
        (false, false) => ExecutionResult::PartialSuccess { outputs, errors },
        (true, false) => ExecutionResult::Failure(errors),
    }
}
