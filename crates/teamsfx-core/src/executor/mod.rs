//! Execution of named plugin tasks
//!
//! Two flavours are provided:
//! - [`execute_sequentially`] / [`execute_concurrently`] / [`execute_lifecycles`]
//!   run lifecycle hooks and stop at (or report) the first error
//! - [`execute_thunks`] runs everything and collects every outcome into an
//!   [`ExecutionResult`], distinguishing partial success from failure

pub mod lifecycle;
pub mod plugin;
pub mod thunk;

pub use lifecycle::{
    execute_concurrently, execute_lifecycles, execute_sequentially, LifecycleEntry,
    LifecycleOutputs, PluginOutput, StageCallback,
};
pub use plugin::{
    lifecycle_hook, Lifecycle, LifecycleFn, PluginContext, ResourcePlugin, TokenProvider,
};
pub use thunk::{
    execute_thunks, ExecutionKind, ExecutionResult, NamedThunk, Thunk, ThunkOutput,
};
