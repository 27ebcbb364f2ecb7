//! Resource plugin contract

use crate::error::PluginError;
use crate::solution::EnvState;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Lifecycle stages a plugin may take part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    PreProvision,
    Provision,
    ConfigureResource,
    PreDeploy,
    Deploy,
    PostDeploy,
    CheckPermission,
    GrantPermission,
    ListCollaborator,
}

impl Lifecycle {
    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::PreProvision => "preProvision",
            Lifecycle::Provision => "provision",
            Lifecycle::ConfigureResource => "configureResource",
            Lifecycle::PreDeploy => "preDeploy",
            Lifecycle::Deploy => "deploy",
            Lifecycle::PostDeploy => "postDeploy",
            Lifecycle::CheckPermission => "checkPermission",
            Lifecycle::GrantPermission => "grantPermission",
            Lifecycle::ListCollaborator => "listCollaborator",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of access tokens handed to plugins
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self, scopes: &[&str]) -> Result<String, PluginError>;
}

/// Everything a lifecycle hook can see
#[derive(Clone)]
pub struct PluginContext {
    pub project_path: PathBuf,
    pub env_name: String,
    /// Caller-supplied inputs (e.g. the collaborator email for permissions)
    pub inputs: Value,
    /// Snapshot of the environment state before the current stage
    pub state: Arc<EnvState>,
    pub token_provider: Arc<dyn TokenProvider>,
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("project_path", &self.project_path)
            .field("env_name", &self.env_name)
            .field("inputs", &self.inputs)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// A cloud resource managed through lifecycle hooks
///
/// Implementations return their own slice of output; the solution merges the
/// slices into the environment state keyed by plugin name.
#[async_trait]
pub trait ResourcePlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the plugin implements `lifecycle`
    fn supports(&self, lifecycle: Lifecycle) -> bool;

    async fn run(&self, lifecycle: Lifecycle, ctx: &PluginContext) -> Result<Value, PluginError>;
}

/// A bound lifecycle hook, ready to be invoked once
pub type LifecycleFn<'a> =
    Box<dyn FnOnce() -> BoxFuture<'a, Result<Value, PluginError>> + Send + 'a>;

/// Look up `lifecycle` on `plugin`; `None` when the plugin does not implement it
pub fn lifecycle_hook<'a>(
    plugin: &'a dyn ResourcePlugin,
    lifecycle: Lifecycle,
    ctx: &'a PluginContext,
) -> Option<LifecycleFn<'a>> {
    if !plugin.supports(lifecycle) {
        return None;
    }
    Some(Box::new(move || plugin.run(lifecycle, ctx)))
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unsupported_lifecycle_has_no_hook() {
        let plugin = FakePlugin::new("fx-resource-bot").on(Lifecycle::Provision, json!({}));
        let ctx = context();

        assert!(lifecycle_hook(&plugin, Lifecycle::Deploy, &ctx).is_none());
        assert!(lifecycle_hook(&plugin, Lifecycle::Provision, &ctx).is_some());
        assert_eq!(plugin.invocations(), 0);
    }

    #[tokio::test]
    async fn test_hook_is_lazy_and_runs_once_called() {
        let plugin =
            FakePlugin::new("fx-resource-bot").on(Lifecycle::Provision, json!({"botId": "b1"}));
        let ctx = context();

        let hook = lifecycle_hook(&plugin, Lifecycle::Provision, &ctx).unwrap();
        assert_eq!(plugin.invocations(), 0);

        let output = hook().await.unwrap();
        assert_eq!(output, json!({"botId": "b1"}));
        assert_eq!(plugin.calls(), vec![Lifecycle::Provision]);
    }

    #[tokio::test]
    async fn test_plugins_use_injected_token_provider() {
        let plugin = FakePlugin::new("fx-resource-aad").on(Lifecycle::Provision, Value::Null);
        let ctx = context();

        let output = plugin.run(Lifecycle::Provision, &ctx).await.unwrap();
        assert_eq!(output, json!({"token": "token:scope"}));
    }

    #[test]
    fn test_lifecycle_names() {
        assert_eq!(Lifecycle::ConfigureResource.to_string(), "configureResource");
        assert_eq!(Lifecycle::ListCollaborator.as_str(), "listCollaborator");
    }
}
