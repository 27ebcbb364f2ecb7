//! Solution-level orchestration of resource plugins

use crate::error::{ExecutionError, PluginError};
use crate::executor::{
    execute_lifecycles, execute_sequentially, execute_thunks, ExecutionResult, Lifecycle,
    LifecycleEntry, NamedThunk, PluginContext, PluginOutput, ResourcePlugin, TokenProvider,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const SOLUTION: &str = "solution";

/// Per-environment state, one slice per plugin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvState {
    plugins: BTreeMap<String, Value>,
}

impl EnvState {
    pub fn get(&self, plugin: &str) -> Option<&Value> {
        self.plugins.get(plugin)
    }

    pub fn set(&mut self, plugin: impl Into<String>, value: Value) {
        self.plugins.insert(plugin.into(), value);
    }

    /// Merge one plugin's output into its slice
    ///
    /// Object outputs update the existing object key by key; any other
    /// non-null output replaces the slice. `null` leaves it untouched.
    pub fn merge_output(&mut self, plugin: &str, output: Value) {
        match output {
            Value::Null => {}
            Value::Object(update) => match self.plugins.get_mut(plugin) {
                Some(Value::Object(existing)) => existing.extend(update),
                _ => {
                    self.plugins.insert(plugin.to_string(), Value::Object(update));
                }
            },
            other => {
                self.plugins.insert(plugin.to_string(), other);
            }
        }
    }

    pub fn merge<'o>(&mut self, outputs: impl IntoIterator<Item = &'o PluginOutput>) {
        for output in outputs {
            self.merge_output(&output.plugin_name, output.output.clone());
        }
    }

    pub fn plugins(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }
}

/// A project's resource plugins and the collaborators they share
pub struct Solution {
    project_path: PathBuf,
    env_name: String,
    plugins: Vec<Arc<dyn ResourcePlugin>>,
    token_provider: Arc<dyn TokenProvider>,
}

impl Solution {
    pub fn new(
        project_path: impl Into<PathBuf>,
        env_name: impl Into<String>,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            project_path: project_path.into(),
            env_name: env_name.into(),
            plugins: Vec::new(),
            token_provider,
        }
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn ResourcePlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn plugin_names(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|plugin| plugin.name())
    }

    fn context(&self, state: &EnvState, inputs: &Value) -> PluginContext {
        PluginContext {
            project_path: self.project_path.clone(),
            env_name: self.env_name.clone(),
            inputs: inputs.clone(),
            state: Arc::new(state.clone()),
            token_provider: Arc::clone(&self.token_provider),
        }
    }

    fn entries<'a>(
        &'a self,
        lifecycle: Lifecycle,
        ctx: &'a PluginContext,
    ) -> Vec<LifecycleEntry<'a>> {
        self.plugins
            .iter()
            .map(|plugin| LifecycleEntry::for_plugin(plugin.as_ref(), lifecycle, ctx))
            .collect()
    }

    fn thunks<'a>(
        &'a self,
        lifecycle: Lifecycle,
        ctx: &'a PluginContext,
    ) -> Vec<NamedThunk<'a, Value>> {
        self.plugins
            .iter()
            .filter(|plugin| plugin.supports(lifecycle))
            .map(|plugin| {
                let plugin = plugin.as_ref();
                NamedThunk::new(plugin.name(), lifecycle.as_str(), move || {
                    plugin.run(lifecycle, ctx)
                })
            })
            .collect()
    }

    /// Pre-provision in sequence, then provision and configure concurrently
    ///
    /// Outputs are merged into `state` after every stage, including the
    /// successful slices of a partially failed stage.
    pub async fn provision(&self, state: &mut EnvState) -> Result<(), ExecutionError> {
        info!(env = %self.env_name, "provisioning");

        let ctx = self.context(state, &Value::Null);
        let pre = execute_sequentially(
            Lifecycle::PreProvision.as_str(),
            self.entries(Lifecycle::PreProvision, &ctx),
        )
        .await?;
        state.merge(&pre);

        for lifecycle in [Lifecycle::Provision, Lifecycle::ConfigureResource] {
            let ctx = self.context(state, &Value::Null);
            let result = execute_thunks(self.thunks(lifecycle, &ctx)).await;
            merge_collected(state, result)?;
        }

        info!(env = %self.env_name, "provision finished");
        Ok(())
    }

    /// Pre-deploy in sequence, then deploy and post-deploy concurrently
    pub async fn deploy(&self, state: &mut EnvState, inputs: &Value) -> Result<(), PluginError> {
        info!(env = %self.env_name, "deploying");

        let ctx = self.context(state, inputs);
        let outputs = execute_lifecycles(
            self.entries(Lifecycle::PreDeploy, &ctx),
            self.entries(Lifecycle::Deploy, &ctx),
            self.entries(Lifecycle::PostDeploy, &ctx),
            None,
            None,
            None,
        )
        .await?;
        state.merge(outputs.all());

        info!(env = %self.env_name, "deploy finished");
        Ok(())
    }

    /// Permissions of the collaborator named in `inputs`, per plugin
    pub async fn check_permission(
        &self,
        state: &EnvState,
        inputs: &Value,
    ) -> Result<Vec<PluginOutput>, ExecutionError> {
        self.collect(Lifecycle::CheckPermission, state, inputs).await
    }

    /// Grant the collaborator in `inputs` (`email`) access to every resource
    pub async fn grant_permission(
        &self,
        state: &EnvState,
        inputs: &Value,
    ) -> Result<Vec<PluginOutput>, ExecutionError> {
        let has_email = inputs
            .get("email")
            .and_then(Value::as_str)
            .is_some_and(|email| !email.trim().is_empty());
        if !has_email {
            let err =
                PluginError::user(SOLUTION, "an `email` input is required to grant permission");
            return Err(err.into());
        }
        self.collect(Lifecycle::GrantPermission, state, inputs).await
    }

    pub async fn list_collaborator(
        &self,
        state: &EnvState,
        inputs: &Value,
    ) -> Result<Vec<PluginOutput>, ExecutionError> {
        self.collect(Lifecycle::ListCollaborator, state, inputs).await
    }

    async fn collect(
        &self,
        lifecycle: Lifecycle,
        state: &EnvState,
        inputs: &Value,
    ) -> Result<Vec<PluginOutput>, ExecutionError> {
        let ctx = self.context(state, inputs);
        let outputs = execute_thunks(self.thunks(lifecycle, &ctx))
            .await
            .into_result()?;
        Ok(outputs
            .into_iter()
            .map(|output| PluginOutput {
                plugin_name: output.plugin_name,
                output: output.output,
            })
            .collect())
    }
}

fn merge_collected(
    state: &mut EnvState,
    result: ExecutionResult<Value>,
) -> Result<(), ExecutionError> {
    let (outputs, error) = result.into_parts();
    for output in outputs {
        state.merge_output(&output.plugin_name, output.output);
    }
    match error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::plugin::testing::{FakePlugin, StaticTokens};
    use serde_json::json;

    fn solution(plugins: Vec<Arc<FakePlugin>>) -> Solution {
        plugins.into_iter().fold(
            Solution::new("/tmp/project", "dev", Arc::new(StaticTokens)),
            |solution, plugin| solution.with_plugin(plugin),
        )
    }

    #[test]
    fn test_merge_output_updates_plugin_slice() {
        let mut state = EnvState::default();
        state.set("fx-resource-bot", json!({"botId": "b1", "region": "eu"}));

        state.merge_output("fx-resource-bot", json!({"region": "us", "endpoint": "e"}));
        state.merge_output("fx-resource-bot", Value::Null);
        state.merge_output("fx-resource-sql", json!("server-1"));

        assert_eq!(
            state.get("fx-resource-bot"),
            Some(&json!({"botId": "b1", "region": "us", "endpoint": "e"}))
        );
        assert_eq!(state.get("fx-resource-sql"), Some(&json!("server-1")));
        assert_eq!(
            state.plugins().collect::<Vec<_>>(),
            vec!["fx-resource-bot", "fx-resource-sql"]
        );
    }

    #[test]
    fn test_state_serializes_as_plain_object() {
        let mut state = EnvState::default();
        state.set("fx-resource-bot", json!({"botId": "b1"}));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value, json!({"fx-resource-bot": {"botId": "b1"}}));
        let back: EnvState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }

    #[tokio::test]
    async fn test_provision_runs_stages_and_merges_state() {
        let bot = Arc::new(
            FakePlugin::new("fx-resource-bot")
                .on(Lifecycle::PreProvision, json!({"appId": "a1"}))
                .on(Lifecycle::Provision, json!({"botId": "b1"}))
                .on(Lifecycle::ConfigureResource, json!({"configured": true})),
        );
        let sql = Arc::new(
            FakePlugin::new("fx-resource-sql").on(Lifecycle::Provision, json!({"server": "s"})),
        );
        let solution = solution(vec![bot.clone(), sql.clone()]);
        let mut state = EnvState::default();

        solution.provision(&mut state).await.unwrap();

        assert_eq!(
            bot.calls(),
            vec![
                Lifecycle::PreProvision,
                Lifecycle::Provision,
                Lifecycle::ConfigureResource
            ]
        );
        assert_eq!(sql.calls(), vec![Lifecycle::Provision]);
        assert_eq!(
            state.get("fx-resource-bot"),
            Some(&json!({"appId": "a1", "botId": "b1", "configured": true}))
        );
        assert_eq!(state.get("fx-resource-sql"), Some(&json!({"server": "s"})));
    }

    #[tokio::test]
    async fn test_provision_partial_failure_keeps_successful_slices() {
        let bot = Arc::new(
            FakePlugin::new("fx-resource-bot").on(Lifecycle::Provision, json!({"botId": "b1"})),
        );
        let sql = Arc::new(
            FakePlugin::new("fx-resource-sql")
                .failing(Lifecycle::Provision, "quota exceeded")
                .on(Lifecycle::ConfigureResource, json!({})),
        );
        let solution = solution(vec![bot, sql.clone()]);
        let mut state = EnvState::default();

        let err = solution.provision(&mut state).await.unwrap_err();

        assert!(err.partial);
        assert_eq!(err.first().unwrap().plugin, "fx-resource-sql");
        assert_eq!(state.get("fx-resource-bot"), Some(&json!({"botId": "b1"})));
        // configure never ran
        assert_eq!(sql.calls(), vec![Lifecycle::Provision]);
    }

    #[tokio::test]
    async fn test_pre_provision_failure_stops_everything() {
        let bot = Arc::new(
            FakePlugin::new("fx-resource-bot")
                .failing(Lifecycle::PreProvision, "not logged in")
                .on(Lifecycle::Provision, json!({})),
        );
        let solution = solution(vec![bot.clone()]);
        let mut state = EnvState::default();

        let err = solution.provision(&mut state).await.unwrap_err();

        assert!(!err.partial);
        assert_eq!(bot.calls(), vec![Lifecycle::PreProvision]);
    }

    #[tokio::test]
    async fn test_deploy_sequences_lifecycles() {
        let frontend = Arc::new(
            FakePlugin::new("fx-resource-frontend-hosting")
                .on(Lifecycle::PreDeploy, json!({"built": true}))
                .on(Lifecycle::Deploy, json!({"deployed": true})),
        );
        let bot = Arc::new(
            FakePlugin::new("fx-resource-bot")
                .on(Lifecycle::Deploy, json!({"deployed": true}))
                .on(Lifecycle::PostDeploy, json!({"warmed": true})),
        );
        let solution = solution(vec![frontend.clone(), bot.clone()]);
        let mut state = EnvState::default();

        solution.deploy(&mut state, &Value::Null).await.unwrap();

        assert_eq!(frontend.calls(), vec![Lifecycle::PreDeploy, Lifecycle::Deploy]);
        assert_eq!(bot.calls(), vec![Lifecycle::Deploy, Lifecycle::PostDeploy]);
        assert_eq!(
            state.get("fx-resource-bot"),
            Some(&json!({"deployed": true, "warmed": true}))
        );
    }

    #[tokio::test]
    async fn test_deploy_failure_skips_post_deploy() {
        let bot = Arc::new(
            FakePlugin::new("fx-resource-bot")
                .failing(Lifecycle::Deploy, "zip deploy failed")
                .on(Lifecycle::PostDeploy, json!({})),
        );
        let solution = solution(vec![bot.clone()]);
        let mut state = EnvState::default();

        let err = solution.deploy(&mut state, &Value::Null).await.unwrap_err();

        assert_eq!(err.message, "zip deploy failed");
        assert_eq!(bot.calls(), vec![Lifecycle::Deploy]);
        assert_eq!(state, EnvState::default());
    }

    #[tokio::test]
    async fn test_permission_operations_collect_per_plugin_outputs() {
        let aad = Arc::new(
            FakePlugin::new("fx-resource-aad-app-for-teams")
                .on(Lifecycle::CheckPermission, json!({"roles": ["Owner"]}))
                .on(Lifecycle::GrantPermission, json!({"granted": true}))
                .on(Lifecycle::ListCollaborator, json!(["a@contoso.com"])),
        );
        let appstudio = Arc::new(
            FakePlugin::new("fx-resource-appstudio")
                .on(Lifecycle::CheckPermission, json!({"roles": ["Administrator"]})),
        );
        let solution = solution(vec![aad, appstudio]);
        let state = EnvState::default();
        let inputs = json!({"email": "a@contoso.com"});

        let checked = solution.check_permission(&state, &inputs).await.unwrap();
        assert_eq!(checked.len(), 2);
        assert_eq!(checked[1].plugin_name, "fx-resource-appstudio");

        let granted = solution.grant_permission(&state, &inputs).await.unwrap();
        assert_eq!(granted.len(), 1);

        let listed = solution.list_collaborator(&state, &Value::Null).await.unwrap();
        assert_eq!(listed[0].output, json!(["a@contoso.com"]));
    }

    #[tokio::test]
    async fn test_grant_permission_requires_email() {
        let aad = Arc::new(
            FakePlugin::new("fx-resource-aad-app-for-teams")
                .on(Lifecycle::GrantPermission, json!({})),
        );
        let solution = solution(vec![aad.clone()]);

        let err = solution
            .grant_permission(&EnvState::default(), &json!({"email": " "}))
            .await
            .unwrap_err();

        assert_eq!(err.first().unwrap().plugin, SOLUTION);
        assert_eq!(aad.invocations(), 0);
    }

    #[tokio::test]
    async fn test_plugins_see_state_snapshot() {
        let bot =
            Arc::new(FakePlugin::new("fx-resource-bot").on(Lifecycle::CheckPermission, json!({})));
        let solution = solution(vec![bot]);
        let mut state = EnvState::default();
        state.set("fx-resource-bot", json!({"botId": "b1"}));

        let ctx = solution.context(&state, &Value::Null);
        assert_eq!(ctx.state.get("fx-resource-bot"), Some(&json!({"botId": "b1"})));
        assert_eq!(ctx.env_name, "dev");
        assert_eq!(solution.plugin_names().collect::<Vec<_>>(), vec!["fx-resource-bot"]);
    }
}
