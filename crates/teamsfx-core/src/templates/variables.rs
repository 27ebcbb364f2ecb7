//! Standard replace map for scaffolded projects

use super::render::Variables;
use serde_json::Value;

/// Builder for the variables substituted into template files
#[derive(Debug, Clone, Default)]
pub struct TemplateVariables {
    values: Variables,
}

impl TemplateVariables {
    /// Variables every template may rely on, derived from the app name
    pub fn for_app(app_name: &str) -> Self {
        let safe = safe_project_name(app_name);
        let mut values = Variables::new();
        values.insert("appName".into(), Value::String(app_name.to_string()));
        values.insert("ProjectName".into(), Value::String(app_name.to_string()));
        values.insert("SafeProjectNameLowerCase".into(), Value::String(safe.to_lowercase()));
        values.insert("SafeProjectName".into(), Value::String(safe));
        Self { values }
    }

    /// Add or replace a variable
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn into_map(self) -> Variables {
        self.values
    }
}

/// Keep only ASCII letters and digits
pub fn safe_project_name(app_name: &str) -> String {
    app_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_app_builds_standard_names() {
        let map = TemplateVariables::for_app("My Teams-App 1").into_map();
        assert_eq!(map["appName"], "My Teams-App 1");
        assert_eq!(map["ProjectName"], "My Teams-App 1");
        assert_eq!(map["SafeProjectName"], "MyTeamsApp1");
        assert_eq!(map["SafeProjectNameLowerCase"], "myteamsapp1");
    }

    #[test]
    fn test_with_overrides_and_adds() {
        let map = TemplateVariables::for_app("demo")
            .with("appName", "renamed")
            .with("useAzure", true)
            .into_map();
        assert_eq!(map["appName"], "renamed");
        assert_eq!(map["useAzure"], true);
        assert_eq!(map["SafeProjectName"], "demo");
    }
}
