//! Error taxonomy shared by the template pipeline and the plugin executor
//!
//! Low-level helpers (HTTP, zip, rendering) return these errors directly. The
//! generator pipeline wraps failures with the name of the action that raised
//! them, and the executor aggregates plugin failures into [`ExecutionError`]
//! so callers can tell a partial success from a total failure.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed error used for transport-level causes
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a single (possibly retried) network request
#[derive(Debug, Error)]
pub enum RequestError {
    /// No usable response; `status` is set when the transport saw one
    #[error("could not reach server: {source}")]
    Network {
        status: Option<u16>,
        #[source]
        source: BoxError,
    },

    /// Server answered with a non-success status
    #[error("HTTP request failed with status {status}")]
    Status { status: u16 },

    /// 403/429 with an exhausted quota header
    #[error("rate limit exceeded (HTTP {status}); wait for the quota to reset or authenticate")]
    RateLimited { status: u16 },

    #[error("operation exceeded its time budget of {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    /// Called with a try limit of zero
    #[error("request was not sent")]
    NotSent,
}

impl RequestError {
    /// HTTP status observed for this failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Network { status, .. } => *status,
            RequestError::Status { status } | RequestError::RateLimited { status } => Some(*status),
            RequestError::Timeout { .. } | RequestError::NotSent => None,
        }
    }

    /// Whether another attempt may succeed: unknown status or a 5xx
    pub fn is_transient(&self) -> bool {
        match self {
            RequestError::Network { status, .. } => status.map_or(true, is_server_error),
            RequestError::Status { status } => is_server_error(*status),
            RequestError::RateLimited { .. } | RequestError::Timeout { .. } | RequestError::NotSent => {
                false
            }
        }
    }
}

fn is_server_error(status: u16) -> bool {
    (500..600).contains(&status)
}

/// Template parse failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("unclosed tag opened at byte {position}")]
    UnclosedTag { position: usize },

    #[error("empty tag at byte {position}")]
    EmptyTag { position: usize },

    #[error("section `{name}` opened at byte {position} is never closed")]
    UnclosedSection { name: String, position: usize },

    #[error("closing tag `{name}` at byte {position} has no open section")]
    UnopenedSection { name: String, position: usize },

    #[error("closing tag `{found}` at byte {position} does not match open section `{expected}`")]
    MismatchedSection {
        expected: String,
        found: String,
        position: usize,
    },

    #[error("unsupported tag type `{sigil}` at byte {position}")]
    UnsupportedTag { sigil: char, position: usize },
}

/// Failure of a template or sample generation
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// A pipeline step ran before the field it depends on was populated
    #[error("`{key}` must be populated before `{action}` runs")]
    MissingKey {
        key: &'static str,
        action: &'static str,
    },

    #[error("no valid template found for `{name}`")]
    TemplateNotFound { name: String },

    #[error("sample `{id}` not found")]
    SampleNotFound { id: String },

    /// Samples have no bundled fallback, so local template mode cannot serve them
    #[error("sample `{id}` cannot be downloaded while local template mode is on")]
    LocalOnly { id: String },

    #[error("zip entry `{entry}` resolves outside the destination directory")]
    UnsafeEntry { entry: String },

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("invalid sample config: {0}")]
    SampleConfig(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Failure raised by a named pipeline action
    #[error("action `{action}` failed: {source}")]
    Action {
        action: &'static str,
        #[source]
        source: Box<GeneratorError>,
    },
}

impl GeneratorError {
    /// Name of the action that failed, when the error came out of the pipeline
    pub fn action(&self) -> Option<&'static str> {
        match self {
            GeneratorError::Action { action, .. } => Some(action),
            _ => None,
        }
    }

    /// The underlying error with any action wrapper removed
    pub fn root(&self) -> &GeneratorError {
        match self {
            GeneratorError::Action { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Whether a plugin failure is the user's to fix or an internal fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    User,
    System,
}

/// Error returned by a resource plugin lifecycle hook
#[derive(Debug, Error)]
#[error("[{plugin}] {message}")]
pub struct PluginError {
    pub plugin: String,
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<BoxError>,
}

impl PluginError {
    pub fn user(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            kind: ErrorKind::User,
            message: message.into(),
            source: None,
        }
    }

    pub fn system(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            kind: ErrorKind::System,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Aggregate failure of a concurrently executed set of thunks
#[derive(Debug)]
pub struct ExecutionError {
    /// True when at least one sibling task still succeeded
    pub partial: bool,
    /// Names of the tasks that completed successfully
    pub succeeded: Vec<String>,
    pub failures: Vec<PluginError>,
}

impl ExecutionError {
    /// The first failure in input order
    pub fn first(&self) -> Option<&PluginError> {
        self.failures.first()
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.failures.len() + self.succeeded.len();
        write!(f, "{} of {} task(s) failed", self.failures.len(), total)?;
        if self.partial {
            write!(f, " (partial success)")?;
        }
        for failure in &self.failures {
            write!(f, "\n  - {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecutionError {}

impl From<PluginError> for ExecutionError {
    fn from(error: PluginError) -> Self {
        Self {
            partial: false,
            succeeded: Vec::new(),
            failures: vec![error],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let network = RequestError::Network {
            status: None,
            source: "connection reset".into(),
        };
        assert!(network.is_transient());
        assert!(RequestError::Status { status: 503 }.is_transient());
        assert!(!RequestError::Status { status: 404 }.is_transient());
        assert!(!RequestError::RateLimited { status: 429 }.is_transient());
        assert!(!RequestError::Timeout {
            timeout: Duration::from_millis(10)
        }
        .is_transient());
    }

    #[test]
    fn test_network_error_with_client_status_is_not_transient() {
        let err = RequestError::Network {
            status: Some(401),
            source: "unauthorized".into(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_generator_error_root_unwraps_actions() {
        let err = GeneratorError::Action {
            action: "Unzip",
            source: Box::new(GeneratorError::MissingKey {
                key: "zip",
                action: "Unzip",
            }),
        };
        assert_eq!(err.action(), Some("Unzip"));
        assert!(matches!(err.root(), GeneratorError::MissingKey { key: "zip", .. }));
    }

    #[test]
    fn test_execution_error_display_marks_partial_success() {
        let err = ExecutionError {
            partial: true,
            succeeded: vec!["fx-resource-sql".to_string()],
            failures: vec![PluginError::user("fx-resource-apim", "quota exceeded")],
        };
        let message = err.to_string();
        assert!(message.starts_with("1 of 2 task(s) failed (partial success)"));
        assert!(message.contains("[fx-resource-apim] quota exceeded"));
    }
}
