//! TeamsFx Core - scaffolding and lifecycle engine for Teams apps
//!
//! This library holds the pieces shared by the `teamsfx` CLI and any other
//! front end:
//!
//! - **Template/sample pipeline** ([`generator`], [`templates`]): resolves the
//!   newest template release within a version range, downloads it with
//!   bounded retries and timeouts ([`http`]), falls back to bundled zips and
//!   renders `.tpl` files while extracting.
//! - **Plugin executor** ([`executor`], [`solution`]): runs resource plugin
//!   lifecycle hooks sequentially or concurrently and reports partial
//!   success separately from failure.
//!
//! # Example Usage
//!
//! ```ignore
//! use teamsfx_core::{Generator, GeneratorSettings, ProductConfig, TemplateVariables};
//!
//! #[derive(Clone)]
//! struct MyConfig;
//! impl ProductConfig for MyConfig {
//!     fn name(&self) -> &'static str { "my-cli" }
//!     // ... implement other methods
//! }
//!
//! let settings = GeneratorSettings::from_config(&MyConfig)?;
//! let generator = Generator::new(settings);
//! let vars = TemplateVariables::for_app("My App").into_map();
//! generator.generate_template("default-bot", "./my-app".as_ref(), &vars).await?;
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod generator;
pub mod http;
pub mod logging;
pub mod product;
pub mod solution;
pub mod templates;

// Re-export main types for convenience
pub use config::GeneratorSettings;
pub use error::{ExecutionError, GeneratorError, PluginError, RenderError, RequestError};
pub use generator::{Generator, GeneratorContext};
pub use product::ProductConfig;
pub use solution::{EnvState, Solution};
pub use templates::{SampleConfig, SampleInfo, TemplateFetcher, TemplateVariables};
