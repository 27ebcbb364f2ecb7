//! Runtime configuration resolved from the product config and the environment

pub mod generator;

pub use generator::{GeneratorSettings, TemplateEndpoints};
