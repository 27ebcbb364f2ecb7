//! HTTP helpers for template and sample downloads

pub mod retry;

pub use retry::{send_request_with_retry, send_request_with_timeout, HttpStatus};
