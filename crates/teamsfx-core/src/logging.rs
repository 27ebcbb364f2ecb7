//! Tracing subscriber setup for binaries built on this crate

use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter (e.g. `teamsfx_core=debug`)
pub const LOG_ENV: &str = "TEAMSFX_LOG";

/// Level used when `TEAMSFX_LOG` is not set
fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Build the filter from `TEAMSFX_LOG`, falling back to the default level
pub fn build_env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level(verbose)))
}

/// Install a stderr fmt subscriber
///
/// Returns false when a global subscriber was already installed.
pub fn init_logging(verbose: bool) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(verbose))
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_levels() {
        assert_eq!(default_level(false), "warn");
        assert_eq!(default_level(true), "debug");
    }

    #[test]
    fn test_filter_falls_back_to_default_level() {
        if std::env::var(LOG_ENV).is_ok() {
            return;
        }
        assert_eq!(build_env_filter(false).to_string(), "warn");
        assert_eq!(build_env_filter(true).to_string(), "debug");
    }
}
