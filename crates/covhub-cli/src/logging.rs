//! Tracing subscriber setup

use crate::config::Verbosity;
use tracing_subscriber::EnvFilter;

/// Default filter directive for a verbosity level
#[must_use]
pub const fn default_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "warn",
        Verbosity::Normal | Verbosity::Verbose => "info",
        Verbosity::Debug => "debug",
    }
}

/// Install the global subscriber; `RUST_LOG` overrides the verbosity default.
///
/// Logs go to stderr so report output on stdout stays clean. A second call is a no-op.
pub fn init_tracing(verbosity: Verbosity, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    // Already installed (tests, embedding)
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(Verbosity::Quiet), "warn");
        assert_eq!(default_directive(Verbosity::Normal), "info");
        assert_eq!(default_directive(Verbosity::Verbose), "info");
        assert_eq!(default_directive(Verbosity::Debug), "debug");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(Verbosity::Normal, false);
        init_tracing(Verbosity::Debug, true);
    }
}
