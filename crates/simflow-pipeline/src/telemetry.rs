//! Tracing setup for the `simflow` binary.
//!
//! Tool runs, campaign state changes and per-test outcomes are logged to
//! stderr, leaving stdout for the ✓/✗ test summary. `SIMFLOW_LOG` (or
//! `RUST_LOG`) overrides the default filter, which shows the simflow crates
//! at the requested level and everything else at `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding a filter directive for simflow logs.
pub const LOG_ENV: &str = "SIMFLOW_LOG";

const CRATES: [&str; 3] = ["simflow", "simflow_pipeline", "simflow_domain"];

/// Default filter: simflow crates at `level`, dependencies at `warn`.
pub fn default_directive(level: Level) -> String {
    let mut directive = String::from("warn");
    for krate in CRATES {
        directive.push_str(&format!(",{}={}", krate, level.as_str().to_ascii_lowercase()));
    }
    directive
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_tracing(json: bool, level: Level) {
    let json_layer = json.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
    });
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_scopes_simflow_crates() {
        assert_eq!(
            default_directive(Level::DEBUG),
            "warn,simflow=debug,simflow_pipeline=debug,simflow_domain=debug"
        );
        assert!(EnvFilter::try_new(default_directive(Level::INFO)).is_ok());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
        tracing::info!("still alive");
    }
}
