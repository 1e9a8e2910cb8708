//! Tracing setup shared by the server binaries.
//!
//! `RUST_LOG` wins when set. Otherwise `MODELSOCK_LOG` picks the level for
//! the modelsock crates (default `info`). `LOG_FORMAT=json` switches to JSON
//! lines. Output always goes to stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const ENV_LOG: &str = "MODELSOCK_LOG";

fn level_from(value: Option<&str>) -> &'static str {
    match value {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    }
}

fn default_directives(level: &str) -> String {
    format!("modelsock={level},modelsock_python={level}")
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = level_from(std::env::var(ENV_LOG).ok().as_deref());
        EnvFilter::new(default_directives(level))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels() {
        assert_eq!(level_from(None), "info");
        assert_eq!(level_from(Some("debug")), "debug");
        assert_eq!(level_from(Some("warning")), "warn");
        assert_eq!(level_from(Some("loud")), "info");
    }

    #[test]
    fn directives_cover_both_crates() {
        assert_eq!(
            default_directives("warn"),
            "modelsock=warn,modelsock_python=warn"
        );
    }

    #[test]
    fn init_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
