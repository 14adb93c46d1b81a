use std::sync::Once;

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

static INIT: Once = Once::new();

/// `RUST_LOG` wins over `level` when set.
pub fn init(level: &str, format: LogFormat) {
    INIT.call_once(|| {
        let level = normalise_level(level);
        let fallback = format!("civic_insights={level},info");
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
        let builder = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false);
        match format {
            LogFormat::Json => builder.json().with_current_span(false).init(),
            LogFormat::Pretty => builder.init(),
        }
    });
}

fn normalise_level(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(normalise_level("WARNING"), "warn");
        assert_eq!(normalise_level("Debug"), "debug");
        assert_eq!(normalise_level("verbose"), "info");
    }
}
