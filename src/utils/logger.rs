use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DIRECTIVES: &str = "mailroom_engine=info,security=warn";
const VERBOSE_DIRECTIVES: &str = "mailroom_engine=debug,security=warn,info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line human output for terminals.
    Compact,
    /// One JSON object per event, fields flattened to the top level.
    Json,
}

impl LogFormat {
    pub fn from_flags(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}

/// `RUST_LOG` wins over the built-in directives when it is set.
fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            VERBOSE_DIRECTIVES
        } else {
            DEFAULT_DIRECTIVES
        })
    })
}

/// Install the global subscriber. Security denials are logged on the
/// `security` target, so the target is always printed.
pub fn init_logger(format: LogFormat, verbose: bool) {
    let registry = tracing_subscriber::registry().with(filter(verbose));
    let layer = tracing_subscriber::fmt::layer().with_target(true);

    match format {
        LogFormat::Compact => registry.with(layer.compact()).init(),
        LogFormat::Json => registry
            .with(layer.json().flatten_event(true).with_current_span(false))
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(LogFormat::from_flags(true), LogFormat::Json);
        assert_eq!(LogFormat::from_flags(false), LogFormat::Compact);
    }

    #[test]
    fn test_directives_parse() {
        for directives in [DEFAULT_DIRECTIVES, VERBOSE_DIRECTIVES] {
            assert!(EnvFilter::try_new(directives).is_ok());
        }
    }
}
