use clap_verbosity_flag::{LogLevel, Verbosity};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber, filtered by the command-line
/// verbosity. An explicit `RUST_LOG` in the environment overrides the
/// flag. Playback runs in a terminal next to the video window, so the
/// format keeps the level but drops timestamps and targets.
pub fn initialize<L>(verbosity: &Verbosity<L>)
where
    L: LogLevel,
{
    if verbosity.is_silent() {
        return;
    }

    let fallback = verbosity
        .log_level()
        .map(|level| level.as_str().to_lowercase())
        .unwrap_or_else(|| "trace".to_owned());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .compact()
        .init();
}
