use crate::cli::{actions::Action, commands, dispatch, telemetry};
use anyhow::Result;

/// Parse the command line, bring up telemetry, and resolve the action the
/// binary should execute.
///
/// # Errors
///
/// Returns an error if telemetry initialization or dispatch fails.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity = matches
        .get_one::<u8>(commands::logging::ARG_VERBOSITY)
        .copied()
        .unwrap_or(0);
    telemetry::init(log_level(verbosity))?;

    dispatch::handler(&matches)
}

/// `-v` repetitions map onto tracing levels; no flag means errors only.
const fn log_level(verbosity: u8) -> Option<tracing::Level> {
    match verbosity {
        0 => None,
        1 => Some(tracing::Level::WARN),
        2 => Some(tracing::Level::INFO),
        3 => Some(tracing::Level::DEBUG),
        _ => Some(tracing::Level::TRACE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_mapping() {
        assert_eq!(log_level(0), None);
        assert_eq!(log_level(1), Some(tracing::Level::WARN));
        assert_eq!(log_level(2), Some(tracing::Level::INFO));
        assert_eq!(log_level(3), Some(tracing::Level::DEBUG));
        assert_eq!(log_level(4), Some(tracing::Level::TRACE));
        assert_eq!(log_level(255), Some(tracing::Level::TRACE));
    }
}
