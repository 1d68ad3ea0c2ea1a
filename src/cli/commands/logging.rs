use clap::{Arg, ArgAction, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Accepts a level name or a repetition count up to 5.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(|level: &str| -> std::result::Result<u8, String> {
        match level.to_lowercase().as_str() {
            "error" => return Ok(0),
            "warn" => return Ok(1),
            "info" => return Ok(2),
            "debug" => return Ok(3),
            "trace" => return Ok(4),
            _ => {}
        }
        match level.parse::<u8>() {
            Ok(count) if count <= 5 => Ok(count),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log verbosity, repeatable (-v warn, -vv info, ...); errors only by default")
            .env("SERTIKA_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
