//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret: auth_opts.token_secret,
        frontend_base_url: auth_opts.frontend_base_url,
        access_token_ttl_seconds: auth_opts.access_token_ttl_seconds,
        refresh_token_ttl_seconds: auth_opts.refresh_token_ttl_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_builds_server_action() -> Result<()> {
        temp_env::with_vars(
            [
                ("SERTIKA_PORT", None::<&str>),
                ("SERTIKA_DSN", None::<&str>),
                ("SERTIKA_TOKEN_SECRET", None::<&str>),
                ("SERTIKA_FRONTEND_URL", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "sertika",
                    "--port",
                    "9090",
                    "--dsn",
                    "postgres://user@localhost:5432/sertika",
                    "--token-secret",
                    "super-secret",
                    "--frontend-base-url",
                    "http://localhost:5173",
                ]);
                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 9090);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/sertika");
                assert_eq!(args.token_secret, "super-secret");
                assert_eq!(args.frontend_base_url, "http://localhost:5173");
                assert_eq!(args.access_token_ttl_seconds, 3600);
                assert_eq!(args.refresh_token_ttl_seconds, 604_800);
                Ok(())
            },
        )
    }
}
