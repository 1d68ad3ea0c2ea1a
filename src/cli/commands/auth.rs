use anyhow::{Context, Result};
use clap::{Arg, Command};

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("HMAC secret used to sign access and refresh tokens")
                .env("SERTIKA_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for CORS and cookie flags")
                .env("SERTIKA_FRONTEND_URL")
                .default_value("https://portal.sertika.dev"),
        )
        .arg(
            Arg::new("access-token-ttl-seconds")
                .long("access-token-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("SERTIKA_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-token-ttl-seconds")
                .long("refresh-token-ttl-seconds")
                .help("Refresh token TTL in seconds")
                .env("SERTIKA_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub token_secret: String,
    pub frontend_base_url: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
}

impl Options {
    /// Extract auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let token_secret = matches
            .get_one::<String>(ARG_TOKEN_SECRET)
            .cloned()
            .context("missing required argument: --token-secret")?;
        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .context("missing required argument: --frontend-base-url")?;
        let access_token_ttl_seconds = matches
            .get_one::<i64>("access-token-ttl-seconds")
            .copied()
            .unwrap_or(3600);
        let refresh_token_ttl_seconds = matches
            .get_one::<i64>("refresh-token-ttl-seconds")
            .copied()
            .unwrap_or(604_800);
        Ok(Self {
            token_secret,
            frontend_base_url,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
        })
    }
}
