use crate::api;
use anyhow::Result;
use secrecy::SecretString;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: String,
    pub frontend_base_url: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    info!(
        port = args.port,
        frontend = %args.frontend_base_url,
        "starting server"
    );

    let auth_config = api::handlers::auth::AuthConfig::new(args.frontend_base_url)
        .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds);

    api::new(
        args.port,
        args.dsn,
        SecretString::from(args.token_secret),
        auth_config,
    )
    .await
}
