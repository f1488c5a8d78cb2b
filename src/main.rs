use std::time::Duration;

use clap::Parser;
use github_connect::{
    AuthError, AuthProperties, CancellationToken, ChallengeOutcome, LocalServer,
    LocalServerConfig, OAuthHandler, providers,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "github-connect",
    about = "Sign in with GitHub via OAuth and print the resulting claims ticket as JSON."
)]
struct Cli {
    #[arg(long, env = "GITHUB_CLIENT_ID")]
    client_id: String,

    #[arg(long, env = "GITHUB_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Loopback port registered as the OAuth app's callback URL.
    #[arg(long, default_value_t = 8765)]
    port: u16,

    /// Extra scope on top of `user`; may be repeated.
    #[arg(long = "scope")]
    scopes: Vec<String>,

    #[arg(long)]
    no_pkce: bool,

    /// Store the provider tokens in the ticket properties.
    #[arg(long)]
    save_tokens: bool,

    /// Give up waiting for the browser callback after this many seconds.
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), AuthError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let server_config = LocalServerConfig::new("127.0.0.1", cli.port, providers::github::CALLBACK_PATH)
        .with_timeout(Duration::from_secs(cli.timeout_secs));
    let origin = server_config.origin();

    let handler = OAuthHandler::builder(providers::github()?)
        .with_client_id(cli.client_id)
        .with_client_secret(cli.client_secret)
        .with_callback_path(server_config.path.clone())
        .with_scopes(cli.scopes)
        .with_pkce(!cli.no_pkce)
        .with_save_tokens(cli.save_tokens)
        .build()?;

    // Bind before opening the browser so the callback cannot race the server.
    let server = LocalServer::from_config(server_config)?;
    let listener = server.bind()?;

    let challenge = match handler.challenge(AuthProperties::new(), &origin).await? {
        ChallengeOutcome::Redirect(challenge) => challenge,
        ChallengeOutcome::Handled => return Ok(()),
    };

    eprintln!("Authorization URL:\n{}", challenge.authorization_url);
    if let Err(err) = webbrowser::open(&challenge.authorization_url) {
        warn!(%err, "failed to open browser automatically");
    }

    let query = server.listen_with(listener).await?;
    let outcome = handler
        .handle_callback(&query, &origin, &CancellationToken::new())
        .await;

    match outcome.into_result() {
        Ok(Some(ticket)) => {
            println!("{}", serde_json::to_string_pretty(&ticket)?);
            Ok(())
        }
        Ok(None) => {
            info!("callback handled without a ticket");
            Ok(())
        }
        Err(failure) => Err(failure.error),
    }
}
