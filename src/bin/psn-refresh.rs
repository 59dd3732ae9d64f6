use std::path::PathBuf;
use std::process;

use clap::Parser;
use psn_oauth::{OAuthConfig, Result, TokenGrant};

/// Exchange a stored PSN refresh token for a fresh token set, without the login step
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Refresh token from an earlier login (defaults to the PSN_REFRESH_TOKEN environment variable)
    #[arg(long)]
    refresh_token: Option<String>,

    /// Path to the human-readable credentials file
    #[arg(long, default_value = "psn-credentials.txt")]
    credentials_file: PathBuf,

    /// Path to the bare access-token file consumed by the streaming client
    #[arg(long, default_value = "/tmp/token.txt")]
    token_file: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let refresh_token = match args
        .refresh_token
        .clone()
        .or_else(|| std::env::var("PSN_REFRESH_TOKEN").ok())
    {
        Some(token) if !token.is_empty() => token,
        _ => {
            eprintln!("No refresh token given; pass --refresh-token or set PSN_REFRESH_TOKEN");
            process::exit(2);
        }
    };

    if let Err(err) = run(args, refresh_token).await {
        eprintln!("{err}");
        process::exit(err.exit_code());
    }
}

async fn run(args: Args, refresh_token: String) -> Result<()> {
    let base = std::env::var("PSN_AUTH_BASE").ok();
    let config = OAuthConfig::remote_play(base.as_deref());

    eprintln!("Exchanging refresh token for a new token set...");
    let grant = TokenGrant::RefreshToken { refresh_token };
    let tokens = psn_oauth::exchange_token(&config, &grant).await?;

    psn_oauth::write_credentials(&args.credentials_file, &tokens)?;
    println!(
        "Your credentials are saved to: {}",
        args.credentials_file.display()
    );

    psn_oauth::write_access_token(&args.token_file, &tokens)?;
    println!("Your access token is saved to: {}", args.token_file.display());

    Ok(())
}
