use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use psn_oauth::{OAuthConfig, Result, TokenGrant};

/// PSN Remote Play Token Fetcher - logs in through the PSN authorization page and saves the tokens
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Print the login URL instead of opening a browser
    #[arg(long)]
    headless: bool,

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

    if let Err(err) = run(args).await {
        eprintln!("{err}");
        process::exit(err.exit_code());
    }
}

async fn run(args: Args) -> Result<()> {
    // Allow pointing at a different authentication service, e.g. a local stub
    let base = std::env::var("PSN_AUTH_BASE").ok();
    let config = OAuthConfig::remote_play(base.as_deref());

    println!("== PSN Remote Play Token Fetcher ==");
    println!("Sign in on the PSN Remote Play login page.");
    println!("After signing in you will land on a page showing \"redirect\" in the top-left.");
    println!("Copy the entire URL of that page, paste it below and press Enter.");
    println!();

    let duid = psn_oauth::generate_duid()?;
    eprintln!("Device identifier: {duid}");

    let auth_url = psn_oauth::build_auth_url(&config, &duid);

    if args.headless {
        println!("Open this page in a browser that supports Javascript and ReCaptcha:");
        println!("{auth_url}");
    } else {
        print!("Press Enter to open the PSN Remote Play login page in your browser");
        io::stdout().flush()?;
        read_line()?;
        if open::that(&auth_url).is_err() {
            eprintln!("Could not launch a browser; open this page yourself:");
            println!("{auth_url}");
        }
    }

    print!("Paste the redirect URL here > ");
    io::stdout().flush()?;
    let redirect = read_line()?;
    let code = psn_oauth::authorization_code_from_redirect(&redirect)?;

    eprintln!("Exchanging authorization code for tokens...");
    let grant = TokenGrant::AuthorizationCode { code };
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

/// Read one trimmed line from standard input.
fn read_line() -> Result<String> {
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
