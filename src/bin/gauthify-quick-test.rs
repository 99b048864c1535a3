//! GAuthify quick test
//!
//! Runs a short end-to-end check of an account against the live API:
//! creates a throwaway user, checks OTPs and that auth codes reach the API,
//! optionally sends email/SMS, deletes the user and finally verifies that
//! the backup endpoint answers when the primary one is unreachable.
//!
//! Configuration is read from `GAUTHIFY_*` environment variables (a `.env`
//! file is loaded first if present).

use clap::Parser;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use gauthify_client::{ClientConfig, CreateUserParams, GAuthify};

const TEST_ACCOUNT: &str = "testuser@gauthify.com";
const UNREACHABLE_ENDPOINT: &str = "https://blah.gauthify.com/v1/";

#[derive(Parser)]
#[command(name = "gauthify-quick-test", about = "Smoke test a GAuthify account")]
struct Cli {
    /// Also send the OTP to this email address
    #[arg(long, value_name = "EMAIL")]
    email: Option<String>,

    /// Also text the OTP to this phone number
    #[arg(long, value_name = "NUMBER")]
    sms: Option<String>,

    /// Log filter, e.g. `debug` or `gauthify_client=trace`
    #[arg(long, default_value = "info")]
    level: String,
}

fn init_tracing(level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => level.to_string(),
    };
    let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing(&cli.level);

    let config = ClientConfig::from_env()?;
    let client = GAuthify::with_config(&config)?;

    info!("1) Creating a user");
    let user = client.create_user(TEST_ACCOUNT, TEST_ACCOUNT, &CreateUserParams::default())?;
    info!(unique_id = %user.unique_id, "created");

    info!("2) Retrieving the created user");
    let user = client.get_user(TEST_ACCOUNT)?;
    info!(?user, "retrieved");

    info!("3) Retrieving all users");
    let users = client.get_all_users()?;
    info!(count = users.len(), "listed");

    info!("4) Checking a bad OTP");
    if client.check_auth(TEST_ACCOUNT, "112345", None, false)? {
        return Err("bad OTP was accepted".into());
    }

    info!("5) Checking the current OTP");
    let otp = user.otp.as_deref().ok_or("user has no current OTP")?;
    if !client.check_auth(TEST_ACCOUNT, otp, None, false)? {
        return Err("current OTP was rejected".into());
    }

    if let Some(email) = cli.email.as_deref() {
        info!(email, "5a) Sending OTP by email");
        let result = client.send_email(TEST_ACCOUNT, Some(email))?;
        info!(%result, "sent");
    }
    if let Some(number) = cli.sms.as_deref() {
        info!(number, "5b) Sending OTP by SMS");
        let result = client.send_sms(TEST_ACCOUNT, Some(number))?;
        info!(%result, "sent");
    }

    info!("6) Checking that the auth code reaches the API");
    if !client.check_otp(TEST_ACCOUNT, "test12", None)?.provided_auth {
        return Err("auth_code not detected. Check if params sent via get request.".into());
    }

    info!("7) Deleting the created user");
    let result = client.delete_user(TEST_ACCOUNT)?;
    info!(%result, "deleted");

    info!("8) Checking the backup endpoint");
    let mut endpoints = vec![UNREACHABLE_ENDPOINT.to_string()];
    endpoints.extend(config.endpoints.iter().skip(1).cloned());
    let backup = GAuthify::with_config(&config.clone().with_endpoints(endpoints))?;
    let users = backup.get_all_users()?;
    info!(count = users.len(), "backup endpoint answered");

    info!("Tests look good");
    Ok(())
}
