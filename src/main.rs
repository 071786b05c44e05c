use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log::*;
use portal_client::cache::ResourceKind;
use portal_client::storage::FileStore;
use portal_client::{Error, PortalClient, PortalClientConfig};
use secrecy::SecretString;
use serde_json::{json, Value};
use service::{config::Config, logging::Logger};

#[derive(Parser)]
#[command(author, version, about = "Command-line client for the loan portal API", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session and the current user's cached data
    Logout,
    /// Show the identity of the stored session
    Whoami,
    /// List loans
    Loans {
        /// Bypass the cached list and fetch it again
        #[arg(long)]
        refresh: bool,
    },
    /// Show a single loan
    Loan { id: String },
    /// Show the repayment schedule of a loan
    Schedule { id: String },
    /// Show the portfolio, maturity and high-risk reports
    Reports,
    /// Warm the cache with loan details
    Prefetch {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = Logger::init_logger(&cli.config) {
        eprintln!("Failed to start logger: {e}");
    }

    info!(
        "Using {} with storage at {} ({})",
        cli.config.base_url,
        cli.config.storage_path.display(),
        cli.config.runtime_env()
    );

    let client = match build_client(&cli.config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize portal client: {e}");
            std::process::exit(1);
        }
    };

    match run(&client, cli.command).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{output}"),
        },
        Err(e) if e.is_auth_expired() => {
            error!("{e}");
            eprintln!("Your session has expired. Log in again with `loan_portal_rs login`.");
            std::process::exit(1);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}

async fn build_client(config: &Config) -> Result<PortalClient, Error> {
    let backend = Arc::new(FileStore::open(&config.storage_path).await?);

    let mut client_config =
        PortalClientConfig::new(config.base_url.clone()).with_refresh_margin(config.refresh_margin());
    if let Some(timeout) = config.request_timeout() {
        client_config = client_config.with_timeout(timeout);
    }

    PortalClient::new(client_config, backend).await
}

async fn run(client: &PortalClient, command: Command) -> Result<Value, Error> {
    match command {
        Command::Login { email, password } => {
            let identity = client
                .auth()
                .login(&email, &SecretString::new(password))
                .await?;
            Ok(json!({ "loggedIn": true, "user": identity }))
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            client
                .auth()
                .register(&name, &email, &SecretString::new(password))
                .await
        }
        Command::Logout => {
            client.auth().logout().await?;
            Ok(json!({ "loggedIn": false }))
        }
        Command::Whoami => {
            let credentials = client.credentials().read().await;
            let expires_in_secs = credentials
                .as_ref()
                .and_then(|credentials| credentials.time_until_expiry())
                .map(|remaining| remaining.num_seconds());
            Ok(json!({
                "loggedIn": credentials.is_some(),
                "user": client.credentials().identity().await,
                "expiresInSecs": expires_in_secs,
            }))
        }
        Command::Loans { refresh: true } => client.portfolio().refresh_loans().await,
        Command::Loans { refresh: false } => client.portfolio().loans().await,
        Command::Loan { id } => client.portfolio().loan(&id).await,
        Command::Schedule { id } => client.portfolio().schedule(&id).await,
        Command::Reports => client.portfolio().reports().await,
        Command::Prefetch { ids } => {
            let mut handles = Vec::with_capacity(ids.len());
            for id in &ids {
                handles.push(client.portfolio().prefetch_loan(id).await);
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("Prefetch task did not complete: {e}");
                }
            }

            let user_id = client.credentials().user_id().await;
            let mut cached = serde_json::Map::new();
            for id in ids {
                let hit = client
                    .cache()
                    .read(&user_id, ResourceKind::LoanDetail, Some(&id))
                    .await?
                    .is_some();
                cached.insert(id, Value::Bool(hit));
            }
            Ok(json!({ "cached": cached }))
        }
    }
}
