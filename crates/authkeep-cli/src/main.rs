//! authkeep - command-line front end for the session manager.
//!
//! Every command reconciles the persisted token with the backend first,
//! then runs its operation and prints the navigation intents it produced.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use authkeep_core::{
    ApiClient, ChannelNavigator, Config, CredentialStore, Route, SessionManager, SessionState,
};

// ============================================================================
// Constants
// ============================================================================

const USAGE: &str = "\
Usage: authkeep <command>

Commands:
  status               Show the current session
  login [username]     Log in (password read from AUTHKEEP_PASSWORD or prompted)
  logout               Forget the stored token
  register <json>      Register a new account from a JSON profile";

const ENV_USERNAME: &str = "AUTHKEEP_USERNAME";
const ENV_PASSWORD: &str = "AUTHKEEP_PASSWORD";

const DEFAULT_LOG_FILE_NAME: &str = "authkeep.log";

type CliSessionManager = SessionManager<ApiClient, Box<dyn CredentialStore>, ChannelNavigator>;

/// Initialize the tracing subscriber for logging.
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(DEFAULT_LOG_FILE_NAME);
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load().context("Failed to load configuration")?;
    let _log_guard = init_tracing(config.log_file.as_deref());
    info!(api = %config.api_base_url, backend = ?config.credential_backend, "authkeep starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let client = ApiClient::from_config(&config)?;
    let store = config.build_store()?;
    let (navigator, mut routes) = ChannelNavigator::new();
    let manager: CliSessionManager = SessionManager::new(client, store, navigator);

    manager.initialize().await;

    let outcome = match command {
        "status" => None,
        "login" => {
            let username = match args.get(1) {
                Some(name) => name.clone(),
                None => prompt_username()?,
            };
            let password = read_password()?;
            manager.login(&username, &password).await
        }
        "logout" => {
            manager.logout().await;
            None
        }
        "register" => {
            let raw = args
                .get(1)
                .ok_or_else(|| anyhow!("register needs a JSON profile argument"))?;
            let profile: serde_json::Value =
                serde_json::from_str(raw).context("Profile is not valid JSON")?;
            manager.register(&profile).await
        }
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            return Ok(());
        }
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
    };

    print_routes(&mut routes);
    if let Some(message) = outcome {
        eprintln!("Error: {}", message);
    }
    print_state(&manager);

    info!("authkeep finished");
    Ok(())
}

fn prompt_username() -> Result<String> {
    if let Ok(name) = std::env::var(ENV_USERNAME) {
        if !name.is_empty() {
            return Ok(name);
        }
    }

    print!("Username: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let name = line.trim().to_string();
    if name.is_empty() {
        return Err(anyhow!("Username required"));
    }
    Ok(name)
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        if !password.is_empty() {
            return Ok(password);
        }
    }
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}

fn print_routes(routes: &mut UnboundedReceiver<Route>) {
    while let Ok(route) = routes.try_recv() {
        println!("-> {}", route);
    }
}

fn print_state(manager: &CliSessionManager) {
    match manager.state() {
        SessionState::Unauthenticated => println!("Not logged in"),
        SessionState::Authenticated { user } => match user.display_name() {
            Some(name) => println!("Logged in as {}", name),
            None => println!("Logged in: {}", user.as_value()),
        },
    }
}
