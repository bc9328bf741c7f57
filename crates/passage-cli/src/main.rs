//! Passage - log in to a token-authenticated admin API from the terminal.
//!
//! The session token is kept in the configured storage backend for 7 days,
//! so `info` and `logout` work across invocations.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Local;
use passage_core::auth::salutation_now;
use passage_core::config::{Config, StorageBackend, APP_NAME};
use passage_core::{
    Credentials, ExpiringCache, FileStorage, HttpAuthApi, KeyringStorage, MemoryStorage,
    RandomGreeter, SessionManager, SessionStatus, Storage, ACCESS_TOKEN_KEY,
};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Manager = SessionManager<HttpAuthApi, Box<dyn Storage>, RandomGreeter>;

/// Log file name in cache directory
const LOG_FILE: &str = "passage.log";

const USAGE: &str = "\
Usage: passage <command>

Commands:
  login [username]   Log in and load the user profile
  info               Show the profile for the saved session
  status             Show whether a session is saved and when it expires
  logout             End the saved session

Environment:
  PASSAGE_API_URL    Auth API base URL (overrides config)
  PASSAGE_USERNAME   Username for login
  PASSAGE_PASSWORD   Password for login (prompted if unset)
  RUST_LOG           Log filter (default: warn)";

/// Initialize the tracing subscriber for logging.
/// Logs go to stderr and, when the cache directory is writable, to a log file.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) if std::fs::create_dir_all(dir).is_ok() => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
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

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config ({}), using defaults", e);
            let mut config = Config::default();
            config.apply_env();
            config
        }
    };
    let cache_dir = config.cache_dir().ok();

    let _guard = init_tracing(cache_dir.as_deref());
    debug!(api = %config.api_base_url, storage = ?config.storage, "Config loaded");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("help");

    let mut manager = build_manager(&config)?;

    match command {
        "login" => login(&mut manager, config, args.get(1).cloned()).await,
        "info" => show_info(&mut manager).await,
        "status" => show_status(&mut manager),
        "logout" => logout(&mut manager).await,
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => {
            eprintln!("{}", USAGE);
            bail!("Unknown command: {}", other)
        }
    }
}

fn build_manager(config: &Config) -> Result<Manager> {
    let storage: Box<dyn Storage> = match config.storage {
        StorageBackend::File => {
            let dir = config
                .cache_dir()
                .context("File storage needs a cache directory")?;
            Box::new(FileStorage::new(dir))
        }
        StorageBackend::Keyring => Box::new(KeyringStorage::new(APP_NAME)),
        StorageBackend::Memory => Box::new(MemoryStorage::new()),
    };

    let cache = ExpiringCache::new(storage);
    if config.storage.supports_expiry_sweep() {
        let swept = cache.remove_expired_keys();
        if swept > 0 {
            debug!(swept, "Removed expired cache entries");
        }
    }

    let api = HttpAuthApi::new(config.api_base_url.clone())?;
    Ok(SessionManager::new(api, cache, RandomGreeter).with_token_ttl(config.token_ttl()))
}

async fn login(manager: &mut Manager, mut config: Config, username: Option<String>) -> Result<()> {
    let username = match username
        .or_else(|| std::env::var("PASSAGE_USERNAME").ok())
        .filter(|u| !u.is_empty())
    {
        Some(u) => u,
        None => prompt_username(config.last_username.as_deref())?,
    };

    let password = match std::env::var("PASSAGE_PASSWORD") {
        Ok(p) if !p.is_empty() => p,
        _ => rpassword::prompt_password("Password: ")?,
    };

    if username.is_empty() || password.is_empty() {
        bail!("Username and password required");
    }

    manager
        .login(&Credentials::new(username.clone(), password))
        .await
        .context("Login failed")?;

    config.last_username = Some(username);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    let profile = manager
        .get_info()
        .await
        .context("Logged in, but the user profile could not be loaded")?;

    let state = manager.state();
    println!("{}, {}. {}", salutation_now(), profile.name, state.welcome);
    println!("Permissions: {}", profile.role.permission_list.join(", "));
    info!("Session established");
    Ok(())
}

fn prompt_username(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match (input.is_empty(), last) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    })
}

fn require_session(manager: &mut Manager) -> Result<()> {
    if !manager.restore() {
        bail!("Not logged in. Run `passage login` first.");
    }
    Ok(())
}

async fn show_info(manager: &mut Manager) -> Result<()> {
    require_session(manager)?;

    let profile = manager.get_info().await.context("Failed to load user profile")?;
    let info = serde_json::to_string_pretty(&profile.info)?;
    println!("{}", info);
    Ok(())
}

fn show_status(manager: &mut Manager) -> Result<()> {
    manager.restore();

    match manager.status() {
        SessionStatus::Unauthenticated => println!("Not logged in"),
        _ => {
            let expires = manager
                .cache()
                .expiration(ACCESS_TOKEN_KEY)
                .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("Logged in (session expires {})", expires);
        }
    }
    Ok(())
}

async fn logout(manager: &mut Manager) -> Result<()> {
    if !manager.restore() {
        println!("No saved session");
        return Ok(());
    }

    manager.logout().await;
    println!("Logged out");
    Ok(())
}
