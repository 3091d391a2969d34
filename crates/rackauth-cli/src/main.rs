//! rackauth - command-line client for the Rackspace Cloud v1.0 API.
//!
//! Authenticates an account, caches the session between runs, and issues
//! signed requests against the returned service endpoints.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use rackauth_core::{
    AuthEndpoint, CallOptions, Config, CredentialStore, Session, SessionStore,
};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "rackauth", version, about = "Authenticate and call the Rackspace Cloud API")]
struct Cli {
    /// Account name
    #[arg(long, env = "RACKSPACE_USER", global = true)]
    user: Option<String>,

    /// API key (falls back to the OS keychain)
    #[arg(long, env = "RACKSPACE_KEY", global = true, hide_env_values = true)]
    key: Option<String>,

    /// Authentication endpoint: `us`, `uk`, or the full endpoint URL
    #[arg(long, env = "RACKSPACE_AUTH_URL", global = true)]
    auth_url: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Authenticate and print the token and service endpoints
    Auth {
        /// Ignore the cached session
        #[arg(long)]
        fresh: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify an API key and store it in the OS keychain
    Login,

    /// Remove the stored API key and cached session
    Logout,

    /// Send an authenticated request and print the response
    Call {
        /// HTTP method (GET, PUT, POST, DELETE, HEAD, ...)
        method: String,

        url: String,

        /// Extra header, as `Name: value`
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Query parameter, as `key=value`
        #[arg(short = 'q', long = "query")]
        query: Vec<String>,

        /// Request body
        #[arg(long)]
        data: Option<String>,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr))
            .with(filter)
            .init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("Invalid log file path: {}", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;
    debug!(command = ?cli.command, "rackauth starting");

    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });

    match &cli.command {
        Command::Auth { fresh, json } => auth(&cli, &config, *fresh, *json).await,
        Command::Login => login(&cli, config).await,
        Command::Logout => logout(&cli, &config),
        Command::Call {
            method,
            url,
            headers,
            query,
            data,
        } => call(&cli, &config, method, url, headers, query, data.as_deref()).await,
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn auth(cli: &Cli, config: &Config, fresh: bool, json: bool) -> Result<()> {
    let user = resolve_user(cli, config)?;
    let mut session = open_session(cli, config, &user)?;
    let store = SessionStore::new(config.cache_dir(Some(&user))?);

    if !fresh {
        restore_cached(&mut session, &store);
    }
    authenticate_and_cache(&mut session, &store).await?;

    let info = session
        .auth_info()
        .ok_or_else(|| anyhow!("Session is not authenticated"))?;

    if json {
        let output = serde_json::json!({
            "user": session.user(),
            "auth_url": session.auth_url(),
            "token": info.token,
            "storage_url": info.storage_url,
            "cdn_url": info.cdn_url,
            "management_url": info.management_url,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("User:           {}", session.user());
        println!("Auth URL:       {}", session.auth_url());
        println!("Token:          {}", info.token);
        println!("Storage URL:    {}", info.storage_url);
        println!("CDN URL:        {}", info.cdn_url);
        println!("Management URL: {}", info.management_url);
    }
    Ok(())
}

async fn login(cli: &Cli, mut config: Config) -> Result<()> {
    let user = match cli.user.clone().or_else(|| config.last_user.clone()) {
        Some(user) => user,
        None => prompt_user()?,
    };
    let key = match cli.key.clone() {
        Some(key) => key,
        None => rpassword::prompt_password("API key: ")?,
    };
    let endpoint = resolve_endpoint(cli, &config)?;

    let mut session = Session::builder(user.clone(), key.clone())
        .auth_endpoint(endpoint)
        .build()?;

    eprintln!("Authenticating...");
    let store = SessionStore::new(config.cache_dir(Some(&user))?);
    authenticate_and_cache(&mut session, &store).await?;

    CredentialStore::store(endpoint, &user, &key)?;

    config.last_user = Some(user);
    config.auth_endpoint = Some(endpoint);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    info!(user = session.user(), "Login successful");
    eprintln!("Login successful!");
    Ok(())
}

fn logout(cli: &Cli, config: &Config) -> Result<()> {
    let user = resolve_user(cli, config)?;

    let endpoint = resolve_endpoint(cli, config)?;
    if !CredentialStore::delete(endpoint, &user)? {
        debug!(user = %user, region = endpoint.region(), "No stored API key");
    }
    SessionStore::new(config.cache_dir(Some(&user))?).clear()?;

    eprintln!("Logged out {}", user);
    Ok(())
}

async fn call(
    cli: &Cli,
    config: &Config,
    method: &str,
    url: &str,
    headers: &[String],
    query: &[String],
    data: Option<&str>,
) -> Result<()> {
    let method = parse_method(method)?;
    let mut options = CallOptions::new();
    for header in headers {
        let (name, value) = parse_header(header)?;
        options = options.header(name, value);
    }
    for param in query {
        let (key, value) = parse_query(param)?;
        options = options.query(key, value);
    }
    if let Some(data) = data {
        options = options.body(data);
    }

    let user = resolve_user(cli, config)?;
    let mut session = open_session(cli, config, &user)?;
    let store = SessionStore::new(config.cache_dir(Some(&user))?);
    restore_cached(&mut session, &store);
    authenticate_and_cache(&mut session, &store).await?;

    let response = session.call(url, method, options).await?;

    eprintln!("{}", response.status);
    for (name, value) in &response.headers {
        eprintln!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
    io::stdout().write_all(&response.body)?;

    if !response.status.is_success() {
        session.record_failure(&response);
        bail!("Request failed with status {}", response.status);
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn resolve_user(cli: &Cli, config: &Config) -> Result<String> {
    cli.user
        .clone()
        .or_else(|| config.last_user.clone())
        .ok_or_else(|| anyhow!("No user given. Pass --user, set RACKSPACE_USER, or run `rackauth login`"))
}

fn resolve_endpoint(cli: &Cli, config: &Config) -> Result<AuthEndpoint> {
    match cli.auth_url.as_deref() {
        Some(url) => Ok(url.parse()?),
        None => Ok(config.endpoint()),
    }
}

fn open_session(cli: &Cli, config: &Config, user: &str) -> Result<Session> {
    let endpoint = resolve_endpoint(cli, config)?;
    let key = match cli.key.clone() {
        Some(key) => key,
        None => CredentialStore::get_key(endpoint, user)?.ok_or_else(|| {
            anyhow!(
                "No API key for {} on {}. Pass --key or run `rackauth login`",
                user,
                endpoint.region()
            )
        })?,
    };

    Ok(Session::builder(user, key).auth_endpoint(endpoint).build()?)
}

fn restore_cached(session: &mut Session, store: &SessionStore) {
    match store.load() {
        Ok(Some(data)) if data.needs_refresh() => {
            debug!(minutes_left = data.minutes_until_expiry(), "Cached session close to expiry");
        }
        Ok(Some(data)) => {
            if session.restore(data) {
                debug!("Using cached session");
            }
        }
        Ok(None) => debug!("No cached session"),
        Err(e) => warn!(error = %e, "Failed to load cached session"),
    }
}

/// Authenticate unless a token is already present, then refresh the cache.
async fn authenticate_and_cache(session: &mut Session, store: &SessionStore) -> Result<()> {
    if session.is_authenticated() {
        return Ok(());
    }

    if !session.authenticate().await? {
        bail!(
            "Authentication failed ({}): {}",
            session.error_code().unwrap_or_default(),
            session.error_message().unwrap_or_default().trim()
        );
    }

    if let Some(data) = session.snapshot() {
        if let Err(e) = store.save(&data) {
            warn!(error = %e, "Failed to save session");
        }
    }
    Ok(())
}

fn prompt_user() -> Result<String> {
    eprint!("User: ");
    io::stderr().flush()?;

    let mut user = String::new();
    io::stdin().read_line(&mut user)?;
    Ok(user.trim().to_string())
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow!("Invalid HTTP method: {}", method))
}

fn parse_header(header: &str) -> Result<(HeaderName, HeaderValue)> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| anyhow!("Header must look like `Name: value`, got {:?}", header))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .with_context(|| format!("Invalid header name in {:?}", header))?;
    let value = HeaderValue::from_str(value.trim())
        .with_context(|| format!("Invalid header value in {:?}", header))?;
    Ok((name, value))
}

fn parse_query(param: &str) -> Result<(String, String)> {
    let (key, value) = param
        .split_once('=')
        .ok_or_else(|| anyhow!("Query parameter must look like `key=value`, got {:?}", param))?;
    if key.is_empty() {
        bail!("Query parameter name is empty in {:?}", param);
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let (name, value) = parse_header("X-Container-Meta-Color: blue").expect("valid header");
        assert_eq!(name.as_str(), "x-container-meta-color");
        assert_eq!(value.to_str().ok(), Some("blue"));

        let (_, value) = parse_header("X-Object-Manifest: c/seg:1").expect("colon in value");
        assert_eq!(value.to_str().ok(), Some("c/seg:1"));

        assert!(parse_header("no colon here").is_err());
        assert!(parse_header("Bad Name: x").is_err());
    }

    #[test]
    fn test_parse_query() {
        assert_eq!(
            parse_query("limit=10").expect("valid"),
            ("limit".to_string(), "10".to_string())
        );
        assert_eq!(
            parse_query("marker=").expect("empty value"),
            ("marker".to_string(), String::new())
        );
        assert!(parse_query("limit").is_err());
        assert!(parse_query("=10").is_err());
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("get").expect("get"), Method::GET);
        assert_eq!(parse_method("DELETE").expect("delete"), Method::DELETE);
        assert!(parse_method("BAD METHOD").is_err());
    }

    #[test]
    fn test_cli_parses_call() {
        let cli = Cli::try_parse_from([
            "rackauth",
            "--user",
            "demo",
            "--auth-url",
            "uk",
            "call",
            "put",
            "https://storage.example.com/v1/acct/photos",
            "-H",
            "X-Container-Read: .r:*",
            "-q",
            "format=xml",
        ])
        .expect("valid arguments");

        assert_eq!(cli.user.as_deref(), Some("demo"));
        let config = Config::default();
        assert_eq!(resolve_endpoint(&cli, &config).expect("endpoint"), AuthEndpoint::Uk);
        match cli.command {
            Command::Call { method, headers, query, data, .. } => {
                assert_eq!(method, "put");
                assert_eq!(headers, vec!["X-Container-Read: .r:*".to_string()]);
                assert_eq!(query, vec!["format=xml".to_string()]);
                assert!(data.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_endpoint_rejects_unknown() {
        let cli = Cli::try_parse_from(["rackauth", "--auth-url", "https://example.com", "logout"])
            .expect("valid arguments");
        assert!(resolve_endpoint(&cli, &Config::default()).is_err());
    }
}
