//! Configuration management for the NotesAI API.
//!
//! Options come from command-line arguments or environment variables, and a
//! `.env` file in the working directory is loaded before parsing.
//!
//! # Commands
//!
//! - `serve` - Run the HTTP server
//! - `check` - Verify database and provider connectivity
//! - `token` - Mint a development bearer token
//!
//! # Environment Variables
//!
//! - `NOTESAI_HOST` - Server bind address (default: 0.0.0.0)
//! - `NOTESAI_PORT` or `PORT` - Server port (default: 8080)
//! - `MONGODB_URI` - MongoDB connection string (required)
//! - `NOTESAI_DATABASE` - Database name (default: NotesAI)
//! - `NOTESAI_MAX_POOL_SIZE` - Connection pool bound (default: 5)
//! - `REPLICATE_API_TOKEN` - Replicate API token (required)
//! - `REPLICATE_API_URL` - Replicate API base URL
//! - `FIREBASE_PROJECT_ID` - Firebase project whose ID tokens are accepted
//! - `NOTESAI_AUTH_SECRET` - HS256 secret for development tokens
//! - `NOTESAI_CORS_ORIGINS` - Allowed CORS origins, comma-separated
//! - `NOTESAI_MAX_BODY_SIZE` - Request body limit in bytes (default: 10 MiB)

use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;

use crate::inference::DEFAULT_REPLICATE_API_URL;
use crate::server::DEFAULT_MAX_BODY_SIZE;
use crate::store::{DEFAULT_DATABASE, DEFAULT_MAX_POOL_SIZE};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default lifetime of a development token, in seconds.
pub const DEFAULT_TOKEN_TTL: u64 = 3600;

/// Longest lifetime the `token` command will mint (30 days).
pub const MAX_TOKEN_TTL: u64 = 30 * 24 * 3600;

/// Variable consulted for the port when `NOTESAI_PORT` is unset.
pub const PLATFORM_PORT_ENV: &str = "PORT";

// =============================================================================
// CLI Arguments
// =============================================================================

/// NotesAI API - project storage and AI image editing.
#[derive(Parser, Debug, Clone)]
#[command(name = "notesai-api")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Consume the parsed arguments and return the selected command.
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeConfig),

    /// Check database and provider connectivity
    Check(CheckConfig),

    /// Mint a development bearer token for shared-secret mode
    Token(TokenConfig),
}

// =============================================================================
// Serve
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "NOTESAI_HOST")]
    pub host: String,

    /// Port to listen on. Falls back to `PORT`, then 8080.
    #[arg(short, long, env = "NOTESAI_PORT")]
    pub port: Option<u16>,

    /// Maximum request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_SIZE, env = "NOTESAI_MAX_BODY_SIZE")]
    pub max_body_size: usize,

    // =========================================================================
    // Database Configuration
    // =========================================================================
    /// MongoDB connection string.
    #[arg(long, env = "MONGODB_URI", hide_env_values = true)]
    pub mongodb_uri: String,

    /// Database holding the Projects collection.
    #[arg(long, default_value = DEFAULT_DATABASE, env = "NOTESAI_DATABASE")]
    pub database: String,

    /// Maximum number of pooled database connections.
    #[arg(long, default_value_t = DEFAULT_MAX_POOL_SIZE, env = "NOTESAI_MAX_POOL_SIZE")]
    pub max_pool_size: u32,

    // =========================================================================
    // Inference Provider Configuration
    // =========================================================================
    /// Replicate API token.
    #[arg(long, env = "REPLICATE_API_TOKEN", hide_env_values = true)]
    pub replicate_api_token: String,

    /// Replicate API base URL.
    #[arg(long, default_value = DEFAULT_REPLICATE_API_URL, env = "REPLICATE_API_URL")]
    pub replicate_api_url: String,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Firebase project whose ID tokens are accepted.
    #[arg(long, env = "FIREBASE_PROJECT_ID")]
    pub firebase_project_id: Option<String>,

    /// Shared HS256 secret for development tokens.
    ///
    /// WARNING: replaces Firebase verification. Only use in development.
    #[arg(long, env = "NOTESAI_AUTH_SECRET", hide_env_values = true)]
    pub auth_secret: Option<String>,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "NOTESAI_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.mongodb_uri.trim().is_empty() {
            return Err("MongoDB URI is required. Set --mongodb-uri or MONGODB_URI".to_string());
        }

        if self.replicate_api_token.trim().is_empty() {
            return Err(
                "Replicate API token is required. Set --replicate-api-token or REPLICATE_API_TOKEN"
                    .to_string(),
            );
        }

        validate_api_url(&self.replicate_api_url)?;

        if self.max_pool_size == 0 {
            return Err("max_pool_size must be greater than 0".to_string());
        }

        if self.max_body_size == 0 {
            return Err("max_body_size must be greater than 0".to_string());
        }

        match (self.firebase_project(), self.dev_secret()) {
            (None, None) => Err(
                "No token verifier configured. Set --firebase-project-id or FIREBASE_PROJECT_ID \
                 (or --auth-secret for development)"
                    .to_string(),
            ),
            (Some(_), Some(_)) => Err(
                "--firebase-project-id and --auth-secret are mutually exclusive".to_string(),
            ),
            _ => Ok(()),
        }
    }

    /// Resolve the port from `--port`, `NOTESAI_PORT`, then `PORT`.
    pub fn resolved_port(&self) -> Result<u16, String> {
        resolve_port(
            self.port,
            std::env::var(PLATFORM_PORT_ENV).ok().as_deref(),
        )
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> Result<String, String> {
        Ok(format!("{}:{}", self.host, self.resolved_port()?))
    }

    /// Firebase project id, if set and non-blank.
    pub fn firebase_project(&self) -> Option<&str> {
        non_blank(self.firebase_project_id.as_deref())
    }

    /// Development secret, if set and non-blank.
    pub fn dev_secret(&self) -> Option<&str> {
        non_blank(self.auth_secret.as_deref())
    }
}

/// Pick the explicit port, else parse the platform fallback, else the default.
pub fn resolve_port(explicit: Option<u16>, fallback: Option<&str>) -> Result<u16, String> {
    if let Some(port) = explicit {
        return Ok(port);
    }

    match fallback.map(str::trim).filter(|p| !p.is_empty()) {
        Some(value) => value
            .parse()
            .map_err(|_| format!("Invalid {} value: '{}'", PLATFORM_PORT_ENV, value)),
        None => Ok(DEFAULT_PORT),
    }
}

/// Require an absolute http(s) URL for the provider API.
pub fn validate_api_url(value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("Invalid Replicate API URL '{}': {}", value, e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(format!(
            "Invalid Replicate API URL '{}': unsupported scheme '{}'",
            value, scheme
        )),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Check
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// MongoDB connection string.
    #[arg(long, env = "MONGODB_URI", hide_env_values = true)]
    pub mongodb_uri: String,

    /// Database holding the Projects collection.
    #[arg(long, default_value = DEFAULT_DATABASE, env = "NOTESAI_DATABASE")]
    pub database: String,

    /// Replicate API token. The provider check is skipped when absent.
    #[arg(long, env = "REPLICATE_API_TOKEN", hide_env_values = true)]
    pub replicate_api_token: Option<String>,

    /// Replicate API base URL.
    #[arg(long, default_value = DEFAULT_REPLICATE_API_URL, env = "REPLICATE_API_URL")]
    pub replicate_api_url: String,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Token
// =============================================================================

/// Output format for the `token` command.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenOutputFormat {
    /// The bare token
    #[default]
    Token,

    /// JSON object with token, claims and expiry
    Json,

    /// A ready-to-use `Authorization` header line
    Header,
}

#[derive(Args, Debug, Clone)]
pub struct TokenConfig {
    /// Shared secret the server was started with.
    #[arg(long, env = "NOTESAI_AUTH_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Email claim; becomes the owner of created projects.
    #[arg(long)]
    pub email: String,

    /// Subject claim. Defaults to the email.
    #[arg(long)]
    pub uid: Option<String>,

    /// Token lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL)]
    pub ttl: u64,

    #[arg(long, value_enum, default_value_t = TokenOutputFormat::Token)]
    pub format: TokenOutputFormat,
}

impl TokenConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("Secret is required. Set --secret or NOTESAI_AUTH_SECRET".to_string());
        }
        if self.email.trim().is_empty() {
            return Err("Email is required".to_string());
        }
        if self.ttl == 0 {
            return Err("ttl must be greater than 0".to_string());
        }
        if self.ttl > MAX_TOKEN_TTL {
            return Err(format!("ttl must be at most {} seconds", MAX_TOKEN_TTL));
        }
        Ok(())
    }

    /// Subject claim for the token.
    pub fn subject(&self) -> &str {
        self.uid.as_deref().unwrap_or(&self.email)
    }
}

// =============================================================================
// Tests
// =============================================================================
