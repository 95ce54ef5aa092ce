//! NotesAI API - project storage and AI image editing.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notesai_api::{
    config::{CheckConfig, Cli, Command, ServeConfig, TokenConfig, TokenOutputFormat},
    inference::InferenceSettings,
    issue_token,
    server::{create_router, RouterConfig},
    JwtVerifier, MongoProjectStore, ReplicateClient,
};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; real environment variables still apply
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
        Command::Token(config) => run_token(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let addr = match config.bind_address() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let settings = InferenceSettings::default();

    info!("NotesAI API v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Database: {}", config.database);
    info!("  Pool size: {}", config.max_pool_size);
    info!("  Provider URL: {}", config.replicate_api_url);
    match &config.cors_origins {
        Some(origins) => info!("  CORS origins: {}", origins.join(", ")),
        None => info!("  CORS origins: any"),
    }
    info!("  Max body size: {} bytes", config.max_body_size);

    // Connect to the database
    info!("Connecting to MongoDB...");
    let store = match MongoProjectStore::connect(
        &config.mongodb_uri,
        &config.database,
        config.max_pool_size,
    )
    .await
    {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to create MongoDB client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = store.ping().await {
        error!("Failed to reach MongoDB: {}", e);
        error!("  Please check that MONGODB_URI is correct and the server is reachable");
        return ExitCode::FAILURE;
    }
    info!("  Connected to database '{}'", store.database());

    // Token verifier
    let http = reqwest::Client::new();
    let verifier = match (config.firebase_project(), config.dev_secret()) {
        (_, Some(secret)) => {
            warn!("  Auth: shared-secret development tokens");
            warn!("        Do not use --auth-secret in production");
            JwtVerifier::with_secret(secret)
        }
        (Some(project_id), None) => JwtVerifier::firebase(project_id, http),
        (None, None) => {
            error!("No token verifier configured");
            return ExitCode::FAILURE;
        }
    };
    info!("  Auth mode: {}", verifier.mode());
    if let Some(url) = verifier.key_source() {
        info!("  Signing keys: {}", url);
    }

    let editor = match ReplicateClient::new(
        config.replicate_api_token.clone(),
        config.replicate_api_url.clone(),
        settings,
    ) {
        Ok(editor) => editor,
        Err(e) => {
            error!("Failed to create Replicate client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "  Model: {} (max wait {}s)",
        editor.settings().model_ref(),
        editor.settings().max_wait.as_secs()
    );

    let router = create_router(store, editor, verifier, build_router_config(&config));

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "notesai_api=debug,tower_http=debug"
    } else {
        "notesai_api=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_max_body_size(config.max_body_size)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Token Command
// =============================================================================

fn run_token(config: TokenConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let ttl = Duration::from_secs(config.ttl);
    let (token, expiry) = match issue_token(&config.secret, config.subject(), &config.email, ttl) {
        Ok(issued) => issued,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match config.format {
        TokenOutputFormat::Token => {
            println!("{}", token);
        }
        TokenOutputFormat::Json => {
            let json = serde_json::json!({
                "token": token,
                "uid": config.subject(),
                "email": config.email,
                "expiry": expiry,
                "ttl": config.ttl,
            });
            match serde_json::to_string_pretty(&json) {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        TokenOutputFormat::Header => {
            println!("Authorization: Bearer {}", token);
        }
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("NotesAI API Configuration Check");
    println!("═══════════════════════════════");
    println!();

    print!("Connecting to MongoDB... ");
    let store = match MongoProjectStore::connect(&config.mongodb_uri, &config.database, 1).await {
        Ok(store) => store,
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = store.ping().await {
        println!("✗ failed");
        println!();
        println!("Error: {}", e);
        println!();
        println!("Please check:");
        println!("  - MONGODB_URI points at a reachable server");
        println!("  - The credentials in the URI are valid");
        return ExitCode::FAILURE;
    }
    println!("✓ success");

    match store.count().await {
        Ok(count) => println!("✓ Database '{}': {} project(s)", store.database(), count),
        Err(e) => {
            println!("✗ Database '{}': {}", store.database(), e);
            return ExitCode::FAILURE;
        }
    }

    match config.replicate_api_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => {
            print!("Verifying Replicate token... ");
            let client = match ReplicateClient::new(
                token,
                config.replicate_api_url.clone(),
                InferenceSettings::default(),
            ) {
                Ok(client) => client,
                Err(e) => {
                    println!("✗ failed");
                    println!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            };

            match client.verify_credentials().await {
                Ok(username) => println!("✓ account '{}'", username),
                Err(e) => {
                    println!("✗ failed");
                    println!();
                    println!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => {
            println!("- Replicate token not set, skipping provider check");
        }
    }

    println!();
    println!("═══════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
