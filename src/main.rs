//! Convocation attendance backend
//! Mission: Serve the roster API, or manage admin accounts from the shell

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use convocation_attendance::{
    api::{self, AppState},
    auth::JwtHandler,
    config::AppConfig,
    store::Store,
};

#[derive(Parser, Debug)]
#[command(name = "convocation")]
#[command(about = "Role-based convocation attendance backend")]
struct Cli {
    /// Optional TOML config file; environment variables override it
    #[arg(long, env = "CONVOCATION_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Create an additional admin account
    CreateAdmin {
        #[arg(long)]
        username: String,

        #[arg(long, env = "NEW_ADMIN_PASSWORD")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Invalid configuration")?;

    let store = Arc::new(Store::open(&config.db_path, config.bcrypt_cost)?);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, store).await,
        Commands::CreateAdmin { username, password } => {
            let admin = store
                .create_admin(&username, &password)
                .with_context(|| format!("Failed to create admin '{}'", username))?;
            info!("Admin '{}' created ({})", username, admin.id);
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, store: Arc<Store>) -> Result<()> {
    match config.default_admin_password.as_deref() {
        Some(password) => {
            if store.ensure_default_admin(&config.default_admin_username, password)? {
                info!("Created default admin '{}'", config.default_admin_username);
            }
        }
        None => warn!("ADMIN_PASSWORD not set; no default admin is created"),
    }

    let window = config.attendance_window()?;
    info!(
        "Attendance window {} - {} (UTC{:+} min)",
        window.start(),
        window.end(),
        config.utc_offset_minutes
    );

    let jwt = Arc::new(JwtHandler::new(
        config.jwt_secret.clone(),
        config.token_ttl_minutes,
    ));
    let app = api::router(AppState::new(store, jwt, window));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("API server listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "convocation_attendance=debug,convocation=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) The crate's own .env, for runs started from another directory
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
