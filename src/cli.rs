//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::email::{LogMailer, Mailer, SmtpConfig, SmtpMailer};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "Videoflix", about = "Video streaming backend with HLS delivery")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "videoflix.db")]
    pub database: String,

    /// Directory holding video renditions and thumbnails
    #[arg(short, long, default_value = "media")]
    pub media_root: PathBuf,

    /// Public origin of this API, used to build absolute media URLs
    /// (e.g., "https://videoflix.example.com")
    #[arg(long, default_value = "http://localhost:8000")]
    pub public_origin: String,

    /// Origin of the frontend, used to build emailed activation/reset links
    #[arg(long, default_value = "http://localhost:5500")]
    pub frontend_origin: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// SMTP relay host. When unset, outgoing email is logged instead of sent
    #[arg(long, env = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    /// SMTP relay port
    #[arg(long, env = "SMTP_PORT", default_value = "1025")]
    pub smtp_port: u16,

    /// Sender address for outgoing email
    #[arg(long, env = "SMTP_FROM_EMAIL", default_value = "noreply@localhost")]
    pub smtp_from: String,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

/// Build the mailer from SMTP arguments. Without a host configured, email
/// is logged rather than sent.
pub fn build_mailer(args: &Args) -> Option<Arc<dyn Mailer>> {
    match &args.smtp_host {
        Some(host) => {
            let config = SmtpConfig {
                host: host.clone(),
                port: args.smtp_port,
                from_email: args.smtp_from.clone(),
                username: std::env::var("SMTP_USERNAME").ok(),
                password: std::env::var("SMTP_PASSWORD").ok(),
            };
            match SmtpMailer::new(&config) {
                Ok(mailer) => Some(Arc::new(mailer)),
                Err(e) => {
                    error!(host = %host, error = %e, "Failed to configure SMTP transport");
                    None
                }
            }
        }
        None => {
            warn!("No SMTP host configured, outgoing email will be logged only");
            Some(Arc::new(LogMailer))
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    jwt_secret: String,
    mailer: Arc<dyn Mailer>,
) -> ServerConfig {
    let secure_cookies = args.public_origin.starts_with("https://");

    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        media_root: args.media_root.clone(),
        public_origin: args.public_origin.trim_end_matches('/').to_string(),
        frontend_origin: args.frontend_origin.trim_end_matches('/').to_string(),
        secure_cookies,
        mailer,
    }
}
