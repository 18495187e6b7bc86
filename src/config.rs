//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, Args};

/// Longest accepted session lifetime (ten years).
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Parser)]
#[command(name = "authgate", version, about = "Authenticated web server with email/password login and session cookies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Provision a user in the credential store and exit.
    AddUser {
        #[arg(long)]
        email: String,
        #[arg(long, env = "AUTHGATE_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Debug, Args)]
pub struct ServerArgs {
    /// HTTP listening port.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Folder holding the credential store.
    #[arg(long, env = "AUTHGATE_DB_FOLDER", default_value = "dbs")]
    pub db_folder: PathBuf,

    /// Folder served as static assets.
    #[arg(long, env = "AUTHGATE_PUBLIC_DIR", default_value = "public")]
    pub public_dir: PathBuf,

    /// Secret used to sign session cookies (at least 32 bytes). A random secret is
    /// generated when unset.
    #[arg(long, env = "AUTHGATE_SESSION_SECRET", hide_env_values = true)]
    pub session_secret: Option<String>,

    /// Session lifetime in seconds.
    #[arg(
        long,
        env = "AUTHGATE_SESSION_TTL_SECS",
        default_value_t = 86_400,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SESSION_TTL_SECS)
    )]
    pub session_ttl_secs: u64,

    /// Mark the session cookie `Secure` (HTTPS only).
    #[arg(long, env = "AUTHGATE_SECURE_COOKIES")]
    pub secure_cookies: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_root: PathBuf,
    pub public_dir: PathBuf,
    pub session_secret: Option<String>,
    pub session_ttl: Duration,
    pub secure_cookies: bool,
    /// How often expired sessions are evicted.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_root: PathBuf::from("dbs"),
            public_dir: PathBuf::from("public"),
            session_secret: None,
            session_ttl: Duration::from_secs(86_400),
            secure_cookies: false,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        Self {
            port: args.port,
            db_root: args.db_folder,
            public_dir: args.public_dir,
            session_secret: args.session_secret,
            session_ttl: Duration::from_secs(args.session_ttl_secs),
            secure_cookies: args.secure_cookies,
            ..Default::default()
        }
    }
}
