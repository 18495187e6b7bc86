use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use authgate::config::{Cli, Command, ServerConfig};
use authgate::storage::{CredentialStore, FileUserStore, NewUser};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = ServerConfig::from(cli.server);

    match cli.command {
        Some(Command::AddUser { email, password }) => {
            let store = FileUserStore::open(&config.db_root)
                .with_context(|| format!("While opening credential store under {:?}", config.db_root))?;
            let user = store.insert(NewUser { email, password }).await?;
            info!(email = %user.email, id = %user.id, "user added");
            println!("added {} ({})", user.email, user.id);
            Ok(())
        }
        None => authgate::server::run(config).await,
    }
}
